//! Who is signed in, as reported by the authentication provider.

use std::sync::RwLock;

use crate::domain::UserId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub token: String,
}

pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<AuthUser>;
}

/// Session holder the host application updates on sign-in and sign-out.
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<AuthUser>>,
}

impl SessionIdentity {
    pub fn signed_in(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self { user: RwLock::new(Some(AuthUser { user_id: UserId::new(user_id), token: token.into() })) }
    }

    pub fn sign_in(&self, user: AuthUser) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<AuthUser> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
