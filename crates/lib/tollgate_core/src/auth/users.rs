//! User profile operations.

use std::sync::Arc;

use tracing::info;

use super::AuthError;
use super::password::PasswordHasher;
use super::validation::validate_password;
use crate::models::auth::{Identity, ProfileUpdate, UserProfile};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    pub async fn get_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        self.store.find_profile(username).await
    }

    /// Apply `update` to `username`'s profile. The caller must be that user
    /// or an admin.
    pub async fn update_profile(
        &self,
        caller: &Identity,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AuthError> {
        authorize(caller, username)?;
        if update.is_empty() {
            return Err(AuthError::ValidationError("no profile fields given".into()));
        }
        self.store.update_profile(username, update).await?;
        info!(user_id = caller.user_id, target = username, "profile updated");
        Ok(())
    }

    /// Change the caller's own password. All open sessions are revoked.
    ///
    /// A wrong `old_password` yields `NotFound`.
    pub async fn change_password(
        &self,
        caller: &Identity,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if caller.user_name != username {
            return Err(AuthError::Forbidden(
                "cannot change another user's password".into(),
            ));
        }
        validate_password(new_password)?;
        self.store
            .change_password(
                caller.user_id,
                &self.hasher.hash(old_password),
                &self.hasher.hash(new_password),
            )
            .await?;
        info!(user_id = caller.user_id, "password changed");
        Ok(())
    }
}

fn authorize(caller: &Identity, username: &str) -> Result<(), AuthError> {
    if caller.user_name == username || caller.is_admin() {
        Ok(())
    } else {
        Err(AuthError::Forbidden("not allowed to modify this user".into()))
    }
}
