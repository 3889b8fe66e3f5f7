//! In-memory credential store.
//!
//! All tables sit behind one mutex, so every operation is trivially a single
//! transaction. Used by tests and by `tollgate auth --in-memory`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CredentialStore, TokenPurpose};
use crate::auth::AuthError;
use crate::models::auth::{Login, NewUser, ProfileUpdate, Role, User, UserProfile};

#[derive(Debug, Clone)]
struct TokenRow {
    user_id: i64,
    purpose: Option<TokenPurpose>,
    expires_at: DateTime<Utc>,
    consumed: bool,
}

impl TokenRow {
    fn live(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    next_id: i64,
    user_tokens: HashMap<String, TokenRow>,
    refresh_tokens: HashMap<String, TokenRow>,
}

impl Tables {
    fn user_mut(&mut self, user_id: i64) -> Result<&mut User, AuthError> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))
    }

    fn take_refresh(&mut self, token: &str, now: DateTime<Utc>) -> Result<i64, AuthError> {
        match self.refresh_tokens.get_mut(token) {
            Some(row) if row.live(now) => {
                row.consumed = true;
                Ok(row.user_id)
            }
            _ => Err(AuthError::NotFound("refresh token not found".into())),
        }
    }

    fn revoke_sessions(&mut self, user_id: i64) {
        for row in self.refresh_tokens.values_mut() {
            if row.user_id == user_id {
                row.consumed = true;
            }
        }
    }
}

/// Credential store holding everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tables: Mutex<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AuthError> {
        self.tables
            .lock()
            .map_err(|_| AuthError::Internal("credential store lock poisoned".into()))
    }

    /// Promote a user to a different role. Only used to seed admins.
    pub fn set_role(&self, username: &str, role: Role) -> Result<(), AuthError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .values_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
        user.role = role;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn create_user(
        &self,
        user: &NewUser,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AuthError::Conflict(
                "username or email already registered".into(),
            ));
        }

        tables.next_id += 1;
        let id = tables.next_id;
        tables.users.insert(
            id,
            User {
                id,
                username: user.username.clone(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                is_confirmed: false,
                first_name: None,
                last_name: None,
                middle_name: None,
                avatar: None,
                phone: None,
                role: Role::User,
                created_at: Utc::now(),
            },
        );
        tables.user_tokens.insert(
            confirm_token.to_string(),
            TokenRow {
                user_id: id,
                purpose: Some(TokenPurpose::Confirmation),
                expires_at,
                consumed: false,
            },
        );
        Ok(id)
    }

    async fn consume_confirmation_token(&self, token: &str) -> Result<i64, AuthError> {
        let mut tables = self.lock()?;
        let user_id = match tables.user_tokens.get_mut(token) {
            Some(row) if row.purpose == Some(TokenPurpose::Confirmation) && !row.consumed => {
                row.consumed = true;
                row.user_id
            }
            _ => return Err(AuthError::NotFound("confirmation token not found".into())),
        };
        tables.user_mut(user_id)?.is_confirmed = true;
        Ok(user_id)
    }

    async fn issue_confirmation_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tables = self.lock()?;
        let user_id = tables
            .users
            .values()
            .find(|u| u.email == email && !u.is_confirmed)
            .map(|u| u.id)
            .ok_or_else(|| AuthError::NotFound("no unconfirmed user with this email".into()))?;
        tables.user_tokens.insert(
            token.to_string(),
            TokenRow {
                user_id,
                purpose: Some(TokenPurpose::Confirmation),
                expires_at,
                consumed: false,
            },
        );
        Ok(user_id)
    }

    async fn issue_reset_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tables = self.lock()?;
        let user_id = tables
            .users
            .values()
            .find(|u| u.email == email && u.is_confirmed)
            .map(|u| u.id)
            .ok_or_else(|| AuthError::NotFound("no confirmed user with this email".into()))?;
        tables.user_tokens.insert(
            token.to_string(),
            TokenRow {
                user_id,
                purpose: Some(TokenPurpose::Reset),
                expires_at,
                consumed: false,
            },
        );
        Ok(user_id)
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<i64, AuthError> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        let user_id = match tables.user_tokens.get_mut(token) {
            Some(row) if row.purpose == Some(TokenPurpose::Reset) && !row.consumed => {
                if row.expires_at <= now {
                    return Err(AuthError::Expired("reset token expired".into()));
                }
                row.consumed = true;
                row.user_id
            }
            _ => return Err(AuthError::NotFound("reset token not found".into())),
        };
        tables.user_mut(user_id)?.password_hash = new_password_hash.to_string();
        tables.revoke_sessions(user_id);
        Ok(user_id)
    }

    async fn find_by_credentials(
        &self,
        login: &Login,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let tables = self.lock()?;
        tables
            .users
            .values()
            .find(|u| {
                let matches = match login {
                    Login::Email(email) => &u.email == email,
                    Login::Username(username) => &u.username == username,
                };
                matches && u.password_hash == password_hash
            })
            .cloned()
            .ok_or_else(|| AuthError::NotFound("user not found".into()))
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<User, AuthError> {
        let mut tables = self.lock()?;
        let user_id = tables.take_refresh(token, Utc::now())?;
        Ok(tables.user_mut(user_id)?.clone())
    }

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut tables = self.lock()?;
        tables.user_mut(user_id)?;
        tables.refresh_tokens.insert(
            token.to_string(),
            TokenRow {
                user_id,
                purpose: None,
                expires_at,
                consumed: false,
            },
        );
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_token: &str,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let mut tables = self.lock()?;
        let user_id = tables.take_refresh(old_token, Utc::now())?;
        tables.refresh_tokens.insert(
            new_token.to_string(),
            TokenRow {
                user_id,
                purpose: None,
                expires_at,
                consumed: false,
            },
        );
        Ok(tables.user_mut(user_id)?.clone())
    }

    async fn find_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        let tables = self.lock()?;
        tables
            .users
            .values()
            .find(|u| u.username == username)
            .map(UserProfile::from)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))
    }

    async fn update_profile(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AuthError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .values_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;

        let fields = [
            (&mut user.first_name, &update.first_name),
            (&mut user.last_name, &update.last_name),
            (&mut user.middle_name, &update.middle_name),
            (&mut user.avatar, &update.avatar),
            (&mut user.phone, &update.phone),
        ];
        for (stored, new) in fields {
            if let Some(value) = new {
                *stored = Some(value.clone());
            }
        }
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: i64,
        old_password_hash: &str,
        new_password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut tables = self.lock()?;
        let user = tables.user_mut(user_id)?;
        if user.password_hash != old_password_hash {
            return Err(AuthError::NotFound("user not found".into()));
        }
        user.password_hash = new_password_hash.to_string();
        tables.revoke_sessions(user_id);
        Ok(())
    }
}
