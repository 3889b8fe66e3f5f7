//! PostgreSQL credential store.
//!
//! Token consumption uses `UPDATE … WHERE NOT consumed … RETURNING` (or
//! `SELECT … FOR UPDATE` where the failure reason matters) inside the same
//! transaction as the dependent write. A concurrent transaction on the same
//! row blocks on the row lock and then re-evaluates the predicate against the
//! committed `consumed = TRUE`, so it sees no row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{CredentialStore, TokenPurpose};
use crate::auth::AuthError;
use crate::models::auth::{Login, NewUser, ProfileUpdate, Role, User, UserProfile};

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.is_confirmed, \
     u.first_name, u.last_name, u.middle_name, u.avatar, u.phone, u.role_id, u.created_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    is_confirmed: bool,
    first_name: Option<String>,
    last_name: Option<String>,
    middle_name: Option<String>,
    avatar: Option<String>,
    phone: Option<String>,
    role_id: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = role_from_id(row.role_id)?;
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            is_confirmed: row.is_confirmed,
            first_name: row.first_name,
            last_name: row.last_name,
            middle_name: row.middle_name,
            avatar: row.avatar,
            phone: row.phone,
            role,
            created_at: row.created_at,
        })
    }
}

fn role_from_id(id: i32) -> Result<Role, AuthError> {
    Role::from_id(id).ok_or_else(|| AuthError::Internal(format!("unknown role id {id}")))
}

/// Map a unique-constraint violation on `users` to `Conflict`.
fn map_unique_violation(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return AuthError::Conflict("username or email already registered".into());
    }
    AuthError::from(e)
}

/// Credential store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Fetch a user by id inside an open transaction.
async fn user_by_id(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> Result<User, AuthError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
    let row = sqlx::query_as::<_, UserRow>(&query)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
    User::try_from(row)
}

/// Consume a live refresh token inside an open transaction, returning its owner id.
async fn take_refresh_token(
    tx: &mut Transaction<'_, Postgres>,
    token: &str,
) -> Result<i64, AuthError> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE refresh_tokens SET consumed = TRUE, consumed_at = now() \
         WHERE token_hash = $1 AND NOT consumed AND expires_at > now() \
         RETURNING user_id",
    )
    .bind(token)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AuthError::NotFound("refresh token not found".into()))
}

/// Consume every live refresh token of a user inside an open transaction.
async fn revoke_sessions(tx: &mut Transaction<'_, Postgres>, user_id: i64) -> Result<u64, AuthError> {
    let done = sqlx::query(
        "UPDATE refresh_tokens SET consumed = TRUE, consumed_at = now() \
         WHERE user_id = $1 AND NOT consumed",
    )
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(done.rows_affected())
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(
        &self,
        user: &NewUser,
        confirm_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, password_hash, role_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(Role::User.id())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query(
            "INSERT INTO user_tokens (user_id, purpose, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(TokenPurpose::Confirmation.code())
        .bind(confirm_token)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn consume_confirmation_token(&self, token: &str) -> Result<i64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, i64>(
            "UPDATE user_tokens SET consumed = TRUE, consumed_at = now() \
             WHERE purpose = $1 AND token_hash = $2 AND NOT consumed \
             RETURNING user_id",
        )
        .bind(TokenPurpose::Confirmation.code())
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AuthError::NotFound("confirmation token not found".into()))?;

        debug!(user_id, "confirming user");
        sqlx::query("UPDATE users SET is_confirmed = TRUE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn issue_confirmation_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE email = $1 AND NOT is_confirmed FOR UPDATE",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AuthError::NotFound("no unconfirmed user with this email".into()))?;

        sqlx::query(
            "INSERT INTO user_tokens (user_id, purpose, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(TokenPurpose::Confirmation.code())
        .bind(token)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn issue_reset_token(
        &self,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM users WHERE email = $1 AND is_confirmed",
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AuthError::NotFound("no confirmed user with this email".into()))?;

        sqlx::query(
            "INSERT INTO user_tokens (user_id, purpose, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(TokenPurpose::Reset.code())
        .bind(token)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        new_password_hash: &str,
    ) -> Result<i64, AuthError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, (i64, i64, bool, bool)>(
            "SELECT id, user_id, consumed, expires_at > now() \
             FROM user_tokens \
             WHERE purpose = $1 AND token_hash = $2 \
             FOR UPDATE",
        )
        .bind(TokenPurpose::Reset.code())
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let (token_id, user_id) = match row {
            None | Some((_, _, true, _)) => {
                return Err(AuthError::NotFound("reset token not found".into()));
            }
            Some((_, _, false, false)) => {
                return Err(AuthError::Expired("reset token expired".into()));
            }
            Some((id, user_id, false, true)) => (id, user_id),
        };

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(new_password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE user_tokens SET consumed = TRUE, consumed_at = now() WHERE id = $1")
            .bind(token_id)
            .execute(&mut *tx)
            .await?;

        let revoked = revoke_sessions(&mut tx, user_id).await?;
        debug!(user_id, revoked, "password reset, sessions revoked");

        tx.commit().await?;
        Ok(user_id)
    }

    async fn find_by_credentials(
        &self,
        login: &Login,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let (column, identifier) = match login {
            Login::Email(email) => ("email", email),
            Login::Username(username) => ("username", username),
        };
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.{column} = $1 AND u.password_hash = $2"
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(identifier)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
        User::try_from(row)
    }

    async fn consume_refresh_token(&self, token: &str) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;
        let user_id = take_refresh_token(&mut tx, token).await?;
        let user = user_by_id(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn store_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        old_token: &str,
        new_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;
        let user_id = take_refresh_token(&mut tx, old_token).await?;

        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(new_token)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        let user = user_by_id(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn find_profile(&self, username: &str) -> Result<UserProfile, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = $1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".into()))?;
        let user = User::try_from(row)?;
        Ok(UserProfile::from(&user))
    }

    async fn update_profile(
        &self,
        username: &str,
        update: &ProfileUpdate,
    ) -> Result<(), AuthError> {
        let done = sqlx::query(
            "UPDATE users SET \
               first_name = COALESCE($1, first_name), \
               last_name = COALESCE($2, last_name), \
               middle_name = COALESCE($3, middle_name), \
               avatar = COALESCE($4, avatar), \
               phone = COALESCE($5, phone), \
               updated_at = now() \
             WHERE username = $6",
        )
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.middle_name)
        .bind(&update.avatar)
        .bind(&update.phone)
        .bind(username)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(AuthError::NotFound("user not found".into()));
        }
        Ok(())
    }

    async fn change_password(
        &self,
        user_id: i64,
        old_password_hash: &str,
        new_password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;

        let done = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = now() \
             WHERE id = $2 AND password_hash = $3",
        )
        .bind(new_password_hash)
        .bind(user_id)
        .bind(old_password_hash)
        .execute(&mut *tx)
        .await?;

        if done.rows_affected() == 0 {
            return Err(AuthError::NotFound("user not found".into()));
        }

        let revoked = revoke_sessions(&mut tx, user_id).await?;
        debug!(user_id, revoked, "password changed, sessions revoked");

        tx.commit().await?;
        Ok(())
    }
}
