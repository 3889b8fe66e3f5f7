//! Credential lifecycle service.
//!
//! Orchestrates sign-up, confirmation, sign-in, refresh rotation, sign-out,
//! and password reset over the hasher, codec, store, and email capabilities.
//! Holds no state of its own beyond those handles.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::{JwtCodec, TokenCodec, verify_identity};
use super::opaque::digest_token;
use super::password::{PasswordHasher, Sha256Hasher};
use super::settings::AuthSettings;
use super::validation::{validate_email, validate_password, validate_sign_up};
use crate::email::{EmailMessage, EmailSender};
use crate::models::auth::{Identity, Login, NewUser, TokenPair, User};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct CredentialService {
    settings: Arc<AuthSettings>,
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
    mailer: Arc<dyn EmailSender>,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CredentialService {
    pub fn new(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            hasher,
            codec,
            mailer,
        }
    }

    /// Wire the default hasher and codec from `settings`.
    pub fn from_settings(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn EmailSender>,
    ) -> Result<Self, AuthError> {
        settings.validate()?;
        let hasher = Arc::new(Sha256Hasher::new(settings.password_salt.clone()));
        let codec = Arc::new(JwtCodec::from_settings(&settings));
        Ok(Self::new(settings, store, hasher, codec, mailer))
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.store)
    }

    pub fn hasher(&self) -> Arc<dyn PasswordHasher> {
        Arc::clone(&self.hasher)
    }

    pub fn codec(&self) -> Arc<dyn TokenCodec> {
        Arc::clone(&self.codec)
    }

    /// Register an unconfirmed user and email the confirmation link.
    ///
    /// The user row and its confirmation token commit before the email goes
    /// out. A delivery failure is reported as `Delivery` but leaves the
    /// account in place; `resend_confirmation` recovers from it.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, AuthError> {
        let username = username.trim();
        let email = email.trim();
        validate_sign_up(username, email, password)?;

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password),
        };
        let token = self.codec.generate(self.settings.token_bytes);
        let expires_at = Utc::now() + self.settings.confirm_ttl;

        let user_id = self
            .store
            .create_user(&new_user, &digest_token(&token), expires_at)
            .await?;
        info!(user_id, "user registered");

        let message = EmailMessage::confirmation(email, &self.settings.confirm_link_base, &token);
        self.deliver(&message, user_id).await?;
        Ok(user_id)
    }

    /// Consume a confirmation token and mark its owner confirmed.
    pub async fn confirm_user(&self, token: &str) -> Result<i64, AuthError> {
        if token.is_empty() {
            return Err(AuthError::ValidationError("confirm_token is required".into()));
        }
        let user_id = self
            .store
            .consume_confirmation_token(&digest_token(token))
            .await?;
        info!(user_id, "user confirmed");
        Ok(user_id)
    }

    /// Issue and send a fresh confirmation token. Unknown and already
    /// confirmed addresses succeed silently.
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        validate_email(email)?;

        let token = self.codec.generate(self.settings.token_bytes);
        let expires_at = Utc::now() + self.settings.confirm_ttl;
        let user_id = match self
            .store
            .issue_confirmation_token(email, &digest_token(&token), expires_at)
            .await
        {
            Ok(id) => id,
            Err(AuthError::NotFound(_)) => {
                debug!("resend requested for unknown or confirmed email");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let message = EmailMessage::confirmation(email, &self.settings.confirm_link_base, &token);
        self.deliver(&message, user_id).await
    }

    /// Authenticate with an email or username and issue a token pair.
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<TokenPair, AuthError> {
        validate_password(password)?;
        let login = Login::parse(login);
        let digest = self.hasher.hash(password);

        let user = match self.store.find_by_credentials(&login, &digest).await {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                return Err(AuthError::Unauthorized("invalid credentials".into()));
            }
            Err(e) => return Err(e),
        };

        let refresh = self.codec.generate(self.settings.token_bytes);
        let expires_at = Utc::now() + self.settings.refresh_ttl;
        self.store
            .store_refresh_token(user.id, &digest_token(&refresh), expires_at)
            .await?;

        info!(user_id = user.id, "user signed in");
        self.token_pair(&user, refresh)
    }

    /// Rotate a refresh token into a new access + refresh pair.
    ///
    /// The presented token is consumed and its successor stored in a single
    /// store transaction. Replaying a consumed token fails `Unauthorized`.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::Unauthorized("refresh token required".into()));
        }
        let successor = self.codec.generate(self.settings.token_bytes);
        let expires_at = Utc::now() + self.settings.refresh_ttl;

        let user = match self
            .store
            .rotate_refresh_token(
                &digest_token(refresh_token),
                &digest_token(&successor),
                expires_at,
            )
            .await
        {
            Ok(user) => user,
            Err(AuthError::NotFound(_)) => {
                warn!("refresh with unknown, consumed, or expired token");
                return Err(AuthError::Unauthorized("invalid refresh token".into()));
            }
            Err(e) => return Err(e),
        };

        debug!(user_id = user.id, "refresh token rotated");
        self.token_pair(&user, successor)
    }

    /// Consume a refresh token. Unknown or spent tokens are not an error.
    pub async fn sign_out(&self, refresh_token: &str) -> Result<(), AuthError> {
        match self
            .store
            .consume_refresh_token(&digest_token(refresh_token))
            .await
        {
            Ok(user) => {
                info!(user_id = user.id, "user signed out");
                Ok(())
            }
            Err(AuthError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Start a password reset. Always succeeds for unknown addresses.
    pub async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim();
        validate_email(email)?;

        let token = self.codec.generate(self.settings.token_bytes);
        let expires_at = Utc::now() + self.settings.reset_ttl;
        let user_id = match self
            .store
            .issue_reset_token(email, &digest_token(&token), expires_at)
            .await
        {
            Ok(id) => id,
            Err(AuthError::NotFound(_)) => {
                debug!("reset requested for unknown or unconfirmed email");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let message = EmailMessage::password_reset(email, &self.settings.reset_link_base, &token);
        self.deliver(&message, user_id).await
    }

    /// Consume a reset token and set a new password. Every open session of
    /// the user is revoked in the same transaction.
    pub async fn confirm_reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<i64, AuthError> {
        validate_password(new_password)?;
        if token.is_empty() {
            return Err(AuthError::ValidationError("reset_token is required".into()));
        }
        let user_id = self
            .store
            .consume_reset_token(&digest_token(token), &self.hasher.hash(new_password))
            .await?;
        info!(user_id, "password reset");
        Ok(user_id)
    }

    /// Resolve an access token to the caller's identity without touching the store.
    pub fn verify(&self, access_token: &str) -> Result<Identity, AuthError> {
        verify_identity(self.codec.as_ref(), access_token)
            .map_err(|e| AuthError::Unauthorized(e.to_string()))
    }

    fn token_pair(&self, user: &User, refresh_token: String) -> Result<TokenPair, AuthError> {
        let access = self
            .codec
            .issue(user.id, &user.username, user.role)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token,
            expire_in: self.codec.access_ttl().num_seconds(),
        })
    }

    async fn deliver(&self, message: &EmailMessage, user_id: i64) -> Result<(), AuthError> {
        self.mailer.send(message).await.map_err(|e| {
            warn!(user_id, error = %e, "email delivery failed");
            AuthError::Delivery(e.to_string())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::email::tests::CapturedLogs;
    use crate::email::{EmailError, LogEmailSender};
    use crate::models::auth::Role;
    use crate::store::MemoryCredentialStore;

    /// Sender that keeps every message for inspection.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub(crate) sent: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingSender {
        /// Token at the end of the most recent message body.
        pub(crate) fn last_token(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let body = &sent.last().expect("no email sent").body;
            body.rsplit('/').next().unwrap().to_string()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingSender {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Records each message, then hands it to `LogEmailSender`.
    #[derive(Default)]
    struct LoggingRecorder {
        inner: RecordingSender,
    }

    #[async_trait]
    impl EmailSender for LoggingRecorder {
        async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
            self.inner.send(message).await?;
            LogEmailSender.send(message).await
        }
    }

    struct FailingSender;

    #[async_trait]
    impl EmailSender for FailingSender {
        async fn send(&self, _message: &EmailMessage) -> Result<(), EmailError> {
            Err(EmailError::Delivery("smtp down".into()))
        }
    }

    pub(crate) fn settings() -> AuthSettings {
        AuthSettings::new("test-secret", "test-salt")
            .with_links("https://app/verify/", "https://app/reset/")
    }

    pub(crate) fn service() -> (CredentialService, Arc<RecordingSender>) {
        let mailer = Arc::new(RecordingSender::default());
        let store = Arc::new(MemoryCredentialStore::new());
        let svc = CredentialService::from_settings(settings(), store, mailer.clone()).unwrap();
        (svc, mailer)
    }

    /// Sign up and confirm `name`, returning its id.
    pub(crate) async fn confirmed_user(
        svc: &CredentialService,
        mailer: &RecordingSender,
        name: &str,
    ) -> i64 {
        let id = svc
            .sign_up(name, &format!("{name}@example.com"), "password1")
            .await
            .unwrap();
        svc.confirm_user(&mailer.last_token()).await.unwrap();
        id
    }

    #[tokio::test]
    async fn sign_up_confirm_sign_in() {
        let (svc, mailer) = service();
        let id = svc.sign_up("ann_1", "ann@example.com", "password1").await.unwrap();

        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ann@example.com");
        assert!(sent[0].body.contains("https://app/verify/"));

        assert_eq!(svc.confirm_user(&mailer.last_token()).await.unwrap(), id);

        let pair = svc.sign_in("ann@example.com", "password1").await.unwrap();
        assert_eq!(pair.expire_in, 15 * 60);
        let identity = svc.verify(&pair.access_token).unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.user_name, "ann_1");
        assert_eq!(identity.role, Role::User);

        assert!(svc.sign_in("ann_1", "password1").await.is_ok());
    }

    #[tokio::test]
    async fn confirmation_token_works_once() {
        let (svc, mailer) = service();
        svc.sign_up("ann_1", "ann@example.com", "password1").await.unwrap();
        let token = mailer.last_token();
        svc.confirm_user(&token).await.unwrap();
        let err = svc.confirm_user(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_sign_up_conflicts_and_keeps_original() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;

        let err = svc
            .sign_up("ann_1", "other@example.com", "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
        let err = svc
            .sign_up("bob_1", "ann_1@example.com", "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        assert!(svc.sign_in("ann_1", "password1").await.is_ok());
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;

        let wrong = svc.sign_in("ann_1", "password9").await.unwrap_err();
        let unknown = svc.sign_in("nobody", "password1").await.unwrap_err();
        assert!(matches!(wrong, AuthError::Unauthorized(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn refresh_rotation_chain() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;

        let a = svc.sign_in("ann_1", "password1").await.unwrap();
        let b = svc.refresh_token(&a.refresh_token).await.unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
        assert!(svc.verify(&b.access_token).is_ok());

        let replay = svc.refresh_token(&a.refresh_token).await.unwrap_err();
        assert!(matches!(replay, AuthError::Unauthorized(_)));

        let c = svc.refresh_token(&b.refresh_token).await.unwrap();
        assert!(svc.refresh_token(&b.refresh_token).await.is_err());
        assert!(svc.refresh_token(&c.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_refresh_has_one_winner() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;
        let pair = svc.sign_in("ann_1", "password1").await.unwrap();

        let (first, second) = tokio::join!(
            svc.refresh_token(&pair.refresh_token),
            svc.refresh_token(&pair.refresh_token)
        );
        assert!(first.is_ok() != second.is_ok());
    }

    #[tokio::test]
    async fn sign_out_consumes_and_tolerates_unknown() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;
        let pair = svc.sign_in("ann_1", "password1").await.unwrap();

        svc.sign_out(&pair.refresh_token).await.unwrap();
        assert!(svc.refresh_token(&pair.refresh_token).await.is_err());
        svc.sign_out(&pair.refresh_token).await.unwrap();
        svc.sign_out("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn reset_flow_replaces_password_and_revokes_sessions() {
        let (svc, mailer) = service();
        confirmed_user(&svc, &mailer, "ann_1").await;
        let session = svc.sign_in("ann_1", "password1").await.unwrap();

        svc.reset_password("ann_1@example.com").await.unwrap();
        let token = mailer.last_token();
        assert!(mailer.sent.lock().unwrap().last().unwrap().body.contains("https://app/reset/"));

        svc.confirm_reset_password(&token, "password2").await.unwrap();
        assert!(svc.sign_in("ann_1", "password1").await.is_err());
        assert!(svc.sign_in("ann_1", "password2").await.is_ok());
        assert!(svc.refresh_token(&session.refresh_token).await.is_err());

        let replay = svc.confirm_reset_password(&token, "password3").await.unwrap_err();
        assert!(matches!(replay, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let mailer = Arc::new(RecordingSender::default());
        let store = Arc::new(MemoryCredentialStore::new());
        let settings = settings().with_reset_ttl(Duration::seconds(-1));
        let svc = CredentialService::from_settings(settings, store, mailer.clone());
        // A negative TTL is refused by validation.
        assert!(svc.is_err());

        // Bypass validation to mint an already-expired reset token.
        let settings = AuthSettings {
            reset_ttl: Duration::seconds(-1),
            ..self::settings()
        };
        let hasher = Arc::new(Sha256Hasher::new("salt"));
        let codec = Arc::new(JwtCodec::from_settings(&settings));
        let svc = CredentialService::new(
            settings,
            Arc::new(MemoryCredentialStore::new()),
            hasher,
            codec,
            mailer.clone(),
        );
        confirmed_user(&svc, &mailer, "ann_1").await;
        svc.reset_password("ann_1@example.com").await.unwrap();
        let err = svc
            .confirm_reset_password(&mailer.last_token(), "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Expired(_)));
    }

    #[tokio::test]
    async fn reset_for_unknown_email_is_silent() {
        let (svc, mailer) = service();
        svc.reset_password("ghost@example.com").await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn email_failure_keeps_user_and_resend_recovers() {
        let store = Arc::new(MemoryCredentialStore::new());
        let failing = CredentialService::from_settings(
            settings(),
            store.clone(),
            Arc::new(FailingSender),
        )
        .unwrap();
        let err = failing
            .sign_up("ann_1", "ann@example.com", "password1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Delivery(_)));

        let mailer = Arc::new(RecordingSender::default());
        let svc = CredentialService::from_settings(settings(), store, mailer.clone()).unwrap();
        let err = svc
            .sign_up("ann_1", "ann@example.com", "password1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));

        svc.resend_confirmation("ann@example.com").await.unwrap();
        svc.confirm_user(&mailer.last_token()).await.unwrap();

        // Confirmed now, so a second resend sends nothing.
        svc.resend_confirmation("ann@example.com").await.unwrap();
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sign_up_validates_input() {
        let (svc, _) = service();
        for (username, email, password) in [
            ("ann", "ann@example.com", "password1"),
            ("ann_1", "not-an-email", "password1"),
            ("ann_1", "ann@example.com", "short"),
        ] {
            let err = svc.sign_up(username, email, password).await.unwrap_err();
            assert!(matches!(err, AuthError::ValidationError(_)), "{username} {email}");
        }
    }

    #[test]
    fn tampered_access_token_is_unauthorized() {
        let (svc, _) = service();
        let issued = svc.codec().issue(1, "ann_1", Role::User).unwrap();
        let tampered = format!("{}x", issued.token);
        assert!(matches!(svc.verify(&tampered), Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn emailed_tokens_never_reach_logs() {
        let (logs, _guard) = CapturedLogs::install();
        let mailer = Arc::new(LoggingRecorder::default());
        let store = Arc::new(MemoryCredentialStore::new());
        let svc = CredentialService::from_settings(settings(), store, mailer.clone()).unwrap();

        svc.sign_up("ann_1", "ann@example.com", "password1").await.unwrap();
        let confirm = mailer.inner.last_token();
        svc.confirm_user(&confirm).await.unwrap();
        svc.reset_password("ann@example.com").await.unwrap();
        let reset = mailer.inner.last_token();

        let out = logs.contents();
        assert!(out.contains("email send stub"));
        assert!(!out.contains(&confirm));
        assert!(!out.contains(&reset));
    }
}
