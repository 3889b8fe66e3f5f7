use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about = "Credential lifecycle service and identity gateway")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the auth HTTP service.
    Auth(AuthArgs),
    /// Run the identity-propagating gateway.
    Gateway(GatewayArgs),
    /// Apply database migrations and exit.
    Migrate(MigrateArgs),
    /// Print the version.
    Version,
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    pub bind: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Keep all credentials in process memory. Takes precedence over
    /// `--database-url`.
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,

    /// HS256 signing key for access tokens.
    #[arg(long, env = "JWT_SIGNED_KEY", hide_env_values = true)]
    pub jwt_signed_key: String,

    /// Server-wide password salt.
    #[arg(long, env = "PASSWORD_SALT", hide_env_values = true)]
    pub password_salt: String,

    /// Access token lifetime in seconds.
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = 15 * 60)]
    pub access_ttl_secs: i64,

    /// Refresh token lifetime in seconds.
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = 30 * 24 * 60 * 60)]
    pub refresh_ttl_secs: i64,

    /// Confirmation and reset token lifetime in seconds.
    #[arg(long, env = "EMAIL_TOKEN_TTL", default_value_t = 2 * 60 * 60)]
    pub email_token_ttl_secs: i64,

    /// Random bytes per opaque token.
    #[arg(long, default_value_t = 32)]
    pub token_bytes: usize,

    /// Prefix for confirmation links in outgoing email.
    #[arg(
        long,
        env = "CONFIRM_LINK_BASE",
        default_value = "http://localhost:3000/verifyemail/"
    )]
    pub confirm_link_base: String,

    /// Prefix for password reset links in outgoing email.
    #[arg(
        long,
        env = "RESET_LINK_BASE",
        default_value = "http://localhost:3000/reset-password/"
    )]
    pub reset_link_base: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verifier {
    /// Verify tokens in-process with the shared signing key.
    Local,
    /// Call the auth service's verify endpoint.
    Remote,
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Address to listen on.
    #[arg(long, env = "GATEWAY_BIND_ADDR", default_value = "127.0.0.1:8888")]
    pub bind: String,

    /// Auth service base URL.
    #[arg(long, env = "AUTH_SERVICE_URL", default_value = "http://127.0.0.1:8000")]
    pub auth_service_url: String,

    /// Data service base URL.
    #[arg(long, env = "DATA_SERVICE_URL", default_value = "http://127.0.0.1:9000")]
    pub data_service_url: String,

    /// How bearer tokens are verified.
    #[arg(long, value_enum, default_value_t = Verifier::Remote)]
    pub verifier: Verifier,

    /// Signing key, required with `--verifier local`.
    #[arg(long, env = "JWT_SIGNED_KEY", hide_env_values = true)]
    pub jwt_signed_key: Option<String>,

    /// Upstream request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Largest request body forwarded, in bytes.
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    pub max_body_bytes: usize,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}
