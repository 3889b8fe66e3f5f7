use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("IO: {}", .0)]
    Io(#[from] std::io::Error),

    #[error("Auth: {}", .0)]
    Auth(#[from] tollgate_core::auth::AuthError),

    #[error("Gateway: {}", .0)]
    Gateway(#[from] tollgate_gateway::error::GatewayError),

    #[error("Database: {}", .0)]
    Db(#[from] sqlx::Error),

    #[error("Migration: {}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid URL: {}", .0)]
    Url(#[from] url::ParseError),

    #[error("Logging: {}", .0)]
    Logging(String),
}
