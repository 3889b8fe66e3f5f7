//! Route paths served by the auth API.

pub const POST_AUTH_SIGN_UP: &str = "/api/v1/auth/sign-up";
pub const POST_AUTH_SIGN_IN: &str = "/api/v1/auth/sign-in";
pub const POST_AUTH_SIGN_OUT: &str = "/api/v1/auth/sign-out";
pub const POST_AUTH_CONFIRM: &str = "/api/v1/auth/confirm";
pub const POST_AUTH_RESEND_CONFIRMATION: &str = "/api/v1/auth/resend-confirmation";
pub const POST_AUTH_REFRESH: &str = "/api/v1/auth/refresh";
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/v1/auth/reset-password";
pub const POST_AUTH_CONFIRM_PASSWORD: &str = "/api/v1/auth/confirm-password";
pub const GET_AUTH_ME: &str = "/api/v1/auth/me";
pub const GET_AUTH_VERIFY: &str = "/api/v1/auth/verify";

pub const GET_USER_PROFILE: &str = "/api/v1/users/{username}/profile";
pub const PUT_USER_PROFILE: &str = "/api/v1/users/{username}/profile";
pub const POST_USER_PASSWORD: &str = "/api/v1/users/{username}/password";
