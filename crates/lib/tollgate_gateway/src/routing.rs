//! Path classification.

/// Which upstream a request belongs to, and whether identity is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Auth, user, and swagger routes. Forwarded to the auth service.
    PublicAuth,
    /// Everything else under the API. Forwarded to the data service with
    /// server-derived identity.
    Protected,
}

const PUBLIC_AUTH_PREFIXES: &[&str] = &["/api/v1/auth", "/api/v1/users", "/swagger"];
const PROTECTED_PREFIXES: &[&str] = &["/api/v1", "/docs", "/openapi.json"];

/// Classify `path`. `None` means the gateway does not serve it.
///
/// Public-auth prefixes are checked first, so `/api/v1/auth/...` never
/// falls through to the broader `/api/v1` protected prefix.
pub fn classify(path: &str) -> Option<RouteClass> {
    if PUBLIC_AUTH_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Some(RouteClass::PublicAuth)
    } else if PROTECTED_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Some(RouteClass::Protected)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_and_user_paths_are_public() {
        for path in [
            "/api/v1/auth/sign-in",
            "/api/v1/users/ann/profile",
            "/swagger/index.html",
        ] {
            assert_eq!(classify(path), Some(RouteClass::PublicAuth), "{path}");
        }
    }

    #[test]
    fn other_api_paths_are_protected() {
        for path in ["/api/v1/tours", "/api/v1", "/docs", "/openapi.json"] {
            assert_eq!(classify(path), Some(RouteClass::Protected), "{path}");
        }
    }

    #[test]
    fn unknown_paths_are_unrouted() {
        for path in ["/", "/api/v2/tours", "/metrics"] {
            assert_eq!(classify(path), None, "{path}");
        }
    }
}
