use serde::Serialize;

/// Paths reachable without a session, matched exactly.
const PUBLIC_EXACT: &[&str] = &["/", "/login"];
/// Static assets and the console's own API surface.
const PUBLIC_PREFIXES: &[&str] = &["/_next", "/favicon.ico", "/api"];

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum GateDecision {
    Next,
    Redirect { location: String },
}

pub fn is_public(pathname: &str) -> bool {
    PUBLIC_EXACT.contains(&pathname) || PUBLIC_PREFIXES.iter().any(|p| pathname.starts_with(p))
}

/// Navigation gate. Only the presence of the non-sensitive flag cookie is
/// checked; the backend validates the real session on every call.
pub fn check(pathname: &str, has_auth_flag: bool) -> GateDecision {
    let pathname = normalize_path(pathname);
    if is_public(&pathname) || has_auth_flag {
        return GateDecision::Next;
    }
    GateDecision::Redirect {
        location: format!("{}?from={}", LOGIN_PATH, encode_query_value(&pathname)),
    }
}

fn normalize_path(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or("").trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn encode_query_value(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_always_pass() {
        for p in ["/", "/login", "/_next/static/app.js", "/favicon.ico", "/api/students"] {
            assert_eq!(check(p, false), GateDecision::Next, "{p}");
        }
    }

    #[test]
    fn protected_paths_redirect_without_flag() {
        assert_eq!(
            check("/students", false),
            GateDecision::Redirect {
                location: "/login?from=%2Fstudents".to_string()
            }
        );
        assert_eq!(
            check("/reports/monthly?x=1", false),
            GateDecision::Redirect {
                location: "/login?from=%2Freports%2Fmonthly".to_string()
            }
        );
    }

    #[test]
    fn flag_cookie_opens_protected_paths() {
        assert_eq!(check("/payments", true), GateDecision::Next);
        assert_eq!(check("collections", true), GateDecision::Next);
    }

    #[test]
    fn login_prefix_is_not_a_public_prefix() {
        // Only exact "/login" is public.
        assert!(!is_public("/login-history"));
        assert!(is_public("/login"));
    }
}
