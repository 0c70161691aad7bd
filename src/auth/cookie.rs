use actix_web::cookie::{time::Duration, Cookie, SameSite};

pub const AUTH_COOKIE_NAME: &str = "auth_token";

/// Builds the client credential cookie.
///
/// Cross-site delivery (SameSite=None + Secure), HTTP-only, scoped to the
/// whole path space, expiring with the session.
pub fn auth_cookie(token: &str, max_age_hours: i64) -> Cookie<'static> {
    base_cookie(token.to_owned())
        .max_age(Duration::hours(max_age_hours))
        .finish()
}

/// Builds the cookie-clear directive.
///
/// Attributes must match `auth_cookie` exactly or the clear will not override
/// the original on the client.
pub fn clear_auth_cookie() -> Cookie<'static> {
    base_cookie(String::new()).max_age(Duration::ZERO).finish()
}

fn base_cookie(value: String) -> actix_web::cookie::CookieBuilder<'static> {
    Cookie::build(AUTH_COOKIE_NAME, value)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie("some.token.value", 4);
        assert_eq!(cookie.name(), AUTH_COOKIE_NAME);
        assert_eq!(cookie.value(), "some.token.value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::hours(4)));
    }

    #[test]
    fn test_clear_cookie_matches_scope() {
        let minted = auth_cookie("t", 4);
        let cleared = clear_auth_cookie();

        // Same name, path and flags so the clear actually overrides.
        assert_eq!(cleared.name(), minted.name());
        assert_eq!(cleared.path(), minted.path());
        assert_eq!(cleared.http_only(), minted.http_only());
        assert_eq!(cleared.secure(), minted.secure());
        assert_eq!(cleared.same_site(), minted.same_site());

        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }
}
