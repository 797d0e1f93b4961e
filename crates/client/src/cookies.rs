//! Token cookies: httpOnly, SameSite=Strict, Path=/, MaxAge to the token's
//! expiration. Clearing uses MaxAge=-1 with the same name and path.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use consent_tokens::{AccessToken, RefreshToken};
use time::OffsetDateTime;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn token_cookie(
    name: &'static str,
    value: String,
    expiration: OffsetDateTime,
    secure: bool,
) -> Cookie<'static> {
    let max_age = expiration - OffsetDateTime::now_utc();
    Cookie::build((name, value))
        .path("/")
        .max_age(max_age)
        .same_site(SameSite::Strict)
        .secure(secure)
        .http_only(true)
        .build()
}

/// Write both tokens into the jar.
pub fn set_token_cookies(
    jar: CookieJar,
    access_token: &AccessToken,
    refresh_token: &RefreshToken,
    secure: bool,
) -> CookieJar {
    jar.add(token_cookie(
        ACCESS_TOKEN_COOKIE,
        access_token.encoded().to_owned(),
        access_token.expiration(),
        secure,
    ))
    .add(token_cookie(
        REFRESH_TOKEN_COOKIE,
        refresh_token.encoded().to_owned(),
        refresh_token.expiration(),
        secure,
    ))
}

/// Expire both token cookies.
pub fn clear_token_cookies(jar: CookieJar) -> CookieJar {
    jar.add(
        Cookie::build((ACCESS_TOKEN_COOKIE, ""))
            .path("/")
            .max_age(time::Duration::seconds(-1))
            .build(),
    )
    .add(
        Cookie::build((REFRESH_TOKEN_COOKIE, ""))
            .path("/")
            .max_age(time::Duration::seconds(-1))
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    #[test]
    fn cookies_carry_the_flag_set() {
        let env = TestEnv::new("auth.example.com", "my-app");
        let access = env
            .issue_access_token("alice", std::time::Duration::from_secs(1800))
            .unwrap();
        let refresh = env
            .issue_refresh_token("alice", std::time::Duration::from_secs(86400))
            .unwrap();

        let jar = set_token_cookies(CookieJar::new(), &access, &refresh, true);
        let cookie = jar.get(ACCESS_TOKEN_COOKIE).unwrap();

        assert_eq!(cookie.value(), access.encoded());
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        let max_age = cookie.max_age().unwrap().whole_seconds();
        assert!((1795..=1800).contains(&max_age), "max_age was {max_age}");

        assert!(jar.get(REFRESH_TOKEN_COOKIE).is_some());
    }

    #[test]
    fn clearing_expires_both_cookies() {
        let jar = clear_token_cookies(CookieJar::new());
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let cookie = jar.get(name).unwrap();
            assert_eq!(cookie.max_age(), Some(time::Duration::seconds(-1)));
            assert_eq!(cookie.path(), Some("/"));
        }
    }
}
