//! End-to-end tests: the production relying-party client talking to a real
//! server instance over HTTP.

mod common;

use axum_extra::extract::cookie::{Cookie, CookieJar};
use axum_test::TestServer;
use serde_json::json;
use url::Url;

use common::{ISSUER_DOMAIN, TEST_AUDIENCE, TestContext};
use consent_client::{
    ACCESS_TOKEN_COOKIE, AuthClient, ClientConfig, REFRESH_TOKEN_COOKIE, Verifier, VerifyError,
};

/// Serve the app over a real port and build a matching client.
async fn http_server_and_client(ctx: &TestContext) -> (TestServer, AuthClient) {
    let server = TestServer::builder()
        .http_transport()
        .build(ctx.router())
        .expect("start http test server");

    let base_url = server
        .server_address()
        .expect("http transport has an address")
        .to_string();
    let public_key = p256::PublicKey::from(ctx.resources.issuer.verification_key());

    let mut config = ClientConfig::new(public_key, ISSUER_DOMAIN, TEST_AUDIENCE, base_url);
    config.cookie_secure = false;
    let client = AuthClient::new(config).expect("build auth client");

    (server, client)
}

async fn register_and_login(server: &TestServer) -> String {
    server
        .post("/api/register")
        .json(&json!({ "username": "alice", "password": "pw" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/api/login")
        .json(&json!({ "handle": "alice", "secret": "pw", "service": "test-service" }))
        .await;
    response.assert_status_see_other();

    let location = response.header("location").to_str().unwrap().to_owned();
    Url::parse(&location)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "auth_code")
        .map(|(_, value)| value.into_owned())
        .expect("redirect carries auth_code")
}

#[tokio::test]
async fn authorization_code_exchanges_for_a_stored_pair() {
    let ctx = TestContext::new().await;
    let (server, client) = http_server_and_client(&ctx).await;

    let auth_code = register_and_login(&server).await;
    let (access, refresh) = client.refresh_tokens(&auth_code).await.unwrap();

    assert_eq!(access.subject(), "alice");
    assert_eq!(refresh.subject(), "alice");

    // The auth code was consumed by the exchange.
    let replay = client.refresh_tokens(&auth_code).await.unwrap_err();
    assert!(matches!(replay, VerifyError::NetworkRefresh(_)));
}

#[tokio::test]
async fn expired_access_cookie_refreshes_transparently() {
    let ctx = TestContext::new().await;
    let (server, client) = http_server_and_client(&ctx).await;

    let auth_code = register_and_login(&server).await;
    let (_, refresh) = client.refresh_tokens(&auth_code).await.unwrap();

    // Simulate a relying-party request whose access token has lapsed while
    // the refresh token is still live and stored.
    let expired_access = ctx
        .resources
        .issuer
        .issue_access_token_at(
            "alice",
            &[TEST_AUDIENCE.to_owned()],
            time::OffsetDateTime::now_utc() - std::time::Duration::from_secs(7200),
            std::time::Duration::from_secs(1800),
        )
        .unwrap();
    let jar = CookieJar::new()
        .add(Cookie::new(
            ACCESS_TOKEN_COOKIE,
            expired_access.encoded().to_owned(),
        ))
        .add(Cookie::new(
            REFRESH_TOKEN_COOKIE,
            refresh.encoded().to_owned(),
        ));

    let (jar, result) = client.verify_authorization(jar).await;
    let access = result.unwrap();
    assert_eq!(access.subject(), "alice");

    // Fresh cookies were written; the new access cookie lives ~30 minutes.
    let access_cookie = jar.get(ACCESS_TOKEN_COOKIE).unwrap();
    assert_ne!(access_cookie.value(), expired_access.encoded());
    let max_age = access_cookie.max_age().unwrap().whole_seconds();
    assert!((1795..=1800).contains(&max_age), "max_age was {max_age}");

    let refresh_cookie = jar.get(REFRESH_TOKEN_COOKIE).unwrap();
    assert_ne!(refresh_cookie.value(), refresh.encoded());

    // The consumed refresh token cannot be replayed by a second request
    // carrying stale cookies.
    let stale_jar = CookieJar::new().add(Cookie::new(
        REFRESH_TOKEN_COOKIE,
        refresh.encoded().to_owned(),
    ));
    let (_, result) = client.verify_authorization(stale_jar).await;
    assert!(matches!(
        result.unwrap_err(),
        VerifyError::NetworkRefresh(_)
    ));
}

#[tokio::test]
async fn handle_authorization_code_sets_cookies_and_redirects_home() {
    let ctx = TestContext::new().await;
    let (server, client) = http_server_and_client(&ctx).await;

    let auth_code = register_and_login(&server).await;
    let query = consent_client::AuthCodeQuery {
        auth_code: Some(auth_code),
    };

    let (jar, _redirect) = client
        .handle_authorization_code(CookieJar::new(), &query)
        .await;

    assert!(jar.get(ACCESS_TOKEN_COOKIE).is_some());
    assert!(jar.get(REFRESH_TOKEN_COOKIE).is_some());
}

#[tokio::test]
async fn handle_authorization_code_without_code_sets_no_cookies() {
    let ctx = TestContext::new().await;
    let (_server, client) = http_server_and_client(&ctx).await;

    let query = consent_client::AuthCodeQuery { auth_code: None };
    let (jar, _redirect) = client
        .handle_authorization_code(CookieJar::new(), &query)
        .await;

    assert!(jar.get(ACCESS_TOKEN_COOKIE).is_none());
    assert!(jar.get(REFRESH_TOKEN_COOKIE).is_none());
}
