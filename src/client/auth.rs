//! Credential acquisition against the service's auth endpoints.
//!
//! The collaboration session itself only consumes a ready-to-use bearer
//! token; these helpers obtain one. Failures carry the upstream status and
//! body so an expired API token is distinguishable from a bad base URL.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Exchange an API token for a collaboration session token.
///
/// POSTs to `{base_url}/auth/collab-token` with a Bearer header and unwraps
/// the token from either `{"data":{"token":...}}` or `{"token":...}`.
pub async fn collab_token(
    http: &reqwest::Client,
    base_url: &str,
    api_token: &str,
) -> Result<String> {
    let url = format!("{}/auth/collab-token", base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .bearer_auth(api_token)
        .header("Content-Type", "application/json")
        .body("{}")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });
        return Err(Error::Credential {
            status: status.as_u16(),
            detail,
        });
    }

    let body: Value = response.json().await?;
    let token = body["data"]["token"]
        .as_str()
        .or_else(|| body["token"].as_str())
        .ok_or_else(|| Error::Credential {
            status: status.as_u16(),
            detail: "no token field in response".to_string(),
        })?;

    debug!(token_prefix = %token.chars().take(5).collect::<String>(), "obtained collab token");
    Ok(token.to_string())
}

/// Log in with email and password, returning the auth token extracted from
/// the `Set-Cookie` header.
pub async fn login(
    http: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<String> {
    let url = format!("{}/auth/login", base_url.trim_end_matches('/'));
    let response = http
        .post(&url)
        .json(&LoginRequest { email, password })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "login failed".to_string());
        return Err(Error::Credential {
            status: status.as_u16(),
            detail,
        });
    }

    for cookie in response.headers().get_all("set-cookie") {
        let Ok(cookie) = cookie.to_str() else {
            continue;
        };
        if let Some(rest) = cookie.strip_prefix("authToken=") {
            let token = rest.split(';').next().unwrap_or(rest);
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(Error::Http(
        "no authToken cookie found in login response".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn test_collab_token_wrapped_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/collab-token")
            .match_header("authorization", "Bearer api-key")
            .with_status(200)
            .with_body(r#"{"data":{"token":"collab-secret"}}"#)
            .create_async()
            .await;

        let token = collab_token(&client(), &server.url(), "api-key")
            .await
            .unwrap();
        assert_eq!(token, "collab-secret");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_collab_token_flat_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/collab-token")
            .with_status(200)
            .with_body(r#"{"token":"flat-secret"}"#)
            .create_async()
            .await;

        let token = collab_token(&client(), &server.url(), "api-key")
            .await
            .unwrap();
        assert_eq!(token, "flat-secret");
    }

    #[tokio::test]
    async fn test_collab_token_upstream_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/collab-token")
            .with_status(403)
            .with_body(r#"{"message":"forbidden"}"#)
            .create_async()
            .await;

        let err = collab_token(&client(), &server.url(), "bad-key")
            .await
            .unwrap_err();
        match err {
            Error::Credential { status, detail } => {
                assert_eq!(status, 403);
                assert!(detail.contains("forbidden"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_extracts_cookie() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "email": "a@b.c",
                "password": "pw",
            })))
            .with_status(200)
            .with_header("set-cookie", "authToken=tok123; Path=/; HttpOnly")
            .with_body("{}")
            .create_async()
            .await;

        let token = login(&client(), &server.url(), "a@b.c", "pw")
            .await
            .unwrap();
        assert_eq!(token, "tok123");
    }

    #[tokio::test]
    async fn test_login_without_cookie() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let err = login(&client(), &server.url(), "a@b.c", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
