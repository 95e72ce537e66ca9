//! OAuth 2.0 authorization-code flow against LinkedIn.

use anyhow::{anyhow, Context, Result};
use linkgate::credentials::TokenPayload;
use reqwest::Client;

/// Builds the authorization redirect target.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        auth_url,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
        urlencoding::encode(state)
    )
}

/// Application credentials used for the code exchange.
pub struct ClientCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

/// Exchanges an authorization code for a token payload.
///
/// The payload is returned as the provider sent it; `expires_in` stays
/// relative and is resolved to an absolute time by the token store.
pub async fn exchange_code_for_token(
    http_client: &Client,
    token_url: &str,
    code: &str,
    credentials: &ClientCredentials<'_>,
) -> Result<TokenPayload> {
    let form = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", credentials.redirect_uri),
        ("client_id", credentials.client_id),
        ("client_secret", credentials.client_secret),
    ];

    tracing::debug!(token_url = %token_url, "Exchanging authorization code for token");

    let response = http_client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .context("Failed to send token exchange request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!(
            "Token exchange failed with status {}: {}",
            status,
            body
        ));
    }

    let payload: TokenPayload = response
        .json()
        .await
        .context("Failed to parse token response")?;

    if payload.access_token.is_empty() {
        return Err(anyhow!("Token response contained an empty access_token"));
    }

    tracing::debug!(
        has_refresh_token = payload.refresh_token.is_some(),
        expires_in = ?payload.expires_in,
        "Token exchange successful"
    );

    Ok(payload)
}
