use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

pub(crate) const SERVICE_NAME: &str = "jot-notes";
const TOKEN_ITEM_LABEL: &str = "Jot GitHub token";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Store the access token in the system keyring via Secret Service.
pub async fn store_token(token: &str) -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("kind", "access-token");

    keyring
        .create_item(
            TOKEN_ITEM_LABEL,
            &attrs,
            token.as_bytes(),
            true, // replace existing
        )
        .await
        .map_err(|e| format!("Failed to store token: {}", e))?;

    Ok(())
}

/// Load the access token from the system keyring, if one is stored.
pub async fn load_token() -> Result<Option<String>, String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("kind", "access-token");

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    if let Some(item) = items.first() {
        let secret_bytes = item
            .secret()
            .await
            .map_err(|e| format!("Failed to read secret: {}", e))?;
        let token = String::from_utf8(secret_bytes.to_vec())
            .map_err(|e| format!("Invalid UTF-8 in secret: {}", e))?;
        return Ok(Some(token));
    }

    Ok(None)
}

/// Delete the stored access token from the system keyring.
pub async fn delete_token() -> Result<(), String> {
    let keyring = oo7::Keyring::new()
        .await
        .map_err(|e| format!("Failed to connect to keyring: {}", e))?;

    let mut attrs = HashMap::new();
    attrs.insert("service", SERVICE_NAME);
    attrs.insert("kind", "access-token");

    let items = keyring
        .search_items(&attrs)
        .await
        .map_err(|e| format!("Failed to search keyring: {}", e))?;

    for item in items {
        item.delete()
            .await
            .map_err(|e| format!("Failed to delete token: {}", e))?;
    }

    Ok(())
}

/// Where `AuthManager` resolves tokens from. Tests inject a fixed token so
/// nothing touches the session keyring.
enum TokenSource {
    Keyring,
    Fixed(Option<String>),
}

/// Single entry point for token resolution and sign-out.
pub struct AuthManager {
    source: TokenSource,
}

impl AuthManager {
    pub fn new() -> Self {
        Self {
            source: TokenSource::Keyring,
        }
    }

    pub fn with_fixed_token(token: Option<String>) -> Self {
        Self {
            source: TokenSource::Fixed(token),
        }
    }

    /// The current access token, or None when signed out.
    pub async fn access_token(&self) -> Option<String> {
        match &self.source {
            TokenSource::Fixed(token) => token.clone(),
            TokenSource::Keyring => match load_token().await {
                Ok(token) => token,
                Err(e) => {
                    log::warn!("keyring unavailable: {}", e);
                    None
                }
            },
        }
    }

    pub async fn store_token(&self, token: &str) -> Result<(), String> {
        match &self.source {
            TokenSource::Fixed(_) => Ok(()),
            TokenSource::Keyring => store_token(token).await,
        }
    }

    /// Revoke the token remotely (best effort) and always clear local state.
    pub async fn sign_out(&self, config: &OAuthConfig) {
        if let Some(token) = self.access_token().await {
            let revoked = revoke_token(config, &token).await;
            log::info!("token revocation {}", if revoked { "succeeded" } else { "skipped" });
        }
        if let TokenSource::Keyring = self.source {
            if let Err(e) = delete_token().await {
                log::warn!("failed to clear stored token: {}", e);
            }
        }
    }
}

impl Default for AuthManager {
    fn default() -> Self {
        Self::new()
    }
}

/// OAuth application coordinates for the authorization-code flow.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub revoke_url: String,
}

impl OAuthConfig {
    pub fn github(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            revoke_url: format!("https://api.github.com/applications/{client_id}/grant"),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

/// Exchange an authorization code (plus PKCE verifier) for an access token.
pub async fn exchange_code(
    config: &OAuthConfig,
    code: &str,
    code_verifier: &str,
) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
        ("code_verifier", code_verifier),
    ];

    let response = client
        .post(&config.token_url)
        .header("Accept", "application/json")
        .form(&params)
        .send()
        .await
        .map_err(|e| format!("Token exchange request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Token exchange failed: HTTP {}", response.status()));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| format!("Invalid token response: {}", e))?;

    match body.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(body
            .error_description
            .unwrap_or_else(|| "No access token in response".to_string())),
    }
}

/// Revoke an access token. Best effort: any failure is logged and reported
/// as `false`, never surfaced, since local sign-out proceeds regardless.
pub async fn revoke_token(config: &OAuthConfig, token: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(HTTP_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            log::warn!("failed to build HTTP client for revocation: {}", e);
            return false;
        }
    };

    let basic = BASE64.encode(format!("{}:{}", config.client_id, config.client_secret));

    let result = client
        .delete(&config.revoke_url)
        .header("Authorization", format!("Basic {basic}"))
        .header("Accept", "application/vnd.github+json")
        .json(&serde_json::json!({ "access_token": token }))
        .send()
        .await;

    match result {
        Ok(response) if response.status().as_u16() == 204 => true,
        Ok(response) => {
            log::warn!("token revocation returned HTTP {}", response.status());
            false
        }
        Err(e) => {
            log::warn!("token revocation request failed: {}", e);
            false
        }
    }
}
