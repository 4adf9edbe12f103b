//! OAuth2 Authentication Module
//!
//! Installed-app flow for the Gmail API: cached token file, refresh, and an
//! interactive sign-in through a local redirect listener.

use chrono::{DateTime, Utc};
use oauth2::{
    basic::BasicClient,
    reqwest::async_http_client,
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tiny_http::{Response, Server};

/// Gmail scope allowing label changes on messages
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Tokens this close to expiry are refreshed up front
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("OAuth2 error: {0}")]
    OAuth2(String),
    #[error("HTTP server error: {0}")]
    Server(String),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Callback state does not match the request")]
    StateMismatch,
    #[error("Token file error: {0}")]
    TokenStore(String),
    #[error("User cancelled authentication")]
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub callback_port: u16,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.callback_port)
    }
}

/// Gmail OAuth2 configuration
pub fn gmail_config(client_id: String, client_secret: String, callback_port: u16) -> OAuthConfig {
    OAuthConfig {
        client_id,
        client_secret,
        auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
        token_url: "https://oauth2.googleapis.com/token".to_string(),
        callback_port,
        scopes: vec![GMAIL_MODIFY_SCOPE.to_string()],
    }
}

/// Token persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Usable as-is at `now`; tokens without a known expiry are tried as-is
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }

    /// Read the token file; a missing file is `None`
    pub fn load(path: &Path) -> Result<Option<Self>, OAuthError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OAuthError::TokenStore(format!("{:?}: {}", path, e))),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| OAuthError::TokenStore(format!("{:?}: {}", path, e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), OAuthError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OAuthError::TokenStore(format!("{:?}: {}", parent, e)))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OAuthError::TokenStore(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| OAuthError::TokenStore(format!("{:?}: {}", path, e)))
    }

    fn from_response<T: TokenResponse<oauth2::basic::BasicTokenType>>(
        response: &T,
        previous_refresh: Option<&str>,
    ) -> Self {
        let expires_at = response
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        Self {
            access_token: response.access_token().secret().clone(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().clone())
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at,
        }
    }
}

/// Redirect parameters delivered to the local listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

fn build_client(config: &OAuthConfig) -> Result<BasicClient, OAuthError> {
    Ok(BasicClient::new(
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
        AuthUrl::new(config.auth_url.clone()).map_err(|e| OAuthError::OAuth2(e.to_string()))?,
        Some(TokenUrl::new(config.token_url.clone()).map_err(|e| OAuthError::OAuth2(e.to_string()))?),
    )
    .set_redirect_uri(
        RedirectUrl::new(config.redirect_uri()).map_err(|e| OAuthError::OAuth2(e.to_string()))?,
    ))
}

/// Return a usable access token, refreshing or signing in as needed
pub async fn authorize(config: &OAuthConfig, token_path: &Path) -> Result<String, OAuthError> {
    if let Some(stored) = StoredToken::load(token_path)? {
        if stored.is_fresh(Utc::now()) {
            log::debug!("Using cached access token from {:?}", token_path);
            return Ok(stored.access_token);
        }

        if let Some(refresh_token) = stored.refresh_token.as_deref() {
            match refresh_access_token(config, refresh_token).await {
                Ok(token) => {
                    token.save(token_path)?;
                    log::info!("Access token refreshed");
                    return Ok(token.access_token);
                }
                Err(e) => log::warn!("Token refresh failed, signing in again: {}", e),
            }
        }
    }

    let token = sign_in(config).await?;
    token.save(token_path)?;
    Ok(token.access_token)
}

/// Start OAuth2 flow and return authorization URL
pub fn start_oauth_flow(
    config: &OAuthConfig,
) -> Result<(String, CsrfToken, PkceCodeVerifier), OAuthError> {
    let client = build_client(config)?;

    // Generate PKCE challenge
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let mut auth_request = client.authorize_url(CsrfToken::new_random);
    for scope in &config.scopes {
        auth_request = auth_request.add_scope(Scope::new(scope.clone()));
    }

    // Offline access so a refresh token comes back
    let (auth_url, csrf_token) = auth_request
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    Ok((auth_url.to_string(), csrf_token, pkce_verifier))
}

/// Interactive sign-in through the browser
async fn sign_in(config: &OAuthConfig) -> Result<StoredToken, OAuthError> {
    let (auth_url, csrf_token, pkce_verifier) = start_oauth_flow(config)?;

    log::info!("Opening browser for Gmail sign-in");
    println!("Authorize access to your mailbox:\n{}", auth_url);
    if let Err(e) = open::that(&auth_url) {
        log::warn!("Could not open a browser: {}", e);
    }

    let port = config.callback_port;
    let params = tokio::task::spawn_blocking(move || wait_for_callback(port))
        .await
        .map_err(|e| OAuthError::Server(e.to_string()))??;

    if params.state != *csrf_token.secret() {
        return Err(OAuthError::StateMismatch);
    }

    exchange_code(config, params.code, pkce_verifier).await
}

/// Exchange authorization code for tokens
pub async fn exchange_code(
    config: &OAuthConfig,
    authorization_code: String,
    pkce_verifier: PkceCodeVerifier,
) -> Result<StoredToken, OAuthError> {
    let client = build_client(config)?;

    let token_result = client
        .exchange_code(AuthorizationCode::new(authorization_code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(async_http_client)
        .await
        .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

    Ok(StoredToken::from_response(&token_result, None))
}

/// Trade a refresh token for a new access token
pub async fn refresh_access_token(
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<StoredToken, OAuthError> {
    let client = build_client(config)?;

    let token_result = client
        .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
        .request_async(async_http_client)
        .await
        .map_err(|e| OAuthError::TokenExchange(e.to_string()))?;

    Ok(StoredToken::from_response(&token_result, Some(refresh_token)))
}

/// Parse the redirect request target (`/callback?code=..&state=..`)
pub fn parse_callback(url: &str) -> Result<CallbackParams, OAuthError> {
    let query = url
        .split_once('?')
        .map(|(_, query)| query)
        .ok_or_else(|| OAuthError::OAuth2("Invalid callback".to_string()))?;

    let params: Vec<(String, String)> = query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let value = urlencoding::decode(value).ok()?;
            Some((key.to_string(), value.into_owned()))
        })
        .collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    if let Some(error) = param("error") {
        return Err(if error == "access_denied" {
            OAuthError::Cancelled
        } else {
            OAuthError::OAuth2(error)
        });
    }

    match (param("code"), param("state")) {
        (Some(code), Some(state)) => Ok(CallbackParams { code, state }),
        _ => Err(OAuthError::OAuth2("Authorization code missing from callback".to_string())),
    }
}

/// Block until the provider redirects back to the local listener
pub fn wait_for_callback(port: u16) -> Result<CallbackParams, OAuthError> {
    let server = Server::http(format!("127.0.0.1:{}", port))
        .map_err(|e| OAuthError::Server(e.to_string()))?;

    log::info!("OAuth callback server started on http://localhost:{}", port);

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        if !url.starts_with("/callback") {
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }

        let result = parse_callback(&url);
        let page = if result.is_ok() {
            "Authentication successful! You can close this window."
        } else {
            "Authentication failed! You can close this window."
        };
        let _ = request.respond(Response::from_string(page));
        return result;
    }

    Err(OAuthError::Server("Callback server stopped".to_string()))
}
