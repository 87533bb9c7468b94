//! OAuth2 credentials for the installed-app flow: a cached token file, refresh
//! through the token endpoint, and a manual consent flow (PKCE) when nothing is
//! cached. The protocol itself is handled by the `oauth2` crate.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use oauth2::url::Url;
use reqwest::{redirect, Client};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use tubesift_core::contract::{AuthError, AuthProvider, Credential};
use tubesift_core::targets;

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const REDIRECT_URI: &str = "http://localhost:8080/";
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.force-ssl",
];

/// Client with authorization and token endpoints configured.
pub type GoogleClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn auth_error(context: &str, e: impl std::fmt::Display) -> AuthError {
    AuthError(format!("{context}: {e}"))
}

/// Converts a token response, keeping `previous_refresh` when the server sends
/// no new refresh token.
pub fn into_credential(token: &BasicTokenResponse, previous_refresh: Option<String>) -> Credential {
    Credential {
        access_token: token.access_token().secret().clone(),
        refresh_token: token
            .refresh_token()
            .map(|t| t.secret().clone())
            .or(previous_refresh),
        expires_at: token
            .expires_in()
            .and_then(|lifetime| Duration::from_std(lifetime).ok())
            .map(|lifetime| Utc::now() + lifetime),
    }
}

/// Parses a client secrets file as downloaded from the cloud console.
pub fn read_client_secrets(path: &Path) -> Result<ClientSecrets, AuthError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| auth_error(&format!("cannot read client secrets {}", path.display()), e))?;
    let file: ClientSecretsFile =
        serde_json::from_str(&raw).map_err(|e| auth_error("malformed client secrets", e))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| AuthError("client secrets contain neither `installed` nor `web`".into()))
}

pub fn oauth_client(secrets: &ClientSecrets) -> Result<GoogleClient, AuthError> {
    let auth_url = AuthUrl::new(secrets.auth_uri.as_deref().unwrap_or(AUTH_URL).to_string())
        .map_err(|e| auth_error("invalid authorization endpoint", e))?;
    let token_url = TokenUrl::new(secrets.token_uri.as_deref().unwrap_or(TOKEN_URL).to_string())
        .map_err(|e| auth_error("invalid token endpoint", e))?;
    let redirect_url = RedirectUrl::new(REDIRECT_URI.to_string())
        .map_err(|e| auth_error("invalid redirect URI", e))?;

    Ok(BasicClient::new(ClientId::new(secrets.client_id.clone()))
        .set_client_secret(ClientSecret::new(secrets.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

/// Consent URL with offline access and an S256 PKCE challenge, plus the state and
/// verifier needed to finish the flow.
pub fn authorization_request(client: &GoogleClient) -> (Url, CsrfToken, PkceCodeVerifier) {
    let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
    let (url, state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(SCOPES.iter().map(|scope| Scope::new(scope.to_string())))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(challenge)
        .url();
    (url, state, verifier)
}

fn query_value(input: &str, key: &str) -> Option<String> {
    Url::parse(input.trim())
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.into_owned())
}

/// Accepts either the bare code or the full redirect URL the browser landed on.
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(_) => query_value(input, "code"),
        Err(_) => Some(input.to_string()),
    }
}

/// A pasted redirect URL must carry the state we sent. A bare code carries none.
pub fn state_matches(input: &str, expected: &CsrfToken) -> bool {
    query_value(input, "state").map_or(true, |state| state == *expected.secret())
}

/// [`AuthProvider`] backed by `client_secrets.json` and a `token.json` cache.
pub struct TokenCache {
    http: Client,
    secrets_path: PathBuf,
    cache_path: PathBuf,
}

impl TokenCache {
    pub fn new(secrets_path: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        // Token endpoints must not be followed through redirects.
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            http,
            secrets_path: secrets_path.into(),
            cache_path: cache_path.into(),
        }
    }

    pub fn read_cached(&self) -> Result<Option<Credential>, AuthError> {
        if !self.cache_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.cache_path)
            .map_err(|e| auth_error("cannot read token cache", e))?;
        match serde_json::from_str(&raw) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(target: targets::CREDENTIALS, error = %e, path = %self.cache_path.display(), "Ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    /// Writes through a temporary file so a crash never leaves a torn cache.
    pub fn store(&self, credential: &Credential) -> Result<(), AuthError> {
        let body = serde_json::to_string_pretty(credential)
            .map_err(|e| auth_error("cannot encode credential", e))?;
        let tmp = self.cache_path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| auth_error("cannot write token cache", e))?;
        fs::rename(&tmp, &self.cache_path).map_err(|e| auth_error("cannot write token cache", e))?;
        info!(target: targets::CREDENTIALS, path = %self.cache_path.display(), "Credentials saved");
        Ok(())
    }

    async fn consent_flow(&self) -> Result<Credential, AuthError> {
        let client = oauth_client(&read_client_secrets(&self.secrets_path)?)?;
        let (url, state, verifier) = authorization_request(&client);

        println!("Open this URL in a browser and grant access:\n\n{url}\n");
        println!("Then paste the address the browser was redirected to (or just the code):");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let input = lines
            .next_line()
            .await
            .map_err(|e| auth_error("cannot read from stdin", e))?
            .unwrap_or_default();
        if !state_matches(&input, &state) {
            return Err(AuthError("the redirect carries a different state, start again".into()));
        }
        let code = extract_code(&input).ok_or_else(|| AuthError("no authorization code given".into()))?;

        let token = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| auth_error("token exchange failed", e))?;
        Ok(into_credential(&token, None))
    }
}

#[async_trait]
impl AuthProvider for TokenCache {
    async fn obtain(&self) -> Result<Credential, AuthError> {
        if let Some(credential) = self.read_cached()? {
            info!(target: targets::CREDENTIALS, "Loading credentials from file...");
            return Ok(credential);
        }
        info!(target: targets::CREDENTIALS, "Fetching new tokens...");
        let credential = self.consent_flow().await?;
        self.store(&credential)?;
        Ok(credential)
    }

    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError("no refresh token available".into()))?;
        let client = oauth_client(&read_client_secrets(&self.secrets_path)?)?;
        let token = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| auth_error("token refresh failed", e))?;
        let refreshed = into_credential(&token, credential.refresh_token.clone());
        self.store(&refreshed)?;
        info!(target: targets::CREDENTIALS, "Access token refreshed");
        Ok(refreshed)
    }
}
