//! Service account authentication for Google APIs.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{ConnectorError, TransportError};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Full Drive access.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Read-only Drive access.
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Full Sheets access.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Read-only Sheets access.
pub const SPREADSHEETS_READONLY_SCOPE: &str =
    "https://www.googleapis.com/auth/spreadsheets.readonly";

/// Tokens are refreshed this long before they expire.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Supported ways of authenticating a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Service account JSON key file.
    #[default]
    Service,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Service => "service",
        }
    }
}

impl FromStr for AuthMode {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(AuthMode::Service),
            other => Err(ConnectorError::BadAuthMode(other.to_string())),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of bearer tokens for API requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, TransportError>;
}

/// A fixed token, e.g. one printed by `gcloud auth print-access-token`.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, TransportError> {
        Ok(self.0.clone())
    }
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // Space-separated OAuth scopes
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// Authenticator for Google APIs using service account credentials.
#[derive(Clone)]
pub struct Authenticator {
    client_email: String,
    key: EncodingKey,
    scope: String,
    token_uri: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Load a service account JSON file and bind it to `scopes`.
    ///
    /// The private key is parsed here, so a bad key fails at load time
    /// rather than on the first request.
    pub fn from_file<P, S>(path: P, scopes: &[S]) -> Result<Self, TransportError>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let content = fs::read_to_string(path)?;
        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)?;
        Self::new(credentials, scopes)
    }

    /// Create a new authenticator from credentials.
    pub fn new<S: AsRef<str>>(
        credentials: ServiceAccountCredentials,
        scopes: &[S],
    ) -> Result<Self, TransportError> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        let scope = scopes
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Self {
            client_email: credentials.client_email,
            key,
            scope,
            token_uri: credentials
                .token_uri
                .unwrap_or_else(|| TOKEN_URI.to_string()),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Service account email this authenticator signs as.
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Space-separated scopes requested in each assertion.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Override the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String, TransportError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_BUFFER {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Exchange a signed JWT assertion for an access token.
    async fn refresh_token(&self) -> Result<CachedToken, TransportError> {
        debug!(email = %self.client_email, "Refreshing access token");

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TransportError::TokenRefresh(e.to_string()))?
            .as_secs();

        let claims = Claims {
            iss: self.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + 3600,
        };

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &self.key)?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", &jwt),
        ];

        let response = self
            .client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::TokenRefresh(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(token_response.expires_in),
        })
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn access_token(&self) -> Result<String, TransportError> {
        self.get_access_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: format!("{} {}", DRIVE_SCOPE, SPREADSHEETS_SCOPE),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(SPREADSHEETS_SCOPE));
    }

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!("service".parse::<AuthMode>().unwrap(), AuthMode::Service);
        assert_eq!(AuthMode::default().to_string(), "service");
    }

    #[test]
    fn test_auth_mode_rejects_unknown() {
        let err = "oauth".parse::<AuthMode>().unwrap_err();
        assert!(matches!(err, ConnectorError::BadAuthMode(ref m) if m == "oauth"));
    }

    #[tokio::test]
    async fn test_static_token() {
        let token = StaticToken::new("abc");
        assert_eq!(token.access_token().await.unwrap(), "abc");
    }
}
