//! OAuth2 client-credentials token acquisition.

use crate::config::{Config, Credentials};
use crate::error::{is_transient_status, SyncError};
use crate::retry::{parse_retry_after, retry_with_backoff, Attempt, RetryPolicy};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

/// Token endpoint response. Error responses share the same shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,

    #[serde(default)]
    token_type: Option<String>,

    /// Seconds until expiry. Some endpoints send it as a string.
    #[serde(default)]
    expires_in: Option<serde_json::Value>,

    #[serde(default)]
    error: Option<String>,

    #[serde(default)]
    error_description: Option<String>,
}

/// Bearer token for Graph requests. Lives for one run only.
#[derive(Clone)]
pub struct AccessToken {
    secret: SecretString,
    token_type: String,
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            token_type: "Bearer".to_string(),
            expires_in: None,
        }
    }

    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// `Authorization` header value, `<token_type> <token>`.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.secret())
    }

    /// Lifetime in seconds as reported by the token endpoint.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Client for the tenant-scoped token endpoint.
pub struct TokenClient {
    client: Client,
    login_endpoint: String,
    scope: String,
    retry: RetryPolicy,
}

impl TokenClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            login_endpoint: config.graph.login_endpoint().to_string(),
            scope: format!("{}/.default", config.graph.graph_endpoint()),
            retry: config.http.retry.clone(),
        }
    }

    /// Token endpoint URL for a tenant.
    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.login_endpoint, tenant_id)
    }

    /// Requested scope, `{graph}/.default`.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Exchange client credentials for an access token.
    pub async fn acquire_token(&self, credentials: &Credentials) -> Result<AccessToken, SyncError> {
        credentials
            .validate()
            .map_err(|e| SyncError::Authentication(e.to_string()))?;

        let url = self.token_url(&credentials.tenant_id);
        debug!(url = %url, client_id = %credentials.client_id, "Requesting access token");

        let token = retry_with_backoff(&self.retry, "token request", || {
            self.request_token(credentials, &url)
        })
        .await
        .map_err(|e| match e {
            SyncError::Status { status, body } => SyncError::Authentication(format!(
                "token endpoint returned HTTP {}: {}",
                status, body
            )),
            other => other,
        })?;

        info!(
            token_type = %token.token_type(),
            expires_in = ?token.expires_in(),
            "Access token acquired"
        );
        Ok(token)
    }

    async fn request_token(&self, credentials: &Credentials, url: &str) -> Attempt<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = match self.client.post(url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::from(Err(e.into())),
        };

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Attempt::from(Err(e.into())),
        };

        if is_transient_status(status) {
            return Attempt {
                result: Err(SyncError::Status { status, body }),
                retry_after,
            };
        }

        Attempt::from(parse_token_response(status, &body))
    }
}

fn parse_token_response(status: reqwest::StatusCode, body: &str) -> Result<AccessToken, SyncError> {
    let response: TokenResponse = serde_json::from_str(body).map_err(|e| {
        SyncError::Authentication(format!(
            "unreadable token response (HTTP {}): {}",
            status, e
        ))
    })?;

    match response.access_token {
        Some(secret) if !secret.is_empty() => Ok(AccessToken {
            secret: SecretString::from(secret),
            token_type: response
                .token_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_in: response.expires_in.as_ref().and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            }),
        }),
        _ => {
            let error = response
                .error
                .unwrap_or_else(|| "no access_token in response".to_string());
            Err(SyncError::Authentication(match response.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            }))
        }
    }
}
