//! HTTP transport for the registry API.
//!
//! This module provides the HTTP client used by the registry connector, with
//! retry logic, rate limiting, and session-token management against the
//! registry's login endpoint.

use crate::secure_string::SecureString;
use crate::traits::{ConnectorError, ConnectorResult};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Type alias for the rate limiter.
type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn default_auth_path() -> String {
    "api/users/v1/auth".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_verify_tls() -> bool {
    true
}

/// Registry connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry base URL, e.g. `https://gate.example.com`.
    pub base_url: String,

    /// Credential used against the registry.
    pub auth: RegistryAuth,

    /// Path receiving the username/password login request.
    #[serde(default = "default_auth_path")]
    pub auth_path: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry budget for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether to verify TLS certificates.
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Optional client-side request rate cap.
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            auth: RegistryAuth::Token {
                token: SecureString::default(),
            },
            auth_path: default_auth_path(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            verify_tls: default_verify_tls(),
            requests_per_second: None,
        }
    }
}

/// How the client authenticates against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryAuth {
    /// Pre-issued API token, sent as a bearer credential.
    Token { token: SecureString },

    /// Username and password, exchanged for a session token at the login
    /// endpoint on first use.
    Password {
        username: String,
        password: SecureString,
    },
}

/// HTTP client for the registry API with retry and rate limiting support.
pub struct HttpClient {
    client: Client,
    config: RegistryConfig,
    /// Session token obtained from the login endpoint (zeroized on drop).
    session: Arc<RwLock<Option<SecureString>>>,
    /// Rate limiter for this client.
    rate_limiter: Option<Arc<RateLimiterType>>,
}

impl HttpClient {
    /// Creates a new HTTP client from registry configuration.
    pub fn new(config: RegistryConfig) -> ConnectorResult<Self> {
        // SECURITY: TLS verification cannot be disabled in release builds
        let verify_tls = if !config.verify_tls {
            #[cfg(debug_assertions)]
            {
                warn!(
                    base_url = %config.base_url,
                    "TLS certificate verification DISABLED in development mode - connection is vulnerable to MITM attacks"
                );
                false
            }
            #[cfg(not(debug_assertions))]
            {
                warn!(
                    base_url = %config.base_url,
                    "Attempted to disable TLS verification in a release build - request IGNORED for security"
                );
                true
            }
        } else {
            true
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        // Create rate limiter if configured
        let rate_limiter = config.requests_per_second.map(|rps| {
            let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
            Arc::new(GovernorRateLimiter::direct(quota))
        });

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
            rate_limiter,
        })
    }

    /// Builds a URL from a path.
    ///
    /// The registry requires the trailing slash; without it every request
    /// answers with a redirect.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_matches('/');
        format!("{}/{}/", base, path)
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Executes a GET request and parses the JSON response.
    pub async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> ConnectorResult<Value> {
        let url = self.build_url(path);
        let mut request = self.client.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.execute_with_retry(request).await?;
        self.parse_json(response).await
    }

    /// Executes a POST request and parses the JSON response.
    pub async fn post_json(&self, path: &str, body: &Value) -> ConnectorResult<Value> {
        let url = self.build_url(path);
        let request = self.client.post(&url).json(body);
        let response = self.execute_with_retry(request).await?;
        self.parse_json(response).await
    }

    /// Executes a PUT request and parses the JSON response.
    pub async fn put_json(&self, path: &str, body: &Value) -> ConnectorResult<Value> {
        let url = self.build_url(path);
        let request = self.client.put(&url).json(body);
        let response = self.execute_with_retry(request).await?;
        self.parse_json(response).await
    }

    /// Executes a DELETE request. Any success status counts as deleted.
    pub async fn delete(&self, path: &str) -> ConnectorResult<()> {
        let url = self.build_url(path);
        let request = self.client.delete(&url);
        self.execute_with_retry(request).await?;
        Ok(())
    }

    /// Parses a JSON response body.
    async fn parse_json(&self, response: Response) -> ConnectorResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| {
            ConnectorError::InvalidResponse(format!(
                "Failed to parse response (status {}): {} - Body: {}",
                status,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Executes a request with authentication, rate limiting, retries, and
    /// error handling.
    ///
    /// A 401 clears the cached session token once, so the next attempt logs
    /// in again before the error is surfaced.
    async fn execute_with_retry(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<Response> {
        // Wait for rate limiter if configured
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let mut last_error = None;
        let mut delay = Duration::from_millis(100);
        let mut relogin_attempted = false;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} after {:?}", attempt, delay);
                sleep(delay).await;
                // Exponential backoff with jitter
                let jitter = rand_jitter();
                delay = std::cmp::min(delay * 2 + jitter, Duration::from_secs(30));
            }

            // Clone the request builder and authenticate per attempt, so a
            // re-login after a 401 takes effect on the retry
            let request_clone = request
                .try_clone()
                .ok_or_else(|| ConnectorError::Internal("Failed to clone request".to_string()))?;
            let authed = self.add_auth(request_clone).await?;

            match authed.send().await {
                Ok(response) => {
                    let status = response.status();

                    // Handle rate limiting
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);

                        warn!("Rate limited by the registry, waiting {} seconds", retry_after);

                        if attempt < self.config.max_retries {
                            sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }

                        return Err(ConnectorError::RateLimited(retry_after));
                    }

                    // An expired session token answers 401; log in again once
                    if status == StatusCode::UNAUTHORIZED && !relogin_attempted {
                        relogin_attempted = true;
                        self.session.write().await.take();
                        last_error = Some(ConnectorError::AuthenticationFailed(
                            "Unauthorized".to_string(),
                        ));
                        continue;
                    }

                    // Handle server errors (retry)
                    if status.is_server_error() && attempt < self.config.max_retries {
                        warn!("Registry returned {}, retrying...", status);
                        last_error = Some(ConnectorError::RequestFailed(format!(
                            "Server error: {}",
                            status
                        )));
                        continue;
                    }

                    // Handle client errors (don't retry)
                    if status.is_client_error() {
                        return match status {
                            StatusCode::UNAUTHORIZED => {
                                Err(ConnectorError::AuthenticationFailed("Unauthorized".into()))
                            }
                            StatusCode::FORBIDDEN => {
                                Err(ConnectorError::AuthorizationDenied("Forbidden".into()))
                            }
                            StatusCode::NOT_FOUND => {
                                Err(ConnectorError::NotFound("Resource not found".into()))
                            }
                            StatusCode::BAD_REQUEST => {
                                let body = response.text().await.unwrap_or_default();
                                Err(ConnectorError::RequestFailed(format!(
                                    "Bad request: {}",
                                    body
                                )))
                            }
                            _ => Err(ConnectorError::RequestFailed(format!(
                                "Client error: {}",
                                status
                            ))),
                        };
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(ConnectorError::Timeout(e.to_string()));
                    } else if e.is_connect() {
                        last_error = Some(ConnectorError::ConnectionFailed(e.to_string()));
                    } else {
                        last_error = Some(ConnectorError::RequestFailed(e.to_string()));
                    }

                    if attempt >= self.config.max_retries {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Internal("Unknown error".to_string())))
    }

    /// Adds the bearer credential to a request.
    async fn add_auth(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<reqwest::RequestBuilder> {
        let token = self.session_token().await?;
        Ok(request.header("Authorization", format!("Bearer {}", token.expose_secret())))
    }

    /// Gets the configured token, or logs in and caches the session token.
    ///
    /// Returns a `SecureString` so the token is zeroized from memory when no
    /// longer needed.
    async fn session_token(&self) -> ConnectorResult<SecureString> {
        match &self.config.auth {
            RegistryAuth::Token { token } => Ok(token.clone()),
            RegistryAuth::Password { username, password } => {
                // Check if we already hold a session token
                {
                    let session = self.session.read().await;
                    if let Some(token) = &*session {
                        return Ok(token.clone());
                    }
                }

                info!(username = %username, "Logging in to the registry");

                let url = self.build_url(&self.config.auth_path);
                let body = serde_json::json!({
                    "username": username,
                    "password": password.expose_secret(),
                });

                let response = self
                    .client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| ConnectorError::AuthenticationFailed(e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ConnectorError::AuthenticationFailed(format!(
                        "Login request failed: {}",
                        response.status()
                    )));
                }

                #[derive(serde::Deserialize)]
                struct LoginResponse {
                    token: String,
                }

                let login: LoginResponse = response
                    .json()
                    .await
                    .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

                // Wrap the session token in SecureString immediately
                let token = SecureString::new(login.token);
                *self.session.write().await = Some(token.clone());
                Ok(token)
            }
        }
    }
}

/// Generate a small random jitter for exponential backoff.
fn rand_jitter() -> Duration {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::time::Instant::now().hash(&mut hasher);
    let jitter_ms = hasher.finish() % 100;
    Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> RegistryConfig {
        RegistryConfig {
            base_url: "https://gate.example.com".to_string(),
            auth: RegistryAuth::Token {
                token: "test-token".into(),
            },
            ..RegistryConfig::default()
        }
    }

    #[test]
    fn test_build_url_appends_trailing_slash() {
        let client = HttpClient::new(create_test_config()).unwrap();

        assert_eq!(
            client.build_url("/api/assets/v1/assets"),
            "https://gate.example.com/api/assets/v1/assets/"
        );
        assert_eq!(
            client.build_url("api/assets/v1/assets/"),
            "https://gate.example.com/api/assets/v1/assets/"
        );
    }

    #[test]
    fn test_build_url_trims_base_slash() {
        let config = RegistryConfig {
            base_url: "https://gate.example.com/".to_string(),
            ..create_test_config()
        };
        let client = HttpClient::new(config).unwrap();

        assert_eq!(
            client.build_url("api/users/v1/auth"),
            "https://gate.example.com/api/users/v1/auth/"
        );
    }

    #[test]
    fn test_config_defaults() {
        let yaml = r#"
base_url: https://gate.example.com
auth:
  type: token
  token: abc123
"#;
        let config: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.auth_path, "api/users/v1/auth");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 3);
        assert!(config.verify_tls);
        assert!(config.requests_per_second.is_none());
    }

    #[test]
    fn test_password_auth_from_yaml() {
        let yaml = r#"
base_url: https://gate.example.com
auth:
  type: password
  username: admin
  password: hunter2
requests_per_second: 10
"#;
        let config: RegistryConfig = serde_yaml::from_str(yaml).unwrap();
        match &config.auth {
            RegistryAuth::Password { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password.expose_secret(), "hunter2");
            }
            other => panic!("unexpected auth variant: {:?}", other),
        }

        let client = HttpClient::new(config).unwrap();
        assert!(client.rate_limiter.is_some());
    }

    #[test]
    fn test_rand_jitter_bounded() {
        for _ in 0..10 {
            assert!(rand_jitter() < Duration::from_millis(100));
        }
    }
}
