// src/client.rs - HTTP + JSON client for the API under test

use reqwest::Method;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ConformanceError, Result};
use crate::model::{login_body, user_body};
use crate::url::{join_base, with_limit};

/// Thin REST client bound to one server.
///
/// Every request carries `Content-type: application/json`; authenticated
/// requests add `Authorization: Token <token>`. GETs always carry the
/// configured `limit` so list assertions see the whole collection.
///
/// # Example
///
/// ```rust,no_run
/// use ocl_conformance::{ApiClient, Config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ApiClient::new(&Config::default())?;
///     let token = client.authenticate_admin().await?;
///     let orgs = client.get("orgs/", Some(&token)).await?;
///     println!("{} orgs visible to admin", orgs.json_array()?.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    page_limit: u32,
    admin_user: String,
    admin_password: String,
}

/// Status, final URL and decoded body of one exchange
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    /// `Value::Null` when the body is empty or not JSON
    pub body: Value,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.server.url.clone(),
            page_limit: config.server.page_limit,
            admin_user: config.server.admin_user.clone(),
            admin_password: config.server.admin_password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn admin_user(&self) -> &str {
        &self.admin_user
    }

    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }

    /// Absolute URL for an API path; the path is sent as given
    pub fn url(&self, path: &str) -> String {
        join_base(&self.base_url, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<ApiResponse> {
        let limited = with_limit(path, self.page_limit);
        self.send(Method::GET, &limited, None, token).await
    }

    pub async fn post(&self, path: &str, body: &Value, token: Option<&str>) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(body), token).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>, token: Option<&str>) -> Result<ApiResponse> {
        self.send(Method::PUT, path, body, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, None, token).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("Content-type", "application/json");

        if let Some(token) = token {
            request = request.header("Authorization", format!("Token {}", token));
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        debug!(
            method = %method,
            url = %url,
            status = status,
            authenticated = token.is_some(),
            "API request completed"
        );

        Ok(ApiResponse {
            method: method.to_string(),
            url,
            status,
            body,
        })
    }

    /// Log in and return the token, or `None` when the API issues none
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<String>> {
        let response = self
            .post("users/login/", &login_body(username, password), None)
            .await?;
        let token = response
            .body
            .get("token")
            .and_then(|t| t.as_str())
            .map(str::to_string);

        if token.is_none() {
            debug!(username = %username, status = response.status, "Login returned no token");
        }
        Ok(token)
    }

    pub async fn authenticate_admin(&self) -> Result<String> {
        self.authenticate(&self.admin_user, &self.admin_password)
            .await?
            .ok_or_else(|| ConformanceError::Authentication {
                username: self.admin_user.clone(),
            })
    }

    /// Create a user as admin and reactivate it so it can log in without
    /// email verification. Returns the JSON of the create call.
    pub async fn new_user(&self, username: &str, password: &str, admin_token: &str) -> Result<Value> {
        let body = user_body(username, password);
        let created = self.post("users/", &body, Some(admin_token)).await?;
        self.put(
            &format!("users/{}/reactivate/", username),
            Some(&body),
            Some(admin_token),
        )
        .await?;

        debug!(username = %username, status = created.status, "Created test user");
        Ok(created.body)
    }
}

impl ApiResponse {
    pub fn expect_status(&self, expected: u16) -> Result<&Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(self.status_error(expected.to_string()))
        }
    }

    pub fn expect_any_status(&self, expected: &[u16]) -> Result<&Self> {
        if expected.contains(&self.status) {
            Ok(self)
        } else {
            let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
            Err(self.status_error(format!("one of [{}]", expected.join(", "))))
        }
    }

    fn status_error(&self, expected: String) -> ConformanceError {
        ConformanceError::UnexpectedStatus {
            method: self.method.clone(),
            url: self.url.clone(),
            expected,
            actual: self.status,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json_array(&self) -> Result<&Vec<Value>> {
        self.body.as_array().ok_or_else(|| {
            ConformanceError::assertion(format!(
                "Expected a JSON array from {} {} (status {}), got {}",
                self.method, self.url, self.status, self.body
            ))
        })
    }

    pub fn field(&self, field: &str) -> Result<&Value> {
        self.body
            .get(field)
            .ok_or_else(|| ConformanceError::MissingField {
                field: field.to_string(),
                url: self.url.clone(),
            })
    }

    pub fn field_str(&self, field: &str) -> Result<&str> {
        self.field(field)?
            .as_str()
            .ok_or_else(|| ConformanceError::MissingField {
                field: field.to_string(),
                url: self.url.clone(),
            })
    }
}

/// Fixed pause that gives the search index time to catch up
pub async fn settle(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Re-run `op` until it succeeds or `attempts` runs out; the last error wins
pub async fn retry<T, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Check did not pass yet, retrying"
                );
                settle(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
