use crate::config::Config;
use crate::session::{parse_set_cookie, CookieJar};
use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, COOKIE, SET_COOKIE};
use reqwest::Method;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type Query = Vec<(String, String)>;

/// Failure talking to the REST backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Connection refused, DNS, timeout.
    Unreachable(String),
    /// Non-2xx; the payload is passed through untouched.
    Status { status: u16, body: Value },
    /// 2xx with a body that is not JSON.
    Decode { status: u16, message: String },
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Status { .. } => "backend_error",
            BackendError::Unreachable(_) | BackendError::Decode { .. } => "backend_unreachable",
        }
    }

    pub fn message(&self) -> String {
        match self {
            BackendError::Unreachable(m) => format!("backend unreachable: {}", m),
            BackendError::Status { body, .. } => body
                .get("error")
                .or_else(|| body.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("Error en backend")
                .to_string(),
            BackendError::Decode { message, .. } => format!("invalid backend payload: {}", message),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            BackendError::Status { status, body } => Some(json!({ "status": status, "body": body })),
            BackendError::Decode { status, .. } => Some(json!({ "status": status })),
            BackendError::Unreachable(_) => None,
        }
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Value,
}

/// One backend request. Paths are relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

impl Call {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authorization: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut c = Self::new(Method::POST, path);
        c.body = Some(body);
        c
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        let mut c = Self::new(Method::PUT, path);
        c.body = Some(body);
        c
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn authorization(mut self, auth: Option<String>) -> Self {
        self.authorization = auth.filter(|a| !a.trim().is_empty());
        self
    }
}

pub struct Backend {
    client: Client,
    base_url: String,
}

impl Backend {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!("cobranzad/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, url: &str) {
        self.base_url = url.to_string();
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send a call, folding any `Set-Cookie` into the jar.
    pub fn send(&self, jar: &mut CookieJar, call: Call) -> Result<BackendResponse, BackendError> {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::debug_span!(
            "backend",
            method = %call.method,
            path = %call.path,
            request_id = %request_id
        );
        let _enter = span.enter();
        let started = Instant::now();

        let mut rb = self
            .client
            .request(call.method.clone(), self.url_for(&call.path))
            .header(CACHE_CONTROL, "no-store")
            .header("x-request-id", &request_id);
        if !call.query.is_empty() {
            rb = rb.query(&call.query);
        }
        if let Some(cookie) = jar.header_value(Utc::now()) {
            rb = rb.header(COOKIE, cookie);
        }
        if let Some(auth) = &call.authorization {
            rb = rb.header(AUTHORIZATION, auth);
        }
        if let Some(body) = &call.body {
            rb = rb.json(body);
        }

        let resp = rb.send().map_err(|e| {
            tracing::warn!(error = %e, "backend request failed");
            BackendError::Unreachable(e.to_string())
        })?;
        let status = resp.status().as_u16();

        let now = Utc::now();
        for v in resp.headers().get_all(SET_COOKIE) {
            if let Some(update) = v.to_str().ok().and_then(|s| parse_set_cookie(s, now)) {
                jar.apply(update);
            }
        }

        let text = resp
            .text()
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;
        tracing::debug!(
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend responded"
        );

        let parsed: Option<Value> = if text.trim().is_empty() {
            Some(json!({}))
        } else {
            serde_json::from_str(&text).ok()
        };

        if !(200..300).contains(&status) {
            let body = parsed.unwrap_or_else(|| json!({ "error": "Error en backend" }));
            tracing::warn!(status, "backend returned an error status");
            return Err(BackendError::Status { status, body });
        }

        match parsed {
            Some(body) => Ok(BackendResponse { status, body }),
            // Deletes often answer with an empty or plain-text body.
            None if call.method == Method::DELETE => Ok(BackendResponse {
                status,
                body: json!({}),
            }),
            None => Err(BackendError::Decode {
                status,
                message: "response is not JSON".to_string(),
            }),
        }
    }
}
