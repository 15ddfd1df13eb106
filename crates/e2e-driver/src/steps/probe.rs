//! One HTTP request with assertions on the response.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use e2e_core::{abbreviate, E2eError, E2eResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::debug;

use crate::params::Params;
use crate::step::Step;

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How an expected response header is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderMatch {
    /// The header equals this value exactly.
    Exact(String),
    /// The header is present with a non-empty value.
    AnyNonEmpty,
    /// The header is missing or empty.
    MustBeAbsent,
}

impl HeaderMatch {
    /// Parse the short form used in scenario tables: `*` for any non-empty
    /// value, `-` for absent, anything else for an exact value.
    pub fn from_pattern(pattern: &str) -> Self {
        match pattern {
            "*" => Self::AnyNonEmpty,
            "-" => Self::MustBeAbsent,
            exact => Self::Exact(exact.to_string()),
        }
    }

    /// Check a header value; `None` means the header was not sent.
    pub fn check(&self, header: &str, actual: Option<&str>) -> E2eResult<()> {
        let actual = actual.unwrap_or_default();
        let ok = match self {
            Self::Exact(expected) => actual == expected,
            Self::AnyNonEmpty => !actual.is_empty(),
            Self::MustBeAbsent => actual.is_empty(),
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Self::Exact(expected) => format!("{expected:?}"),
            Self::AnyNonEmpty => "any non-empty value".to_string(),
            Self::MustBeAbsent => "no value".to_string(),
        };
        Err(E2eError::mismatch(
            format!("header {header}"),
            expected,
            format!("{actual:?}"),
        ))
    }
}

impl From<&str> for HeaderMatch {
    fn from(pattern: &str) -> Self {
        Self::from_pattern(pattern)
    }
}

/// Which port a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// The proxy listener.
    #[default]
    Listener,
    /// The proxy admin endpoint.
    Admin,
    /// A fixed port.
    Port(u16),
}

impl Target {
    pub(crate) fn port(self, params: &Params) -> u16 {
        match self {
            Self::Listener => params.ports.listener,
            Self::Admin => params.ports.admin,
            Self::Port(port) => port,
        }
    }
}

/// Send one HTTP request to `127.0.0.1` and check the response.
///
/// The status must equal the expected status (200 unless set). The body is
/// compared only if an expected body was given. `{{var}}` placeholders in the
/// path are filled from the scenario parameters.
#[derive(Debug, Clone)]
pub struct HttpCall {
    method: Method,
    path: String,
    target: Target,
    body: Bytes,
    request_headers: Vec<(String, String)>,
    expected_status: u16,
    expected_body: Option<Bytes>,
    expected_headers: Vec<(String, HeaderMatch)>,
    timeout: Duration,
}

impl HttpCall {
    /// Create a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            target: Target::default(),
            body: Bytes::new(),
            request_headers: Vec::new(),
            expected_status: 200,
            expected_body: None,
            expected_headers: Vec::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// `GET path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Send to the given port.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Send to the proxy admin endpoint.
    pub fn admin(self) -> Self {
        self.target(Target::Admin)
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.push((name.into(), value.into()));
        self
    }

    /// Expect this status code.
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// Expect exactly this response body.
    pub fn expect_body(mut self, body: impl Into<Bytes>) -> Self {
        self.expected_body = Some(body.into());
        self
    }

    /// Expect a response header to match.
    pub fn expect_header(mut self, name: impl Into<String>, matcher: impl Into<HeaderMatch>) -> Self {
        self.expected_headers.push((name.into(), matcher.into()));
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn headers(&self) -> E2eResult<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.request_headers.len());
        for (name, value) in &self.request_headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| E2eError::Configuration(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| E2eError::Configuration(format!("invalid value for {name}: {e}")))?;
            headers.append(name, value);
        }
        Ok(headers)
    }

    fn verify(&self, status: u16, url: &str, headers: &HeaderMap, body: &[u8]) -> E2eResult<()> {
        if status != self.expected_status {
            return Err(E2eError::Status {
                url: url.to_string(),
                expected: self.expected_status,
                actual: status,
            });
        }

        if let Some(expected) = &self.expected_body {
            if body != expected.as_ref() {
                return Err(E2eError::mismatch(
                    "response body",
                    abbreviate(expected),
                    abbreviate(body),
                ));
            }
        }

        for (name, matcher) in &self.expected_headers {
            let actual = headers.get(name.as_str()).and_then(|v| v.to_str().ok());
            matcher.check(name, actual)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Step for HttpCall {
    fn name(&self) -> String {
        format!("http {} {}", self.method, self.path)
    }

    async fn run(&mut self, params: &mut Params) -> E2eResult<()> {
        let port = self.target.port(params);
        let url = format!("http://127.0.0.1:{}{}", port, params.fill(&self.path)?);

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let response = client
            .request(self.method.clone(), &url)
            .headers(self.headers()?)
            .body(self.body.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        debug!(url = %url, status, bytes = body.len(), "http response");

        self.verify(status, &url, &headers, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;
    use tokio::net::TcpListener;

    #[test]
    fn any_non_empty_rejects_empty_or_missing() {
        let m = HeaderMatch::AnyNonEmpty;
        assert!(m.check("x-id", Some("abc")).is_ok());
        assert!(m.check("x-id", Some("")).is_err());
        assert!(m.check("x-id", None).is_err());
    }

    #[test]
    fn must_be_absent_rejects_any_value() {
        let m = HeaderMatch::MustBeAbsent;
        assert!(m.check("x-id", None).is_ok());
        assert!(m.check("x-id", Some("")).is_ok());
        assert!(m.check("x-id", Some("v")).is_err());
    }

    #[test]
    fn exact_requires_equality() {
        let m = HeaderMatch::Exact("v1".into());
        assert!(m.check("x-version", Some("v1")).is_ok());
        assert!(m.check("x-version", Some("V1")).is_err());
        assert!(m.check("x-version", Some("v1 ")).is_err());
        assert!(m.check("x-version", None).is_err());
    }

    #[test]
    fn header_mismatch_names_both_values() {
        let err = HeaderMatch::Exact("v1".into())
            .check("x-version", Some("v2"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("x-version"));
        assert!(msg.contains("v1"));
        assert!(msg.contains("v2"));
    }

    #[test]
    fn patterns() {
        assert_eq!(HeaderMatch::from_pattern("*"), HeaderMatch::AnyNonEmpty);
        assert_eq!(HeaderMatch::from_pattern("-"), HeaderMatch::MustBeAbsent);
        assert_eq!(HeaderMatch::from("a"), HeaderMatch::Exact("a".into()));
    }

    #[test]
    fn long_body_mismatch_is_abbreviated() {
        let expected = "Hi, this is my SSN: 987-65-4321.".repeat(1000);
        let actual = "Hi, this is my SSN: ***-**-****.".repeat(1000);
        let call = HttpCall::post("/echo").expect_body(expected);

        match call.verify(200, "http://127.0.0.1/echo", &HeaderMap::new(), actual.as_bytes()) {
            Err(E2eError::Mismatch {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "response body");
                assert!(expected.ends_with("(32000 bytes)"), "{expected}");
                assert!(actual.ends_with("(32000 bytes)"), "{actual}");
                assert!(expected.len() < 200);
                assert!(actual.len() < 200);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let short = HttpCall::post("/echo").expect_body("bye");
        let err = short
            .verify(200, "http://127.0.0.1/echo", &HeaderMap::new(), b"hello")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"bye\"") && msg.contains("\"hello\""), "{msg}");
    }

    async fn serve() -> u16 {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { ([("x-request-id", "42")], body) }))
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, app).await });
        port
    }

    #[tokio::test]
    async fn checks_status_body_and_headers() {
        let port = serve().await;
        let mut params = Params::default();

        let mut call = HttpCall::post("/echo")
            .target(Target::Port(port))
            .body("hello")
            .expect_body("hello")
            .expect_header("x-request-id", "*")
            .expect_header("x-missing", "-");
        call.run(&mut params).await.unwrap();

        let mut wrong_body = HttpCall::post("/echo")
            .target(Target::Port(port))
            .body("hello")
            .expect_body("bye");
        assert!(matches!(
            wrong_body.run(&mut params).await,
            Err(E2eError::Mismatch { .. })
        ));
    }

    #[tokio::test]
    async fn default_expects_200() {
        let port = serve().await;
        let mut call = HttpCall::get("/teapot").target(Target::Port(port));
        match call.run(&mut Params::default()).await {
            Err(E2eError::Status { expected, actual, .. }) => {
                assert_eq!(expected, 200);
                assert_eq!(actual, 418);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut teapot = HttpCall::get("/teapot")
            .target(Target::Port(port))
            .expect_status(418);
        teapot.run(&mut Params::default()).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_port_is_an_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut call = HttpCall::get("/")
            .target(Target::Port(port))
            .timeout(Duration::from_secs(1));
        assert!(matches!(
            call.run(&mut Params::default()).await,
            Err(E2eError::Http(_))
        ));
    }
}
