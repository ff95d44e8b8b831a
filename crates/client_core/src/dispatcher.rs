//! Single entry point for every call the storefront makes.

use std::{collections::BTreeMap, fmt, sync::Arc};

use reqwest::{Client, Request};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::domain::{ProductId, UserId};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::DispatchError,
    middleware::{Middleware, Outcome},
    reporter::FailureReporter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Primitive query parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

macro_rules! param_from {
    ($variant:ident, $($ty:ty),+) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::$variant(value.into())
            }
        })+
    };
}

param_from!(Bool, bool);
param_from!(Int, i64, i32, u32);
param_from!(Float, f64);
param_from!(Str, String, &str);

impl From<UserId> for ParamValue {
    fn from(value: UserId) -> Self {
        ParamValue::Int(value.0)
    }
}

impl From<ProductId> for ParamValue {
    fn from(value: ProductId) -> Self {
        ParamValue::Int(value.0)
    }
}

/// Everything needed to issue one call. Built up front and only borrowed
/// while the call is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    endpoint: String,
    method: HttpMethod,
    payload: Option<Value>,
    params: BTreeMap<String, ParamValue>,
}

impl RequestContext {
    pub fn new(endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            payload: None,
            params: BTreeMap::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Get)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Post)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Put)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, HttpMethod::Delete)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_json<T: Serialize>(self, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_payload(serde_json::to_value(payload)?))
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }
}

pub struct DispatcherBuilder {
    base_url: Url,
    middleware: Vec<Arc<dyn Middleware>>,
    reporter: FailureReporter,
}

impl DispatcherBuilder {
    /// Appends a hook; hooks see requests in the order they were added.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(DispatcherInner {
                http: Client::new(),
                base_url: self.base_url,
                middleware: self.middleware,
                reporter: self.reporter,
            }),
        }
    }
}

struct DispatcherInner {
    http: Client,
    base_url: Url,
    middleware: Vec<Arc<dyn Middleware>>,
    reporter: FailureReporter,
}

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn builder(
        base_url: &str,
        reporter: FailureReporter,
    ) -> Result<DispatcherBuilder, url::ParseError> {
        Ok(DispatcherBuilder {
            base_url: normalize_base_url(base_url)?,
            middleware: Vec::new(),
            reporter,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Issues the call and returns the response body unchanged on 2xx.
    ///
    /// Any other outcome is classified and reported, then the original error
    /// is returned so the caller can still recover on its own terms.
    pub async fn dispatch(&self, context: RequestContext) -> Result<Value, DispatchError> {
        let mut request = match self.build_request(&context) {
            Ok(request) => request,
            Err(err) => {
                self.report_failure(&context, &err).await;
                return Err(err);
            }
        };

        for layer in &self.inner.middleware {
            layer.on_request(&context, &mut request).await;
        }

        let result = self.send(&context, request).await;

        let outcome = match &result {
            Ok((status, _)) => Outcome::Success { status: *status },
            Err(err) => Outcome::Failure(err),
        };
        for layer in self.inner.middleware.iter().rev() {
            layer.on_response(&context, &outcome).await;
        }

        match result {
            Ok((status, body)) => {
                debug!(endpoint = context.endpoint(), method = %context.method(), status, "request succeeded");
                Ok(body)
            }
            Err(err) => {
                self.report_failure(&context, &err).await;
                Err(err)
            }
        }
    }

    /// [`Dispatcher::dispatch`] followed by decoding the body into `T`.
    /// A decode failure is not reported; the call itself succeeded.
    pub async fn dispatch_as<T: DeserializeOwned>(
        &self,
        context: RequestContext,
    ) -> Result<T, DispatchError> {
        let endpoint = context.endpoint().to_string();
        let body = self.dispatch(context).await?;
        serde_json::from_value(body).map_err(|source| DispatchError::Decode { endpoint, source })
    }

    fn build_request(&self, context: &RequestContext) -> Result<Request, DispatchError> {
        let url = self
            .inner
            .base_url
            .join(context.endpoint().trim_start_matches('/'))
            .map_err(|source| DispatchError::InvalidEndpoint {
                endpoint: context.endpoint().to_string(),
                source,
            })?;

        let mut builder = self.inner.http.request(context.method().into(), url);
        if !context.params().is_empty() {
            builder = builder.query(context.params());
        }
        if let Some(payload) = context.payload() {
            builder = builder.json(payload);
        }
        builder.build().map_err(|source| DispatchError::Transport {
            endpoint: context.endpoint().to_string(),
            method: context.method(),
            source,
        })
    }

    async fn send(
        &self,
        context: &RequestContext,
        request: Request,
    ) -> Result<(u16, Value), DispatchError> {
        let response = self
            .inner
            .http
            .execute(request)
            .await
            .map_err(|source| DispatchError::Transport {
                endpoint: context.endpoint().to_string(),
                method: context.method(),
                source,
            })?;
        let status = response.status();

        let body = match response.text().await {
            Ok(text) => parse_body(text),
            Err(source) if status.is_success() => {
                return Err(DispatchError::Transport {
                    endpoint: context.endpoint().to_string(),
                    method: context.method(),
                    source,
                });
            }
            Err(error) => {
                warn!(endpoint = context.endpoint(), %error, "failed to read error response body");
                Value::Null
            }
        };

        if status.is_success() {
            Ok((status.as_u16(), body))
        } else {
            Err(DispatchError::Status {
                endpoint: context.endpoint().to_string(),
                method: context.method(),
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn report_failure(&self, context: &RequestContext, err: &DispatchError) {
        warn!(
            endpoint = context.endpoint(),
            method = %context.method(),
            status = err.status(),
            error = %err,
            "request failed"
        );
        if let Some(envelope) = err.envelope() {
            self.inner.reporter.report(&envelope).await;
        }
    }
}

/// Makes relative endpoints resolve beneath the base path.
fn normalize_base_url(raw: &str) -> Result<Url, url::ParseError> {
    let raw = raw.trim();
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

/// JSON bodies are parsed; anything else comes back as a JSON string and an
/// empty body as `null`.
fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
