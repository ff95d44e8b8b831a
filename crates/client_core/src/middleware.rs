//! Ordered request/response hooks applied by the dispatcher.
//!
//! `on_request` hooks run in registration order right before the request is
//! sent; `on_response` hooks run in reverse order once the call has settled,
//! before the result goes back to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Request,
};
use tracing::warn;

use crate::{
    dispatcher::RequestContext, error::DispatchError, progress::ProgressSignal,
    session::SessionStore,
};

pub const AUTH_SCHEME: &str = "Token";

pub enum Outcome<'a> {
    Success { status: u16 },
    Failure(&'a DispatchError),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn on_request(&self, _context: &RequestContext, _request: &mut Request) {}

    async fn on_response(&self, _context: &RequestContext, _outcome: &Outcome<'_>) {}
}

pub fn authorization_value(token: &str) -> String {
    format!("{AUTH_SCHEME} {token}")
}

/// Attaches `Authorization: Token <token>` when the session holds a token.
pub struct AuthTokenInjector {
    session: SessionStore,
}

impl AuthTokenInjector {
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Middleware for AuthTokenInjector {
    async fn on_request(&self, context: &RequestContext, request: &mut Request) {
        let token = match self.session.token().await {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(error) => {
                warn!(endpoint = context.endpoint(), %error, "sending request without credential");
                return;
            }
        };

        match HeaderValue::from_str(&authorization_value(&token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(error) => {
                warn!(endpoint = context.endpoint(), %error, "stored token is not a valid header value");
            }
        }
    }
}

pub struct ProgressMiddleware {
    signal: Arc<dyn ProgressSignal>,
}

impl ProgressMiddleware {
    pub fn new(signal: Arc<dyn ProgressSignal>) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl Middleware for ProgressMiddleware {
    async fn on_request(&self, _context: &RequestContext, _request: &mut Request) {
        self.signal.start();
    }

    async fn on_response(&self, _context: &RequestContext, _outcome: &Outcome<'_>) {
        self.signal.stop();
    }
}
