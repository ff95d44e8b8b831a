//! Storefront calls built on the dispatcher: sign-in, registration, catalog
//! and cart.
//!
//! These callers own the session writes (the dispatcher never sets a session)
//! and any recovery after a failed call.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{CartLine, ProductId, ProductSummary, UserRecord},
    protocol::{
        CartItemRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
        LOGIN_STATUS_SUCCESS, REGISTER_STATUS_CREATED,
    },
};
use thiserror::Error;
use tracing::info;

use crate::{
    dispatcher::{Dispatcher, RequestContext},
    error::DispatchError,
    events::{NotificationEvent, NotificationSink},
    session::SessionStore,
};

pub const LOGIN_FAILED_MESSAGE: &str = "Failed to login";
pub const REGISTER_FAILED_MESSAGE: &str = "Failed to register";

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("failed to encode request payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session storage failed: {source}")]
    Session { source: anyhow::Error },
    #[error("not signed in")]
    NotSignedIn,
    #[error("{0}")]
    Rejected(String),
}

impl StorefrontError {
    fn session(source: anyhow::Error) -> Self {
        StorefrontError::Session { source }
    }
}

#[derive(Clone)]
pub struct StorefrontClient {
    dispatcher: Dispatcher,
    session: SessionStore,
    notifier: Arc<dyn NotificationSink>,
}

impl StorefrontClient {
    pub fn new(
        dispatcher: Dispatcher,
        session: SessionStore,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            dispatcher,
            session,
            notifier,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Signs in and stores token and user together on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserRecord, StorefrontError> {
        let context = RequestContext::post("login").with_json(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let body = self.dispatcher.dispatch(context).await?;

        if body.get("status").and_then(Value::as_str) != Some(LOGIN_STATUS_SUCCESS) {
            self.notifier
                .notify(NotificationEvent::error(LOGIN_FAILED_MESSAGE));
            return Err(StorefrontError::Rejected(LOGIN_FAILED_MESSAGE.to_string()));
        }

        let response: LoginResponse =
            serde_json::from_value(body).map_err(|source| DispatchError::Decode {
                endpoint: "login".to_string(),
                source,
            })?;
        self.session
            .set(&response.token, &response.user)
            .await
            .map_err(StorefrontError::session)?;
        self.notifier
            .notify(NotificationEvent::success(response.message));
        info!(user_id = response.user.id.0, "signed in");
        Ok(response.user)
    }

    /// Creates an account. The server answers with body status 201; the
    /// session is left untouched so the user signs in explicitly afterwards.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, StorefrontError> {
        let context = RequestContext::post("register").with_json(&RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let body = self.dispatcher.dispatch(context).await?;

        if body.get("status").and_then(Value::as_u64) != Some(u64::from(REGISTER_STATUS_CREATED)) {
            self.notifier
                .notify(NotificationEvent::error(REGISTER_FAILED_MESSAGE));
            return Err(StorefrontError::Rejected(
                REGISTER_FAILED_MESSAGE.to_string(),
            ));
        }

        let response: RegisterResponse =
            serde_json::from_value(body).map_err(|source| DispatchError::Decode {
                endpoint: "register".to_string(),
                source,
            })?;
        info!(user_id = response.user.id.0, "registered");
        Ok(response)
    }

    pub async fn logout(&self) -> Result<(), StorefrontError> {
        self.session.clear().await.map_err(StorefrontError::session)?;
        info!("signed out");
        Ok(())
    }

    pub async fn current_user(&self) -> Result<UserRecord, StorefrontError> {
        self.session
            .user()
            .await
            .map_err(StorefrontError::session)?
            .ok_or(StorefrontError::NotSignedIn)
    }

    pub async fn products(&self) -> Result<Vec<ProductSummary>, StorefrontError> {
        Ok(self
            .dispatcher
            .dispatch_as(RequestContext::get("products"))
            .await?)
    }

    pub async fn cart(&self) -> Result<Vec<CartLine>, StorefrontError> {
        let user = self.current_user().await?;
        let context = RequestContext::get("cart").with_param("user_id", user.id);
        Ok(self.dispatcher.dispatch_as(context).await?)
    }

    pub async fn add_to_cart(&self, product_id: ProductId) -> Result<Value, StorefrontError> {
        let user = self.current_user().await?;
        let context = RequestContext::post("cart").with_json(&CartItemRequest {
            user_id: user.id,
            product_id,
        })?;
        Ok(self.dispatcher.dispatch(context).await?)
    }

    pub async fn remove_from_cart(&self, product_id: ProductId) -> Result<Value, StorefrontError> {
        let user = self.current_user().await?;
        let context = RequestContext::delete("cart").with_json(&CartItemRequest {
            user_id: user.id,
            product_id,
        })?;
        Ok(self.dispatcher.dispatch(context).await?)
    }
}

/// Cart lines as currently displayed.
#[derive(Debug, Clone, Default)]
pub struct CartView {
    items: Vec<CartLine>,
}

impl CartView {
    pub async fn load(client: &StorefrontClient) -> Result<Self, StorefrontError> {
        Ok(Self {
            items: client.cart().await?,
        })
    }

    pub fn items(&self) -> &[CartLine] {
        &self.items
    }

    /// Drops the line only once the server confirmed the removal.
    pub async fn remove(
        &mut self,
        client: &StorefrontClient,
        product_id: ProductId,
    ) -> Result<(), StorefrontError> {
        client.remove_from_cart(product_id).await?;
        self.items.retain(|line| line.product_id != product_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/storefront_tests.rs"]
mod tests;
