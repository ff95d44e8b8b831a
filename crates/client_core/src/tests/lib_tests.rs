use anyhow::Result;
use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use shared::domain::{UserId, UserRecord};
use tokio::sync::broadcast::error::TryRecvError;

use super::*;
use crate::{
    classifier::SESSION_EXPIRED_MESSAGE, invalidator::LANDING_ROUTE, test_support::spawn_api,
};

async fn expired() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "status": 401 } })),
    )
}

fn shopper() -> UserRecord {
    UserRecord {
        id: UserId(1),
        username: "grace".into(),
        email: "grace@example.com".into(),
    }
}

#[tokio::test]
async fn expired_session_emits_events_in_order() -> Result<()> {
    let base = spawn_api(Router::new().route("/api/products", get(expired))).await?;
    let core = ClientCore::assemble(&base, Arc::new(MemoryStore::new()))?;
    core.session.set("jwt-1", &shopper()).await?;
    let mut events = core.subscribe_events();

    core.dispatcher
        .dispatch(RequestContext::get("products"))
        .await
        .expect_err("expired");

    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Empty) => break,
            Err(other) => panic!("event stream broke: {other:?}"),
        }
    }
    assert_eq!(
        seen,
        vec![
            ClientEvent::Progress { active: true },
            ClientEvent::Progress { active: false },
            ClientEvent::Notification(NotificationEvent::success(SESSION_EXPIRED_MESSAGE)),
            ClientEvent::Navigation {
                route: LANDING_ROUTE.to_string()
            },
        ]
    );
    assert!(!core.session.get().await?.is_authenticated());
    Ok(())
}

#[tokio::test]
async fn connect_opens_client_state() -> Result<()> {
    let settings = ClientSettings {
        api_url: "http://127.0.0.1:9/api".into(),
        state_database_url: "sqlite::memory:".into(),
    };
    let core = ClientCore::connect(&settings).await?;
    assert_eq!(core.dispatcher.base_url().as_str(), "http://127.0.0.1:9/api/");
    assert_eq!(core.session.get().await?, Session::default());
    Ok(())
}

#[test]
fn assemble_rejects_unparsable_api_url() {
    assert!(ClientCore::assemble("not a url", Arc::new(MemoryStore::new())).is_err());
}
