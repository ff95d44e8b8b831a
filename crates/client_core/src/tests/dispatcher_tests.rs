use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::{UserId, UserRecord};
use tokio::sync::Notify;

use super::*;
use crate::{
    classifier::{NO_INTERNET_MESSAGE, SESSION_EXPIRED_MESSAGE},
    events::{NotificationEvent, Severity},
    invalidator::LANDING_ROUTE,
    progress::ProgressSignal,
    session::Session,
    test_support::{harness, spawn_api, unreachable_api},
};

#[derive(Clone, Default)]
struct Gate {
    arrived: Arc<Notify>,
    release: Arc<Notify>,
}

async fn login() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Welcome back",
        "token": "jwt-1",
        "user": { "id": 7, "username": "ada", "email": "ada@example.com" }
    }))
}

async fn expired() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "status": 401, "message": "jwt expired" } })),
    )
}

async fn already_exists() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_ACCEPTABLE,
        Json(json!({ "error": { "status": 406, "message": "User already exist" } })),
    )
}

async fn missing() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": { "status": 404 } })),
    )
}

async fn echo_auth(headers: HeaderMap) -> Json<Value> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Json(json!({ "authorization": authorization }))
}

async fn echo_query(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!(params))
}

async fn echo_body(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "received": body }))
}

async fn slow(State(gate): State<Gate>) -> Json<Value> {
    gate.arrived.notify_one();
    gate.release.notified().await;
    Json(json!({ "slow": true }))
}

async fn fast() -> Json<Value> {
    Json(json!({ "fast": true }))
}

async fn spawn_shop(gate: Gate) -> Result<String> {
    let app = Router::new()
        .route("/api/login", post(login))
        .route("/api/cart", get(echo_query).delete(expired))
        .route("/api/register", post(already_exists))
        .route("/api/missing", get(missing))
        .route("/api/me", get(echo_auth))
        .route("/api/echo", post(echo_body))
        .route("/api/ping", get(|| async { "pong" }))
        .route("/api/slow", get(slow))
        .route("/api/fast", get(fast))
        .with_state(gate);
    spawn_api(app).await
}

fn shopper() -> UserRecord {
    UserRecord {
        id: UserId(7),
        username: "ada".into(),
        email: "ada@example.com".into(),
    }
}

#[tokio::test]
async fn success_returns_body_unchanged_without_side_effects() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let body = h
        .dispatcher
        .dispatch(RequestContext::post("login").with_payload(json!({
            "email": "ada@example.com",
            "password": "hunter2"
        })))
        .await?;

    assert_eq!(body, login().await.0);
    assert!(h.recorder.notifications().is_empty());
    assert!(h.recorder.navigations().is_empty());
    assert!(!h.progress.is_active());
    assert_eq!(h.session.get().await?, Session::default());
    Ok(())
}

#[tokio::test]
async fn unauthorized_clears_session_and_returns_original_error() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;
    h.session.set("jwt-1", &shopper()).await?;

    let err = h
        .dispatcher
        .dispatch(RequestContext::delete("cart").with_payload(json!({
            "user_id": 7,
            "product_id": 3
        })))
        .await
        .expect_err("expired session");

    match &err {
        DispatchError::Status {
            endpoint,
            method,
            status,
            body,
        } => {
            assert_eq!(endpoint, "cart");
            assert_eq!(*method, HttpMethod::Delete);
            assert_eq!(*status, 401);
            assert_eq!(body["error"]["message"], "jwt expired");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(h.session.get().await?, Session::default());
    assert_eq!(h.recorder.navigations(), vec![LANDING_ROUTE.to_string()]);
    assert_eq!(
        h.recorder.notifications(),
        vec![NotificationEvent {
            message: SESSION_EXPIRED_MESSAGE.into(),
            severity: Severity::Success,
        }]
    );
    assert!(!h.progress.is_active());
    Ok(())
}

#[tokio::test]
async fn refused_connection_reports_no_internet_once() -> Result<()> {
    let h = harness(&unreachable_api().await?)?;
    h.session.set("jwt-1", &shopper()).await?;

    let err = h
        .dispatcher
        .dispatch(RequestContext::get("products"))
        .await
        .expect_err("nothing listens");

    assert!(matches!(err, DispatchError::Transport { .. }), "{err:?}");
    assert_eq!(err.status(), None);
    assert_eq!(
        h.recorder.notifications(),
        vec![NotificationEvent::error(NO_INTERNET_MESSAGE)]
    );
    assert!(h.recorder.navigations().is_empty());
    assert!(h.session.get().await?.is_authenticated());
    assert!(!h.progress.is_active());
    Ok(())
}

#[tokio::test]
async fn coded_failures_notify_with_server_or_default_message() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let err = h
        .dispatcher
        .dispatch(RequestContext::post("register").with_payload(json!({})))
        .await
        .expect_err("duplicate user");
    assert_eq!(err.status(), Some(406));

    let err = h
        .dispatcher
        .dispatch(RequestContext::get("missing"))
        .await
        .expect_err("missing route");
    assert_eq!(err.status(), Some(404));

    assert_eq!(
        h.recorder.notifications(),
        vec![
            NotificationEvent::error("User already exist"),
            NotificationEvent::error("API Not Found"),
        ]
    );
    assert!(h.recorder.navigations().is_empty());
    Ok(())
}

#[tokio::test]
async fn unparsable_endpoint_is_reported_without_running_hooks() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let err = h
        .dispatcher
        .dispatch(RequestContext::get("http://[::1"))
        .await
        .expect_err("bad endpoint");

    assert!(matches!(err, DispatchError::InvalidEndpoint { .. }), "{err:?}");
    assert_eq!(
        h.recorder.notifications(),
        vec![NotificationEvent::error(NO_INTERNET_MESSAGE)]
    );
    assert!(!h.progress.is_active());
    Ok(())
}

#[tokio::test]
async fn authorization_reflects_session_at_send_time() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let anonymous = h.dispatcher.dispatch(RequestContext::get("me")).await?;
    assert_eq!(anonymous["authorization"], Value::Null);

    h.session.set("jwt-9", &shopper()).await?;
    let signed_in = h.dispatcher.dispatch(RequestContext::get("/me")).await?;
    assert_eq!(signed_in["authorization"], "Token jwt-9");

    h.session.clear().await?;
    let signed_out = h.dispatcher.dispatch(RequestContext::get("me")).await?;
    assert_eq!(signed_out["authorization"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn params_and_payload_reach_the_server() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let query = h
        .dispatcher
        .dispatch(
            RequestContext::get("cart")
                .with_param("user_id", UserId(7))
                .with_param("fresh", true),
        )
        .await?;
    assert_eq!(query, json!({ "user_id": "7", "fresh": "true" }));

    let echoed = h
        .dispatcher
        .dispatch(RequestContext::post("echo").with_payload(json!({ "product_id": 3 })))
        .await?;
    assert_eq!(echoed, json!({ "received": { "product_id": 3 } }));
    Ok(())
}

#[tokio::test]
async fn non_json_body_comes_back_as_string() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;
    let body = h.dispatcher.dispatch(RequestContext::get("ping")).await?;
    assert_eq!(body, Value::String("pong".into()));
    Ok(())
}

#[tokio::test]
async fn decode_failure_is_not_reported() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let err = h
        .dispatcher
        .dispatch_as::<Vec<u64>>(RequestContext::get("fast"))
        .await
        .expect_err("object is not a list");

    assert!(matches!(err, DispatchError::Decode { .. }), "{err:?}");
    assert!(h.recorder.notifications().is_empty());
    Ok(())
}

#[tokio::test]
async fn concurrent_calls_keep_their_own_context() -> Result<()> {
    let h = harness(&spawn_shop(Gate::default()).await?)?;

    let calls = (1..=8i64).map(|user| {
        let dispatcher = h.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch(RequestContext::get("cart").with_param("user_id", user))
                .await
        })
    });
    let mut results = Vec::new();
    for call in calls.collect::<Vec<_>>() {
        results.push(call.await??);
    }

    for (user, body) in (1..=8i64).zip(results) {
        assert_eq!(body, json!({ "user_id": user.to_string() }));
    }
    assert!(h.recorder.notifications().is_empty());
    Ok(())
}

#[tokio::test]
async fn overlapping_calls_clear_progress_on_first_completion() -> Result<()> {
    let gate = Gate::default();
    let h = harness(&spawn_shop(gate.clone()).await?)?;

    let slow_call = {
        let dispatcher = h.dispatcher.clone();
        tokio::spawn(async move { dispatcher.dispatch(RequestContext::get("slow")).await })
    };
    gate.arrived.notified().await;
    assert!(h.progress.is_active());

    h.dispatcher.dispatch(RequestContext::get("fast")).await?;
    assert!(
        !h.progress.is_active(),
        "indicator is not reference counted"
    );

    gate.release.notify_one();
    assert_eq!(slow_call.await??, json!({ "slow": true }));
    assert!(!h.progress.is_active());
    Ok(())
}

#[test]
fn base_url_gains_trailing_slash() -> Result<()> {
    assert_eq!(
        normalize_base_url("http://shop.example.com/api")?.as_str(),
        "http://shop.example.com/api/"
    );
    assert_eq!(
        normalize_base_url("http://shop.example.com/api/")?.as_str(),
        "http://shop.example.com/api/"
    );
    Ok(())
}
