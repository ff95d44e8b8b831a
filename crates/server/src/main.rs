use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use server_api::{tokens::TokenConfig, ApiContext};
use shared::{
    domain::{CartLine, ProductSummary},
    error::{ApiError, ErrorCode},
    protocol::{
        CartItemRequest, CartMutationResponse, CartQuery, LoginRequest, LoginResponse,
        RegisterRequest, RegisterResponse,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info, warn};

mod app_state;
mod config;
mod rate_limit;

use app_state::AppState;
use config::{load_settings, prepare_database_url};
use rate_limit::RateLimits;

const MAX_BODY_BYTES: usize = 64 * 1024;
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

type Rejection = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        tokens: TokenConfig {
            secret: settings.token_secret.clone(),
            ttl_seconds: settings.token_ttl_seconds,
        },
        password_cost: settings.password_cost,
    };

    let limits = RateLimits::standard();
    let pruned = limits.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            pruned.prune();
        }
    });

    let mut app = build_router(Arc::new(AppState { api, limits }));
    if let Some(origin) = settings.frontend_url.as_deref() {
        match cors_for(origin) {
            Some(cors) => app = app.layer(cors),
            None => warn!(origin, "frontend_url is not a valid origin; CORS disabled"),
        }
    }

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let limits = &state.limits;
    let register_routes = Router::new()
        .route("/api/register", post(register))
        .route_layer(middleware::from_fn_with_state(
            limits.register.clone(),
            rate_limit::enforce,
        ));
    let login_routes = Router::new()
        .route("/api/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            limits.login.clone(),
            rate_limit::enforce,
        ));
    let api_routes = Router::new()
        .route("/api/products", get(products))
        .route(
            "/api/cart",
            get(list_cart).post(add_to_cart).delete(remove_from_cart),
        )
        .route_layer(middleware::from_fn_with_state(
            limits.default.clone(),
            rate_limit::enforce,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(register_routes)
        .merge(login_routes)
        .merge(api_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn cors_for(origin: &str) -> Option<CorsLayer> {
    let origin = HeaderValue::from_str(origin.trim_end_matches('/')).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

fn reject(err: ApiError) -> Rejection {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "request failed");
    }
    (status, Json(err))
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Unavailable, e.to_string())))?;
    Ok("ok")
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), Rejection> {
    let response = server_api::register(&state.api, req).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, Rejection> {
    let response = server_api::login(&state.api, req).await.map_err(reject)?;
    Ok(Json(response))
}

async fn products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductSummary>>, Rejection> {
    let products = server_api::list_products(&state.api).await.map_err(reject)?;
    Ok(Json(products))
}

async fn list_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<CartQuery>,
) -> Result<Json<Vec<CartLine>>, Rejection> {
    let claims = server_api::authenticate(&state.api, authorization(&headers)).map_err(reject)?;
    let lines = server_api::list_cart(&state.api, &claims, q.user_id)
        .await
        .map_err(reject)?;
    Ok(Json(lines))
}

async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartMutationResponse>, Rejection> {
    let claims = server_api::authenticate(&state.api, authorization(&headers)).map_err(reject)?;
    let response = server_api::add_to_cart(&state.api, &claims, req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartMutationResponse>, Rejection> {
    let claims = server_api::authenticate(&state.api, authorization(&headers)).map_err(reject)?;
    let response = server_api::remove_from_cart(&state.api, &claims, req)
        .await
        .map_err(reject)?;
    Ok(Json(response))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
