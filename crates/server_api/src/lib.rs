use shared::{
    domain::{CartLine, ProductSummary, UserId, UserRecord},
    error::{ApiError, ErrorCode},
    protocol::{
        CartItemRequest, CartMutationResponse, LoginRequest, LoginResponse, RegisterRequest,
        RegisterResponse, LOGIN_STATUS_SUCCESS, REGISTER_STATUS_CREATED,
    },
};
use storage::Storage;
use tracing::{info, warn};

pub mod password;
pub mod tokens;

use password::{hash_password, verify_password};
use tokens::{mint_token, verify_token, Claims, TokenConfig};

pub const AUTH_SCHEME: &str = "Token";
const MUTATION_STATUS: &str = "success";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub tokens: TokenConfig,
    /// bcrypt work factor for new password hashes.
    pub password_cost: u32,
}

/// Strips everything except word characters, whitespace, `@`, `.` and `-`.
pub fn sanitize_input(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            c.is_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '@' | '.' | '-')
        })
        .collect()
}

pub async fn register(ctx: &ApiContext, req: RegisterRequest) -> Result<RegisterResponse, ApiError> {
    let username = sanitize_input(&req.username);
    let email = sanitize_input(&req.email);
    if username.trim().is_empty() || email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "username, email and password are required",
        ));
    }

    let password_hash = hash_password(&req.password, ctx.password_cost)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("password hash failed: {e}")))?;
    let user_id = ctx
        .storage
        .create_user(&username, &email, &password_hash)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::AlreadyExists, "User already exists!"))?;
    let user = UserRecord {
        id: user_id,
        username,
        email,
    };
    let token = issue(ctx, &user)?;
    info!(user_id = user.id.0, "user registered");

    Ok(RegisterResponse {
        status: REGISTER_STATUS_CREATED,
        message: "User registered successfully!".into(),
        token,
        user,
    })
}

pub async fn login(ctx: &ApiContext, req: LoginRequest) -> Result<LoginResponse, ApiError> {
    let email = sanitize_input(&req.email);
    let stored = ctx
        .storage
        .find_user_by_email(&email)
        .await
        .map_err(internal)?
        .filter(|stored| verify_password(&req.password, &stored.password_hash))
        .ok_or_else(|| ApiError::text(ErrorCode::Unauthorized, "Invalid credentials!"))?;

    let token = issue(ctx, &stored.record)?;
    Ok(LoginResponse {
        status: LOGIN_STATUS_SUCCESS.into(),
        message: "Login successful!".into(),
        token,
        user: stored.record,
    })
}

/// Resolves an `Authorization: Token <jwt>` header value to its claims.
pub fn authenticate(ctx: &ApiContext, header: Option<&str>) -> Result<Claims, ApiError> {
    let token = header
        .and_then(|value| value.strip_prefix(AUTH_SCHEME))
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Missing token"))?;

    verify_token(&ctx.tokens, token).map_err(|error| {
        warn!(%error, "rejected session token");
        ApiError::new(ErrorCode::Unauthorized, "Invalid or expired token")
    })
}

pub async fn list_products(ctx: &ApiContext) -> Result<Vec<ProductSummary>, ApiError> {
    ctx.storage.list_products().await.map_err(internal)
}

pub async fn list_cart(
    ctx: &ApiContext,
    claims: &Claims,
    user_id: UserId,
) -> Result<Vec<CartLine>, ApiError> {
    ensure_owner(claims, user_id)?;
    ctx.storage.list_cart(user_id).await.map_err(internal)
}

pub async fn add_to_cart(
    ctx: &ApiContext,
    claims: &Claims,
    req: CartItemRequest,
) -> Result<CartMutationResponse, ApiError> {
    ensure_owner(claims, req.user_id)?;
    if !ctx
        .storage
        .product_exists(req.product_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::new(ErrorCode::NotFound, "Product not found"));
    }
    ctx.storage
        .add_cart_item(req.user_id, req.product_id)
        .await
        .map_err(internal)?;
    Ok(CartMutationResponse {
        status: MUTATION_STATUS.into(),
        message: "Item added to cart".into(),
    })
}

pub async fn remove_from_cart(
    ctx: &ApiContext,
    claims: &Claims,
    req: CartItemRequest,
) -> Result<CartMutationResponse, ApiError> {
    ensure_owner(claims, req.user_id)?;
    let removed = ctx
        .storage
        .remove_cart_item(req.user_id, req.product_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(ApiError::new(ErrorCode::NotFound, "Item not in cart"));
    }
    Ok(CartMutationResponse {
        status: MUTATION_STATUS.into(),
        message: "Item removed from cart".into(),
    })
}

fn ensure_owner(claims: &Claims, user_id: UserId) -> Result<(), ApiError> {
    if claims.user_id() != user_id {
        return Err(ApiError::bare(ErrorCode::Forbidden));
    }
    Ok(())
}

fn issue(ctx: &ApiContext, user: &UserRecord) -> Result<String, ApiError> {
    mint_token(&ctx.tokens, user)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
