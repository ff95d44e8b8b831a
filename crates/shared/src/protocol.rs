use serde::{Deserialize, Serialize};

use crate::domain::{ProductId, UserId, UserRecord};

pub const LOGIN_STATUS_SUCCESS: &str = "success";
pub const REGISTER_STATUS_CREATED: u16 = 201;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub status: String,
    pub message: String,
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: u16,
    pub message: String,
    pub token: String,
    pub user: UserRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartQuery {
    pub user_id: UserId,
}

/// Body of `POST cart` and `DELETE cart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRequest {
    pub user_id: UserId,
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartMutationResponse {
    pub status: String,
    pub message: String,
}
