//! 账户资料 API handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use skybook_core::{AccountProfile, UpdateProfileRequest};

use super::super::error::ApiError;
use super::super::middleware::AuthInfo;
use super::super::state::AppState;

/// GET /api/users/profile - 当前账户资料
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Json<AccountProfile>, ApiError> {
    let account = state.accounts.get_account(auth.account_id()).await?;
    Ok(Json(account.into()))
}

/// PATCH /api/users/profile - 更新姓名 / 电话
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountProfile>, ApiError> {
    let account = state
        .accounts
        .update_profile(auth.account_id(), req)
        .await?;
    Ok(Json(account.into()))
}

/// 修改密码请求
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// PATCH /api/users/password - 修改密码（需提供当前密码）
///
/// 成功后旧会话全部失效，响应携带新签发的会话 token。
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    // 限流检查（按账户 ID，防止暴力破解当前密码）
    if !state.password_limiter.allow(auth.account_id()).await {
        return Err(ApiError::too_many_requests(
            "too many password change attempts, try again later",
        ));
    }

    let changed = state
        .accounts
        .change_password(auth.account_id(), &req.current_password, &req.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "token": changed.token,
            "user": changed.account,
        })),
    ))
}
