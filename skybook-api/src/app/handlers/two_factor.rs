//! 双因素认证 API 处理器
//!
//! @author sky

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use skybook_core::AccountProfile;

use super::super::error::ApiError;
use super::super::middleware::AuthInfo;
use super::super::state::AppState;

/// 携带一次性验证码的请求
#[derive(Debug, Deserialize)]
pub struct TwoFactorCodeRequest {
    pub code: String,
}

/// POST /api/auth/setup-2fa - 生成 TOTP secret 和 otpauth 链接
pub async fn setup_2fa(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let setup = state
        .accounts
        .begin_two_factor_setup(auth.account_id())
        .await?;

    Ok((StatusCode::OK, Json(json!(setup))))
}

/// POST /api/auth/verify-2fa-setup - 校验首个 TOTP 码并正式启用
///
/// 备份码仅在这一次响应中以明文出现。
pub async fn confirm_2fa_setup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Json(req): Json<TwoFactorCodeRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let backup_codes = state
        .accounts
        .confirm_two_factor_setup(auth.account_id(), &req.code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "two-factor authentication enabled",
            "backup_codes": backup_codes,
        })),
    ))
}

/// POST /api/auth/disable-2fa - 用 TOTP 码或备份码关闭二因素
pub async fn disable_2fa(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Json(req): Json<TwoFactorCodeRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .accounts
        .disable_two_factor(auth.account_id(), &req.code)
        .await?;

    Ok((StatusCode::OK, Json(json!({"success": true}))))
}

/// PATCH /api/users/toggle-2fa - 开关邮件验证码二因素
///
/// 账户启用着 TOTP 时两个方向都拒绝，避免绕开认证器。
pub async fn toggle_email_2fa(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Json<AccountProfile>, ApiError> {
    let account = state
        .accounts
        .toggle_email_two_factor(auth.account_id())
        .await?;

    Ok(Json(account.into()))
}
