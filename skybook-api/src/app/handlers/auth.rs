//! 认证相关 API handlers

use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use skybook_core::{
    AccountProfile, CreateAccountRequest, LoginOutcome, LoginRequest, VerifyTwoFactorRequest,
};
use std::net::SocketAddr;

use super::super::email::Recipient;
use super::super::error::ApiError;
use super::super::middleware::AuthInfo;
use super::super::state::AppState;

/// 拼接指向前端页面的一次性令牌链接
pub(super) fn frontend_link(state: &AppState, page: &str, token: &str) -> String {
    format!(
        "{}/{}/{}",
        state.frontend_url.trim_end_matches('/'),
        page,
        token
    )
}

/// POST /api/auth/signup - 注册账户并发送验证邮件
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let account = state.accounts.create_account(req).await?;
    let raw_token = state.accounts.start_email_verification(&account.id).await?;

    let recipient = Recipient {
        name: account.name.clone(),
        email: account.email.clone(),
    };
    let url = frontend_link(&state, "verify-email", &raw_token);
    state
        .mailer
        .send_verification(&recipient, &url)
        .await
        .map_err(|e| ApiError::mail_failed(e.to_string()))?;

    let profile: AccountProfile = account.into();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "verification email sent, please check your inbox",
            "user": profile,
        })),
    ))
}

/// POST /api/auth/login - 第一步登录
///
/// 启用二因素的账户返回待验证通道；邮件验证码在响应之前投递完成。
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.login_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many login attempts, try again later",
        ));
    }

    let outcome = state.accounts.login(&req.email, &req.password).await?;
    match outcome {
        LoginOutcome::Authenticated { token, account } => Ok((
            StatusCode::OK,
            Json(json!({ "token": token, "user": account })),
        )),
        LoginOutcome::TwoFactorRequired {
            channel,
            email_code,
        } => {
            if let Some(code) = email_code {
                let account = state
                    .accounts
                    .find_by_email(&req.email)
                    .await?
                    .ok_or_else(ApiError::unauthorized)?;
                let recipient = Recipient {
                    name: account.name,
                    email: account.email,
                };
                state
                    .mailer
                    .send_two_factor_code(&recipient, &code)
                    .await
                    .map_err(|e| ApiError::mail_failed(e.to_string()))?;
            }
            Ok((
                StatusCode::OK,
                Json(json!({
                    "two_factor_required": true,
                    "channel": channel,
                })),
            ))
        }
    }
}

/// POST /api/auth/verify-2fa - 第二步登录：校验第二因素并签发会话
pub async fn verify_two_factor(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<VerifyTwoFactorRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.two_factor_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many verification attempts, try again later",
        ));
    }

    let outcome = state
        .accounts
        .complete_two_factor(&req.email, &req.code)
        .await?;
    match outcome {
        LoginOutcome::Authenticated { token, account } => Ok((
            StatusCode::OK,
            Json(json!({ "token": token, "user": account })),
        )),
        // complete_two_factor 只会返回 Authenticated 或错误
        LoginOutcome::TwoFactorRequired { .. } => Err(ApiError::unauthorized()),
    }
}

/// GET /api/auth/verify-email/:token - 消费邮箱验证令牌
pub async fn verify_email(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.verification_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many verification attempts, try again later",
        ));
    }

    let profile = state.accounts.verify_email(&token).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "email verified successfully",
            "user": profile,
        })),
    ))
}

/// 重发验证邮件请求
#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// POST /api/auth/resend-verification - 重发验证邮件
///
/// 核心层还有一道 5 分钟重发间隔闸，超限返回 429。
pub async fn resend_verification(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.verification_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many verification attempts, try again later",
        ));
    }

    let (profile, raw_token) = state.accounts.resend_email_verification(&req.email).await?;
    let recipient = Recipient {
        name: profile.name,
        email: profile.email,
    };
    let url = frontend_link(&state, "verify-email", &raw_token);
    state
        .mailer
        .send_verification(&recipient, &url)
        .await
        .map_err(|e| ApiError::mail_failed(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "verification email sent" })),
    ))
}

/// 找回密码请求
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// POST /api/auth/forgot-password - 签发密码重置令牌并发送邮件
pub async fn forgot_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.reset_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many password reset requests, try again later",
        ));
    }

    let (profile, raw_token) = state.accounts.start_password_reset(&req.email).await?;
    let recipient = Recipient {
        name: profile.name,
        email: profile.email,
    };
    let url = frontend_link(&state, "reset-password", &raw_token);
    state
        .mailer
        .send_password_reset(&recipient, &url)
        .await
        .map_err(|e| ApiError::mail_failed(e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "password reset email sent" })),
    ))
}

/// 重置密码请求
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// PATCH /api/auth/reset-password/:token - 消费重置令牌并改密
///
/// 成功后旧会话全部失效，响应携带一枚新签发的会话 token。
pub async fn reset_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ip = addr.ip().to_string();
    if !state.reset_limiter.allow(&ip).await {
        return Err(ApiError::too_many_requests(
            "too many password reset requests, try again later",
        ));
    }

    let changed = state.accounts.reset_password(&token, &req.password).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "password reset successful",
            "token": changed.token,
            "user": changed.account,
        })),
    ))
}

/// GET /api/auth/user - 当前登录账户的概要
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Json<AccountProfile>, ApiError> {
    let account = state.accounts.get_account(auth.account_id()).await?;
    Ok(Json(account.into()))
}
