use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use skybook_core::SessionClaims;

use super::error::ApiError;
use super::state::AppState;

/// 认证信息扩展
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub claims: SessionClaims,
}

impl AuthInfo {
    /// 当前会话所属账户 ID
    pub fn account_id(&self) -> &str {
        &self.claims.sub
    }
}

/// 不需要认证的路径
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/api/auth/signup",
    "/api/auth/login",
    "/api/auth/verify-2fa",
    "/api/auth/resend-verification",
    "/api/auth/forgot-password",
];

/// 不需要认证的路径前缀（末段携带一次性令牌）
const PUBLIC_PREFIXES: &[&str] = &["/api/auth/verify-email/", "/api/auth/reset-password/"];

/// 从 Authorization header 中提取 Bearer token
fn extract_token(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token.to_string())
}

/// 从请求中提取客户端 IP
/// 优先级：X-Real-IP > X-Forwarded-For（第一个） > Socket Address
fn extract_client_ip(request: &Request<Body>) -> String {
    // 1. 优先从 X-Real-IP header 获取（Nginx 常用）
    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
    {
        return real_ip.to_string();
    }

    // 2. 从 X-Forwarded-For 获取第一个 IP（最左边是真实客户端）
    if let Some(forwarded) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first_ip) = forwarded.split(',').next().map(|s| s.trim()) {
            if !first_ip.is_empty() {
                return first_ip.to_string();
            }
        }
    }

    // 3. fallback 到直连 socket 地址
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    // 公开端点不需要认证
    if PUBLIC_PATHS.iter().any(|p| path == *p)
        || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
    {
        return Ok(next.run(request).await);
    }

    let client_ip = extract_client_ip(&request);
    let token = match extract_token(&request) {
        Some(t) => t,
        None => {
            // 无 token，检查并记录认证失败（使用 allow 原子化操作）
            if !state.auth_limiter.allow(&client_ip).await {
                tracing::warn!("认证限流触发: IP={}, 路径={} (无token)", client_ip, path);
                return Err(ApiError::too_many_requests("请求过于频繁，请稍后再试"));
            }
            return Err(ApiError::unauthorized());
        }
    };

    // 验证会话 token（签名 + iss/aud + token_version）
    let claims = match state.accounts.verify_session(&token).await {
        Ok(c) => c,
        Err(_) => {
            // Token 验证失败，检查并记录认证失败（使用 allow 原子化操作）
            if !state.auth_limiter.allow(&client_ip).await {
                tracing::warn!("认证限流触发: IP={}, 路径={} (token无效)", client_ip, path);
                return Err(ApiError::too_many_requests("请求过于频繁，请稍后再试"));
            }
            return Err(ApiError::unauthorized());
        }
    };

    // JWT 验证成功，已认证用户不受限流限制，直接放行
    let auth_info = AuthInfo { claims };
    request.extensions_mut().insert(auth_info);
    Ok(next.run(request).await)
}
