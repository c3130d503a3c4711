use skybook_core::{AccountManager, BookingManager, FlightManager};
use std::sync::Arc;

use super::email::Mailer;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountManager>,
    pub flights: Arc<FlightManager>,
    pub bookings: Arc<BookingManager>,
    /// 邮件投递器（验证链接、重置链接、验证码、订单通知）
    pub mailer: Arc<dyn Mailer>,
    /// 前端地址，用于拼接验证 / 重置链接
    pub frontend_url: String,
    /// 登录接口限流（按 IP）
    pub login_limiter: Arc<crate::app::RateLimiter>,
    /// 邮箱验证限流（verify + resend，按 IP）
    pub verification_limiter: Arc<crate::app::RateLimiter>,
    /// 密码重置限流（forgot + reset，按 IP）
    pub reset_limiter: Arc<crate::app::RateLimiter>,
    /// 二因素验证码限流（按 IP，防止暴力猜 OTP）
    pub two_factor_limiter: Arc<crate::app::RateLimiter>,
    /// 密码修改限流（按账户 ID，防止暴力破解当前密码）
    pub password_limiter: Arc<crate::app::RateLimiter>,
    /// Token 认证失败限流（按 IP）
    pub auth_limiter: Arc<crate::app::RateLimiter>,
}
