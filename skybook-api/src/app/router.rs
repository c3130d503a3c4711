use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::handlers::{
    cancel_booking, change_password, confirm_2fa_setup, create_booking, create_flight,
    create_flights_bulk, disable_2fa, forgot_password, get_booking, get_flight, get_me,
    get_profile, handler_404, health, login, my_bookings, resend_verification, reset_password,
    search_flights, setup_2fa, signup, toggle_email_2fa, update_profile, verify_email,
    verify_two_factor,
};
use super::middleware::auth_middleware;
use super::state::AppState;

/// 根据配置的来源列表构建 CorsLayer
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ])
        .allow_credentials(true);

    if cors_origins.is_empty() {
        // 未配置时允许所有来源（开发环境友好，但生产环境应配置 SB_CORS_ORIGINS）
        tracing::warn!(
            "SB_CORS_ORIGINS not configured, allowing all origins. \
             Set SB_CORS_ORIGINS in production for security."
        );
        base.allow_origin(AllowOrigin::any())
            .allow_credentials(false) // any() 不能与 credentials(true) 共用
    } else {
        // 指定来源列表
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    // 公开端点（不需要认证）
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/verify-2fa", post(verify_two_factor))
        .route("/api/auth/verify-email/:token", get(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/reset-password/:token", patch(reset_password));

    // 账户端点（需要认证）
    let account_routes = Router::new()
        .route("/api/auth/user", get(get_me))
        .route("/api/auth/setup-2fa", post(setup_2fa))
        .route("/api/auth/verify-2fa-setup", post(confirm_2fa_setup))
        .route("/api/auth/disable-2fa", post(disable_2fa))
        .route(
            "/api/users/profile",
            get(get_profile).patch(update_profile),
        )
        .route("/api/users/password", patch(change_password))
        .route("/api/users/toggle-2fa", patch(toggle_email_2fa));

    // 航班端点（需要认证）
    let flight_routes = Router::new()
        .route("/api/flights", post(create_flight))
        .route("/api/flights/bulk", post(create_flights_bulk))
        .route("/api/flights/search", get(search_flights))
        .route("/api/flights/:id", get(get_flight));

    // 订票端点（需要认证）
    let booking_routes = Router::new()
        .route("/api/bookings", get(my_bookings).post(create_booking))
        .route(
            "/api/bookings/:id",
            get(get_booking).patch(cancel_booking),
        );

    // 组合所有路由；fallback 放在认证层之外，未带 token 的扫描也会被记录
    Router::new()
        .merge(public_routes)
        .merge(account_routes)
        .merge(flight_routes)
        .merge(booking_routes)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .fallback(handler_404)
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
