//! 订票 API handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use skybook_core::{Booking, CreateBookingRequest};

use super::super::email::Recipient;
use super::super::error::ApiError;
use super::super::middleware::AuthInfo;
use super::super::state::AppState;

/// POST /api/bookings - 预订座位并发送确认邮件
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let booking = state
        .bookings
        .create_booking(auth.account_id(), req)
        .await?;

    let account = state.accounts.get_account(auth.account_id()).await?;
    let flight = state.flights.get_flight(&booking.flight_id).await?;
    let recipient = Recipient {
        name: account.name,
        email: account.email,
    };
    state
        .mailer
        .send_booking_confirmation(&recipient, &booking, &flight)
        .await
        .map_err(|e| ApiError::mail_failed(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/bookings - 当前账户的订单（按创建时间倒序）
pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let bookings = state.bookings.bookings_for_user(auth.account_id()).await?;
    Ok(Json(bookings))
}

/// GET /api/bookings/:id - 获取订单详情（仅限本人）
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.bookings.get_booking(auth.account_id(), &id).await?;
    Ok(Json(booking))
}

/// PATCH /api/bookings/:id - 取消订单，释放座位并发送通知
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthInfo>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.bookings.cancel_booking(auth.account_id(), &id).await?;

    let account = state.accounts.get_account(auth.account_id()).await?;
    let flight = state.flights.get_flight(&booking.flight_id).await?;
    let recipient = Recipient {
        name: account.name,
        email: account.email,
    };
    state
        .mailer
        .send_booking_cancellation(&recipient, &booking, &flight)
        .await
        .map_err(|e| ApiError::mail_failed(e.to_string()))?;

    Ok(Json(booking))
}
