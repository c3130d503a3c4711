//! 航班 API handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use skybook_core::{CreateFlightRequest, Flight, FlightSearchQuery};

use super::super::error::ApiError;
use super::super::state::AppState;

/// POST /api/flights - 创建单个航班
pub async fn create_flight(
    State(state): State<AppState>,
    Json(req): Json<CreateFlightRequest>,
) -> Result<(StatusCode, Json<Flight>), ApiError> {
    let flight = state.flights.create_flight(req).await?;
    Ok((StatusCode::CREATED, Json(flight)))
}

/// POST /api/flights/bulk - 批量创建航班（全部入库或全部拒绝）
pub async fn create_flights_bulk(
    State(state): State<AppState>,
    Json(reqs): Json<Vec<CreateFlightRequest>>,
) -> Result<(StatusCode, Json<Vec<Flight>>), ApiError> {
    if reqs.is_empty() {
        return Err(ApiError::bad_request("flight list must not be empty"));
    }
    let flights = state.flights.create_flights(reqs).await?;
    Ok((StatusCode::CREATED, Json(flights)))
}

/// GET /api/flights/search - 组合条件查询航班
pub async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<FlightSearchQuery>,
) -> Result<Json<Vec<Flight>>, ApiError> {
    let flights = state.flights.search(&query).await?;
    Ok(Json(flights))
}

/// GET /api/flights/:id - 获取航班详情
pub async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Flight>, ApiError> {
    let flight = state.flights.get_flight(&id).await?;
    Ok(Json(flight))
}
