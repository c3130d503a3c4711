//! 航班库存模块

mod manager;
mod models;
mod search;

pub use manager::FlightManager;
pub use models::{CreateFlightRequest, Flight, FlightSearchQuery, Seat, SeatClass, SeatState};
