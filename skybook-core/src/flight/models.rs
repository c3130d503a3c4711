use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A scheduled flight with its seat map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    /// Unique flight number, e.g. "SB-204".
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    /// Display duration, e.g. "2h 30m".
    pub duration: String,
    pub seats: Vec<Seat>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A single sellable seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    /// Seat label, e.g. "12A".
    pub number: String,
    pub class: SeatClass,
    pub price: u64,
    #[serde(default)]
    pub state: SeatState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeatClass {
    Economy,
    Business,
    First,
}

/// Seat availability. All transitions go through `FlightManager::reserve_seats`
/// and `release_seats`; `Held` marks operator-blocked seats that search skips
/// and booking rejects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    Available,
    Held,
    Booked,
}

impl Default for SeatState {
    fn default() -> Self {
        SeatState::Available
    }
}

/// Flight creation payload. Seats default to `available` unless stated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFlightRequest {
    pub flight_number: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: DateTime<Utc>,
    pub arrival_at: DateTime<Utc>,
    pub duration: String,
    pub seats: Vec<Seat>,
}

/// Composable search filters; every field is optional.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightSearchQuery {
    /// Case-insensitive substring match.
    pub origin: Option<String>,
    /// Case-insensitive substring match.
    pub destination: Option<String>,
    /// Calendar day (UTC), format YYYY-MM-DD.
    pub departure_date: Option<String>,
    /// Keep flights with at least one available seat of this class.
    pub class: Option<SeatClass>,
    /// Case-insensitive substring match.
    pub airline: Option<String>,
    /// Lower bound on the cheapest remaining seat.
    pub min_price: Option<u64>,
    /// Upper bound on the cheapest remaining seat.
    pub max_price: Option<u64>,
}
