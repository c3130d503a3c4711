use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flight::SeatClass;

/// A confirmed (or cancelled) reservation of one or more seats on a flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub flight_id: String,
    pub passengers: Vec<Passenger>,
    /// Sum of the reserved seat prices at booking time.
    pub total_amount: u64,
    pub payment_status: PaymentStatus,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub age: u32,
    pub seat_number: String,
    pub seat_class: SeatClass,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Booking creation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub flight_id: String,
    pub passengers: Vec<Passenger>,
}
