//! 订票模块

mod manager;
mod models;

pub use manager::BookingManager;
pub use models::{Booking, BookingStatus, CreateBookingRequest, Passenger, PaymentStatus};
