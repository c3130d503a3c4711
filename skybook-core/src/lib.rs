//! Core library for the flight-booking backend: account security (passwords,
//! single-use tokens, two-factor auth, sessions), flight inventory, and bookings.

pub mod account;
pub mod booking;
mod error;
pub mod flight;

pub use account::{
    AccountManager, AccountProfile, CreateAccountRequest, LoginOutcome, LoginRequest,
    PasswordChanged, SecondFactor, SessionClaims, TwoFactorSetup, UpdateProfileRequest,
    UserAccount, VerifyTwoFactorRequest,
};
pub use booking::{Booking, BookingManager, CreateBookingRequest};
pub use error::{Result, ServiceError};
pub use flight::{CreateFlightRequest, Flight, FlightManager, FlightSearchQuery};
