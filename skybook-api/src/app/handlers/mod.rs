mod auth;
mod bookings;
mod flights;
mod health;
mod two_factor;
mod users;

pub use auth::{
    forgot_password, get_me, login, resend_verification, reset_password, signup, verify_email,
    verify_two_factor,
};
pub use bookings::{cancel_booking, create_booking, get_booking, my_bookings};
pub use flights::{create_flight, create_flights_bulk, get_flight, search_flights};
pub use health::{handler_404, health};
pub use two_factor::{confirm_2fa_setup, disable_2fa, setup_2fa, toggle_email_2fa};
pub use users::{change_password, get_profile, update_profile};
