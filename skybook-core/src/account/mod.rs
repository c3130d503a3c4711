//! 账户与认证模块

mod crypto;
mod encryption;
mod login;
mod manager;
mod models;
mod password;
mod session;
pub mod token;
mod two_factor;
mod verification;

pub use manager::AccountManager;
pub use models::{
    AccountProfile, BackupCode, CreateAccountRequest, EmailOtp, LoginOutcome, LoginRequest,
    SecondFactor, SessionClaims, StoredToken, TwoFactorSetup, TwoFactorState, UpdateProfileRequest,
    UserAccount, VerifyTwoFactorRequest,
};
pub use password::PasswordChanged;
pub use two_factor::{BACKUP_CODE_COUNT, EMAIL_OTP_TTL_MINUTES};
