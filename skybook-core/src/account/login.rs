//! 登录编排：密码校验、邮箱验证门槛、第二因素分派

use tracing::{info, instrument, warn};

use super::crypto::verify_password;
use super::models::{LoginOutcome, SecondFactor};
use super::AccountManager;
use crate::error::{Result, ServiceError};

impl AccountManager {
    /// 第一步登录。
    ///
    /// 邮箱不存在与密码错误返回同一个错误，避免账户枚举；密码正确但
    /// 邮箱未验证单独报错。双因素账户按"存在哪种密钥"分派：绑定了
    /// 认证器直接要求 TOTP（不发邮件码），否则签发邮件验证码等待第二步。
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let mut account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::InvalidCredentials("incorrect email or password".into()))?;

        let valid = verify_password(password, &account.password_hash).await?;
        if !valid {
            warn!(account_id = %account.id, "login failed: wrong password");
            return Err(ServiceError::InvalidCredentials(
                "incorrect email or password".into(),
            ));
        }

        if !account.is_email_verified {
            return Err(ServiceError::EmailNotVerified);
        }

        if !account.two_factor.enabled {
            let token = self.issue_session(&account)?;
            info!(account_id = %account.id, "logged in");
            return Ok(LoginOutcome::Authenticated {
                token,
                account: account.into(),
            });
        }

        if account.two_factor.has_totp_secret() {
            info!(account_id = %account.id, "login pending authenticator code");
            return Ok(LoginOutcome::TwoFactorRequired {
                channel: SecondFactor::AuthenticatorApp,
                email_code: None,
            });
        }

        let code = self.issue_email_code(&mut account).await?;
        info!(account_id = %account.id, "login pending email code");
        Ok(LoginOutcome::TwoFactorRequired {
            channel: SecondFactor::EmailCode,
            email_code: Some(code),
        })
    }

    /// 第二步登录：校验第二因素并签发会话。
    ///
    /// 邮件验证码无论对错只允许一次尝试（verify_login 内部清除）。
    #[instrument(skip(self, code))]
    pub async fn complete_two_factor(&self, email: &str, code: &str) -> Result<LoginOutcome> {
        let mut account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no account with that email".into()))?;

        if !account.two_factor.enabled {
            return Err(ServiceError::Conflict(
                "two-factor authentication is not enabled".into(),
            ));
        }

        let verified = self.verify_login(&mut account, code).await?;
        // 邮件验证码的清除必须落盘，哪怕本次尝试失败
        self.persist_account(&account)?;

        if !verified {
            warn!(account_id = %account.id, "two-factor login failed");
            return Err(ServiceError::InvalidCredentials(
                "invalid or expired verification code".into(),
            ));
        }

        let token = self.issue_session(&account)?;
        info!(account_id = %account.id, "logged in with second factor");
        Ok(LoginOutcome::Authenticated {
            token,
            account: account.into(),
        })
    }
}
