//! 邮箱验证与密码重置流程
//!
//! 两条流程共用单次使用令牌机制（见 token.rs）：链接里的原始令牌
//! 经哈希后与账户逐一比对（目录扫描，与邮箱索引兜底同一套路径），
//! 命中且未过期才放行。重发即覆盖，旧链接随之作废。

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};

use super::models::AccountProfile;
use super::password::PasswordChanged;
use super::token::{self, RESEND_INTERVAL_MINUTES};
use super::AccountManager;
use crate::error::{Result, ServiceError};

impl AccountManager {
    /// 为新注册账户签发邮箱验证令牌（24 小时有效），返回原始令牌供邮件链接使用
    #[instrument(skip(self))]
    pub async fn start_email_verification(&self, account_id: &str) -> Result<String> {
        let mut account = self.get_account(account_id).await?;
        if account.is_email_verified {
            return Err(ServiceError::Conflict("email is already verified".into()));
        }

        let issued = token::issue(token::email_verification_ttl());
        account.set_email_verification(issued.stored);
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "email verification token issued");
        Ok(issued.raw)
    }

    /// 重发验证邮件。距上一封不足 5 分钟时拒绝；签发新令牌即作废旧链接。
    #[instrument(skip(self))]
    pub async fn resend_email_verification(
        &self,
        email: &str,
    ) -> Result<(AccountProfile, String)> {
        let account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no account with that email".into()))?;
        if account.is_email_verified {
            return Err(ServiceError::Conflict("email is already verified".into()));
        }

        if let Some(existing) = &account.email_verification {
            let issued_at = existing.issued_at(token::email_verification_ttl());
            if issued_at + Duration::minutes(RESEND_INTERVAL_MINUTES) > Utc::now() {
                return Err(ServiceError::RateLimited(
                    "please wait a few minutes before requesting another email".into(),
                ));
            }
        }

        let raw = self.start_email_verification(&account.id).await?;
        Ok((account.into(), raw))
    }

    /// 消费邮箱验证令牌：按哈希找到账户，校验有效期，置为已验证并清除令牌
    #[instrument(skip(self, raw_token))]
    pub async fn verify_email(&self, raw_token: &str) -> Result<AccountProfile> {
        let account = self.scan_find(|a| {
            a.email_verification
                .as_ref()
                .map(|t| t.matches(raw_token))
                .unwrap_or(false)
        })?;

        let mut account = match account {
            Some(account) => account,
            None => {
                warn!("email verification failed: unknown token");
                return Err(ServiceError::InvalidToken);
            }
        };

        if let Some(stored) = &account.email_verification {
            if stored.is_expired(Utc::now()) {
                return Err(ServiceError::Expired("verification token".into()));
            }
        }

        account.is_email_verified = true;
        account.clear_email_verification();
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "email verified");
        Ok(account.into())
    }

    /// 发起密码重置（令牌 10 分钟有效）。到了这一步邮箱存在性已不需要隐藏，
    /// 未注册邮箱直接返回 NotFound。
    #[instrument(skip(self))]
    pub async fn start_password_reset(&self, email: &str) -> Result<(AccountProfile, String)> {
        let mut account = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound("no account with that email".into()))?;

        let issued = token::issue(token::password_reset_ttl());
        account.set_password_reset(issued.stored);
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "password reset token issued");
        Ok((account.into(), issued.raw))
    }

    /// 消费密码重置令牌：改密、清除令牌、递增 token 版本号（旧会话
    /// 全部失效），随后签发一枚新会话。
    #[instrument(skip(self, raw_token, new_password))]
    pub async fn reset_password(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<PasswordChanged> {
        let account = self.scan_find(|a| {
            a.password_reset
                .as_ref()
                .map(|t| t.matches(raw_token))
                .unwrap_or(false)
        })?;

        let mut account = match account {
            Some(account) => account,
            None => {
                warn!("password reset failed: unknown token");
                return Err(ServiceError::InvalidToken);
            }
        };

        if let Some(stored) = &account.password_reset {
            if stored.is_expired(Utc::now()) {
                return Err(ServiceError::Expired("password reset token".into()));
            }
        }

        Self::validate_password(new_password)?;
        account.password_hash = super::crypto::hash_password(new_password).await?;
        account.clear_password_reset();
        Self::bump_token_version(&mut account);
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "password reset completed");
        let token = self.issue_session(&account)?;
        Ok(PasswordChanged {
            account: account.into(),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::crypto::verify_password;
    use super::super::models::CreateAccountRequest;
    use super::*;
    use tempfile::TempDir;

    async fn fixture(dir: &TempDir) -> (AccountManager, String) {
        let mgr = AccountManager::new(dir.path(), "test-secret".to_string());
        let account = mgr
            .create_account(CreateAccountRequest {
                name: "V".to_string(),
                email: "v@example.com".to_string(),
                password: "pw12345678".to_string(),
                phone: "1".to_string(),
            })
            .await
            .unwrap();
        (mgr, account.id)
    }

    #[tokio::test]
    async fn verify_email_consumes_the_token() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let raw = mgr.start_email_verification(&id).await.unwrap();
        assert_eq!(raw.len(), 64);

        let profile = mgr.verify_email(&raw).await.unwrap();
        assert!(profile.is_email_verified);

        let stored = mgr.get_account(&id).await.unwrap();
        assert!(stored.is_email_verified);
        assert!(stored.email_verification.is_none());

        // 令牌单次使用
        let err = mgr.verify_email(&raw).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_and_expired_token_is_distinct() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let err = mgr.verify_email("deadbeef").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));

        let raw = mgr.start_email_verification(&id).await.unwrap();
        let mut account = mgr.get_account(&id).await.unwrap();
        if let Some(stored) = account.email_verification.as_mut() {
            stored.expires_at = Utc::now() - Duration::seconds(1);
        }
        mgr.persist_account(&account).unwrap();

        let err = mgr.verify_email(&raw).await.unwrap_err();
        assert!(matches!(err, ServiceError::Expired(_)));
    }

    #[tokio::test]
    async fn resend_is_gated_and_supersedes_the_old_link() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let first = mgr.start_email_verification(&id).await.unwrap();

        // 5 分钟以内拒绝重发
        let err = mgr.resend_email_verification("v@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::RateLimited(_)));

        // 把签发时间拨回 6 分钟前（过期时间同步回拨）
        let mut account = mgr.get_account(&id).await.unwrap();
        if let Some(stored) = account.email_verification.as_mut() {
            stored.expires_at = stored.expires_at - Duration::minutes(6);
        }
        mgr.persist_account(&account).unwrap();

        let (profile, second) = mgr.resend_email_verification("v@example.com").await.unwrap();
        assert_eq!(profile.email, "v@example.com");
        assert_ne!(first, second);

        // 旧链接已被覆盖
        let err = mgr.verify_email(&first).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
        mgr.verify_email(&second).await.unwrap();

        // 已验证账户不再重发
        let err = mgr.resend_email_verification("v@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn reset_password_flow_revokes_sessions_and_the_token() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let account = mgr.get_account(&id).await.unwrap();
        let old_session = mgr.issue_session(&account).unwrap();

        let err = mgr.start_password_reset("nobody@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let (_, raw) = mgr.start_password_reset("v@example.com").await.unwrap();
        let changed = mgr.reset_password(&raw, "brand-new-pass").await.unwrap();

        let stored = mgr.get_account(&id).await.unwrap();
        assert!(stored.password_reset.is_none());
        assert!(verify_password("brand-new-pass", &stored.password_hash).await.unwrap());
        assert!(!verify_password("pw12345678", &stored.password_hash).await.unwrap());

        // 旧会话失效，重置返回的新会话可用；令牌不能复用
        assert!(mgr.verify_session(&old_session).await.is_err());
        assert!(mgr.verify_session(&changed.token).await.is_ok());
        let err = mgr.reset_password(&raw, "another-pass1").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected_distinctly() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let (_, raw) = mgr.start_password_reset("v@example.com").await.unwrap();
        let mut account = mgr.get_account(&id).await.unwrap();
        if let Some(stored) = account.password_reset.as_mut() {
            stored.expires_at = Utc::now() - Duration::seconds(1);
        }
        mgr.persist_account(&account).unwrap();

        let err = mgr.reset_password(&raw, "whatever-pass").await.unwrap_err();
        assert!(matches!(err, ServiceError::Expired(_)));
    }

    #[tokio::test]
    async fn changing_the_password_invalidates_an_outstanding_reset_link() {
        let dir = TempDir::new().unwrap();
        let (mgr, id) = fixture(&dir).await;

        let (_, raw) = mgr.start_password_reset("v@example.com").await.unwrap();
        mgr.change_password(&id, "pw12345678", "changed-pass1").await.unwrap();

        let err = mgr.reset_password(&raw, "hijacked-pass").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }
}
