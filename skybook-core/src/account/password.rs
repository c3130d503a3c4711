//! 密码管理：验证策略、修改密码

use super::crypto::{hash_password, verify_password};
use super::models::AccountProfile;
use super::AccountManager;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use tracing::{info, instrument};

impl AccountManager {
    /// 密码策略：至少 8 个字符
    pub(super) fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(ServiceError::PolicyViolation(
                "password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }

    /// 修改已登录账户的密码。
    ///
    /// 成功后递增 token 版本号（所有已签发会话失效），并清除尚未使用的
    /// 密码重置令牌，避免旧的重置链接在改密之后仍然可用。
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<PasswordChanged> {
        let mut account = self.get_account(id).await?;

        Self::validate_password(new_password)?;
        let valid = verify_password(current_password, &account.password_hash).await?;
        if !valid {
            return Err(ServiceError::InvalidCredentials(
                "current password is incorrect".into(),
            ));
        }

        account.password_hash = hash_password(new_password).await?;
        account.clear_password_reset();
        Self::bump_token_version(&mut account);
        account.updated_at = Some(Utc::now());

        self.persist_account(&account)?;

        info!(account_id = %id, "password changed");
        let token = self.issue_session(&account)?;
        Ok(PasswordChanged {
            account: account.into(),
            token,
        })
    }
}

/// 改密结果：旧会话已全部失效，携带一枚新签发的会话 token
#[derive(Debug, Clone)]
pub struct PasswordChanged {
    pub account: AccountProfile,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::super::models::CreateAccountRequest;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn change_password_requires_current_and_revokes_sessions() {
        let dir = TempDir::new().unwrap();
        let mgr = AccountManager::new(dir.path(), "test-secret".to_string());
        let account = mgr
            .create_account(CreateAccountRequest {
                name: "T".to_string(),
                email: "t@example.com".to_string(),
                password: "pw12345678".to_string(),
                phone: "1".to_string(),
            })
            .await
            .unwrap();
        let old_session = mgr.issue_session(&account).unwrap();

        let err = mgr
            .change_password(&account.id, "wrong-current", "newpassword1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials(_)));

        let changed = mgr
            .change_password(&account.id, "pw12345678", "newpassword1")
            .await
            .unwrap();

        // 旧会话失效，新会话可用
        assert!(mgr.verify_session(&old_session).await.is_err());
        assert!(mgr.verify_session(&changed.token).await.is_ok());

        let stored = mgr.get_account(&account.id).await.unwrap();
        assert_eq!(stored.token_version, account.token_version + 1);
        assert!(verify_password("newpassword1", &stored.password_hash).await.unwrap());
    }
}
