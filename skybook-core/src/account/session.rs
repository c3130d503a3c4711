//! JWT 会话：签发与验证
//!
//! 单一长效会话 token（默认 30 天），没有刷新机制；撤销通过账户上的
//! token 版本号实现，改密/重置密码后旧会话全部失效。

use super::models::*;
use super::AccountManager;
use crate::error::{Result, ServiceError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

impl AccountManager {
    /// 为账户签发会话 token
    pub fn issue_session(&self, account: &UserAccount) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.session_ttl);

        let claims = SessionClaims {
            sub: account.id.clone(),
            email: account.email.clone(),
            iss: Some(self.jwt_issuer.clone()),
            aud: Some(self.jwt_audience.clone()),
            token_version: account.token_version,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::Other(e.to_string()))
    }

    /// 验证会话 token：签名、iss/aud、有效期，以及 token 版本号
    pub async fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.jwt_audience.clone()]);
        validation.set_issuer(&[self.jwt_issuer.clone()]);
        let token_data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::InvalidCredentials(format!("invalid session: {}", e)))?;

        let claims = token_data.claims;

        // 校验 token 版本号以支持撤销
        let account = self.get_account(&claims.sub).await?;
        if claims.token_version != account.token_version {
            return Err(ServiceError::InvalidCredentials("session revoked".into()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::super::models::CreateAccountRequest;
    use super::*;
    use tempfile::TempDir;

    async fn account_fixture(mgr: &AccountManager) -> UserAccount {
        mgr.create_account(CreateAccountRequest {
            name: "S".to_string(),
            email: "s@example.com".to_string(),
            password: "pw12345678".to_string(),
            phone: "1".to_string(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn issue_and_verify_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mgr = AccountManager::new(dir.path(), "test-secret".to_string());
        let account = account_fixture(&mgr).await;

        let token = mgr.issue_session(&account).unwrap();
        let claims = mgr.verify_session(&token).await.unwrap();
        assert_eq!(claims.sub, account.id);
        assert_eq!(claims.email, "s@example.com");
    }

    #[tokio::test]
    async fn wrong_secret_or_wrong_audience_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mgr = AccountManager::new(dir.path(), "test-secret".to_string());
        let account = account_fixture(&mgr).await;
        let token = mgr.issue_session(&account).unwrap();

        let other_secret = AccountManager::new(dir.path(), "other-secret".to_string());
        assert!(other_secret.verify_session(&token).await.is_err());

        let other_aud = AccountManager::new(dir.path(), "test-secret".to_string())
            .with_claims_context("skybook-api", "someone-else");
        assert!(other_aud.verify_session(&token).await.is_err());
    }

    #[tokio::test]
    async fn bumped_token_version_revokes_session() {
        let dir = TempDir::new().unwrap();
        let mgr = AccountManager::new(dir.path(), "test-secret".to_string());
        let mut account = account_fixture(&mgr).await;

        let token = mgr.issue_session(&account).unwrap();
        AccountManager::bump_token_version(&mut account);
        mgr.persist_account(&account).unwrap();

        let err = mgr.verify_session(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials(_)));
    }
}
