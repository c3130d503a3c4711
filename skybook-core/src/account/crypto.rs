//! 密码加密工具函数

use crate::error::{Result, ServiceError};
use bcrypt::{hash, verify, DEFAULT_COST};

/// 异步哈希密码（在阻塞线程中执行 bcrypt，12 log-rounds）
pub async fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash(&password, DEFAULT_COST))
        .await
        .map_err(|e| ServiceError::Other(format!("spawn_blocking failed: {}", e)))?
        .map_err(|e| ServiceError::Other(format!("bcrypt hash failed: {}", e)))
}

/// 异步验证密码（在阻塞线程中执行 bcrypt）。
///
/// 存储侧哈希损坏或格式非法时返回 false 而不是报错，
/// 调用方只需要区分"匹配/不匹配"。
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    let outcome = tokio::task::spawn_blocking(move || verify(&password, &hash))
        .await
        .map_err(|e| ServiceError::Other(format!("spawn_blocking failed: {}", e)))?;
    Ok(outcome.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_roundtrip() {
        let hashed = hash_password("s3cret-password").await.unwrap();
        assert_ne!(hashed, "s3cret-password");
        assert!(verify_password("s3cret-password", &hashed).await.unwrap());
        assert!(!verify_password("wrong-password", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_verifies_to_false() {
        let ok = verify_password("anything", "not-a-bcrypt-hash").await.unwrap();
        assert!(!ok);
    }
}
