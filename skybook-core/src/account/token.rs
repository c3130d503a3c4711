//! 单次使用令牌的签发与校验
//!
//! 邮箱验证与密码重置共用同一套机制：签发时生成 32 字节随机值，
//! 原始令牌以 hex 形式出现在邮件链接里，存储侧只保留 SHA-256 哈希。
//! 令牌没有独立的"已使用"标记，消费即由调用方清除对应字段。

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::models::StoredToken;

/// 邮箱验证令牌有效期：24 小时
pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;
/// 密码重置令牌有效期：10 分钟
pub const PASSWORD_RESET_TTL_MINUTES: i64 = 10;
/// 两封验证邮件之间的最小间隔：5 分钟
pub const RESEND_INTERVAL_MINUTES: i64 = 5;

/// 邮箱验证令牌的有效期
pub fn email_verification_ttl() -> Duration {
    Duration::hours(EMAIL_VERIFICATION_TTL_HOURS)
}

/// 密码重置令牌的有效期
pub fn password_reset_ttl() -> Duration {
    Duration::minutes(PASSWORD_RESET_TTL_MINUTES)
}

/// 一次签发的结果：`raw` 只此一份，交给邮件链接后即丢弃
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// 原始令牌（64 位 hex 字符），不落盘
    pub raw: String,
    /// 入库形态
    pub stored: StoredToken,
}

/// 签发一枚新令牌：32 字节随机值 + 给定有效期
pub fn issue(ttl: Duration) -> IssuedToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = hex::encode(bytes);
    IssuedToken {
        stored: StoredToken {
            hash: hash_token(&raw),
            expires_at: Utc::now() + ttl,
        },
        raw,
    }
}

/// 计算令牌的存储哈希：hex(sha256(raw))
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

impl StoredToken {
    /// 常量时间比较：持有的原始令牌是否对应本哈希
    pub fn matches(&self, raw: &str) -> bool {
        let computed = hash_token(raw);
        computed.as_bytes().ct_eq(self.hash.as_bytes()).into()
    }

    /// 过期判定：过期时间必须严格晚于当前时间才算有效
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// 反推签发时间（过期时间 - 有效期），用于重发间隔判断
    pub fn issued_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.expires_at - ttl
    }
}
