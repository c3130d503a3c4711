//! 账户数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// 用户账户（存储模型，包含密码哈希与双因素状态）
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// 账户唯一 ID (UUID)
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 邮箱（唯一，小写存储，用于登录）
    pub email: String,
    /// 联系电话
    pub phone: String,
    /// bcrypt 哈希后的密码
    pub password_hash: String,
    /// 邮箱是否已验证
    #[serde(default)]
    pub is_email_verified: bool,
    /// 待完成的邮箱验证令牌（哈希 + 过期时间成对出现）
    #[serde(default)]
    pub email_verification: Option<StoredToken>,
    /// 待完成的密码重置令牌
    #[serde(default)]
    pub password_reset: Option<StoredToken>,
    /// 双因素认证状态
    #[serde(default)]
    pub two_factor: TwoFactorState,
    /// Token 版本号（用于撤销旧会话）
    #[serde(default)]
    pub token_version: u64,
    /// 创建时间
    pub created_at: Option<DateTime<Utc>>,
    /// 更新时间
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// 写入新的邮箱验证令牌（覆盖旧令牌即作废旧链接）。
    pub fn set_email_verification(&mut self, token: StoredToken) {
        self.email_verification = Some(token);
    }

    /// 清除邮箱验证令牌。消费成功或验证完成后必须调用。
    pub fn clear_email_verification(&mut self) {
        self.email_verification = None;
    }

    /// 写入新的密码重置令牌（覆盖旧令牌即作废旧链接）。
    pub fn set_password_reset(&mut self, token: StoredToken) {
        self.password_reset = Some(token);
    }

    /// 清除密码重置令牌。
    pub fn clear_password_reset(&mut self) {
        self.password_reset = None;
    }
}

/// 单次使用令牌的存储形态：只保存 SHA-256 哈希与过期时间，
/// 原始令牌只在签发时返回一次，不落盘。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// hex(sha256(原始令牌))
    pub hash: String,
    /// 过期时间（严格小于当前时间视为过期）
    pub expires_at: DateTime<Utc>,
}

/// 双因素认证状态。
///
/// `pending_secret` 在 setup 确认前不参与登录；`secret` 仅在 `enabled`
/// 为 true 时存在（纯邮件验证码模式下可以 enabled 而无 TOTP 密钥）。
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwoFactorState {
    /// 双因素认证是否已启用
    #[serde(default)]
    pub enabled: bool,
    /// 已确认的 TOTP 密钥（AES-256-GCM 加密存储）
    pub secret: Option<String>,
    /// setup 阶段的候选密钥（加密存储，确认前不生效）
    pub pending_secret: Option<String>,
    /// 备份码（bcrypt 哈希存储，明文只在启用时返回一次）
    #[serde(default)]
    pub backup_codes: Vec<BackupCode>,
    /// 登录时签发的邮件验证码（一次尝试后即清除）
    pub email_code: Option<EmailOtp>,
    /// 启用时间
    pub enabled_at: Option<DateTime<Utc>>,
}

impl TwoFactorState {
    /// 是否存在已确认的 TOTP 密钥。
    pub fn has_totp_secret(&self) -> bool {
        self.enabled && self.secret.is_some()
    }
}

/// 备份码存储项。`used` 只会从 false 变为 true，不可逆。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupCode {
    /// bcrypt 哈希后的备份码
    pub code_hash: String,
    /// 是否已被消费
    #[serde(default)]
    pub used: bool,
}

/// 邮件一次性验证码（6 位数字，10 分钟有效）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// 注册请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 登录第二步（双因素验证）请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTwoFactorRequest {
    pub email: String,
    pub code: String,
}

/// 更新资料请求（只允许姓名与电话）
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// JWT 会话 Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: 账户 ID
    pub sub: String,
    /// 账户邮箱
    pub email: String,
    /// JWT issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// JWT audience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// 签发时账户的 token 版本号，不一致即已撤销
    #[serde(default)]
    pub token_version: u64,
    /// 过期时间戳 (Unix timestamp)
    pub exp: i64,
    /// 签发时间戳 (Unix timestamp)
    pub iat: i64,
}

/// TOTP setup 响应：base32 密钥与 otpauth 链接，供绑定认证器使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_url: String,
}

/// 登录所需的第二因素通道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecondFactor {
    /// 邮件一次性验证码
    EmailCode,
    /// 认证器 App (TOTP)
    AuthenticatorApp,
}

/// 登录结果。
///
/// 不派生 Serialize：`email_code` 只能交给邮件投递，绝不能进入响应体，
/// 由 API 层自行组装对外 JSON。
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// 认证完成，携带会话 token 与账户概要
    Authenticated {
        token: String,
        account: AccountProfile,
    },
    /// 还需第二因素
    TwoFactorRequired {
        channel: SecondFactor,
        /// 仅邮件通道存在，待 API 层投递
        email_code: Option<String>,
    },
}

/// 账户概要（不含哈希、密钥等敏感信息），唯一允许出 API 的账户视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_email_verified: bool,
    pub two_factor_enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<UserAccount> for AccountProfile {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            phone: account.phone,
            is_email_verified: account.is_email_verified,
            two_factor_enabled: account.two_factor.enabled,
            created_at: account.created_at,
        }
    }
}
