//! 双因素认证核心逻辑
//!
//! 状态机：Disabled -> SettingUp (pending_secret) -> Enabled。
//! TOTP 基于 RFC 6238（6 位、30 秒步长、允许前后各一步偏移）；
//! 无认证器的账户可用邮件一次性验证码作为第二因素。
//! 登录验证按"存在哪种密钥"分派：已确认的 TOTP 密钥优先，
//! 邮件验证码只在没有 TOTP 密钥时生效，防止降级。
//!
//! @author sky

use chrono::{Duration, Utc};
use rand::{Rng, RngCore};
use subtle::ConstantTimeEq;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{info, instrument, warn};

use super::crypto::{hash_password, verify_password};
use super::models::{BackupCode, EmailOtp, TwoFactorSetup, TwoFactorState, UserAccount};
use super::AccountManager;
use crate::error::{Result, ServiceError};

/// 邮件验证码有效期：10 分钟
pub const EMAIL_OTP_TTL_MINUTES: i64 = 10;
/// 启用双因素时生成的备份码数量
pub const BACKUP_CODE_COUNT: usize = 8;

/// 生成备份码：4 个随机字节的十六进制编码（8 个字符）
fn generate_backup_code() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl AccountManager {
    /// 从加密存储的密钥构造 TOTP 实例
    fn totp_for(&self, encrypted_secret: &str) -> Result<TOTP> {
        let secret = self.decrypt_totp_secret(encrypted_secret)?;
        let secret_bytes = Secret::Encoded(secret)
            .to_bytes()
            .map_err(|e| ServiceError::Other(format!("invalid TOTP secret: {}", e)))?;
        TOTP::new(Algorithm::SHA1, 6, 1, 30, secret_bytes)
            .map_err(|e| ServiceError::Other(format!("TOTP creation failed: {}", e)))
    }

    /// 开始 TOTP 绑定（第一步：生成候选密钥）
    ///
    /// 候选密钥加密后存入 pending_secret，未经确认不参与任何验证；
    /// 重复调用会覆盖旧的候选密钥。
    #[instrument(skip(self))]
    pub async fn begin_two_factor_setup(&self, account_id: &str) -> Result<TwoFactorSetup> {
        let mut account = self.get_account(account_id).await?;

        if account.two_factor.enabled {
            return Err(ServiceError::Conflict(
                "two-factor authentication is already enabled".into(),
            ));
        }

        // 生成 32 字节随机密钥
        let mut secret_bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret_bytes);
        let secret_base32 = Secret::Raw(secret_bytes).to_encoded().to_string();

        // 手动构造 otpauth URL 供认证器扫码
        let otpauth_url = format!(
            "otpauth://totp/Skybook:{}?secret={}&issuer=Skybook",
            urlencoding::encode(&account.email),
            secret_base32
        );

        account.two_factor.pending_secret = Some(self.encrypt_totp_secret(&secret_base32)?);
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "two-factor setup initiated");

        Ok(TwoFactorSetup {
            secret: secret_base32,
            otpauth_url,
        })
    }

    /// 确认 TOTP 绑定（第二步：校验验证码并启用）
    ///
    /// 成功后候选密钥转正，生成 8 个备份码。备份码以 bcrypt 哈希入库，
    /// 明文只在本次返回，之后无法再次查看。
    #[instrument(skip(self, code))]
    pub async fn confirm_two_factor_setup(
        &self,
        account_id: &str,
        code: &str,
    ) -> Result<Vec<String>> {
        let mut account = self.get_account(account_id).await?;

        if account.two_factor.enabled {
            return Err(ServiceError::Conflict(
                "two-factor authentication is already enabled".into(),
            ));
        }
        let pending = account.two_factor.pending_secret.clone().ok_or_else(|| {
            ServiceError::Conflict("no two-factor setup in progress".into())
        })?;

        let totp = self.totp_for(&pending)?;
        let valid = totp
            .check_current(code)
            .map_err(|e| ServiceError::Other(format!("TOTP check failed: {}", e)))?;
        if !valid {
            warn!(account_id = %account_id, "two-factor confirm failed: invalid code");
            return Err(ServiceError::InvalidCredentials(
                "invalid verification code".into(),
            ));
        }

        // 生成备份码并哈希入库
        let backup_codes: Vec<String> = (0..BACKUP_CODE_COUNT)
            .map(|_| generate_backup_code())
            .collect();
        let mut hashed = Vec::new();
        for code in &backup_codes {
            hashed.push(BackupCode {
                code_hash: hash_password(code).await?,
                used: false,
            });
        }

        let now = Utc::now();
        account.two_factor.secret = Some(pending);
        account.two_factor.pending_secret = None;
        account.two_factor.enabled = true;
        account.two_factor.enabled_at = Some(now);
        account.two_factor.backup_codes = hashed;
        account.two_factor.email_code = None;
        account.updated_at = Some(now);

        self.persist_account(&account)?;

        info!(account_id = %account.id, "two-factor authentication enabled");
        Ok(backup_codes)
    }

    /// 登录第二步的验证码校验。
    ///
    /// 存在已确认 TOTP 密钥时只接受 TOTP（±1 步容差）；否则校验邮件
    /// 验证码，且无论对错该验证码都会被清除（每码只允许一次尝试），
    /// 调用方负责持久化账户。
    pub async fn verify_login(&self, account: &mut UserAccount, code: &str) -> Result<bool> {
        if !account.two_factor.enabled {
            return Ok(false);
        }

        if let Some(encrypted) = account.two_factor.secret.clone() {
            let totp = self.totp_for(&encrypted)?;
            return totp
                .check_current(code)
                .map_err(|e| ServiceError::Other(format!("TOTP check failed: {}", e)));
        }

        // 邮件验证码：取出即清除
        if let Some(otp) = account.two_factor.email_code.take() {
            if otp.expires_at <= Utc::now() {
                return Ok(false);
            }
            let matches: bool = otp.code.as_bytes().ct_eq(code.as_bytes()).into();
            return Ok(matches);
        }

        Ok(false)
    }

    /// 为已启用双因素的账户签发邮件验证码（6 位数字，10 分钟有效），
    /// 覆盖旧码。返回明文交由调用方投递，绝不能进入 API 响应。
    pub async fn issue_email_code(&self, account: &mut UserAccount) -> Result<String> {
        if !account.two_factor.enabled {
            return Err(ServiceError::Conflict(
                "two-factor authentication is not enabled".into(),
            ));
        }

        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        account.two_factor.email_code = Some(EmailOtp {
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(EMAIL_OTP_TTL_MINUTES),
        });
        account.updated_at = Some(Utc::now());
        self.persist_account(account)?;

        info!(account_id = %account.id, "two-factor email code issued");
        Ok(code)
    }

    /// 消费一个未使用的备份码。
    ///
    /// 命中即标记 used 并立刻持久化：即使外层操作随后失败，
    /// 该码也已作废，不给重放留窗口。
    pub(super) async fn consume_backup_code(
        &self,
        account: &mut UserAccount,
        code: &str,
    ) -> Result<bool> {
        for entry in account.two_factor.backup_codes.iter_mut() {
            if entry.used {
                continue;
            }
            if verify_password(code, &entry.code_hash).await? {
                entry.used = true;
                account.updated_at = Some(Utc::now());
                self.persist_account(account)?;
                warn!(account_id = %account.id, "backup code consumed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 关闭双因素认证。先尝试备份码，再尝试 TOTP；
    /// 成功后整个双因素状态归零（密钥、备份码、邮件码全部清除）。
    #[instrument(skip(self, code))]
    pub async fn disable_two_factor(&self, account_id: &str, code: &str) -> Result<()> {
        let mut account = self.get_account(account_id).await?;

        if !account.two_factor.enabled {
            return Err(ServiceError::Conflict(
                "two-factor authentication is not enabled".into(),
            ));
        }

        let mut verified = self.consume_backup_code(&mut account, code).await?;
        if !verified {
            if let Some(encrypted) = account.two_factor.secret.clone() {
                let totp = self.totp_for(&encrypted)?;
                verified = totp
                    .check_current(code)
                    .map_err(|e| ServiceError::Other(format!("TOTP check failed: {}", e)))?;
            }
        }

        if !verified {
            warn!(account_id = %account_id, "two-factor disable failed: invalid code");
            return Err(ServiceError::InvalidCredentials(
                "invalid verification code".into(),
            ));
        }

        account.two_factor = TwoFactorState::default();
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %account.id, "two-factor authentication disabled");
        Ok(())
    }

    /// 切换纯邮件验证码模式的双因素开关。
    ///
    /// 已绑定认证器的账户不允许从这里绕过：开启会与 TOTP 冲突，
    /// 关闭必须走 disable_two_factor 出示验证码。
    #[instrument(skip(self))]
    pub async fn toggle_email_two_factor(&self, account_id: &str) -> Result<UserAccount> {
        let mut account = self.get_account(account_id).await?;

        if account.two_factor.secret.is_some() {
            return Err(ServiceError::Conflict(
                "an authenticator app is enrolled; disable it with a verification code".into(),
            ));
        }

        if account.two_factor.enabled {
            account.two_factor = TwoFactorState::default();
        } else {
            account.two_factor.enabled = true;
            account.two_factor.enabled_at = Some(Utc::now());
            account.two_factor.pending_secret = None;
            account.two_factor.email_code = None;
        }
        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(
            account_id = %account.id,
            enabled = account.two_factor.enabled,
            "email two-factor toggled"
        );
        Ok(account)
    }
}
