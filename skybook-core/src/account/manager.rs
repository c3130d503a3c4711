//! 账户管理器：核心结构与账户 CRUD 操作

use super::crypto::hash_password;
use super::models::*;
use crate::error::{Result, ServiceError};
use chrono::Utc;
use serde_json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

const DEFAULT_JWT_ISSUER: &str = "skybook-api";
const DEFAULT_JWT_AUDIENCE: &str = "skybook-clients";

/// 会话默认有效期：30 天
const DEFAULT_SESSION_TTL_SECS: i64 = 30 * 24 * 3600;

/// 账户管理器
#[derive(Debug, Clone)]
pub struct AccountManager {
    /// 账户数据存储目录
    pub(super) data_dir: PathBuf,
    /// JWT 签名密钥（同时派生 TOTP 密钥的加密密钥）
    pub(super) jwt_secret: String,
    /// JWT issuer
    pub(super) jwt_issuer: String,
    /// JWT audience
    pub(super) jwt_audience: String,
    /// 会话 token 有效期（秒）
    pub(super) session_ttl: i64,
}

// ============================================================================
// 构造器和配置
// ============================================================================

impl AccountManager {
    /// 创建新的账户管理器
    pub fn new<P: AsRef<Path>>(data_dir: P, jwt_secret: String) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            jwt_secret,
            jwt_issuer: DEFAULT_JWT_ISSUER.to_string(),
            jwt_audience: DEFAULT_JWT_AUDIENCE.to_string(),
            session_ttl: DEFAULT_SESSION_TTL_SECS,
        }
    }

    /// 配置 JWT iss/aud
    pub fn with_claims_context(
        mut self,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        self.jwt_issuer = issuer.into();
        self.jwt_audience = audience.into();
        self
    }

    /// 配置会话有效期（秒）
    pub fn with_session_ttl(mut self, ttl_secs: i64) -> Self {
        self.session_ttl = ttl_secs;
        self
    }
}

// ============================================================================
// 内部辅助方法
// ============================================================================

impl AccountManager {
    /// 邮箱归一化：去空白 + 小写，索引与查找统一用这个形式
    pub(super) fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// 递增 token 版本号，令所有已签发会话失效
    pub(super) fn bump_token_version(account: &mut UserAccount) {
        account.token_version = account.token_version.saturating_add(1);
    }

    /// 持久化账户数据
    pub(super) fn persist_account(&self, account: &UserAccount) -> Result<()> {
        let data = serde_json::to_vec_pretty(account)?;
        std::fs::write(self.account_path(&account.id), data)?;
        Ok(())
    }

    /// 邮箱索引文件路径
    fn index_path(&self) -> PathBuf {
        self.accounts_dir().join("index.json")
    }

    /// 加载邮箱 -> ID 索引
    fn load_email_index(&self) -> HashMap<String, String> {
        let path = self.index_path();
        if let Ok(data) = fs::read(&path) {
            if let Ok(map) = serde_json::from_slice::<HashMap<String, String>>(&data) {
                return map;
            }
        }
        HashMap::new()
    }

    /// 保存邮箱索引
    fn save_email_index(&self, index: &HashMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(index)?;
        fs::write(self.index_path(), data)?;
        Ok(())
    }

    /// 确保账户目录存在
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.accounts_dir())?;
        Ok(())
    }

    /// 账户存储目录
    fn accounts_dir(&self) -> PathBuf {
        self.data_dir.join("accounts")
    }

    /// 账户文件路径
    fn account_path(&self, id: &str) -> PathBuf {
        self.accounts_dir().join(format!("{}.json", id))
    }

    /// 遍历账户目录，返回第一个满足条件的账户。
    /// 索引失效或按令牌哈希查找时的兜底路径。
    pub(super) fn scan_find<F>(&self, pred: F) -> Result<Option<UserAccount>>
    where
        F: Fn(&UserAccount) -> bool,
    {
        let dir = self.accounts_dir();
        if !dir.exists() {
            return Ok(None);
        }

        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_stem().map(|s| s != "index").unwrap_or(true)
            {
                if let Ok(data) = std::fs::read(&path) {
                    if let Ok(account) = serde_json::from_slice::<UserAccount>(&data) {
                        if pred(&account) {
                            return Ok(Some(account));
                        }
                    }
                }
            }
        }

        Ok(None)
    }
}

// ============================================================================
// 账户 CRUD 操作
// ============================================================================

impl AccountManager {
    /// 注册新账户。邮箱唯一，密码哈希后入库，初始为未验证状态。
    #[instrument(skip(self, req))]
    pub async fn create_account(&self, req: CreateAccountRequest) -> Result<UserAccount> {
        self.ensure_dirs()?;

        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::PolicyViolation("name is required".into()));
        }
        let phone = req.phone.trim().to_string();
        if phone.is_empty() {
            return Err(ServiceError::PolicyViolation("phone is required".into()));
        }

        let email = Self::normalize_email(&req.email);
        if email.parse::<email_address::EmailAddress>().is_err() {
            return Err(ServiceError::PolicyViolation(
                "please provide a valid email address".into(),
            ));
        }

        // 检查邮箱是否已注册
        if self.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!("email: {}", email)));
        }

        Self::validate_password(&req.password)?;
        let password_hash = hash_password(&req.password).await?;

        let now = Utc::now();
        let account = UserAccount {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            phone,
            password_hash,
            is_email_verified: false,
            email_verification: None,
            password_reset: None,
            two_factor: TwoFactorState::default(),
            token_version: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };

        // 保存
        self.persist_account(&account)?;
        let mut index = self.load_email_index();
        index.insert(account.email.clone(), account.id.clone());
        self.save_email_index(&index)?;

        info!(account_id = %account.id, email = %account.email, "created account");
        Ok(account)
    }

    /// 获取账户
    #[instrument(skip(self))]
    pub async fn get_account(&self, id: &str) -> Result<UserAccount> {
        let path = self.account_path(id);
        if !path.exists() {
            return Err(ServiceError::NotFound(format!("account: {}", id)));
        }
        let data = std::fs::read(&path)?;
        let account: UserAccount = serde_json::from_slice(&data)?;
        Ok(account)
    }

    /// 通过邮箱查找（优先使用索引，索引失效时扫描目录并修复）
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        self.ensure_dirs()?;
        let email = Self::normalize_email(email);
        let index = self.load_email_index();

        // 优先从索引查找
        if let Some(id) = index.get(&email) {
            match self.get_account(id).await {
                Ok(account) => return Ok(Some(account)),
                Err(ServiceError::NotFound(_)) => {
                    // 索引指向的账户不存在，清理索引
                    let mut index = index;
                    index.remove(&email);
                    let _ = self.save_email_index(&index);
                }
                Err(e) => return Err(e),
            }
        }

        // 索引中没有，扫描目录兜底并修复索引
        if let Some(account) = self.scan_find(|a| a.email == email)? {
            let mut index = self.load_email_index();
            index.insert(email, account.id.clone());
            let _ = self.save_email_index(&index);
            return Ok(Some(account));
        }

        Ok(None)
    }

    /// 更新账户资料（只允许姓名与电话，其余字段各走各的流程）
    #[instrument(skip(self, req))]
    pub async fn update_profile(&self, id: &str, req: UpdateProfileRequest) -> Result<UserAccount> {
        let mut account = self.get_account(id).await?;

        if let Some(name) = req.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::PolicyViolation("name cannot be empty".into()));
            }
            account.name = name;
        }

        if let Some(phone) = req.phone {
            let phone = phone.trim().to_string();
            if phone.is_empty() {
                return Err(ServiceError::PolicyViolation("phone cannot be empty".into()));
            }
            account.phone = phone;
        }

        account.updated_at = Some(Utc::now());
        self.persist_account(&account)?;

        info!(account_id = %id, "updated profile");
        Ok(account)
    }
}
