mod app;

use app::{app_router, AppState, HttpMailer, LogMailer, Mailer, RateLimiter};
use dotenvy::dotenv;
use skybook_core::{AccountManager, BookingManager, FlightManager};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: SocketAddr,
    data_dir: PathBuf,
    /// JWT 签名密钥
    jwt_secret: String,
    /// JWT iss
    jwt_issuer: String,
    /// JWT aud
    jwt_audience: String,
    /// 会话有效期（天）
    session_ttl_days: i64,
    /// 前端地址，用于拼接验证 / 重置链接
    frontend_url: String,
    /// CORS 允许的来源列表（空则允许所有）
    cors_origins: Vec<String>,
    /// HTTP 邮件服务地址（缺省则只打日志）
    mail_endpoint: Option<String>,
    /// HTTP 邮件服务鉴权 token
    mail_token: Option<String>,
    /// 发件人地址
    mail_from: Option<String>,
}

impl ApiConfig {
    fn from_env() -> Self {
        let bind = env::var("SB_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| "0.0.0.0:8080".parse().expect("valid default bind"));

        let data_dir = env::var("SB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        // JWT 密钥，用于签发会话 token
        let jwt_secret = env::var("SB_JWT_SECRET").unwrap_or_else(|_| {
            info!("SB_JWT_SECRET not set; generating a random secret for this run");
            uuid::Uuid::new_v4().to_string()
        });
        let jwt_issuer = env::var("SB_JWT_ISSUER").unwrap_or_else(|_| "skybook-api".into());
        let jwt_audience = env::var("SB_JWT_AUDIENCE").unwrap_or_else(|_| "skybook-clients".into());

        let session_ttl_days = env::var("SB_SESSION_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(30);

        // 前端地址，验证 / 重置链接都指向这里
        let frontend_url =
            env::var("SB_FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        if url::Url::parse(&frontend_url).is_err() {
            panic!("SB_FRONTEND_URL is not a valid URL: {frontend_url}");
        }
        let frontend_url = frontend_url.trim_end_matches('/').to_string();

        // CORS 允许的来源，逗号分隔；空或 "*" 表示允许所有
        let cors_origins = env::var("SB_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    trimmed
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| t.trim().to_string())
                        .collect()
                }
            })
            .unwrap_or_default();

        let mail_endpoint = env::var("SB_MAIL_ENDPOINT")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let mail_token = env::var("SB_MAIL_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let mail_from = env::var("SB_MAIL_FROM")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            bind,
            data_dir,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            session_ttl_days,
            frontend_url,
            cors_origins,
            mail_endpoint,
            mail_token,
            mail_from,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先读取 .env（若存在）
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env();
    info!("starting API on {}", config.bind);

    let accounts = Arc::new(
        AccountManager::new(config.data_dir.clone(), config.jwt_secret.clone())
            .with_claims_context(config.jwt_issuer.clone(), config.jwt_audience.clone())
            .with_session_ttl(config.session_ttl_days * 24 * 3600),
    );
    accounts.ensure_dirs()?;

    let flights = Arc::new(FlightManager::new(config.data_dir.clone()));
    flights.ensure_dirs()?;

    let bookings = Arc::new(BookingManager::new(
        config.data_dir.clone(),
        (*flights).clone(),
    ));
    bookings.ensure_dirs()?;

    let mailer: Arc<dyn Mailer> = match (
        config.mail_endpoint.clone(),
        config.mail_token.clone(),
        config.mail_from.clone(),
    ) {
        (Some(endpoint), Some(token), Some(from)) => {
            info!("mail delivery via HTTP endpoint {}", endpoint);
            Arc::new(HttpMailer::new(endpoint, token, from))
        }
        _ => {
            info!("SB_MAIL_ENDPOINT not fully configured; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let state = AppState {
        accounts,
        flights,
        bookings,
        mailer,
        frontend_url: config.frontend_url.clone(),
        login_limiter: Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
        verification_limiter: Arc::new(RateLimiter::new(3, Duration::from_secs(15 * 60))),
        reset_limiter: Arc::new(RateLimiter::new(3, Duration::from_secs(60 * 60))),
        two_factor_limiter: Arc::new(RateLimiter::new(5, Duration::from_secs(5 * 60))),
        password_limiter: Arc::new(RateLimiter::new(5, Duration::from_secs(15 * 60))),
        auth_limiter: Arc::new(RateLimiter::new(30, Duration::from_secs(60))),
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
