use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// 简单的滑动窗口限流器（基于内存，按 key 计数）。
/// key 通常是客户端 IP，改密接口用账户 ID。
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
    sweep_threshold: usize,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            buckets: Mutex::new(HashMap::new()),
            sweep_threshold: 1024,
        }
    }

    /// 返回是否允许当前请求；超限返回 false。
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let key_owned = key.to_string();
        let mut buckets = self.buckets.lock().await;
        let entry = buckets.entry(key_owned.clone()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        let allowed = if entry.len() >= self.limit {
            false
        } else {
            entry.push(now);
            true
        };
        // 清理空桶，避免无限增长
        if entry.is_empty() {
            buckets.remove(&key_owned);
        }
        // 当 bucket 过多时触发全量清理
        if buckets.len() > self.sweep_threshold {
            buckets.retain(|_, times| {
                times.retain(|t| now.duration_since(*t) < self.window);
                !times.is_empty()
            });
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_the_limit_within_the_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
        // 其他 key 互不影响
        assert!(limiter.allow("5.6.7.8").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_bucket() {
        let limiter = RateLimiter::new(1, Duration::from_millis(30));
        assert!(limiter.allow("k").await);
        assert!(!limiter.allow("k").await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.allow("k").await);
    }
}
