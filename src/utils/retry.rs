//! 重试机制模块
//!
//! 以显式的策略对象表达重试，在调用点直接使用，不做隐式包装

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};

/// 重试策略
///
/// 以尝试次数（而非墙钟时间）作为预算；退避为固定倍数指数曲线，无抖动
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: usize,
    /// 首次退避时间
    pub backoff_min: Duration,
    /// 退避时间上限
    pub backoff_max: Duration,
    /// 退避倍数
    pub multiplier: u32,
}

impl RetryPolicy {
    /// 网络错误重试策略（3次，2秒起步，上限10秒）
    pub fn network() -> Self {
        Self {
            max_attempts: 3,
            backoff_min: Duration::from_secs(2),
            backoff_max: Duration::from_secs(10),
            multiplier: 2,
        }
    }

    /// 通知类调用重试策略（2次）
    pub fn notify() -> Self {
        Self {
            max_attempts: 2,
            backoff_min: Duration::from_secs(2),
            backoff_max: Duration::from_secs(10),
            multiplier: 2,
        }
    }

    /// 第 n 次失败后的退避时间（n 从 1 开始）
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let mut backoff = self.backoff_min;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(self.multiplier);
            if backoff >= self.backoff_max {
                return self.backoff_max;
            }
        }
        backoff.min(self.backoff_max)
    }

    /// 执行带重试的异步操作
    ///
    /// 仅对 `AppError::is_retryable`（网络/超时）错误重试；
    /// 其他错误立即向上传播
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(
                        "{} 失败，重试 {}/{}（{}秒后）: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        backoff.as_secs(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetworkError, ValidationError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn network_err() -> AppError {
        AppError::Network(NetworkError::BadStatus {
            url: "http://example.com".to_string(),
            status: 502,
        })
    }

    #[test]
    fn test_backoff_curve() {
        let policy = RetryPolicy::network();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(8));
        // 上限截断
        assert_eq!(policy.backoff_for(4), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(10), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(2),
            multiplier: 2,
        };
        let calls = AtomicUsize::new(0);

        let result: AppResult<u32> = tokio_test::block_on(policy.run("测试", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(network_err())
                } else {
                    Ok(42)
                }
            }
        }));

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_propagates_immediately() {
        let policy = RetryPolicy::network();
        let calls = AtomicUsize::new(0);

        let result: AppResult<u32> = tokio_test::block_on(policy.run("测试", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Validation(ValidationError::EmptySearchResults)) }
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_budget_exhausted() {
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_min: Duration::from_millis(1),
            backoff_max: Duration::from_millis(1),
            multiplier: 2,
        };
        let calls = AtomicUsize::new(0);

        let result: AppResult<u32> = tokio_test::block_on(policy.run("测试", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(network_err()) }
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
