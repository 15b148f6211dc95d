use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{QiwiError, Result};
use crate::transport::TransportError;

/// Повтор запроса при временных сетевых сбоях.
///
/// Повторяются только ошибки транспорта, для которых
/// [`TransportError::is_transient`] возвращает `true`. HTTP-ответы с кодом
/// ошибки (404, 500 и т.д.) этот уровень не видит и не повторяет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Общее число попыток, включая первую.
    pub max_attempts: u32,
    /// Пауза перед второй попыткой.
    pub delay: Duration,
    /// Во сколько раз растет пауза после каждой неудачи (1 = фиксированная пауза).
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            multiplier: 1,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
            multiplier: 1,
        }
    }

    /// Единственная попытка, без повторов.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    /// Экспоненциальный рост паузы между попытками.
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Выполняет `operation` до успеха, постоянной ошибки или исчерпания попыток.
    ///
    /// Пауза выдерживается только между попытками, после последней ее нет.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.delay;
        let mut attempt = 1;

        loop {
            debug!(attempt, attempts, "dispatching request");
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(QiwiError::Transport(err)),
                Err(err) if attempt >= attempts => {
                    warn!(attempts, error = %err, "retry attempts exhausted");
                    return Err(QiwiError::RetryExhausted {
                        attempts,
                        last: err,
                    });
                }
                Err(err) => {
                    warn!(attempt, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(self.multiplier.max(1));
                    attempt += 1;
                }
            }
        }
    }
}
