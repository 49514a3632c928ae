//! Timeout-wrapped downstream invocation.

use std::future::Future;
use std::time::Duration;

use crate::core::error::InvokeError;

/// Wraps arbitrary async calls with a hard deadline.
///
/// Expiry drops the wrapped future, which cancels the underlying operation;
/// there is no grace period. The deadline elapsing is reported as
/// [`InvokeError::Elapsed`], the call's own failure as [`InvokeError::Call`].
#[derive(Debug, Clone, Copy)]
pub struct Invoker {
    timeout: Duration,
}

impl Invoker {
    /// Create an invoker applying `timeout` to each call.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Deadline applied to each call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under the hard deadline.
    pub async fn invoke<T, E, F>(&self, call: F) -> Result<T, InvokeError<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(InvokeError::Call(e)),
            Err(_) => {
                tracing::debug!(timeout = ?self.timeout, "downstream call timed out");
                Err(InvokeError::Elapsed(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn settles_before_deadline() {
        let invoker = Invoker::new(Duration::from_millis(100));
        let out: Result<u32, InvokeError<io::Error>> = invoker.invoke(async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn call_failure_passes_through() {
        let invoker = Invoker::new(Duration::from_millis(100));
        let out: Result<u32, InvokeError<io::Error>> = invoker
            .invoke(async { Err(io::Error::new(io::ErrorKind::ConnectionRefused, "nope")) })
            .await;
        assert!(matches!(out.unwrap_err(), InvokeError::Call(_)));
    }

    #[tokio::test]
    async fn slow_call_is_cut_off() {
        let invoker = Invoker::new(Duration::from_millis(20));
        let out: Result<u32, InvokeError<io::Error>> = invoker
            .invoke(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(
            out.unwrap_err(),
            InvokeError::Elapsed(d) if d == Duration::from_millis(20)
        ));
    }
}
