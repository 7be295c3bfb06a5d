//! Bounding probe steps by cancellation and deadlines.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Interruption is reported as a value, never as a panic
//! - The wrapped future is dropped on interruption, which releases whatever it owns

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::cancellation::CancellationToken;

/// Why a bounded operation did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// The caller's cancellation token fired.
    #[error("was cancelled")]
    Cancelled,

    /// The deadline elapsed first.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Race `fut` against `token` and an optional deadline.
///
/// A token that is already cancelled wins before `fut` is polled.
pub async fn with_cancellation<F, T>(
    fut: F,
    token: &CancellationToken,
    deadline: Option<Duration>,
) -> Result<T, Interrupt>
where
    F: Future<Output = T>,
{
    if token.is_cancelled() {
        return Err(Interrupt::Cancelled);
    }

    let bounded = async {
        match deadline {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Interrupt::TimedOut(limit)),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupt::Cancelled),
        outcome = bounded => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_when_not_interrupted() {
        let token = CancellationToken::new();
        let value = with_cancellation(async { 7 }, &token, Some(Duration::from_secs(1))).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test]
    async fn deadline_elapses() {
        let token = CancellationToken::new();
        let outcome = with_cancellation(
            tokio::time::sleep(Duration::from_secs(5)),
            &token,
            Some(Duration::from_millis(20)),
        )
        .await;
        assert_eq!(outcome, Err(Interrupt::TimedOut(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn cancel_during_wait() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome =
            with_cancellation(tokio::time::sleep(Duration::from_secs(5)), &token, None).await;
        assert_eq!(outcome, Err(Interrupt::Cancelled));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_future() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = with_cancellation(std::future::ready(()), &token, None).await;
        assert_eq!(outcome, Err(Interrupt::Cancelled));
    }

    #[test]
    fn interrupt_display() {
        assert_eq!(Interrupt::Cancelled.to_string(), "was cancelled");
        assert!(Interrupt::TimedOut(Duration::from_secs(3))
            .to_string()
            .contains("3s"));
    }
}
