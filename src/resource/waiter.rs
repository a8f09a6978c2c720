//! State Waiter
//!
//! Turns the provider's eventually consistent status into a synchronous
//! checkpoint: poll until the target status, a terminal error status, or the
//! attempt budget runs out.

use super::error::ResourceError;
use super::provider::{ProviderClient, ResourceHandle, Sleeper, TokioSleeper};
use std::num::NonZeroU32;
use std::time::Duration;

/// What to wait for and how long
///
/// `max_attempts * interval` bounds the total time spent sleeping.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec {
    pub target_status: String,
    pub max_attempts: NonZeroU32,
    pub interval: Duration,
}

impl WaitSpec {
    pub const DEFAULT_ATTEMPTS: NonZeroU32 = match NonZeroU32::new(10) {
        Some(n) => n,
        None => unreachable!(),
    };
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    pub fn new(target_status: &str, max_attempts: NonZeroU32, interval: Duration) -> Self {
        Self {
            target_status: target_status.to_string(),
            max_attempts,
            interval,
        }
    }

    /// Default budget: 10 attempts, 2 seconds apart
    pub fn for_status(target_status: &str) -> Self {
        Self::new(target_status, Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }

    /// Upper bound on time spent sleeping between polls
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.get()
    }
}

/// Result of a wait that did not fail
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    /// Last fetched state of the resource
    pub handle: ResourceHandle,
    /// `false` when the attempt budget ran out first
    pub reached_target: bool,
}

/// Polls one provider for status transitions
pub struct StateWaiter<'a, P: ?Sized, S = TokioSleeper> {
    provider: &'a P,
    terminal_statuses: &'a [String],
    sleeper: S,
}

impl<'a, P: ProviderClient + ?Sized> StateWaiter<'a, P> {
    /// Waiter that treats `terminal_statuses` as unrecoverable
    pub fn new(provider: &'a P, terminal_statuses: &'a [String]) -> Self {
        Self {
            provider,
            terminal_statuses,
            sleeper: TokioSleeper,
        }
    }
}

impl<'a, P: ProviderClient + ?Sized, S: Sleeper> StateWaiter<'a, P, S> {
    /// Replace the sleep function (tests inject one that returns at once)
    pub fn with_sleeper<T: Sleeper>(self, sleeper: T) -> StateWaiter<'a, P, T> {
        StateWaiter {
            provider: self.provider,
            terminal_statuses: self.terminal_statuses,
            sleeper,
        }
    }

    /// Poll `resource_id` until it reaches `spec.target_status`
    ///
    /// Running out of attempts is a normal outcome (`reached_target ==
    /// false`) and is logged as a warning. A terminal error status fails
    /// with [`ResourceError::Errored`] on whichever attempt observes it.
    pub async fn wait_until(
        &self,
        resource_id: &str,
        spec: &WaitSpec,
    ) -> Result<WaitOutcome, ResourceError> {
        let kind = self.provider.kind();
        let mut attempt = 0u32;

        loop {
            let handle = self
                .provider
                .fetch_by_id(resource_id)
                .await?
                .ok_or_else(|| ResourceError::not_found(kind, resource_id))?;

            if self.terminal_statuses.contains(&handle.status) {
                tracing::error!(
                    kind = %kind,
                    id = %resource_id,
                    status = %handle.status,
                    "Resource entered terminal error state"
                );
                return Err(ResourceError::Errored {
                    kind: kind.to_string(),
                    id: resource_id.to_string(),
                    status: handle.status,
                });
            }

            if handle.status == spec.target_status {
                tracing::debug!(
                    kind = %kind,
                    id = %resource_id,
                    attempt = attempt + 1,
                    "Resource reached status {}",
                    spec.target_status
                );
                return Ok(WaitOutcome {
                    handle,
                    reached_target: true,
                });
            }

            attempt += 1;
            if attempt >= spec.max_attempts.get() {
                tracing::warn!(
                    "{} {} current state: '{}', expected state: '{}'",
                    kind,
                    resource_id,
                    handle.status,
                    spec.target_status
                );
                return Ok(WaitOutcome {
                    handle,
                    reached_target: false,
                });
            }

            tracing::debug!(
                kind = %kind,
                id = %resource_id,
                attempt = attempt,
                status = %handle.status,
                "Waiting for status {}",
                spec.target_status
            );
            self.sleeper.sleep(spec.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fake::{handle, FakeProvider, RecordingSleeper};

    const VOLUME_ID: &str = "6d1b8c7e-3f0a-4b4e-9a57-2f1c9d0e8a11";

    fn terminal() -> Vec<String> {
        vec!["error".to_string(), "error_deleting".to_string()]
    }

    fn spec(attempts: u32) -> WaitSpec {
        WaitSpec::new(
            "available",
            NonZeroU32::new(attempts).unwrap(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_reaches_target_after_transitions() {
        let provider = FakeProvider::new("volume")
            .with(handle(VOLUME_ID, "data", "creating"))
            .script(VOLUME_ID, &["creating", "creating", "available"]);
        let sleeper = RecordingSleeper::default();
        let terminal = terminal();
        let waiter = StateWaiter::new(&provider, &terminal).with_sleeper(&sleeper);

        let outcome = waiter.wait_until(VOLUME_ID, &spec(5)).await.unwrap();

        assert!(outcome.reached_target);
        assert_eq!(outcome.handle.status, "available");
        assert_eq!(provider.fetch_calls(), 3);
        assert_eq!(sleeper.count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_not_an_error() {
        let provider = FakeProvider::new("volume")
            .with(handle(VOLUME_ID, "data", "creating"))
            .script(VOLUME_ID, &["creating"]);
        let sleeper = RecordingSleeper::default();
        let terminal = terminal();
        let waiter = StateWaiter::new(&provider, &terminal).with_sleeper(&sleeper);

        let outcome = waiter.wait_until(VOLUME_ID, &spec(3)).await.unwrap();

        assert!(!outcome.reached_target);
        assert_eq!(outcome.handle.status, "creating");
        assert_eq!(provider.fetch_calls(), 3);
        // No sleep after the final attempt
        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.total(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_error_status_fails_immediately() {
        let provider = FakeProvider::new("volume")
            .with(handle(VOLUME_ID, "data", "creating"))
            .script(VOLUME_ID, &["creating", "error", "available"]);
        let sleeper = RecordingSleeper::default();
        let terminal = terminal();
        let waiter = StateWaiter::new(&provider, &terminal).with_sleeper(&sleeper);

        let err = waiter.wait_until(VOLUME_ID, &spec(10)).await.unwrap_err();

        match err {
            ResourceError::Errored { id, status, .. } => {
                assert_eq!(id, VOLUME_ID);
                assert_eq!(status, "error");
            }
            other => panic!("expected Errored, got {other:?}"),
        }
        assert_eq!(provider.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_error_on_first_attempt_with_single_attempt_budget() {
        let provider =
            FakeProvider::new("volume").with(handle(VOLUME_ID, "data", "error_deleting"));
        let terminal = terminal();
        let waiter =
            StateWaiter::new(&provider, &terminal).with_sleeper(RecordingSleeper::default());

        let err = waiter.wait_until(VOLUME_ID, &spec(1)).await.unwrap_err();
        assert!(matches!(err, ResourceError::Errored { .. }));
    }

    #[tokio::test]
    async fn test_single_attempt_never_sleeps() {
        let provider = FakeProvider::new("volume").with(handle(VOLUME_ID, "data", "creating"));
        let sleeper = RecordingSleeper::default();
        let terminal = terminal();
        let waiter = StateWaiter::new(&provider, &terminal).with_sleeper(&sleeper);

        let outcome = waiter.wait_until(VOLUME_ID, &spec(1)).await.unwrap();
        assert!(!outcome.reached_target);
        assert_eq!(provider.fetch_calls(), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_vanished_resource_is_not_found() {
        let provider = FakeProvider::new("volume");
        let terminal = terminal();
        let waiter =
            StateWaiter::new(&provider, &terminal).with_sleeper(RecordingSleeper::default());

        let err = waiter.wait_until(VOLUME_ID, &spec(3)).await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
    }

    #[test]
    fn test_default_spec_budget() {
        let spec = WaitSpec::for_status("available");
        assert_eq!(spec.max_attempts.get(), 10);
        assert_eq!(spec.max_wait(), Duration::from_secs(20));
    }
}
