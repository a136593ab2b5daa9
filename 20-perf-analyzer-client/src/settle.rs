//! Waiting for a configuration write to become visible.
//!
//! The plugin acknowledges a toggle before the new state shows up in its
//! config endpoints, so a read straight after a write can return the old
//! state. Callers pick a [`Settle`] strategy instead of sleeping ad hoc.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::state::FeatureState;

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Read immediately.
    Immediate,
    /// Sleep once, then read whatever is there.
    Fixed(Duration),
    /// Read every `interval` until the state is accepted or `timeout` passes.
    Poll { interval: Duration, timeout: Duration },
}

impl Default for Settle {
    fn default() -> Self {
        Settle::Fixed(DEFAULT_SETTLE)
    }
}

impl Settle {
    pub fn poll(interval: Duration) -> Self {
        Settle::Poll {
            interval,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Runs `probe` according to the strategy and returns the state it read.
    ///
    /// `Immediate` and `Fixed` return the first read whether or not `accept`
    /// likes it. `Poll` fails with [`ClientError::NotConverged`] once the
    /// timeout passes without an accepted read. Probe errors are returned
    /// immediately.
    pub async fn wait_for<F, Fut, A>(&self, mut probe: F, accept: A) -> Result<FeatureState>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<FeatureState>>,
        A: Fn(&FeatureState) -> bool,
    {
        match *self {
            Settle::Immediate => probe().await,
            Settle::Fixed(delay) => {
                sleep(delay).await;
                probe().await
            }
            Settle::Poll { interval, timeout } => {
                let started = Instant::now();
                loop {
                    let state = probe().await?;
                    if accept(&state) {
                        return Ok(state);
                    }
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(?waited, %state, "state did not converge");
                        return Err(ClientError::NotConverged {
                            waited,
                            last: state,
                        });
                    }
                    debug!(%state, "state not settled yet");
                    sleep(interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::feature::Feature;

    fn enabled_after(reads: &Cell<u32>, threshold: u32) -> Result<FeatureState> {
        reads.set(reads.get() + 1);
        Ok(FeatureState::default().with(Feature::Pa, reads.get() >= threshold))
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_reads_once_after_the_delay() {
        let reads = &Cell::new(0);
        let started = Instant::now();
        let state = Settle::Fixed(Duration::from_millis(100))
            .wait_for(|| async move { enabled_after(reads, 3) }, |s| s.feature(Feature::Pa))
            .await
            .unwrap();

        assert_eq!(reads.get(), 1);
        assert!(!state.feature(Feature::Pa));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_the_first_accepted_state() {
        let reads = &Cell::new(0);
        let state = Settle::poll(Duration::from_millis(50))
            .wait_for(|| async move { enabled_after(reads, 3) }, |s| s.feature(Feature::Pa))
            .await
            .unwrap();

        assert_eq!(reads.get(), 3);
        assert!(state.feature(Feature::Pa));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_gives_up_with_the_last_state() {
        let reads = &Cell::new(0);
        let settle = Settle::Poll {
            interval: Duration::from_millis(100),
            timeout: Duration::from_millis(250),
        };
        let err = settle
            .wait_for(|| async move { enabled_after(reads, 100) }, |s| s.feature(Feature::Pa))
            .await
            .unwrap_err();

        match err {
            ClientError::NotConverged { waited, last } => {
                assert!(waited >= Duration::from_millis(250));
                assert_eq!(last, FeatureState::default());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(reads.get(), 4);
    }

    #[tokio::test]
    async fn probe_errors_are_not_retried() {
        let reads = &Cell::new(0);
        let err = Settle::poll(Duration::from_millis(1))
            .wait_for(
                || async move {
                    reads.set(reads.get() + 1);
                    Err(ClientError::UnknownFeature("x".into()))
                },
                |_| true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnknownFeature(_)));
        assert_eq!(reads.get(), 1);
    }
}
