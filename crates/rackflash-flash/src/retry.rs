//! Bounded reconnection

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FlashError, FlashResult};
use crate::provider::{DiagnosticSession, ProviderError};

/// Fixed-backoff retry budget for reopening the transport.
///
/// The backoff is waited before every attempt, the first one included: the
/// unit needs time to bring its transport back up after a session change or
/// erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Clear the channel and reopen it on `bus`, retrying transport failures.
    ///
    /// Returns the number of attempts used. Non-transport failures are not
    /// retried. On exhaustion the last transport error is kept as the source.
    pub async fn reopen<S>(&self, session: &mut S, bus: u8) -> FlashResult<u32>
    where
        S: DiagnosticSession + ?Sized,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.backoff).await;
            debug!(attempt, max = self.max_attempts, bus, "Reconnecting");

            let result = match session.clear_channel().await {
                Ok(()) => session.open(bus).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => return Ok(attempt),
                Err(e) if e.is_transport() => {
                    warn!(attempt, max = self.max_attempts, error = %e, "Reconnect attempt failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(FlashError::Diagnostic {
                        step: "reconnect",
                        source: e,
                    })
                }
            }
        }

        Err(FlashError::Transport {
            attempts: self.max_attempts,
            source: last_error
                .unwrap_or_else(|| ProviderError::Transport("no attempts allowed".to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCall, SimulatedEcu};
    use tokio::time::Instant;

    const BACKOFF: Duration = Duration::from_millis(1000);

    /// A unit whose first open already happened, so later opens are reopens
    async fn opened(ecu: SimulatedEcu) -> SimulatedEcu {
        let mut handle = ecu.clone();
        handle.open(1).await.unwrap();
        ecu
    }

    fn opens(ecu: &SimulatedEcu) -> usize {
        ecu.count(|c| matches!(c, SimCall::Open { .. }))
    }

    /// Paused clock: elapsed time is the sum of the backoffs waited
    fn assert_waited(start: Instant, backoffs: u32) {
        let elapsed = start.elapsed();
        assert!(elapsed >= BACKOFF * backoffs, "waited {:?}", elapsed);
        assert!(elapsed < BACKOFF * (backoffs + 1), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transport_error_is_not_retried() {
        let ecu = opened(SimulatedEcu::new(0x10).with_reopen_error(ProviderError::Rejected {
            service: 0x10,
            code: 0x22,
            reason: "conditions not correct".to_string(),
        }))
        .await;
        let policy = RetryPolicy::new(5, BACKOFF);
        let start = Instant::now();

        let err = policy.reopen(&mut ecu.clone(), 1).await.unwrap_err();

        assert!(matches!(
            err,
            FlashError::Diagnostic {
                step: "reconnect",
                source: ProviderError::Rejected { code: 0x22, .. },
            }
        ));
        assert_eq!(opens(&ecu), 2);
        assert_waited(start, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_retrying() {
        let ecu = opened(SimulatedEcu::new(0x10).with_reopen_failures(2)).await;
        let policy = RetryPolicy::new(5, BACKOFF);
        let start = Instant::now();

        let attempts = policy.reopen(&mut ecu.clone(), 1).await.unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(opens(&ecu), 1 + 3);
        assert_eq!(ecu.count(|c| *c == SimCall::ClearChannel), 3);
        assert_waited(start, 3);
        assert!(ecu.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_last_transport_error() {
        let ecu = opened(
            SimulatedEcu::new(0x10)
                .with_reopen_failures(3)
                .with_reopen_error(ProviderError::Transport("bus off".to_string())),
        )
        .await;
        let policy = RetryPolicy::new(4, BACKOFF);
        let start = Instant::now();

        let err = policy.reopen(&mut ecu.clone(), 1).await.unwrap_err();

        match err {
            FlashError::Transport { attempts, source } => {
                assert_eq!(attempts, 4);
                assert_eq!(source, ProviderError::Transport("bus off".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(opens(&ecu), 1 + 4);
        // Backoff is waited before every attempt, the first one included
        assert_waited(start, 4);
    }

    #[tokio::test]
    async fn zero_attempts_never_touches_the_channel() {
        let ecu = opened(SimulatedEcu::new(0x10)).await;
        let policy = RetryPolicy::new(0, Duration::ZERO);

        let err = policy.reopen(&mut ecu.clone(), 1).await.unwrap_err();

        assert!(matches!(err, FlashError::Transport { attempts: 0, .. }));
        assert_eq!(opens(&ecu), 1);
    }
}
