// ABOUTME: Readiness polling for freshly started containers.
// ABOUTME: Starting -> Probing -> Healthy | Unhealthy | TimedOut, with prompt exit on cancellation.

use crate::config::{HealthProbe, ProbeTarget};
use crate::runtime::{ProbeError, ProbeOps};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Terminal verdict of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    /// `retries` consecutive probes failed.
    Unhealthy,
    /// The cumulative `timeout` elapsed first.
    TimedOut,
    /// The plan run was cancelled while probing.
    Cancelled,
}

impl HealthStatus {
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Unhealthy => f.write_str("unhealthy"),
            HealthStatus::TimedOut => f.write_str("timed-out"),
            HealthStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Starting,
    Probing { attempt: u32, failures: u32 },
    Done(HealthStatus),
}

/// Polls one container's probe until a verdict is reached.
#[derive(Debug)]
pub struct HealthChecker<'a> {
    container: &'a str,
    probe: &'a HealthProbe,
}

impl<'a> HealthChecker<'a> {
    pub fn new(container: &'a str, probe: &'a HealthProbe) -> Self {
        Self { container, probe }
    }

    /// The first probe runs immediately. Each attempt is bounded by the time
    /// left before `timeout`; between attempts the checker sleeps `interval`.
    pub async fn wait<R>(&self, runtime: &R, cancel: &CancellationToken) -> HealthStatus
    where
        R: ProbeOps + ?Sized,
    {
        let started = Instant::now();
        let mut state = State::Starting;
        tracing::debug!(container = %self.container, probe = %self.probe.target, "health check starting");

        loop {
            state = match state {
                State::Starting => State::Probing {
                    attempt: 0,
                    failures: 0,
                },
                State::Probing { attempt, failures } => {
                    self.step(runtime, cancel, started, attempt, failures).await
                }
                State::Done(status) => {
                    self.log_verdict(status, started.elapsed());
                    return status;
                }
            };
        }
    }

    async fn step<R: ProbeOps + ?Sized>(
        &self,
        runtime: &R,
        cancel: &CancellationToken,
        started: Instant,
        attempt: u32,
        failures: u32,
    ) -> State {
        let Some(remaining) = self.remaining(started) else {
            return State::Done(HealthStatus::TimedOut);
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return State::Done(HealthStatus::Cancelled),
            outcome = tokio::time::timeout(remaining, self.probe_once(runtime)) => outcome,
        };
        let attempt = attempt + 1;

        match outcome {
            Ok(Ok(true)) => return State::Done(HealthStatus::Healthy),
            Ok(Ok(false)) => {
                tracing::debug!(container = %self.container, attempt, "probe failed");
            }
            Ok(Err(e)) => {
                tracing::debug!(container = %self.container, attempt, error = %e, "probe could not run");
            }
            Err(_) => {
                tracing::debug!(container = %self.container, attempt, "probe exceeded remaining time");
            }
        }

        let failures = failures + 1;
        if self.probe.retries.is_some_and(|limit| failures >= limit) {
            return State::Done(HealthStatus::Unhealthy);
        }

        let Some(remaining) = self.remaining(started) else {
            return State::Done(HealthStatus::TimedOut);
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return State::Done(HealthStatus::Cancelled),
            _ = tokio::time::sleep(self.probe.interval.min(remaining)) => {}
        }
        State::Probing { attempt, failures }
    }

    /// Time left in the budget, `None` once exhausted.
    fn remaining(&self, started: Instant) -> Option<Duration> {
        self.probe
            .timeout
            .checked_sub(started.elapsed())
            .filter(|d| !d.is_zero())
    }

    async fn probe_once<R: ProbeOps + ?Sized>(&self, runtime: &R) -> Result<bool, ProbeError> {
        match &self.probe.target {
            ProbeTarget::Http { path, port } => runtime.probe_http(self.container, path, *port).await,
            ProbeTarget::Tcp { port } => runtime.probe_tcp(self.container, *port).await,
            ProbeTarget::Udp { port } => runtime.probe_udp(self.container, *port).await,
        }
    }

    fn log_verdict(&self, status: HealthStatus, elapsed: Duration) {
        if status.is_healthy() {
            tracing::info!(container = %self.container, ?elapsed, "container healthy");
        } else {
            tracing::warn!(container = %self.container, %status, ?elapsed, "container not healthy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Answers HTTP probes from a script; an empty script means "not ready".
    struct Scripted {
        answers: Mutex<VecDeque<Result<bool, ProbeError>>>,
        delay: Duration,
        calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<bool, ProbeError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ProbeOps for Scripted {
        async fn probe_http(&self, _: &str, _: &str, _: u16) -> Result<bool, ProbeError> {
            self.calls.lock().push(Instant::now());
            tokio::time::sleep(self.delay).await;
            self.answers.lock().pop_front().unwrap_or(Ok(false))
        }

        async fn probe_tcp(&self, c: &str, p: u16) -> Result<bool, ProbeError> {
            self.probe_http(c, "/", p).await
        }

        async fn probe_udp(&self, c: &str, p: u16) -> Result<bool, ProbeError> {
            self.probe_http(c, "/", p).await
        }
    }

    fn probe() -> HealthProbe {
        HealthProbe::http("/health", 8080)
            .with_timeout(Duration::from_secs(60))
            .with_interval(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_after_a_few_failures() {
        let runtime = Scripted::new(vec![Ok(false), Err(ProbeError::NotRunning("api".into())), Ok(true)]);
        let probe = probe();
        let status = HealthChecker::new("api", &probe)
            .wait(&runtime, &CancellationToken::new())
            .await;
        assert_eq!(status, HealthStatus::Healthy);
        assert_eq!(runtime.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_budget() {
        let runtime = Scripted::new(vec![]);
        let probe = probe();
        let started = Instant::now();
        let status = HealthChecker::new("api", &probe)
            .wait(&runtime, &CancellationToken::new())
            .await;
        assert_eq!(status, HealthStatus::TimedOut);
        // Probes at 0s, 5s, ..., 55s.
        assert_eq!(runtime.calls(), 12);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_when_retries_exhausted_first() {
        let runtime = Scripted::new(vec![]);
        let probe = probe().with_retries(3);
        let status = HealthChecker::new("api", &probe)
            .wait(&runtime, &CancellationToken::new())
            .await;
        assert_eq!(status, HealthStatus::Unhealthy);
        assert_eq!(runtime.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_is_cut_at_the_deadline() {
        let mut runtime = Scripted::new(vec![Ok(true)]);
        runtime.delay = Duration::from_secs(120);
        let probe = probe();
        let started = Instant::now();
        let status = HealthChecker::new("api", &probe)
            .wait(&runtime, &CancellationToken::new())
            .await;
        assert_eq!(status, HealthStatus::TimedOut);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_sleep() {
        let runtime = Scripted::new(vec![]);
        let probe = probe();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let status = HealthChecker::new("api", &probe).wait(&runtime, &cancel).await;
        assert_eq!(status, HealthStatus::Cancelled);
        assert_eq!(started.elapsed(), Duration::from_secs(7));
        assert_eq!(runtime.calls(), 2);
    }
}
