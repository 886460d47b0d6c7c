//! Health check convergence waiter
//!
//! Polls the health registry for a set of (service, check) pairs until all of
//! them have been passing for `green_count` consecutive polls.
//!
//! The deadline is `max_wait + interval * green_count` from the start: the
//! extra margin is the time a streak needs to build up once everything is
//! passing. When no streak is running and less than that margin is left,
//! convergence is out of reach and the wait stops early.

use crate::error::{FailedCheck, HealthError, HealthResult};
use crate::poll::{PollOutcome, PollTarget, PollTick, Poller};
use async_trait::async_trait;
use liquid_cluster::HealthRegistry;
use liquid_types::{HealthCheckKey, HealthChecks, HealthStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

/// Timing parameters of a convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Time allowed for checks to start passing.
    pub max_wait: Duration,
    pub interval: Duration,
    /// Consecutive fully-passing polls required.
    pub green_count: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            interval: Duration::from_secs(3),
            green_count: 6,
        }
    }
}

impl WaitConfig {
    /// Time a green streak needs to complete.
    pub fn green_window(&self) -> Duration {
        self.interval * self.green_count
    }

    /// Total time before the wait fails.
    pub fn budget(&self) -> Duration {
        self.max_wait + self.green_window()
    }
}

/// A successful wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    pub polls: u32,
    pub elapsed: Duration,
}

/// Waits for health checks to converge
pub struct ConvergenceWaiter {
    registry: Arc<dyn HealthRegistry>,
    config: WaitConfig,
}

type Snapshot = BTreeMap<HealthCheckKey, HealthStatus>;

impl ConvergenceWaiter {
    pub fn new(registry: Arc<dyn HealthRegistry>, config: WaitConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Block until every check in `checks` has converged.
    ///
    /// An empty set converges immediately without querying the registry.
    #[instrument(skip_all, fields(services = ?checks.keys().collect::<Vec<_>>()))]
    pub async fn wait(&self, checks: &HealthChecks) -> HealthResult<Convergence> {
        if checks.values().all(Vec::is_empty) {
            return Ok(Convergence {
                polls: 0,
                elapsed: Duration::ZERO,
            });
        }

        info!(services = ?checks.keys().collect::<Vec<_>>(), "Waiting for health checks");

        let poller = Poller::new(self.config.interval, self.config.budget());
        let mut state = ConvergenceState {
            registry: self.registry.as_ref(),
            checks,
            green_count: self.config.green_count,
            green_window: self.config.green_window(),
            started: poller.started(),
            streak: 0,
            polls: 0,
            last: BTreeMap::new(),
        };

        match poller.run(&mut state).await? {
            PollOutcome::Ready(()) => {
                let elapsed = poller.elapsed();
                info!(
                    elapsed_secs = elapsed.as_secs_f64(),
                    polls = state.polls,
                    "Checks green"
                );
                Ok(Convergence {
                    polls: state.polls,
                    elapsed,
                })
            }
            PollOutcome::GaveUp => {
                warn!(
                    elapsed_secs = poller.elapsed().as_secs_f64(),
                    "Not enough time left to reach the green streak"
                );
                Err(self.failure(&state, &poller).await)
            }
            PollOutcome::TimedOut => Err(self.failure(&state, &poller).await),
        }
    }

    /// Re-poll once and turn the final statuses into an error.
    async fn failure(&self, state: &ConvergenceState<'_>, poller: &Poller) -> HealthError {
        let snapshot = match snapshot(self.registry.as_ref(), state.checks).await {
            Ok(snapshot) => snapshot,
            Err(e) => return e.into(),
        };
        let elapsed = poller.elapsed();

        let failing: Vec<FailedCheck> = snapshot
            .into_iter()
            .filter(|(_, status)| !status.is_passing())
            .map(|(key, status)| FailedCheck { key, status })
            .collect();

        for check in &failing {
            error!(
                service = %check.key.service,
                check = %check.key.check,
                status = %check.status,
                elapsed_secs = elapsed.as_secs_f64(),
                "Check failed"
            );
        }

        let ambiguous: Vec<FailedCheck> = failing
            .iter()
            .filter(|c| c.status == HealthStatus::Ambiguous)
            .cloned()
            .collect();

        if ambiguous.is_empty() {
            HealthError::ConvergenceTimeout { elapsed, failing }
        } else {
            HealthError::AmbiguousHealthReport {
                elapsed,
                checks: ambiguous,
            }
        }
    }
}

/// Read the current status of every required check.
///
/// A check reported more than once with different statuses is ambiguous; a
/// required check the registry does not report is missing.
async fn snapshot(
    registry: &dyn HealthRegistry,
    checks: &HealthChecks,
) -> Result<Snapshot, liquid_cluster::ClusterError> {
    let mut result = Snapshot::new();

    for (service, required) in checks {
        let mut reported: BTreeMap<String, HealthStatus> = BTreeMap::new();
        for report in registry.checks(service).await? {
            reported
                .entry(report.name)
                .and_modify(|status| {
                    if *status != report.status {
                        *status = HealthStatus::Ambiguous;
                    }
                })
                .or_insert(report.status);
        }

        for check in required {
            let status = reported.get(check).copied().unwrap_or(HealthStatus::Missing);
            result.insert(HealthCheckKey::new(service.clone(), check.clone()), status);
        }
    }

    Ok(result)
}

struct ConvergenceState<'a> {
    registry: &'a dyn HealthRegistry,
    checks: &'a HealthChecks,
    green_count: u32,
    green_window: Duration,
    started: Instant,
    streak: u32,
    polls: u32,
    /// Last status of each check and when it last changed.
    last: BTreeMap<HealthCheckKey, (HealthStatus, Instant)>,
}

impl<'a> ConvergenceState<'a> {
    fn log_changes(&mut self, snapshot: &Snapshot, tick: &PollTick) {
        let now = Instant::now();

        for (key, status) in snapshot {
            let previous = self.last.get(key).copied();
            if previous.map(|(old, _)| old) == Some(*status) {
                continue;
            }

            let changed_at = previous.map(|(_, at)| at).unwrap_or(self.started);
            let since_change = now.saturating_duration_since(changed_at).as_secs_f64();
            let old = previous.map(|(old, _)| old.as_str()).unwrap_or("-");

            if status.is_passing() {
                info!(
                    service = %key.service,
                    check = %key.check,
                    old,
                    new = %status,
                    since_change_secs = since_change,
                    elapsed_secs = tick.elapsed.as_secs_f64(),
                    "Check status"
                );
            } else {
                warn!(
                    service = %key.service,
                    check = %key.check,
                    old,
                    new = %status,
                    since_change_secs = since_change,
                    elapsed_secs = tick.elapsed.as_secs_f64(),
                    "Check status"
                );
            }

            self.last.insert(key.clone(), (*status, now));
        }
    }
}

#[async_trait]
impl<'a> PollTarget for ConvergenceState<'a> {
    type Output = ();
    type Error = HealthError;

    async fn poll(&mut self, tick: &PollTick) -> HealthResult<Option<()>> {
        let snapshot = snapshot(self.registry, self.checks).await?;
        self.polls += 1;
        self.log_changes(&snapshot, tick);

        if snapshot.values().all(HealthStatus::is_passing) {
            self.streak += 1;
        } else {
            self.streak = 0;
        }

        Ok((self.streak >= self.green_count).then_some(()))
    }

    fn hopeless(&self, tick: &PollTick) -> bool {
        self.streak == 0 && tick.remaining < self.green_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquid_cluster::memory::InMemoryHealthRegistry;
    use liquid_types::CheckReport;

    fn passing(name: &str) -> CheckReport {
        CheckReport::new(name, HealthStatus::Passing)
    }

    fn critical(name: &str) -> CheckReport {
        CheckReport::new(name, HealthStatus::Critical)
    }

    fn checks(entries: &[(&str, &[&str])]) -> HealthChecks {
        entries
            .iter()
            .map(|(service, names)| {
                (
                    service.to_string(),
                    names.iter().map(|n| n.to_string()).collect(),
                )
            })
            .collect()
    }

    fn config(max_wait: u64, interval: u64, green_count: u32) -> WaitConfig {
        WaitConfig {
            max_wait: Duration::from_secs(max_wait),
            interval: Duration::from_secs(interval),
            green_count,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_passing_converges_in_green_count_polls() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![passing("http"), passing("db")]);
        registry.set("hoover-search", vec![passing("ping")]);

        let waiter = ConvergenceWaiter::new(registry.clone(), config(60, 3, 3));
        let result = waiter
            .wait(&checks(&[("core", &["http", "db"]), ("hoover-search", &["ping"])]))
            .await
            .unwrap();

        assert_eq!(result.polls, 3);
        assert_eq!(result.elapsed, Duration::from_secs(6));
        assert_eq!(registry.queries("core"), 3);
        assert_eq!(registry.queries("hoover-search"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streak_resets_on_failure() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.script(
            "core",
            vec![
                vec![passing("http")],
                vec![critical("http")],
                vec![passing("http")],
                vec![passing("http")],
            ],
        );

        let waiter = ConvergenceWaiter::new(registry.clone(), config(60, 3, 2));
        let result = waiter.wait(&checks(&[("core", &["http"])])).await.unwrap();

        assert_eq!(result.polls, 4);
        assert_eq!(result.elapsed, Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_critical_fails_within_budget() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![passing("http"), critical("db")]);

        let cfg = config(30, 3, 2);
        let waiter = ConvergenceWaiter::new(registry.clone(), cfg);
        let started = Instant::now();
        let err = waiter
            .wait(&checks(&[("core", &["http", "db"])]))
            .await
            .unwrap_err();

        assert!(started.elapsed() <= cfg.budget());
        match err {
            HealthError::ConvergenceTimeout { failing, .. } => {
                assert_eq!(
                    failing,
                    vec![FailedCheck {
                        key: HealthCheckKey::new("core", "db"),
                        status: HealthStatus::Critical,
                    }]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_when_streak_cannot_complete() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![critical("http")]);

        // Deadline at 36s; from 33s on fewer than 6s remain.
        let waiter = ConvergenceWaiter::new(registry.clone(), config(30, 3, 2));
        let started = Instant::now();
        waiter.wait(&checks(&[("core", &["http"])])).await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_secs(33));
        // Polls at 0, 3, ..., 33 plus the final re-poll.
        assert_eq!(registry.queries("core"), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_recovery_still_converges() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        let mut frames = vec![vec![critical("http")]; 5];
        frames.push(vec![passing("http")]);
        registry.script("core", frames);

        let waiter = ConvergenceWaiter::new(registry.clone(), config(30, 3, 3));
        let result = waiter.wait(&checks(&[("core", &["http"])])).await.unwrap();

        assert_eq!(result.polls, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_check_is_not_passing() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![passing("http")]);

        let waiter = ConvergenceWaiter::new(registry.clone(), config(6, 3, 1));
        let err = waiter
            .wait(&checks(&[("core", &["http", "db"])]))
            .await
            .unwrap_err();

        assert_eq!(
            err.failing_checks(),
            &[FailedCheck {
                key: HealthCheckKey::new("core", "db"),
                status: HealthStatus::Missing,
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_duplicates_are_ambiguous() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![passing("http"), critical("http")]);

        let waiter = ConvergenceWaiter::new(registry.clone(), config(6, 3, 1));
        let err = waiter.wait(&checks(&[("core", &["http"])])).await.unwrap_err();

        assert!(matches!(err, HealthError::AmbiguousHealthReport { .. }));
        assert_eq!(err.failing_checks()[0].status, HealthStatus::Ambiguous);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_duplicates_collapse() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        registry.set("core", vec![passing("http"), passing("http")]);

        let waiter = ConvergenceWaiter::new(registry.clone(), config(6, 3, 2));
        let result = waiter.wait(&checks(&[("core", &["http"])])).await.unwrap();
        assert_eq!(result.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_set_converges_without_polling() {
        let registry = Arc::new(InMemoryHealthRegistry::new());
        let waiter = ConvergenceWaiter::new(registry.clone(), WaitConfig::default());

        let result = waiter.wait(&HealthChecks::new()).await.unwrap();
        assert_eq!(result.polls, 0);

        let result = waiter.wait(&checks(&[("core", &[])])).await.unwrap();
        assert_eq!(result.polls, 0);
        assert_eq!(registry.queries("core"), 0);
    }

    #[test]
    fn test_budget() {
        let cfg = WaitConfig::default();
        assert_eq!(cfg.green_window(), Duration::from_secs(18));
        assert_eq!(cfg.budget(), Duration::from_secs(318));
    }
}
