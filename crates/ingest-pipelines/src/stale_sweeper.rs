//! Periodic stale-timeout sweeper (SPEC_FULL.md §2 supplement): spec.md
//! names the STALE state and its `mark_stale` transition (C8) but leaves the
//! periodic trigger external to the core. This walks a caller-supplied list
//! of known series ids — the router is what actually discovers series ids
//! as traffic arrives, so it owns that list.

use ingest_core::{OperationalState, StateMachine};
use ingest_storage::{ConfigLoader, ConstraintStateRepository, StateStore};

/// Default inactivity window after which a series is marked STALE.
pub const DEFAULT_STALE_TIMEOUT_SECONDS: f64 = 300.0;

pub struct StaleSweeper<'a, C: ConfigLoader, S: StateStore> {
    repository: &'a ConstraintStateRepository<C, S>,
    stale_timeout: f64,
}

impl<'a, C: ConfigLoader, S: StateStore> StaleSweeper<'a, C, S> {
    pub fn new(repository: &'a ConstraintStateRepository<C, S>, stale_timeout: f64) -> Self {
        Self {
            repository,
            stale_timeout,
        }
    }

    /// One sweep pass: marks every series in `series_ids` whose last reading
    /// is older than `stale_timeout` as STALE, if it was previously live.
    /// Returns the series ids that actually transitioned.
    pub async fn sweep_once(&self, series_ids: &[String], now: f64) -> Vec<String> {
        let mut transitioned = Vec::new();
        for series_id in series_ids {
            let mut state = self.repository.get_state(series_id, now).await;
            let Some(last_timestamp) = state.last_timestamp else {
                continue;
            };
            if now - last_timestamp < self.stale_timeout {
                continue;
            }
            if !matches!(
                state.state,
                OperationalState::Normal | OperationalState::Warning | OperationalState::Alert
            ) {
                continue;
            }
            let outcome = StateMachine::mark_stale(&mut state, now);
            if outcome.changed {
                tracing::info!(series_id, "series marked stale after inactivity");
                if self.repository.save_state(&state).await.is_ok() {
                    transitioned.push(series_id.clone());
                }
            }
        }
        transitioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::SeriesState;
    use ingest_storage::{InMemoryConfigLoader, InMemoryStateStore};

    #[tokio::test]
    async fn marks_inactive_series_stale() {
        let repo = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let mut state = SeriesState::new("s1", 0.0);
        state.state = OperationalState::Normal;
        state.last_timestamp = Some(0.0);
        repo.save_state(&state).await.unwrap();

        let sweeper = StaleSweeper::new(&repo, DEFAULT_STALE_TIMEOUT_SECONDS);
        let transitioned = sweeper.sweep_once(&["s1".to_string()], 1_000.0).await;
        assert_eq!(transitioned, vec!["s1".to_string()]);

        let reloaded = repo.get_state("s1", 1_000.0).await;
        assert_eq!(reloaded.state, OperationalState::Stale);
    }

    #[tokio::test]
    async fn recently_active_series_is_untouched() {
        let repo = ConstraintStateRepository::new(InMemoryConfigLoader::new(), InMemoryStateStore::new());
        let mut state = SeriesState::new("s1", 0.0);
        state.state = OperationalState::Normal;
        state.last_timestamp = Some(990.0);
        repo.save_state(&state).await.unwrap();

        let sweeper = StaleSweeper::new(&repo, DEFAULT_STALE_TIMEOUT_SECONDS);
        let transitioned = sweeper.sweep_once(&["s1".to_string()], 1_000.0).await;
        assert!(transitioned.is_empty());
    }
}
