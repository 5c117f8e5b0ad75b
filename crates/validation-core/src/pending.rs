//! Waiting for the deployment's statuses to appear and get picked up.

use std::collections::BTreeSet;

use tracing::debug;

use crate::clock::Deadline;
use crate::error::{Result, ValidationError};
use crate::model::Status;
use crate::run::ValidationRun;
use crate::test_case::TestCase;

/// Where the pending watch stands after a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingState {
    /// Nothing reported yet.
    NoStatuses,
    /// Statuses seen so far, all still queued last time we looked.
    Queued(BTreeSet<String>),
    /// A status seen on an earlier poll has left the queued state.
    Started,
}

impl PendingState {
    /// Fold one poll's statuses into the state.
    ///
    /// A status only counts as started once it was seen on an earlier poll,
    /// so the first observation of any status never ends the watch.
    pub fn advance(self, statuses: &[Status]) -> Self {
        match self {
            PendingState::Started => PendingState::Started,
            PendingState::NoStatuses if statuses.is_empty() => PendingState::NoStatuses,
            PendingState::NoStatuses => {
                PendingState::Queued(statuses.iter().map(|s| s.name.clone()).collect())
            }
            PendingState::Queued(mut seen) => {
                let started = statuses
                    .iter()
                    .any(|s| seen.contains(&s.name) && !s.state.is_queued());
                if started {
                    return PendingState::Started;
                }
                seen.extend(statuses.iter().map(|s| s.name.clone()));
                PendingState::Queued(seen)
            }
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, PendingState::Started)
    }
}

impl ValidationRun {
    /// Poll until the deployment's statuses show up and one of them moves past
    /// queued. Never runs past the pending window.
    pub async fn watch_pending(&self, case: &mut TestCase) -> Result<()> {
        let commit = case
            .head_commit
            .clone()
            .ok_or(ValidationError::MissingHeadCommit)?;
        let deadline = Deadline::after(self.clock.as_ref(), self.config.pending_timeout());
        let mut state = PendingState::NoStatuses;

        loop {
            let statuses = self.deployment_statuses(&commit).await.unwrap_or_default();
            state = state.advance(&statuses);
            debug!(?state, count = statuses.len(), "pending poll");

            if state.is_started() {
                return Ok(());
            }
            if deadline.expired(self.clock.as_ref()) {
                let kind = self.forge.kind();
                let message = format!(
                    "{} {} were not set to queued in time {}.",
                    kind.name(),
                    kind.status_noun(),
                    deadline.describe()
                );
                self.record_failure(case, "pending", message);
                return Ok(());
            }
            self.pause(self.config.pending_interval(), &deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusState;

    fn status(name: &str, state: StatusState) -> Status {
        Status {
            name: name.to_string(),
            owner: "Packit-as-a-Service".to_string(),
            state,
            message: String::new(),
        }
    }

    #[test]
    fn test_first_sighting_never_starts() {
        let state = PendingState::NoStatuses.advance(&[status("rpm-build", StatusState::Success)]);
        assert!(matches!(state, PendingState::Queued(_)));
    }

    #[test]
    fn test_seen_status_leaving_queue_starts() {
        let state = PendingState::NoStatuses
            .advance(&[])
            .advance(&[status("rpm-build", StatusState::Queued)])
            .advance(&[status("rpm-build", StatusState::Queued)]);
        assert!(!state.is_started());

        let state = state.advance(&[status("rpm-build", StatusState::InProgress)]);
        assert!(state.is_started());
    }

    #[test]
    fn test_new_status_does_not_start() {
        let state = PendingState::NoStatuses
            .advance(&[status("rpm-build:fedora-rawhide", StatusState::Queued)])
            .advance(&[
                status("rpm-build:fedora-rawhide", StatusState::Queued),
                status("rpm-build:fedora-40", StatusState::Success),
            ]);
        assert!(!state.is_started());

        let state = state.advance(&[status("rpm-build:fedora-40", StatusState::Success)]);
        assert!(state.is_started());
    }

    #[test]
    fn test_started_is_sticky() {
        let state = PendingState::Started.advance(&[]);
        assert!(state.is_started());
    }
}
