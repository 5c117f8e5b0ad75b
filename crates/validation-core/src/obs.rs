//! Structured observability hooks for the validation lifecycle.
//!
//! - `case_span`: span tagging everything logged during one test case,
//!   attached to the case's future with `Instrument`
//! - `emit_*`: one function per lifecycle event, all at `info!` except
//!   failures and cleanup problems
//!
//! Set `RUST_LOG=validation_core=debug` to also see every poll.

use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::profile::Trigger;

pub fn case_span(case_id: Uuid, trigger: Trigger, repository: &str) -> Span {
    tracing::info_span!(
        "validation.case",
        case_id = %case_id,
        trigger = trigger.name(),
        repository = %repository,
    )
}

pub fn emit_case_started(case_id: Uuid, trigger: Trigger) {
    info!(event = "case.started", case_id = %case_id, trigger = trigger.name());
}

pub fn emit_build_triggered(trigger: Trigger, pr: Option<u64>) {
    info!(event = "build.triggered", trigger = trigger.name(), pr = ?pr);
}

pub fn emit_build_found(project: &str, build_id: u64, previous_count: usize) {
    info!(
        event = "build.found",
        project = %project,
        build_id = build_id,
        previous_count = previous_count,
    );
}

pub fn emit_build_state(build_id: u64, state: &str) {
    info!(event = "build.state", build_id = build_id, state = %state);
}

/// A phase recorded a failure line.
pub fn emit_phase_failure(phase: &str, message: &str) {
    warn!(event = "phase.failure", phase = %phase, message = %message.trim_end());
}

pub fn emit_case_finished(case_id: Uuid, passed: bool, failure_entries: usize) {
    info!(
        event = "case.finished",
        case_id = %case_id,
        passed = passed,
        failure_entries = failure_entries,
    );
}

/// Best-effort cleanup or reporting step failed.
pub fn emit_cleanup_error(step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "case.cleanup_error", step = %step, error = %error);
}
