// SPDX-License-Identifier: MIT OR Apache-2.0
//! hub-scheduler
#![warn(missing_docs)]
//!
//! The claim scheduler's hot path: `poll_and_claim` selects the best
//! dependency-ready, profile-compatible candidate and atomically claims it,
//! or returns a jittered backoff hint when nothing is available.

use hub_core::{Claim, RowId, RuntimeMode, Task, TaskStatus};
use hub_error::{ErrorCode, HubError};
use hub_store::state::{now_ms, State};
use rand::Rng;

const BACKOFF_BASE_MS: u64 = 200;
const BACKOFF_MAX_MS: u64 = 12_000;
/// `2^6 * 200ms = 12_800ms`, already past the cap — further doubling is
/// pointless, so the exponent is clamped here.
const BACKOFF_MAX_EXPONENT: u32 = 6;

/// Outcome of [`poll_and_claim`].
#[derive(Debug, Clone)]
pub struct PollResult {
    /// The claimed task, if one was available.
    pub task: Option<Task>,
    /// The claim issued for `task`, if any.
    pub claim: Option<Claim>,
    /// Backoff hint in milliseconds when nothing was claimed.
    pub retry_after_ms: Option<u64>,
    /// Whether `task` was claimable because its previous lease had expired.
    pub reclaimed: bool,
}

fn dependency_ready(state: &State, task: &Task) -> bool {
    task.depends_on.iter().all(|dep| {
        state
            .task(*dep)
            .is_some_and(|d| d.status == TaskStatus::Done)
    })
}

/// A task is claimable when it's in a non-terminal, not-yet-done status and
/// carries no live claim — this also re-admits a task whose previous lease
/// expired, mirroring `claims::claim`'s own acceptance set so a poll can
/// reclaim what a direct `claim_task` call could.
fn claimable_status(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked
    )
}

fn candidates<'a>(state: &'a State, agent_mode: RuntimeMode, now: i64) -> Vec<&'a Task> {
    state
        .tasks_iter()
        .filter(|t| claimable_status(t.status))
        .filter(|t| state.live_claim(t.id, now).is_none())
        .filter(|t| t.execution_mode.compatible_with(agent_mode))
        .collect()
}

fn rank(mut tasks: Vec<&Task>) -> Vec<&Task> {
    tasks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
    tasks
}

/// Jittered exponential backoff, bounded to `[200ms, 12s]`, keyed by the
/// agent's consecutive-empty-poll count.
fn backoff_ms(consecutive_empty_polls: u32) -> u64 {
    let exponent = consecutive_empty_polls.saturating_sub(1).min(BACKOFF_MAX_EXPONENT);
    let base = BACKOFF_BASE_MS.saturating_mul(1u64 << exponent).min(BACKOFF_MAX_MS);
    let jittered = rand::rng().random_range(0.75..=1.25) * base as f64;
    (jittered as u64).clamp(BACKOFF_BASE_MS, BACKOFF_MAX_MS)
}

/// Select and atomically claim the best candidate task for `agent_id`.
///
/// Ready candidates (all `depends_on` done) are preferred over unready
/// ones; within a partition, ties break by priority then creation order
/// (FIFO). A task whose previous lease has expired is re-admitted to the
/// candidate pool and reported via `reclaimed`. Returns
/// `{task: None, retry_after_ms: Some(_)}` when nothing is claimable.
///
/// # Errors
///
/// Returns [`ErrorCode::NotFound`] if `agent_id` has never registered.
pub fn poll_and_claim(
    state: &mut State,
    agent_id: &str,
    lease_seconds: u64,
) -> Result<PollResult, HubError> {
    let agent = state
        .agent(agent_id)
        .ok_or_else(|| HubError::new(ErrorCode::NotFound, format!("no agent {agent_id}")))?
        .clone();
    let now = now_ms();

    let all = candidates(state, agent.runtime_profile.mode, now);
    let (ready, unready): (Vec<&Task>, Vec<&Task>) =
        all.into_iter().partition(|t| dependency_ready(state, t));
    let pool = if !ready.is_empty() { ready } else { unready };
    let ranked = rank(pool);

    let Some(winner) = ranked.first().map(|t| t.id) else {
        let count = state.bump_poll_backoff(agent_id);
        return Ok(PollResult {
            task: None,
            claim: None,
            retry_after_ms: Some(backoff_ms(count)),
            reclaimed: false,
        });
    };

    let reclaimed = state.claim(winner).is_some_and(|c| c.is_expired(now));
    let claim = hub_store::claims::claim(state, winner, agent_id, lease_seconds)?;
    state.reset_poll_backoff(agent_id);
    let task = state.task(winner).cloned();

    Ok(PollResult {
        task,
        claim: Some(claim),
        retry_after_ms: None,
        reclaimed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{Priority, RuntimeProfile};
    use hub_store::tasks::{create_task, CreateTaskInput};
    use std::collections::BTreeSet;

    fn register(state: &mut State, id: &str, mode: RuntimeMode) {
        state.heartbeat(id, RuntimeProfile { mode, source: "test".into() });
    }

    fn task_input(title: &str, priority: Priority, depends_on: BTreeSet<RowId>) -> CreateTaskInput {
        CreateTaskInput {
            title: title.to_string(),
            description: "d".into(),
            created_by: "creator".into(),
            assigned_to: None,
            priority,
            namespace: None,
            depends_on,
            execution_mode: RuntimeMode::Any,
            consistency_mode_override: None,
        }
    }

    #[test]
    fn poll_returns_backoff_when_nothing_claimable() {
        let mut state = State::new();
        register(&mut state, "a1", RuntimeMode::Any);
        let result = poll_and_claim(&mut state, "a1", 60).unwrap();
        assert!(result.task.is_none());
        let ms = result.retry_after_ms.unwrap();
        assert!((200..=12_000).contains(&ms));
    }

    #[test]
    fn poll_prefers_ready_over_unready_and_priority_then_fifo() {
        let mut state = State::new();
        register(&mut state, "a2", RuntimeMode::Any);

        let b = create_task(&mut state, task_input("B", Priority::Medium, BTreeSet::new()), &[])
            .unwrap()
            .task;
        let mut c_deps = BTreeSet::new();
        c_deps.insert(b.id);
        let c = create_task(&mut state, task_input("C", Priority::Critical, c_deps), &[])
            .unwrap()
            .task;
        let d = create_task(&mut state, task_input("D", Priority::High, BTreeSet::new()), &[])
            .unwrap()
            .task;

        // C depends on B (not done yet) so it's unready; D and B are ready.
        // D outranks B on priority.
        let first = poll_and_claim(&mut state, "a2", 60).unwrap();
        assert_eq!(first.task.unwrap().id, d.id);

        hub_store::claims::release(
            &mut state,
            hub_store::claims::ReleaseInput {
                task_id: d.id,
                agent_id: "a2".into(),
                next_status: TaskStatus::Done,
                confidence: Some(0.95),
                verification_passed: Some(true),
                verified_by: None,
                evidence_refs: Some(vec!["ev".into()]),
                confidence_floor: 0.9,
            },
        )
        .unwrap();

        let second = poll_and_claim(&mut state, "a2", 60).unwrap();
        assert_eq!(second.task.unwrap().id, b.id);

        hub_store::claims::release(
            &mut state,
            hub_store::claims::ReleaseInput {
                task_id: b.id,
                agent_id: "a2".into(),
                next_status: TaskStatus::Done,
                confidence: Some(0.95),
                verification_passed: Some(true),
                verified_by: None,
                evidence_refs: Some(vec!["ev".into()]),
                confidence_floor: 0.9,
            },
        )
        .unwrap();

        let third = poll_and_claim(&mut state, "a2", 60).unwrap();
        assert_eq!(third.task.unwrap().id, c.id);
    }

    #[test]
    fn poll_skips_profile_incompatible_tasks() {
        let mut state = State::new();
        register(&mut state, "a1", RuntimeMode::Isolated);
        let mut input = task_input("t1", Priority::Medium, BTreeSet::new());
        input.execution_mode = RuntimeMode::Repo;
        create_task(&mut state, input, &[]).unwrap();

        let result = poll_and_claim(&mut state, "a1", 60).unwrap();
        assert!(result.task.is_none());
    }

    #[test]
    fn successful_claim_resets_backoff() {
        let mut state = State::new();
        register(&mut state, "a1", RuntimeMode::Any);
        let _ = poll_and_claim(&mut state, "a1", 60).unwrap();
        assert_eq!(state.poll_backoff("a1"), 1);

        create_task(&mut state, task_input("t1", Priority::Medium, BTreeSet::new()), &[]).unwrap();
        let result = poll_and_claim(&mut state, "a1", 60).unwrap();
        assert!(result.task.is_some());
        assert_eq!(state.poll_backoff("a1"), 0);
    }

    #[test]
    fn expired_lease_is_reported_as_reclaimed() {
        let mut state = State::new();
        register(&mut state, "a1", RuntimeMode::Any);
        create_task(&mut state, task_input("t1", Priority::Medium, BTreeSet::new()), &[]).unwrap();

        let first = poll_and_claim(&mut state, "a1", 0).unwrap();
        assert!(first.task.is_some());
        assert!(!first.reclaimed);

        let second = poll_and_claim(&mut state, "a1", 60).unwrap();
        assert_eq!(second.task.unwrap().id, first.claim.unwrap().task_id);
        assert!(second.reclaimed);
    }

    #[test]
    fn unknown_agent_rejected() {
        let mut state = State::new();
        let err = poll_and_claim(&mut state, "ghost", 60).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
