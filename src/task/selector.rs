//! Least-loaded worker selection with randomized tie-break.

use rand::Rng;
use rand::seq::SliceRandom;

use super::model::{Task, WorkerNode};

/// Number of `pending`/`running` tasks attributed to `worker` in `snapshot`.
pub fn active_load(worker: &WorkerNode, snapshot: &[Task]) -> usize {
    snapshot
        .iter()
        .filter(|t| t.agent_id == worker.id && t.status.is_active())
        .count()
}

/// Pick the least-loaded worker, breaking ties uniformly at random.
///
/// Operates on an already-taken snapshot and never touches the registry.
/// Returns `None` for an empty roster.
pub fn select_worker(roster: &[WorkerNode], snapshot: &[Task]) -> Option<WorkerNode> {
    select_worker_with(&mut rand::thread_rng(), roster, snapshot)
}

/// [`select_worker`] with a caller-supplied RNG.
pub fn select_worker_with<R: Rng + ?Sized>(
    rng: &mut R,
    roster: &[WorkerNode],
    snapshot: &[Task],
) -> Option<WorkerNode> {
    let mut min_load = usize::MAX;
    let mut candidates: Vec<&WorkerNode> = Vec::with_capacity(roster.len());

    for worker in roster {
        let load = active_load(worker, snapshot);
        if load < min_load {
            min_load = load;
            candidates.clear();
            candidates.push(worker);
        } else if load == min_load {
            candidates.push(worker);
        }
    }

    candidates.choose(rng).map(|w| (*w).clone())
}
