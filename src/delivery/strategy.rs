//! Pure strategy rules: attempt order, when to stop, and the terminal status.

use crate::domain::{MessageStatus, Routing, SendingStrategy};

/// Order routes for attempting.
///
/// Broadcast keeps the loaded order. Failover sorts by priority, highest
/// first; equal priorities keep their loaded order.
pub fn plan_attempts(strategy: SendingStrategy, mut routings: Vec<Routing>) -> Vec<Routing> {
    if strategy == SendingStrategy::Failover {
        routings.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
    routings
}

/// Whether another route should be tried after an attempt
pub fn should_continue(strategy: SendingStrategy, last_succeeded: bool) -> bool {
    match strategy {
        SendingStrategy::All => true,
        SendingStrategy::Failover => !last_succeeded,
    }
}

/// Terminal status for a run over `total` routes with `succeeded` successes.
///
/// `total` is the number of routes planned, not attempted.
pub fn final_status(strategy: SendingStrategy, total: usize, succeeded: usize) -> MessageStatus {
    if total == 0 {
        return MessageStatus::Completed;
    }

    match strategy {
        SendingStrategy::All if succeeded == 0 => MessageStatus::Failed,
        SendingStrategy::All if succeeded >= total => MessageStatus::Completed,
        SendingStrategy::All => MessageStatus::Partial,
        SendingStrategy::Failover if succeeded > 0 => MessageStatus::Completed,
        SendingStrategy::Failover => MessageStatus::Failed,
    }
}
