//! Condition construction with transition-time preservation.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const CONDITION_ACCEPTED: &str = "Accepted";
pub const CONDITION_PROGRAMMED: &str = "Programmed";
pub const CONDITION_RESOLVED_REFS: &str = "ResolvedRefs";
pub const CONDITION_READY: &str = "Ready";

pub fn condition(
    type_: &str,
    status: bool,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
    now: Time,
) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if status { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        observed_generation,
        last_transition_time: now,
    }
}

/// Keeps the previous `lastTransitionTime` for every condition whose status
/// did not change, so that a rewrite of an unchanged status is byte-stable.
pub fn preserve_transition_times(new: &mut [Condition], old: &[Condition]) {
    for condition in new.iter_mut() {
        if let Some(previous) = old.iter().find(|c| c.type_ == condition.type_) {
            if previous.status == condition.status {
                condition.last_transition_time = previous.last_transition_time.clone();
            }
        }
    }
}
