//! # Classifier
//!
//! Applies the suspicion policy to finalized aggregates. A client is a
//! suspect when BOTH hold:
//!   |touched_endpoints| > breadth_threshold   (strictly greater)
//!   |sensitive_successes| > 0
//!
//! Ordering is the reporter's job; the output here carries no ordering
//! guarantee.

use crate::detection::aggregator::{FinalizedAggregates, IdentityAggregate};
use crate::{Suspect, SuspicionPolicy};

/// Does this aggregate satisfy the policy?
pub fn qualifies(aggregate: &IdentityAggregate, policy: &SuspicionPolicy) -> bool {
    aggregate.endpoint_count() > policy.breadth_threshold
        && !aggregate.sensitive_successes().is_empty()
}

/// Collect every qualifying client.
pub fn classify(aggregates: &FinalizedAggregates, policy: &SuspicionPolicy) -> Vec<Suspect> {
    aggregates
        .iter()
        .filter(|(_, aggregate)| qualifies(aggregate, policy))
        .map(|(client_id, aggregate)| Suspect {
            client_id: client_id.to_string(),
            endpoint_count: aggregate.endpoint_count(),
            sensitive_endpoints_hit: aggregate.sensitive_successes().clone(),
        })
        .collect()
}
