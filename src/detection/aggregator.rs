//! # Aggregator
//!
//! Single-pass fold of in-window events into per-client state. Each client
//! gets its own `IdentityAggregate`, created lazily on its first in-window
//! event. Aggregates only grow and are never merged across clients.
//!
//! `Aggregator::finalize` consumes the aggregator, so nothing can be folded
//! after the end of input.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{LogEvent, SuspicionPolicy, SweepError, SweepResult};

/// Running state for one client identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityAggregate {
    /// Distinct endpoints touched.
    touched_endpoints: BTreeSet<String>,

    /// Sensitive endpoints that answered with the success status at least once.
    sensitive_successes: BTreeSet<String>,

    /// Raw in-window event count. Diagnostic only, never used to classify.
    hits: u64,
}

impl IdentityAggregate {
    pub fn touched_endpoints(&self) -> &BTreeSet<String> {
        &self.touched_endpoints
    }

    pub fn sensitive_successes(&self) -> &BTreeSet<String> {
        &self.sensitive_successes
    }

    /// Endpoint breadth.
    pub fn endpoint_count(&self) -> usize {
        self.touched_endpoints.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// Exclusive owner of the `client -> aggregate` mapping for one sweep
/// (or one partition of it).
pub struct Aggregator {
    policy: SuspicionPolicy,
    identities: HashMap<String, IdentityAggregate>,
    events_folded: u64,
}

impl Aggregator {
    pub fn new(policy: &SuspicionPolicy) -> Self {
        Self {
            policy: policy.clone(),
            identities: HashMap::new(),
            events_folded: 0,
        }
    }

    /// Fold one event that already passed the window filter.
    pub fn fold(&mut self, event: LogEvent) {
        let sensitive_success = self.policy.is_sensitive_success(&event);
        let aggregate = self.identities.entry(event.client_id).or_default();

        aggregate.hits += 1;
        if sensitive_success {
            aggregate.sensitive_successes.insert(event.endpoint.clone());
        }
        aggregate.touched_endpoints.insert(event.endpoint);

        self.events_folded += 1;
    }

    pub fn distinct_clients(&self) -> usize {
        self.identities.len()
    }

    pub fn events_folded(&self) -> u64 {
        self.events_folded
    }

    /// Freeze all aggregates. Consumes the aggregator.
    pub fn finalize(self) -> FinalizedAggregates {
        FinalizedAggregates {
            identities: self.identities.into_iter().collect(),
        }
    }
}

/// Read-only `client -> aggregate` mapping handed to the classifier.
///
/// Iteration is ordered by client id and never depends on arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FinalizedAggregates {
    identities: BTreeMap<String, IdentityAggregate>,
}

impl FinalizedAggregates {
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, client_id: &str) -> Option<&IdentityAggregate> {
        self.identities.get(client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IdentityAggregate)> {
        self.identities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Combine partitions produced by disjoint workers.
    ///
    /// A client showing up in two partitions means routing broke per-client
    /// isolation; that is reported instead of merged.
    pub fn combine_partitions(parts: Vec<FinalizedAggregates>) -> SweepResult<Self> {
        let mut identities = BTreeMap::new();
        for part in parts {
            for (client_id, aggregate) in part.identities {
                if identities.contains_key(&client_id) {
                    return Err(SweepError::Worker(format!(
                        "client {} appeared in more than one partition",
                        client_id
                    )));
                }
                identities.insert(client_id, aggregate);
            }
        }
        Ok(Self { identities })
    }
}
