//! # Partitioned Sweep
//!
//! Higher-throughput variant of the sweep. The producer (this task) reads,
//! parses and window-filters lines, then routes each event by a hash of its
//! client id to one of N worker tasks over bounded channels. Each worker
//! exclusively owns an `Aggregator` for its slice of clients:
//!
//! ```text
//! reader -> triage -> hash(client) % N -> [mpsc] -> worker_i (Aggregator)
//! ```
//!
//! A client always lands on the same channel, so its events keep their
//! arrival order. Partitions never share a client and are combined only
//! after every worker has drained its queue.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::detection::aggregator::{Aggregator, FinalizedAggregates};
use crate::detection::window::InspectionWindow;
use crate::detection::{advance, conclude, triage, ScanLimits, ScanStats, SweepOutcome};
use crate::log_sources::{self, LogSource};
use crate::{LogEvent, SuspicionPolicy, SweepConfig, SweepError, SweepPhase, SweepResult};

/// Partition index for a client. Stable for the life of the process.
pub fn partition_for(client_id: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    client_id.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

/// Worker loop: fold everything routed to this partition until the
/// producer hangs up.
async fn run_partition(
    index: usize,
    mut rx: mpsc::Receiver<LogEvent>,
    policy: SuspicionPolicy,
) -> FinalizedAggregates {
    let mut aggregator = Aggregator::new(&policy);
    while let Some(event) = rx.recv().await {
        aggregator.fold(event);
    }
    log::debug!(
        "[PARTITION] {} drained: {} events, {} clients",
        index,
        aggregator.events_folded(),
        aggregator.distinct_clients()
    );
    aggregator.finalize()
}

/// Partitioned sweep over any async buffered reader.
pub async fn run_partitioned<R>(
    mut reader: R,
    source: &dyn LogSource,
    window: InspectionWindow,
    policy: &SuspicionPolicy,
    limits: ScanLimits,
    partitions: usize,
    queue_capacity: usize,
) -> SweepResult<SweepOutcome>
where
    R: AsyncBufRead + Unpin,
{
    if partitions == 0 || queue_capacity == 0 {
        return Err(SweepError::InvalidPolicy(
            "partitions and queue capacity must be at least 1".to_string(),
        ));
    }

    log::info!(
        "[PARTITION] Sweeping {} log across {} partitions, window [{}, {}]",
        source.name(),
        partitions,
        window.start(),
        window.end()
    );

    let mut phase = SweepPhase::Scanning;
    let mut senders = Vec::with_capacity(partitions);
    let mut workers: Vec<JoinHandle<FinalizedAggregates>> = Vec::with_capacity(partitions);
    for index in 0..partitions {
        let (tx, rx) = mpsc::channel::<LogEvent>(queue_capacity);
        senders.push(tx);
        workers.push(tokio::spawn(run_partition(index, rx, policy.clone())));
    }

    let mut stats = ScanStats::default();
    let started = Instant::now();
    let mut buf = Vec::new();
    let mut abandoned = None;

    loop {
        if let Some(reason) = limits.tripped(stats.lines_read, started.elapsed()) {
            if !reader.fill_buf().await?.is_empty() {
                abandoned = Some(reason);
            }
            break;
        }

        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if let Some(event) = triage(source, &window, &mut stats, &buf) {
            let index = partition_for(&event.client_id, partitions);
            senders[index].send(event).await.map_err(|_| {
                SweepError::Worker(format!("partition {} stopped accepting events", index))
            })?;
        }
    }

    // Closing the channels is the end-of-input signal for every worker.
    drop(senders);

    let mut parts = Vec::with_capacity(partitions);
    for (index, worker) in workers.into_iter().enumerate() {
        let part = worker
            .await
            .map_err(|e| SweepError::Worker(format!("partition {} failed: {}", index, e)))?;
        parts.push(part);
    }

    if let Some(reason) = abandoned {
        log::warn!("[PARTITION] Abandoned after {} lines: {}", stats.lines_read, reason);
        return Ok(SweepOutcome::Incomplete {
            lines_read: stats.lines_read,
            reason,
        });
    }

    advance(&mut phase, SweepPhase::Finalizing);
    let aggregates = FinalizedAggregates::combine_partitions(parts)?;
    Ok(SweepOutcome::Complete(conclude(&mut phase, aggregates, policy, stats)))
}

/// Open `path` and run a partitioned sweep per `config`.
pub async fn sweep_file_partitioned(path: &Path, config: &SweepConfig) -> SweepResult<SweepOutcome> {
    config.validate()?;
    let window = config.inspection_window()?;
    let policy = config.suspicion_policy()?;
    let source = log_sources::source_for_format(config.scan.format);

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| SweepError::InputUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    run_partitioned(
        BufReader::new(file),
        source.as_ref(),
        window,
        &policy,
        config.scan_limits(),
        config.scan.partitions,
        config.scan.queue_capacity,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Sweep;
    use crate::log_sources::access_log::AccessLogSource;

    fn window() -> InspectionWindow {
        InspectionWindow::parse("22:55:00", "23:05:00").unwrap()
    }

    fn policy() -> SuspicionPolicy {
        SuspicionPolicy::new(2, ["/transfer", "/admin"], 200).unwrap()
    }

    fn sample_log() -> String {
        let mut lines = Vec::new();
        for client in 0..20 {
            for (i, path) in ["/a", "/b", "/c", "/admin"].iter().enumerate() {
                let status = if client % 3 == 0 { 403 } else { 200 };
                lines.push(format!(
                    "2025-11-15T22:5{}:0{}Z 10.0.{}.{} {} {}",
                    6 + i,
                    client % 10,
                    client / 10,
                    client,
                    path,
                    status
                ));
            }
        }
        lines.push("not a line".to_string());
        lines.join("\n")
    }

    #[test]
    fn test_partition_for_is_stable_and_in_range() {
        for n in 1..8 {
            let p = partition_for("10.0.0.1", n);
            assert!(p < n);
            assert_eq!(p, partition_for("10.0.0.1", n));
        }
        assert_eq!(partition_for("anything", 0), 0);
    }

    #[tokio::test]
    async fn test_partitioned_matches_sequential() {
        let input = sample_log();
        let sequential = Sweep::new(Box::new(AccessLogSource::new()), window(), policy())
            .run(std::io::Cursor::new(input.clone().into_bytes()))
            .unwrap()
            .into_report()
            .unwrap();

        for partitions in [1, 2, 4, 7] {
            let source = AccessLogSource::new();
            let partitioned = run_partitioned(
                input.as_bytes(),
                &source,
                window(),
                &policy(),
                ScanLimits::unlimited(),
                partitions,
                2,
            )
            .await
            .unwrap()
            .into_report()
            .unwrap();
            assert_eq!(partitioned.render_text(), sequential.render_text());
            assert_eq!(partitioned.stats(), sequential.stats());
        }
        assert!(!sequential.is_empty());
    }

    #[tokio::test]
    async fn test_partitioned_max_lines_incomplete() {
        let input = sample_log();
        let source = AccessLogSource::new();
        let outcome = run_partitioned(
            input.as_bytes(),
            &source,
            window(),
            &policy(),
            ScanLimits { max_lines: Some(5), timeout: None },
            3,
            1,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, SweepOutcome::Incomplete { lines_read: 5, .. }));
    }

    #[tokio::test]
    async fn test_partitioned_rejects_zero_partitions() {
        let source = AccessLogSource::new();
        let err = run_partitioned(
            &b""[..],
            &source,
            window(),
            &policy(),
            ScanLimits::unlimited(),
            0,
            1,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SweepError::InvalidPolicy(_)));
    }
}
