//! The Loader: batched, retried persistence into an external table.
//!
//! The only pipeline component with side effects. A validated
//! RecordSet is partitioned into contiguous batches of at most
//! `batch_size` rows (the partition covers every row exactly once, in
//! order), and each batch is written through a [`BatchWriter`].
//!
//! Retry policy: a transient failure (connection, timeout, throttling)
//! retries the *same batch* up to `max_retries` more times with
//! exponential backoff; a persistent failure (auth, constraint, schema
//! mismatch) fails the batch immediately, since retrying a
//! deterministic error only wastes quota.
//!
//! Batches are written sequentially in partition order by default.
//! Concurrent dispatch up to `concurrency` in-flight writes is an
//! explicit opt-in and gives up cross-batch commit ordering.
//!
//! Already-committed batches are never rolled back: partial success is
//! a visible, reportable state in the [`LoadReport`], and the caller
//! decides whether it is acceptable.

pub mod rest;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::LoadConfig;
use crate::error::LoadError;
use crate::record::{Cell, RecordSet};

/// A sink for one batch insert. Implemented by the REST client and by
/// test doubles.
#[allow(async_fn_in_trait)]
pub trait BatchWriter {
    /// Append `rows` to `table`. Append semantics; dedup across runs is
    /// the caller's concern (fresh or truncated target).
    async fn insert(&self, table: &str, rows: &[Value]) -> Result<(), LoadError>;
}

impl<W: BatchWriter> BatchWriter for &W {
    async fn insert(&self, table: &str, rows: &[Value]) -> Result<(), LoadError> {
        (**self).insert(table, rows).await
    }
}

/// Identity of one batch inside the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchRef {
    /// Position in partition order, starting at 0.
    pub index: usize,
    /// First row offset in the RecordSet.
    pub start: usize,
    /// Number of rows in this batch.
    pub rows: usize,
}

/// One retry that happened while writing a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RetryEvent {
    /// The attempt that failed (1-based).
    pub attempt: u32,
    pub cause: String,
}

/// Terminal state of one batch.
#[derive(Debug, Clone)]
pub enum BatchStatus {
    Committed,
    Failed(LoadError),
}

/// Full per-batch result, including the retry trail.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch: BatchRef,
    /// Transient failures that were retried before the terminal state.
    pub retries: Vec<RetryEvent>,
    /// Total write attempts made (0 if cancelled before dispatch).
    pub attempts: u32,
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, BatchStatus::Committed)
    }
}

/// Aggregate result of one load run.
#[derive(Debug)]
pub struct LoadReport {
    pub table: String,
    /// One outcome per batch, in partition order.
    pub outcomes: Vec<BatchOutcome>,
}

impl LoadReport {
    /// Success iff every batch reached `Committed`.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_committed())
    }

    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.committed()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} of {} batches committed",
            self.table,
            self.committed(),
            self.outcomes.len()
        )
    }
}

/// Map one row to its wire representation.
///
/// This is the single place where in-memory missing values (`Null` and
/// non-finite floats) become the store's native NULL. No sentinel
/// strings, no zeros.
pub fn row_to_json(columns: &[String], row: &[Cell]) -> Value {
    let mut obj = Map::new();
    for (name, cell) in columns.iter().zip(row) {
        let value = match cell {
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) if f.is_finite() => Value::from(*f),
            Cell::Str(s) => Value::from(s.clone()),
            Cell::Bool(b) => Value::from(*b),
            Cell::Float(_) | Cell::Null => Value::Null,
        };
        obj.insert(name.clone(), value);
    }
    Value::Object(obj)
}

/// Partition a RecordSet into ordered wire-ready batches.
///
/// Batches are contiguous, at most `batch_size` rows each (the last
/// may be smaller), and together cover every row exactly once.
pub fn partition(t: &RecordSet, batch_size: usize) -> Vec<(BatchRef, Vec<Value>)> {
    let batch_size = batch_size.max(1);
    let rows: Vec<Value> = t.rows().map(|r| row_to_json(t.columns(), r)).collect();

    let mut batches = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let end = (start + batch_size).min(rows.len());
        batches.push((
            BatchRef {
                index: batches.len(),
                start,
                rows: end - start,
            },
            rows[start..end].to_vec(),
        ));
        start = end;
    }
    batches
}

/// Stateful component that persists a validated RecordSet.
pub struct Loader<W> {
    writer: W,
    config: LoadConfig,
    cancel: Arc<AtomicBool>,
}

impl<W: BatchWriter> Loader<W> {
    pub fn new(writer: W, config: LoadConfig) -> Self {
        Self {
            writer,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that aborts the load when set. In-flight batches finish;
    /// batches not yet dispatched are reported as cancelled.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Write every batch and report per-batch outcomes in partition
    /// order.
    pub async fn load(&self, t: &RecordSet, table: &str) -> LoadReport {
        let batches = partition(t, self.config.batch_size);
        info!(
            table,
            rows = t.len(),
            batches = batches.len(),
            batch_size = self.config.batch_size,
            "starting load"
        );

        let mut outcomes = if self.config.concurrency > 1 {
            // Opt-in concurrent dispatch: bounded in-flight writes,
            // commit order across batches unspecified.
            stream::iter(
                batches
                    .into_iter()
                    .map(|(batch, rows)| self.write_batch(table, batch, rows)),
            )
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await
        } else {
            let mut outcomes = Vec::new();
            for (batch, rows) in batches {
                outcomes.push(self.write_batch(table, batch, rows).await);
            }
            outcomes
        };

        outcomes.sort_by_key(|o| o.batch.index);
        let report = LoadReport {
            table: table.to_string(),
            outcomes,
        };
        info!("{}", report.summary());
        report
    }

    /// Write one batch, retrying transient failures with exponential
    /// backoff.
    async fn write_batch(&self, table: &str, batch: BatchRef, rows: Vec<Value>) -> BatchOutcome {
        if self.cancel.load(Ordering::SeqCst) {
            return BatchOutcome {
                batch,
                retries: Vec::new(),
                attempts: 0,
                status: BatchStatus::Failed(LoadError::Cancelled),
            };
        }

        let mut retries = Vec::new();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.writer.insert(table, &rows).await {
                Ok(()) => {
                    info!(
                        batch = batch.index,
                        rows = batch.rows,
                        attempts = attempt,
                        "batch committed"
                    );
                    return BatchOutcome {
                        batch,
                        retries,
                        attempts: attempt,
                        status: BatchStatus::Committed,
                    };
                }
                Err(err) if err.is_transient() && attempt <= self.config.max_retries => {
                    warn!(batch = batch.index, attempt, error = %err, "transient failure, retrying");
                    retries.push(RetryEvent {
                        attempt,
                        cause: err.to_string(),
                    });
                    let delay = self.config.backoff * 2u32.saturating_pow(attempt - 1);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    warn!(batch = batch.index, attempts = attempt, error = %err, "batch failed");
                    return BatchOutcome {
                        batch,
                        retries,
                        attempts: attempt,
                        status: BatchStatus::Failed(err),
                    };
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockWriter;
    use super::*;
    use std::time::Duration;

    fn config() -> LoadConfig {
        LoadConfig::new("https://example.test", "secret").with_backoff(Duration::ZERO)
    }

    fn record_set(rows: usize) -> RecordSet {
        RecordSet::new(
            vec!["tenure".into(), "monthlycharges".into()],
            (0..rows)
                .map(|i| vec![Cell::Int(i as i64), Cell::Float(i as f64 + 0.5)])
                .collect(),
        )
    }

    fn transient() -> LoadError {
        LoadError::transient(Some(503), "upstream unavailable")
    }

    #[test]
    fn test_partition_is_exact() {
        for (rows, batch_size) in [(10, 3), (10, 1), (7, 7), (5, 100), (0, 4)] {
            let t = record_set(rows);
            let batches = partition(&t, batch_size);

            let total: usize = batches.iter().map(|(b, r)| {
                assert_eq!(b.rows, r.len());
                r.len()
            }).sum();
            assert_eq!(total, rows, "rows={rows} B={batch_size}");

            // Contiguous, ordered, no overlap.
            let mut expected_start = 0;
            for (i, (batch, rows_json)) in batches.iter().enumerate() {
                assert_eq!(batch.index, i);
                assert_eq!(batch.start, expected_start);
                assert!(batch.rows <= batch_size.max(1));
                for (offset, row) in rows_json.iter().enumerate() {
                    assert_eq!(
                        row["tenure"],
                        serde_json::json!((batch.start + offset) as i64)
                    );
                }
                expected_start += batch.rows;
            }
        }
    }

    #[test]
    fn test_wire_null_mapping() {
        let columns = vec!["a".into(), "b".into(), "c".into()];
        let row = vec![Cell::Null, Cell::Float(f64::NAN), Cell::Float(1.5)];
        let json = row_to_json(&columns, &row);
        assert_eq!(json["a"], Value::Null);
        assert_eq!(json["b"], Value::Null);
        assert_eq!(json["c"], serde_json::json!(1.5));
    }

    #[tokio::test]
    async fn test_thousand_rows_ten_batches() {
        let writer = MockWriter::ok();
        let loader = Loader::new(&writer, config().with_batch_size(100));
        let t = record_set(1000);

        let report = loader.load(&t, "telco_customer_churn_features").await;
        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.committed(), 10);
        assert_eq!(writer.call_count(), 10);
        assert_eq!(writer.committed_rows(), 1000);
    }

    #[tokio::test]
    async fn test_retry_bound_is_attempts_plus_one() {
        let writer = MockWriter::scripted(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
            Err(transient()),
            Err(transient()),
        ]);
        let loader = Loader::new(&writer, config().with_batch_size(10).with_max_retries(2));
        let t = record_set(5);

        let report = loader.load(&t, "t").await;
        assert!(!report.is_success());
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.attempts, 3); // R + 1
        assert_eq!(outcome.retries.len(), 2);
        assert!(matches!(
            outcome.status,
            BatchStatus::Failed(LoadError::Transient { .. })
        ));
        assert_eq!(writer.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transient_twice_then_success() {
        let writer = MockWriter::scripted(vec![Err(transient()), Err(transient()), Ok(())]);
        let loader = Loader::new(writer, config().with_batch_size(10).with_max_retries(3));
        let t = record_set(4);

        let report = loader.load(&t, "t").await;
        assert!(report.is_success());
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.retries.len(), 2);
        assert_eq!(outcome.retries[0].attempt, 1);
        assert_eq!(outcome.retries[1].attempt, 2);
    }

    #[tokio::test]
    async fn test_persistent_failure_is_not_retried() {
        let writer = MockWriter::scripted(vec![Err(LoadError::persistent(Some(409), "conflict"))]);
        let loader = Loader::new(writer, config().with_batch_size(10).with_max_retries(5));
        let t = record_set(3);

        let report = loader.load(&t, "t").await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.retries.is_empty());
        assert!(matches!(
            outcome.status,
            BatchStatus::Failed(LoadError::Persistent { .. })
        ));
    }

    #[tokio::test]
    async fn test_partial_success_is_reported_not_rolled_back() {
        // Batch 2 of 4 fails persistently; the rest commit.
        let writer = MockWriter::scripted(vec![
            Ok(()),
            Err(LoadError::persistent(Some(400), "schema mismatch")),
            Ok(()),
            Ok(()),
        ]);
        let loader = Loader::new(writer, config().with_batch_size(2));
        let t = record_set(8);

        let report = loader.load(&t, "t").await;
        assert!(!report.is_success());
        assert_eq!(report.committed(), 3);
        assert_eq!(report.failed(), 1);
        assert!(!report.outcomes[1].is_committed());
        assert!(report.outcomes[3].is_committed());
    }

    #[tokio::test]
    async fn test_cancellation_abandons_outstanding_batches() {
        let writer = MockWriter::ok();
        let loader = Loader::new(&writer, config().with_batch_size(2));
        loader.cancel_handle().store(true, Ordering::SeqCst);
        let t = record_set(6);

        let report = loader.load(&t, "t").await;
        assert_eq!(report.failed(), 3);
        for outcome in &report.outcomes {
            assert_eq!(outcome.attempts, 0);
            assert!(matches!(
                outcome.status,
                BatchStatus::Failed(LoadError::Cancelled)
            ));
        }
        assert_eq!(writer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_commits_every_batch() {
        let writer = MockWriter::ok();
        let loader = Loader::new(writer, config().with_batch_size(3).with_concurrency(4));
        let t = record_set(10);

        let report = loader.load(&t, "t").await;
        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 4);
        // Report stays in partition order even when dispatch is not.
        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.batch.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_record_set_loads_nothing() {
        let writer = MockWriter::ok();
        let loader = Loader::new(writer, config());
        let t = record_set(0);

        let report = loader.load(&t, "t").await;
        assert!(report.is_success());
        assert!(report.outcomes.is_empty());
    }
}
