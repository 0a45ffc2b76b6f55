// Batch coordinator: map and write rows in order, isolating row failures.
//
// Each row moves Mapped -> Writing -> {Committed | Failed} exactly once. A
// failed row is logged and skipped; the batch always runs to the end.

use scoutval_core::config::StatisticsPolicy;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mapper::{map_row, MappedRow, RowMappingError};
use crate::reader::RawRow;
use crate::writer::{PlayerSink, WriteError};

/// Why a single row was not committed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error(transparent)]
    Mapping(#[from] RowMappingError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub line: u64,
    pub error: RowError,
}

/// Terminal state of a row that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Committed {
        player_id: i64,
        /// `None` when the row had no statistics, otherwise whether the
        /// statistics write succeeded.
        statistics_written: Option<bool>,
    },
    Failed(RowError),
}

/// Counts for one import invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub committed: usize,
    /// Committed rows whose statistics write failed.
    pub statistics_failures: usize,
    pub failures: Vec<RowFailure>,
}

impl BatchSummary {
    pub fn skipped(&self) -> usize {
        self.attempted - self.committed
    }

    /// Human-readable status line returned to the caller.
    pub fn message(&self) -> String {
        format!(
            "Successfully processed {} of {} players",
            self.committed, self.attempted
        )
    }

    fn record(mut self, line: u64, outcome: RowOutcome) -> Self {
        self.attempted += 1;
        match outcome {
            RowOutcome::Committed {
                statistics_written, ..
            } => {
                self.committed += 1;
                if statistics_written == Some(false) {
                    self.statistics_failures += 1;
                }
            }
            RowOutcome::Failed(error) => {
                warn!("Error processing record at line {line}: {error}");
                self.failures.push(RowFailure { line, error });
            }
        }
        self
    }
}

/// Write every row through `sink`, in order, one at a time.
pub fn run_batch<S>(rows: &[RawRow], sink: &S, policy: StatisticsPolicy) -> BatchSummary
where
    S: PlayerSink + ?Sized,
{
    rows.iter().fold(BatchSummary::default(), |summary, row| {
        let outcome = match map_row(row, policy) {
            Ok(mapped) => write_row(&mapped, sink),
            Err(e) => RowOutcome::Failed(e.into()),
        };
        summary.record(row.line, outcome)
    })
}

/// Write one mapped row. Statistics are attempted only after the player
/// commits; a statistics failure is logged but does not fail the row.
pub fn write_row<S>(mapped: &MappedRow, sink: &S) -> RowOutcome
where
    S: PlayerSink + ?Sized,
{
    let player_id = match sink.upsert_player(&mapped.player) {
        Ok(id) => id,
        Err(e) => return RowOutcome::Failed(e.into()),
    };
    debug!("upserted player {:?} as id {player_id}", mapped.player.name);

    let statistics_written = mapped.statistics.as_ref().map(|draft| {
        match sink.upsert_statistics(&draft.link(player_id)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Error inserting statistics at line {}: {e}", mapped.line);
                false
            }
        }
    });

    RowOutcome::Committed {
        player_id,
        statistics_written,
    }
}
