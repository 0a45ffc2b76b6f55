// CSV import pipeline: decode an uploaded file, map each row to a player
// (and optionally a statistics record), and upsert rows one at a time.

pub mod batch;
pub mod mapper;
pub mod reader;
pub mod writer;

use scoutval_core::config::StatisticsPolicy;
use tracing::info;

pub use batch::{run_batch, BatchSummary, RowError, RowFailure};
pub use mapper::{map_row, MappedRow, RowMappingError};
pub use reader::{parse_csv, ParseError, RawRow};
pub use writer::{PlayerSink, WriteError};

/// Parse `bytes` as a header-driven CSV file and write every row through
/// `sink`. Only a file-level parse failure is an error; row failures are
/// reported in the returned summary.
pub fn import_csv<S>(
    bytes: &[u8],
    sink: &S,
    policy: StatisticsPolicy,
) -> Result<BatchSummary, ParseError>
where
    S: PlayerSink + ?Sized,
{
    let rows = parse_csv(bytes)?;
    info!("Parsed {} records from CSV", rows.len());
    Ok(run_batch(&rows, sink, policy))
}
