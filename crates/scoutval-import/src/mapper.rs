// Translate one raw CSV row into typed player and statistics records.

use scoutval_core::config::StatisticsPolicy;
use scoutval_core::model::{NewPlayer, NewPlayerStatistic};
use thiserror::Error;

use crate::reader::RawRow;

/// Season label used when a row does not name one.
pub const DEFAULT_SEASON: &str = "current";

/// Columns whose presence marks a row as carrying statistics.
const STATISTICS_MARKERS: [&str; 3] = ["goals", "assists", "appearances"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowMappingError {
    #[error("missing required field `name`")]
    MissingName,

    #[error("field `{field}` is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
}

/// Statistics parsed from a row, waiting for the owning player's id.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsDraft {
    pub season: String,
    pub goals: i64,
    pub assists: i64,
    pub appearances: i64,
    pub minutes_played: i64,
    pub pass_accuracy: Option<f64>,
    pub tackles: i64,
    pub interceptions: i64,
}

impl StatisticsDraft {
    /// Attach the id of the committed player row.
    pub fn link(&self, player_id: i64) -> NewPlayerStatistic {
        NewPlayerStatistic {
            player_id,
            season: self.season.clone(),
            goals: self.goals,
            assists: self.assists,
            appearances: self.appearances,
            minutes_played: self.minutes_played,
            pass_accuracy: self.pass_accuracy,
            tackles: self.tackles,
            interceptions: self.interceptions,
        }
    }
}

/// A row that passed mapping and is ready to write.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub line: u64,
    pub player: NewPlayer,
    pub statistics: Option<StatisticsDraft>,
}

/// Map `row` to a player record and, when `policy` says the row carries
/// statistics, a statistics draft.
///
/// `age` and `market_value` are required integers. Other numeric fields
/// default to 0 when absent or unparseable.
pub fn map_row(row: &RawRow, policy: StatisticsPolicy) -> Result<MappedRow, RowMappingError> {
    let name = row.value("name").ok_or(RowMappingError::MissingName)?;

    let player = NewPlayer {
        name: name.to_string(),
        age: required_int(row, "age")?,
        position: text(row, "position"),
        club: text(row, "club"),
        club_logo: optional_text(row, "club_logo"),
        nationality: text(row, "nationality"),
        nationality_flag: optional_text(row, "nationality_flag"),
        market_value: required_int(row, "market_value")?,
        image_url: optional_text(row, "image_url"),
    };

    let statistics = has_statistics(row, policy).then(|| StatisticsDraft {
        season: row.value("season").unwrap_or(DEFAULT_SEASON).to_string(),
        goals: int_or_zero(row, "goals"),
        assists: int_or_zero(row, "assists"),
        appearances: int_or_zero(row, "appearances"),
        minutes_played: int_or_zero(row, "minutes_played"),
        pass_accuracy: row.value("pass_accuracy").and_then(parse_float),
        tackles: int_or_zero(row, "tackles"),
        interceptions: int_or_zero(row, "interceptions"),
    });

    Ok(MappedRow {
        line: row.line,
        player,
        statistics,
    })
}

/// Whether a row carries a statistics sub-record under `policy`.
pub fn has_statistics(row: &RawRow, policy: StatisticsPolicy) -> bool {
    match policy {
        StatisticsPolicy::Present => STATISTICS_MARKERS.iter().any(|f| row.value(f).is_some()),
        StatisticsPolicy::NonZero => STATISTICS_MARKERS
            .iter()
            .any(|f| row.value(f).and_then(parse_int).is_some_and(|n| n != 0)),
    }
}

/// Parse the leading integer of `raw`: optional sign then ASCII digits.
/// Trailing characters are ignored (`"22.9"` is 22). Returns `None` when no
/// digits lead the value or the number does not fit in an `i64`.
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse the leading decimal number of `raw`, with optional fraction and
/// exponent. Trailing characters are ignored (`"87.5%"` is 87.5). Returns
/// `None` when no digits lead the value or the result is not finite.
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let bytes = s.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_digits = leading_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = leading_digits(&bytes[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = leading_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

fn leading_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn required_int(row: &RawRow, field: &'static str) -> Result<i64, RowMappingError> {
    let raw = row.value(field).unwrap_or_default();
    parse_int(raw).ok_or_else(|| RowMappingError::InvalidInteger {
        field,
        value: raw.to_string(),
    })
}

fn int_or_zero(row: &RawRow, field: &str) -> i64 {
    row.value(field).and_then(parse_int).unwrap_or(0)
}

fn text(row: &RawRow, field: &str) -> String {
    row.value(field).unwrap_or_default().to_string()
}

fn optional_text(row: &RawRow, field: &str) -> Option<String> {
    row.value(field).map(str::to_string)
}
