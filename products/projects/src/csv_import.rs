use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::debug;

use crate::{budget::ActivityRow, error::ImportError};

pub const NAME_COLUMN: &str = "Activity Name";
const QTY_COLUMN: &str = "Qty";
const UNIT_COLUMN: &str = "Unit";
const RATE_COLUMN: &str = "Rate";
const START_COLUMN: &str = "Start Date";
const END_COLUMN: &str = "End Date";

struct Columns {
    name: usize,
    quantity: Option<usize>,
    unit: Option<usize>,
    rate: Option<usize>,
    start_date: Option<usize>,
    end_date: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, ImportError> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(wanted))
        };
        Ok(Self {
            name: find(NAME_COLUMN).ok_or(ImportError::MissingColumn(NAME_COLUMN))?,
            quantity: find(QTY_COLUMN),
            unit: find(UNIT_COLUMN),
            rate: find(RATE_COLUMN),
            start_date: find(START_COLUMN),
            end_date: find(END_COLUMN),
        })
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> &str {
    index.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Blank cells are no date; anything else must be `YYYY-MM-DD`.
fn date_cell(
    record: &StringRecord,
    index: Option<usize>,
    column: &str,
    line: u64,
) -> Result<Option<NaiveDate>, ImportError> {
    let raw = cell(record, index);
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            ImportError::Malformed(format!(
                "line {line}: \"{raw}\" in \"{column}\" is not a YYYY-MM-DD date"
            ))
        })
}

/// Parse an activity sheet into form rows.
///
/// Rows without a name are skipped. Any structural problem or unreadable
/// date rejects the whole file so the caller never applies a partial import.
/// Quantity and rate stay as typed and count as zero when not numeric.
pub fn parse_activity_csv(text: &str) -> Result<Vec<ActivityRow>, ImportError> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ImportError::Empty);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let columns = Columns::locate(reader.headers()?)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |pos| pos.line());
        let name = cell(&record, Some(columns.name));
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        rows.push(ActivityRow {
            name: name.to_string(),
            quantity: cell(&record, columns.quantity).to_string(),
            unit: cell(&record, columns.unit).to_string(),
            rate: cell(&record, columns.rate).to_string(),
            start_date: date_cell(&record, columns.start_date, START_COLUMN, line)?,
            end_date: date_cell(&record, columns.end_date, END_COLUMN, line)?,
            assigned_to: None,
        });
    }
    debug!(rows = rows.len(), skipped, "parsed activity csv");
    Ok(rows)
}
