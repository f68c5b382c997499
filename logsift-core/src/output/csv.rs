use super::{ExportRecord, OutputGenerator, EXPORT_FIELDS};
use crate::error::{Result, SiftError};
use crate::event::Event;

pub struct CsvOutput;

impl OutputGenerator for CsvOutput {
    fn generate(&self, records: &[ExportRecord]) -> Result<String> {
        let mut csv_data = String::new();

        // CSV Header
        csv_data.push_str(&EXPORT_FIELDS.join(","));
        csv_data.push('\n');

        for record in records {
            let row: Vec<String> = record
                .cells()
                .iter()
                .map(|cell| cell.as_deref().map(escape_field).unwrap_or_default())
                .collect();
            csv_data.push_str(&row.join(","));
            csv_data.push('\n');
        }

        Ok(csv_data)
    }

    fn file_extension(&self) -> &str {
        "csv"
    }
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) || value.trim() != value {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Splits CSV text into rows of fields. Quoted fields may contain commas,
/// doubled quotes and line breaks.
fn split_records(content: &str) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
                line += 1;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(SiftError::csv(line, "unterminated quoted field"));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

/// Parses a CSV export back into Events. Columns are matched by header name;
/// an empty cell is an absent value.
pub fn read_csv_events(content: &str) -> Result<Vec<Event>> {
    let mut rows = split_records(content)?.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| SiftError::csv(1, "missing header row"))?;

    let mut columns = [0usize; 7];
    for (slot, name) in columns.iter_mut().zip(EXPORT_FIELDS) {
        *slot = header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SiftError::csv(1, format!("missing column '{}'", name)))?;
    }

    rows.enumerate()
        .map(|(i, row)| {
            let line = i + 2;
            let cell = |index: usize| -> Option<String> {
                row.get(columns[index])
                    .filter(|value| !value.is_empty())
                    .cloned()
            };
            let pid = match cell(5) {
                Some(value) => Some(value.parse::<u64>().map_err(|_| {
                    SiftError::csv(line, format!("invalid pid '{}'", value))
                })?),
                None => None,
            };
            let record = ExportRecord {
                time: cell(0).ok_or_else(|| SiftError::csv(line, "missing time"))?,
                event: cell(1),
                user: cell(2),
                ip: cell(3),
                path: cell(4),
                pid,
                format: cell(6).unwrap_or_default(),
            };
            record.into_event()
        })
        .collect()
}
