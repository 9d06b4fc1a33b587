//! CSV forecast parsing
//!
//! Header row required. A `time` or `timestamps` column carries the time
//! axis; `latitude`/`lat` and `longitude`/`lon` columns are optional and the
//! first non-empty cell of each is used. Every other column whose cells all
//! parse as numbers becomes a variable.

use chrono::Utc;

use super::{parse_timestamp, InputDefaults, RawForecast};
use crate::types::{Forecast, InputFormatError};

const TIME_COLUMNS: [&str; 2] = ["time", "timestamps"];
const LATITUDE_COLUMNS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_COLUMNS: [&str; 2] = ["longitude", "lon"];

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Parse CSV text into a forecast.
pub fn parse_csv(text: &str, defaults: &InputDefaults) -> Result<Forecast, InputFormatError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty());

    let (_, header_line) = lines.next().ok_or(InputFormatError::Csv {
        line: 1,
        reason: "missing header row".to_string(),
    })?;
    let header: Vec<String> = csv_split(header_line)
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let time_col = find_column(&header, &TIME_COLUMNS).ok_or(InputFormatError::Csv {
        line: 1,
        reason: "no 'time' or 'timestamps' column".to_string(),
    })?;
    let lat_col = find_column(&header, &LATITUDE_COLUMNS);
    let lon_col = find_column(&header, &LONGITUDE_COLUMNS);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut timestamps = Vec::new();
    for (line_no, line) in lines {
        let fields = csv_split(line);
        if fields.len() != header.len() {
            return Err(InputFormatError::Csv {
                line: line_no,
                reason: format!("expected {} fields, found {}", header.len(), fields.len()),
            });
        }
        timestamps.push(parse_timestamp(&fields[time_col])?);
        rows.push(fields);
    }

    let first_number = |col: Option<usize>| -> Option<f64> {
        let col = col?;
        rows.iter()
            .map(|r| r[col].trim())
            .find(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
    };

    let mut raw = RawForecast {
        latitude: first_number(lat_col),
        longitude: first_number(lon_col),
        timestamps: Some(timestamps),
        ..RawForecast::default()
    };

    for (col, name) in header.iter().enumerate() {
        if Some(col) == lat_col || Some(col) == lon_col || col == time_col {
            continue;
        }
        let parsed: Result<Vec<f64>, _> = rows.iter().map(|r| r[col].trim().parse::<f64>()).collect();
        match parsed {
            Ok(values) => {
                raw.variables.insert(name.clone(), (values, None));
            }
            Err(_) => tracing::warn!(column = %name, "ignoring non-numeric CSV column"),
        }
    }

    raw.build(defaults, Utc::now())
}
