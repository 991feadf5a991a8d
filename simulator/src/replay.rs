use chrono::{DateTime, Utc};
use log::warn;
use std::{fs, io, path::Path, str::FromStr};
use telemetry_protocol::TelemetryRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} contains no readable telemetry lines")]
    Empty(String),
}

/// One line of a recorded telemetry log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoggedReading {
    pub time: DateTime<Utc>,
    pub voltage: f32,
    pub current: f32,
    pub temperature: f32,
}

/// Parses `TIME=<rfc3339>;VOLT=<v>;CURR=<a>;TEMP=<c>`.
///
/// Fields may come in any order and unknown keys are ignored. Returns `None`
/// if a field is missing or malformed.
pub fn parse_line(line: &str) -> Option<LoggedReading> {
    let mut time: Option<DateTime<Utc>> = None;
    let mut voltage: Option<f32> = None;
    let mut current: Option<f32> = None;
    let mut temperature: Option<f32> = None;

    for part in line.trim().split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "TIME" => time = Some(DateTime::from_str(value).ok()?),
            "VOLT" => voltage = Some(value.parse().ok()?),
            "CURR" => current = Some(value.parse().ok()?),
            "TEMP" => temperature = Some(value.parse().ok()?),
            _ => {}
        }
    }

    Some(LoggedReading {
        time: time?,
        voltage: voltage?,
        current: current?,
        temperature: temperature?,
    })
}

/// Turns log lines into records timed relative to the first readable line.
///
/// Blank lines and `#` comments are skipped silently, malformed lines with a
/// warning.
pub fn records_from_lines<'a, I>(lines: I) -> Vec<TelemetryRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut start: Option<DateTime<Utc>> = None;
    let mut records = Vec::new();

    for (number, line) in lines.into_iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some(reading) = parse_line(trimmed) else {
            warn!("Skipping unreadable line {}: {}", number + 1, trimmed);
            continue;
        };

        let origin = *start.get_or_insert(reading.time);
        let elapsed = (reading.time - origin).num_milliseconds() as f32 / 1000.0;

        records.push(TelemetryRecord::new(
            elapsed,
            reading.voltage,
            reading.current,
            reading.temperature,
        ));
    }

    records
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<TelemetryRecord>, ReplayError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let records = records_from_lines(contents.lines());
    if records.is_empty() {
        return Err(ReplayError::Empty(path.display().to_string()));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_line() {
        let reading =
            parse_line("TIME=2025-03-01T10:00:00Z;VOLT=355.2;CURR=25.5;TEMP=24.8").unwrap();

        assert_eq!(reading.time.to_rfc3339(), "2025-03-01T10:00:00+00:00");
        assert_eq!(reading.voltage, 355.2);
        assert_eq!(reading.current, 25.5);
        assert_eq!(reading.temperature, 24.8);
    }

    #[test]
    fn field_order_and_unknown_keys_do_not_matter() {
        let reading =
            parse_line("TEMP=30;BATTERY_SOC=80;CURR=-10;VOLT=340;TIME=2025-03-01T10:00:00Z");

        assert_eq!(reading.map(|r| r.current), Some(-10.0));
    }

    #[test]
    fn rejects_missing_or_malformed_fields() {
        assert_eq!(parse_line("TIME=2025-03-01T10:00:00Z;VOLT=355.2;CURR=25.5"), None);
        assert_eq!(
            parse_line("TIME=yesterday;VOLT=355.2;CURR=25.5;TEMP=24.8"),
            None
        );
        assert_eq!(
            parse_line("TIME=2025-03-01T10:00:00Z;VOLT=high;CURR=25.5;TEMP=24.8"),
            None
        );
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn timestamps_are_relative_to_the_first_reading() {
        let lines = [
            "# recorded on the bench",
            "TIME=2025-03-01T10:00:00Z;VOLT=355.2;CURR=25.0;TEMP=25.0",
            "garbage",
            "",
            "TIME=2025-03-01T10:00:01.500Z;VOLT=354.9;CURR=26.0;TEMP=25.1",
            "TIME=2025-03-01T10:00:03Z;VOLT=354.5;CURR=27.0;TEMP=25.3",
        ];

        let records = records_from_lines(lines);

        let timestamps: Vec<f32> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![0.0, 1.5, 3.0]);
        assert_eq!(records[2].pack_voltage, 354.5);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load("does/not/exist.txt");

        assert!(matches!(result, Err(ReplayError::Io { .. })));
    }
}
