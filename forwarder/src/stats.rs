use crate::sink::Reading;
use anomaly::Severity;
use std::fmt;

/// Running minimum, maximum and mean of one measured quantity.
///
/// Non-finite samples are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FieldStats {
    count: u64,
    min: f32,
    max: f32,
    mean: f64,
}

impl FieldStats {
    pub fn observe(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }

        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = f64::from(value);
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.mean += (f64::from(value) - self.mean) / self.count as f64;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<f32> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f32> {
        (self.count > 0).then_some(self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }
}

/// Counters for one producer connection.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub records: u64,
    pub warnings: u64,
    pub critical: u64,
    pub delivery_failures: u64,
    /// Records cut short by the peer closing mid-record.
    pub truncated: u64,
    pub voltage: FieldStats,
    pub current: FieldStats,
    pub temperature: FieldStats,
}

impl SessionStats {
    pub fn observe(&mut self, reading: &Reading) {
        self.records += 1;

        if let Some(warning) = &reading.warning {
            match warning.severity() {
                Severity::Warning => self.warnings += 1,
                Severity::Critical => self.critical += 1,
            }
        }

        self.voltage.observe(reading.record.pack_voltage);
        self.current.observe(reading.record.pack_current);
        self.temperature.observe(reading.record.cell_temperature);
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} warnings, {} critical, {} delivery failures, {} truncated",
            self.records, self.warnings, self.critical, self.delivery_failures, self.truncated
        )?;

        for (name, unit, stats) in [
            ("voltage", "V", &self.voltage),
            ("current", "A", &self.current),
            ("temperature", "°C", &self.temperature),
        ] {
            if let (Some(min), Some(max), Some(mean)) = (stats.min(), stats.max(), stats.mean()) {
                write!(
                    f,
                    "; {} {:.2}..{:.2}{} (avg {:.2})",
                    name, min, max, unit, mean
                )?;
            }
        }

        Ok(())
    }
}
