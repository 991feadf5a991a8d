//! Threshold classification of pack telemetry.
//!
//! Each record gets at most one [`AnomalyWarning`]. Rules are evaluated in a
//! fixed order and the first one that matches wins:
//!
//! 1. voltage at or below `low_voltage`
//! 2. voltage at or above `high_voltage`
//! 3. current at or below `low_current`
//! 4. current at or above `high_current`
//! 5. temperature at or below `low_temperature`
//! 6. temperature at or above `high_temperature`
//!
//! Every comparison is inclusive, so a reading sitting exactly on a threshold
//! is flagged. NaN compares false against everything and is never flagged.

use serde::Deserialize;
use std::fmt;
use telemetry_protocol::TelemetryRecord;

/// Warning boundaries for a pack.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub low_voltage: f32,      // volts
    pub high_voltage: f32,     // volts
    pub low_current: f32,      // amperes
    pub high_current: f32,     // amperes
    pub low_temperature: f32,  // degrees Celsius
    pub high_temperature: f32, // degrees Celsius
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            low_voltage: 50.0,
            high_voltage: 500.0,
            low_current: 0.0,
            high_current: 100.0,
            low_temperature: -20.0,
            high_temperature: 60.0,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, record: &TelemetryRecord) -> Option<AnomalyWarning> {
        classify(record, self)
    }
}

/// A breached threshold, carrying the measured value that breached it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnomalyWarning {
    LowVoltage(f32),
    HighVoltage(f32),
    LowCurrent(f32),
    HighCurrent(f32),
    LowTemperature(f32),
    HighTemperature(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Critical,
}

impl AnomalyWarning {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyWarning::LowVoltage(_) => "Low Voltage",
            AnomalyWarning::HighVoltage(_) => "High Voltage",
            AnomalyWarning::LowCurrent(_) => "Low Current",
            AnomalyWarning::HighCurrent(_) => "High Current",
            AnomalyWarning::LowTemperature(_) => "Low Temperature",
            AnomalyWarning::HighTemperature(_) => "High Temperature",
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            AnomalyWarning::LowVoltage(v)
            | AnomalyWarning::HighVoltage(v)
            | AnomalyWarning::LowCurrent(v)
            | AnomalyWarning::HighCurrent(v)
            | AnomalyWarning::LowTemperature(v)
            | AnomalyWarning::HighTemperature(v) => v,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            AnomalyWarning::LowVoltage(_) | AnomalyWarning::HighVoltage(_) => "V",
            AnomalyWarning::LowCurrent(_) | AnomalyWarning::HighCurrent(_) => "A",
            AnomalyWarning::LowTemperature(_) | AnomalyWarning::HighTemperature(_) => "°C",
        }
    }

    /// Voltage and temperature excursions are critical, current excursions
    /// are warnings.
    pub fn severity(&self) -> Severity {
        match self {
            AnomalyWarning::LowCurrent(_) | AnomalyWarning::HighCurrent(_) => Severity::Warning,
            _ => Severity::Critical,
        }
    }
}

impl fmt::Display for AnomalyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}{})", self.label(), self.value(), self.unit())
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify(record: &TelemetryRecord, thresholds: &Thresholds) -> Option<AnomalyWarning> {
    let voltage = record.pack_voltage;
    let current = record.pack_current;
    let temperature = record.cell_temperature;

    if voltage <= thresholds.low_voltage {
        Some(AnomalyWarning::LowVoltage(voltage))
    } else if voltage >= thresholds.high_voltage {
        Some(AnomalyWarning::HighVoltage(voltage))
    } else if current <= thresholds.low_current {
        Some(AnomalyWarning::LowCurrent(current))
    } else if current >= thresholds.high_current {
        Some(AnomalyWarning::HighCurrent(current))
    } else if temperature <= thresholds.low_temperature {
        Some(AnomalyWarning::LowTemperature(temperature))
    } else if temperature >= thresholds.high_temperature {
        Some(AnomalyWarning::HighTemperature(temperature))
    } else {
        None
    }
}
