use std::{fmt, str::FromStr};
use telemetry_protocol::TelemetryRecord;

/// Scripted pack behaviours around the nominal 355.2 V / 25 A / 25 °C point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Small oscillations, never leaves the safe envelope.
    Normal,
    /// Voltage climbs while current flows into the pack.
    Charging,
    /// Voltage falls under a heavy, varying load.
    Discharging,
    /// Temperature ramps from 25 °C to 65 °C.
    Overheating,
    /// Voltage collapses from nominal to about 35 V.
    VoltageAnomaly,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Normal,
        Scenario::Charging,
        Scenario::Discharging,
        Scenario::Overheating,
        Scenario::VoltageAnomaly,
    ];

    /// Reading at `t` seconds into a run lasting `duration` seconds.
    pub fn sample(&self, t: f32, duration: f32) -> TelemetryRecord {
        let progress = if duration > 0.0 {
            (t / duration).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let (voltage, current, temperature) = match self {
            Scenario::Normal => (
                355.2 + 9.6 * (t * 0.1).sin(),
                25.0 + 12.5 * (t * 0.2).sin(),
                25.0 + 2.0 * (t * 0.15).sin(),
            ),
            Scenario::Charging => (
                336.0 + 57.6 * progress,
                -(50.0 + 12.5 * (t * 0.3).sin()),
                25.0 + 5.0 * progress,
            ),
            Scenario::Discharging => (
                384.0 - 76.8 * progress,
                50.0 + 25.0 * (t * 0.3).sin(),
                25.0 + 3.0 * progress,
            ),
            Scenario::Overheating => (
                355.2 + 9.6 * (t * 0.1).sin(),
                50.0 + 12.5 * (t * 0.2).sin(),
                25.0 + 40.0 * progress,
            ),
            Scenario::VoltageAnomaly => (
                355.2 - 320.0 * progress,
                25.0 + 12.5 * (t * 0.2).sin(),
                25.0 + 2.0 * (t * 0.15).sin(),
            ),
        };

        TelemetryRecord::new(t, voltage, current, temperature)
    }

    /// One reading every `interval` seconds from time zero through `duration`.
    pub fn records(self, duration: f32, interval: f32) -> impl Iterator<Item = TelemetryRecord> {
        let steps = if interval > 0.0 {
            (duration / interval).floor() as u64
        } else {
            0
        };

        (0..=steps).map(move |i| self.sample(i as f32 * interval, duration))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Charging => "charging",
            Scenario::Discharging => "discharging",
            Scenario::Overheating => "overheating",
            Scenario::VoltageAnomaly => "voltage-anomaly",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('_', "-");
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown scenario '{}', expected one of: normal, charging, discharging, overheating, voltage-anomaly",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("normal".parse(), Ok(Scenario::Normal));
        assert_eq!("Overheating".parse(), Ok(Scenario::Overheating));
        assert_eq!("voltage_anomaly".parse(), Ok(Scenario::VoltageAnomaly));
        assert!("meltdown".parse::<Scenario>().is_err());

        for scenario in Scenario::ALL {
            assert_eq!(scenario.to_string().parse(), Ok(scenario));
        }
    }

    #[test]
    fn run_covers_start_and_end() {
        let records: Vec<_> = Scenario::Overheating.records(30.0, 1.0).collect();

        assert_eq!(records.len(), 31);
        assert_eq!(records[0].timestamp, 0.0);
        assert_eq!(records[0].cell_temperature, 25.0);
        assert_eq!(records[30].timestamp, 30.0);
        assert!((records[30].cell_temperature - 65.0).abs() < 1e-4);
    }

    #[test]
    fn ramps_follow_progress() {
        let start = Scenario::VoltageAnomaly.sample(0.0, 30.0);
        let end = Scenario::VoltageAnomaly.sample(30.0, 30.0);

        assert!((start.pack_voltage - 355.2).abs() < 1e-3);
        assert!((end.pack_voltage - 35.2).abs() < 1e-3);
        assert!(Scenario::Charging.sample(0.0, 30.0).pack_current < 0.0);
    }

    #[test]
    fn non_positive_interval_yields_a_single_reading() {
        assert_eq!(Scenario::Normal.records(30.0, 0.0).count(), 1);
    }
}
