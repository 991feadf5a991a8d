use telemetry_protocol::TelemetryRecord;

/// Cell open-circuit voltage at 0%, 10%, ..., 100% state of charge.
const OCV_TABLE: [f32; 11] = [
    3.00, 3.30, 3.45, 3.55, 3.62, 3.68, 3.74, 3.82, 3.92, 4.02, 4.10,
];

const SECONDS_PER_HOUR: f32 = 3600.0;

/// Electrical and thermal description of a series/parallel Li-ion pack.
#[derive(Debug, Clone, PartialEq)]
pub struct PackParameters {
    pub series: u32,
    pub parallel: u32,
    pub cell_capacity_ah: f32,
    pub cell_resistance_ohm: f32,
    pub cell_mass_kg: f32,
    /// J/(kg*K)
    pub specific_heat: f32,
    /// Convective loss to ambient for the whole pack, W/K.
    pub cooling_w_per_k: f32,
    pub ambient_c: f32,
    pub initial_soc: f32,
}

impl Default for PackParameters {
    fn default() -> Self {
        PackParameters {
            series: 96,
            parallel: 72,
            cell_capacity_ah: 5.0,
            cell_resistance_ohm: 0.02,
            cell_mass_kg: 0.07,
            specific_heat: 900.0,
            cooling_w_per_k: 30.0,
            ambient_c: 25.0,
            initial_soc: 0.9,
        }
    }
}

impl PackParameters {
    pub fn capacity_ah(&self) -> f32 {
        self.cell_capacity_ah * self.parallel as f32
    }

    pub fn resistance_ohm(&self) -> f32 {
        self.cell_resistance_ohm * self.series as f32 / self.parallel as f32
    }

    /// J/K for the whole pack.
    pub fn heat_capacity(&self) -> f32 {
        self.cell_mass_kg * self.specific_heat * (self.series * self.parallel) as f32
    }

    pub fn nominal_voltage(&self) -> f32 {
        3.7 * self.series as f32
    }
}

/// Linear interpolation of the cell OCV table, clamped to [0, 1].
pub fn cell_ocv(soc: f32) -> f32 {
    let soc = soc.clamp(0.0, 1.0);
    let position = soc * (OCV_TABLE.len() - 1) as f32;
    let index = (position.floor() as usize).min(OCV_TABLE.len() - 2);
    let fraction = position - index as f32;

    OCV_TABLE[index] + (OCV_TABLE[index + 1] - OCV_TABLE[index]) * fraction
}

/// Equivalent-circuit pack: OCV source, series resistance and a single
/// lumped thermal mass.
///
/// Positive current discharges the pack.
#[derive(Debug, Clone)]
pub struct PackModel {
    params: PackParameters,
    time: f32,
    soc: f32,
    temperature: f32,
    voltage: f32,
}

impl PackModel {
    pub fn new(params: PackParameters) -> Self {
        let soc = params.initial_soc.clamp(0.0, 1.0);
        let voltage = cell_ocv(soc) * params.series as f32;
        let temperature = params.ambient_c;

        PackModel {
            params,
            time: 0.0,
            soc,
            temperature,
            voltage,
        }
    }

    pub fn soc(&self) -> f32 {
        self.soc
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Terminal voltage after the last step, or OCV before the first.
    pub fn voltage(&self) -> f32 {
        self.voltage
    }

    pub fn open_circuit_voltage(&self) -> f32 {
        cell_ocv(self.soc) * self.params.series as f32
    }

    /// Advances the model by `dt` seconds at a constant `current` and
    /// returns the reading at the end of the step.
    pub fn step(&mut self, dt: f32, current: f32) -> TelemetryRecord {
        let p = &self.params;

        self.soc = (self.soc - current * dt / SECONDS_PER_HOUR / p.capacity_ah()).clamp(0.0, 1.0);

        let resistance = p.resistance_ohm();
        let heating = current * current * resistance;
        let cooling = p.cooling_w_per_k * (self.temperature - p.ambient_c);
        self.temperature += (heating - cooling) * dt / p.heat_capacity();

        self.voltage = self.open_circuit_voltage() - current * resistance;
        self.time += dt;

        TelemetryRecord::new(self.time, self.voltage, current, self.temperature)
    }

    /// Steps at the current that delivers `power_w` at the present terminal
    /// voltage. An empty pack draws nothing.
    pub fn step_constant_power(&mut self, dt: f32, power_w: f32) -> TelemetryRecord {
        let current = if self.voltage > 0.0 {
            power_w / self.voltage
        } else {
            0.0
        };
        self.step(dt, current)
    }

    /// Lazily yields one constant-power step every `interval` seconds until
    /// `duration` seconds of simulated time are covered.
    pub fn constant_power_run(
        mut self,
        power_w: f32,
        duration: f32,
        interval: f32,
    ) -> impl Iterator<Item = TelemetryRecord> {
        let steps = if interval > 0.0 {
            (duration / interval).ceil() as u64
        } else {
            0
        };

        (0..steps).map(move |_| self.step_constant_power(interval, power_w))
    }
}

impl Default for PackModel {
    fn default() -> Self {
        PackModel::new(PackParameters::default())
    }
}
