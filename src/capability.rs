use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use crate::Result;
use crate::types::Program;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    TargetTemperature,
    MeasureTemperature,
    MeasureTemperatureAlt,
    MeasurePower,
    OnOff,
    ThermostatProgram,
    MeterPower,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::TargetTemperature,
        Capability::MeasureTemperature,
        Capability::MeasureTemperatureAlt,
        Capability::MeasurePower,
        Capability::OnOff,
        Capability::ThermostatProgram,
        Capability::MeterPower,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Capability::TargetTemperature => "target_temperature",
            Capability::MeasureTemperature => "measure_temperature",
            Capability::MeasureTemperatureAlt => "measure_temperature.alt",
            Capability::MeasurePower => "measure_power",
            Capability::OnOff => "onoff",
            Capability::ThermostatProgram => "thermostat_program",
            Capability::MeterPower => "meter_power",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapabilityValue {
    Number(f64),
    Bool(bool),
    Program(Program),
}

impl CapabilityValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CapabilityValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CapabilityValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_program(&self) -> Option<Program> {
        match self {
            CapabilityValue::Program(p) => Some(*p),
            _ => None,
        }
    }
}

impl From<f64> for CapabilityValue {
    fn from(v: f64) -> Self {
        CapabilityValue::Number(v)
    }
}

impl From<bool> for CapabilityValue {
    fn from(v: bool) -> Self {
        CapabilityValue::Bool(v)
    }
}

impl From<Program> for CapabilityValue {
    fn from(v: Program) -> Self {
        CapabilityValue::Program(v)
    }
}

/// Values derived from one device snapshot. `meter_power` is filled in by
/// the energy tracker, not by the mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityValues {
    pub target_temperature: f64,
    pub measure_temperature: f64,
    pub measure_temperature_alt: f64,
    pub measure_power: f64,
    pub onoff: bool,
    pub thermostat_program: Program,
    pub meter_power: Option<f64>,
}

impl CapabilityValues {
    pub fn entries(&self) -> Vec<(Capability, CapabilityValue)> {
        let mut out = vec![
            (Capability::TargetTemperature, self.target_temperature.into()),
            (Capability::MeasureTemperature, self.measure_temperature.into()),
            (Capability::MeasureTemperatureAlt, self.measure_temperature_alt.into()),
            (Capability::MeasurePower, self.measure_power.into()),
            (Capability::OnOff, self.onoff.into()),
            (Capability::ThermostatProgram, self.thermostat_program.into()),
        ];
        if let Some(kwh) = self.meter_power {
            out.push((Capability::MeterPower, kwh.into()));
        }
        out
    }
}

/// The host platform's side of a device: capability storage and presentation.
pub trait CapabilityHost: Send + Sync {
    fn capability_value(&self, capability: Capability) -> Option<CapabilityValue>;

    fn set_capability_value(&self, capability: Capability, value: CapabilityValue) -> Result<()>;

    fn set_capability_title(&self, capability: Capability, title: &str) -> Result<()>;

    fn set_available(&self) -> Result<()> {
        Ok(())
    }

    fn set_unavailable(&self, _reason: &str) -> Result<()> {
        Ok(())
    }
}

/// Host that keeps everything in memory. Used by the demo and in tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    values: Mutex<HashMap<Capability, CapabilityValue>>,
    titles: Mutex<HashMap<Capability, String>>,
    unavailable: Mutex<Option<String>>,
    writes: Mutex<Vec<(Capability, CapabilityValue)>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&self, capability: Capability) -> Option<String> {
        lock(&self.titles).get(&capability).cloned()
    }

    pub fn unavailable_reason(&self) -> Option<String> {
        lock(&self.unavailable).clone()
    }

    /// Every value written so far, in order.
    pub fn writes(&self) -> Vec<(Capability, CapabilityValue)> {
        lock(&self.writes).clone()
    }
}

impl CapabilityHost for MemoryHost {
    fn capability_value(&self, capability: Capability) -> Option<CapabilityValue> {
        lock(&self.values).get(&capability).copied()
    }

    fn set_capability_value(&self, capability: Capability, value: CapabilityValue) -> Result<()> {
        lock(&self.values).insert(capability, value);
        lock(&self.writes).push((capability, value));
        Ok(())
    }

    fn set_capability_title(&self, capability: Capability, title: &str) -> Result<()> {
        lock(&self.titles).insert(capability, title.to_string());
        Ok(())
    }

    fn set_available(&self) -> Result<()> {
        *lock(&self.unavailable) = None;
        Ok(())
    }

    fn set_unavailable(&self, reason: &str) -> Result<()> {
        *lock(&self.unavailable) = Some(reason.to_string());
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
