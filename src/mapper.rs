use crate::capability::CapabilityValues;
use crate::types::{DeviceSnapshot, Program, Regulator};

/// Reported draw in watts while the relay is off.
pub const IDLE_POWER_W: f64 = 0.5;

pub const FLOOR_TITLE: &str = "Floor temperature";
pub const ROOM_TITLE: &str = "Room temperature";

pub fn map_status(snapshot: &DeviceSnapshot, regulator: Regulator) -> CapabilityValues {
    let (primary, alt) = match regulator {
        Regulator::Floor => (snapshot.temperature_floor, snapshot.temperature_room),
        Regulator::Room => (snapshot.temperature_room, snapshot.temperature_floor),
    };

    CapabilityValues {
        target_temperature: snapshot.temperature_set,
        measure_temperature: primary,
        measure_temperature_alt: alt,
        measure_power: if snapshot.relay_on {
            snapshot.installed_effect
        } else {
            IDLE_POWER_W
        },
        onoff: snapshot.power_on,
        thermostat_program: snapshot.program().unwrap_or(Program::Manual),
        meter_power: None,
    }
}

/// Titles for (`measure_temperature`, `measure_temperature.alt`).
pub fn regulator_titles(regulator: Regulator) -> (&'static str, &'static str) {
    match regulator {
        Regulator::Floor => (FLOOR_TITLE, ROOM_TITLE),
        Regulator::Room => (ROOM_TITLE, FLOOR_TITLE),
    }
}

pub fn is_writable_program(program: Program) -> bool {
    program.is_writable()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DeviceSnapshot {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "displayName": "Bathroom",
            "powerOn": true,
            "selectedProgram": "Timer",
            "temperatureSet": 19,
            "temperatureFloor": 15,
            "temperatureRoom": 17,
            "relayOn": true,
            "installedEffect": 470,
            "todaysOnMinutes": 216,
            "hasError": false
        }))
        .unwrap()
    }

    #[test]
    fn floor_regulator_uses_floor_as_primary() {
        let v = map_status(&snapshot(), Regulator::Floor);
        assert_eq!(v.measure_temperature, 15.0);
        assert_eq!(v.measure_temperature_alt, 17.0);
    }

    #[test]
    fn room_regulator_swaps_sensors() {
        let v = map_status(&snapshot(), Regulator::Room);
        assert_eq!(v.measure_temperature, 17.0);
        assert_eq!(v.measure_temperature_alt, 15.0);
    }

    #[test]
    fn power_is_installed_effect_while_relay_on() {
        let v = map_status(&snapshot(), Regulator::Floor);
        assert_eq!(v.measure_power, 470.0);
        assert_eq!(v.target_temperature, 19.0);
        assert_eq!(v.thermostat_program, Program::Timer);
        assert!(v.onoff);
    }

    #[test]
    fn idle_draw_while_relay_off() {
        let mut snap = snapshot();
        snap.relay_on = false;
        assert_eq!(map_status(&snap, Regulator::Floor).measure_power, IDLE_POWER_W);
    }

    #[test]
    fn missing_program_defaults_to_manual() {
        let mut snap = snapshot();
        snap.selected_program = None;
        assert_eq!(map_status(&snap, Regulator::Floor).thermostat_program, Program::Manual);
    }

    #[test]
    fn hotel_and_remote_are_read_only() {
        assert!(!is_writable_program(Program::Hotel));
        assert!(!is_writable_program(Program::Remote));
        assert!(is_writable_program(Program::Week));
    }

    #[test]
    fn titles_follow_regulator() {
        assert_eq!(regulator_titles(Regulator::Room), (ROOM_TITLE, FLOOR_TITLE));
    }
}
