use std::sync::Mutex;

use tracing::debug;

use crate::types::{Building, DeviceSnapshot, DeviceUpdate, LoginResponse};
use crate::{Error, Result};

pub const MOCK_ACCESS_TOKEN: &str = "test-token";
const MOCK_TOKEN_LIFETIME_SECS: i64 = 86_400;

/// In-memory account served for the `test`/`test` credentials.
pub(crate) struct MockBackend {
    devices: Mutex<Vec<DeviceSnapshot>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(vec![
                canned("Bathroom", 1, 19.0, 15.0, 17.0, true, 470.0),
                canned("Living Room", 2, 22.0, 23.0, 19.0, false, 470.0),
                canned("Kitchen", 3, 20.0, 20.0, 20.0, false, 500.0),
            ]),
        }
    }

    pub fn login(&self) -> LoginResponse {
        LoginResponse {
            access_token: MOCK_ACCESS_TOKEN.to_string(),
            expire_in_seconds: MOCK_TOKEN_LIFETIME_SECS,
            requires_two_factor_verification: false,
        }
    }

    pub fn devices(&self) -> Vec<DeviceSnapshot> {
        self.lock().clone()
    }

    pub fn device(&self, id: u64) -> Result<DeviceSnapshot> {
        self.lock()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or(Error::DeviceNotFound(id))
    }

    pub fn update(&self, update: &DeviceUpdate) -> Result<bool> {
        let mut devices = self.lock();
        let device = devices
            .iter_mut()
            .find(|d| d.id == update.id)
            .ok_or(Error::DeviceNotFound(update.id))?;
        if let Some(t) = update.temperature_set {
            device.temperature_set = t;
        }
        if let Some(on) = update.power_on {
            device.power_on = on;
        }
        if let Some(p) = update.selected_program {
            device.selected_program = Some(p.as_vendor_str().to_string());
        }
        debug!(device_id = update.id, "mock device updated");
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeviceSnapshot>> {
        self.devices.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn canned(
    name: &str,
    id: u64,
    set: f64,
    floor: f64,
    room: f64,
    relay_on: bool,
    watts: f64,
) -> DeviceSnapshot {
    DeviceSnapshot {
        id,
        display_name: name.to_string(),
        power_on: true,
        selected_program: Some("Manual".to_string()),
        program_state: Some("Standby".to_string()),
        temperature_set: set,
        temperature_floor: floor,
        temperature_room: room,
        temperature_floor_decimals: Some(floor),
        temperature_room_decimals: Some(room),
        relay_on,
        minutes_to_target: 0,
        remote_input: false,
        installed_effect: watts,
        todays_on_minutes: 216,
        has_error: false,
        error_message: None,
        sensor_application: None,
        building: Some(Building {
            id: 1,
            name: "Elm street".to_string(),
        }),
    }
}
