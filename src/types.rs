use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Thermostat program as reported by Ebeco Connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Program {
    #[default]
    Manual,
    Week,
    Timer,
    Remote,
    Hotel,
}

impl Program {
    pub fn as_vendor_str(&self) -> &'static str {
        match self {
            Program::Manual => "Manual",
            Program::Week => "Week",
            Program::Timer => "Timer",
            Program::Remote => "Remote",
            Program::Hotel => "Hotel",
        }
    }

    pub fn from_vendor_str(s: &str) -> Option<Self> {
        match s {
            "Manual" => Some(Program::Manual),
            "Week" => Some(Program::Week),
            "Timer" => Some(Program::Timer),
            "Remote" => Some(Program::Remote),
            "Hotel" => Some(Program::Hotel),
            _ => None,
        }
    }

    /// `Remote` and `Hotel` are only ever set on the thermostat itself.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Program::Remote | Program::Hotel)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_vendor_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Standby,
    Active,
    Timer,
}

impl ProgramState {
    pub fn from_vendor_str(s: &str) -> Option<Self> {
        match s {
            "Standby" => Some(ProgramState::Standby),
            "Active" => Some(ProgramState::Active),
            "Timer" => Some(ProgramState::Timer),
            _ => None,
        }
    }
}

/// Which sensor drives the primary measured temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Regulator {
    #[default]
    #[serde(rename = "temperatureFloor")]
    Floor,
    #[serde(rename = "temperatureRoom")]
    Room,
}

impl Regulator {
    pub fn as_vendor_str(&self) -> &'static str {
        match self {
            Regulator::Floor => "temperatureFloor",
            Regulator::Room => "temperatureRoom",
        }
    }

    pub fn from_vendor_str(s: &str) -> Option<Self> {
        match s {
            "temperatureFloor" | "floor" => Some(Regulator::Floor),
            "temperatureRoom" | "room" => Some(Regulator::Room),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: u64,
    pub name: String,
}

/// One thermostat as returned by `GetUserDevices` / `GetUserDeviceById`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub id: u64,
    pub display_name: String,
    pub power_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_state: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub temperature_set: f64,
    pub temperature_floor: f64,
    pub temperature_room: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_floor_decimals: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_room_decimals: Option<f64>,
    pub relay_on: bool,
    #[serde(default)]
    pub minutes_to_target: u32,
    #[serde(default)]
    pub remote_input: bool,
    /// Installed heating power in watts.
    pub installed_effect: f64,
    pub todays_on_minutes: u32,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<Building>,
}

impl DeviceSnapshot {
    pub fn program(&self) -> Option<Program> {
        self.selected_program.as_deref().and_then(Program::from_vendor_str)
    }

    pub fn program_state(&self) -> Option<ProgramState> {
        self.program_state.as_deref().and_then(ProgramState::from_vendor_str)
    }
}

/// Body of `UpdateUserDevice`. Unset fields are left untouched by the vendor.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUpdate {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_set: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_program: Option<Program>,
}

/// Daily entry from `GetUserDeviceEnergyData`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyData {
    pub date: String,
    /// kWh for the day.
    pub total_consumption: f64,
    pub total_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Wrapper around every Ebeco Connect response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub un_authorized_request: bool,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name_or_email_address: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_name_or_email_address", &self.user_name_or_email_address)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expire_in_seconds: i64,
    #[serde(default)]
    pub requires_two_factor_verification: bool,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access_token", &"<redacted>")
            .field("expire_in_seconds", &self.expire_in_seconds)
            .field(
                "requires_two_factor_verification",
                &self.requires_two_factor_verification,
            )
            .finish()
    }
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_vendor_payload() {
        let json = serde_json::json!({
            "id": 7,
            "displayName": "Hall",
            "powerOn": true,
            "selectedProgram": "Week",
            "programState": "Active",
            "temperatureSet": "21.5",
            "temperatureFloor": 24,
            "temperatureRoom": 20,
            "relayOn": false,
            "installedEffect": 600,
            "todaysOnMinutes": 42,
            "hasError": false,
            "building": { "id": 1, "name": "Home" }
        });
        let snap: DeviceSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snap.temperature_set, 21.5);
        assert_eq!(snap.program(), Some(Program::Week));
        assert_eq!(snap.program_state(), Some(ProgramState::Active));
        assert_eq!(snap.building.unwrap().name, "Home");
    }

    #[test]
    fn unknown_program_maps_to_none() {
        assert_eq!(Program::from_vendor_str("Vacation"), None);
    }

    #[test]
    fn device_update_omits_unset_fields() {
        let update = DeviceUpdate {
            id: 3,
            temperature_set: Some(22.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"id": 3, "temperatureSet": 22.0}));
    }

    #[test]
    fn login_request_debug_hides_password() {
        let req = LoginRequest {
            user_name_or_email_address: "me@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{req:?}").contains("hunter2"));
    }

    #[test]
    fn regulator_wire_names() {
        let r: Regulator = serde_json::from_str("\"temperatureRoom\"").unwrap();
        assert_eq!(r, Regulator::Room);
        assert_eq!(Regulator::default().as_vendor_str(), "temperatureFloor");
    }
}
