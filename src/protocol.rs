use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::{Envelope, LoginRequest};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://ebecoconnect.com";
pub const DEFAULT_TENANT_ID: &str = "1";
pub const TENANT_HEADER: &str = "Abp.TenantId";

pub const AUTHENTICATE_PATH: &str = "/api/TokenAuth/Authenticate";
pub const USER_DEVICES_PATH: &str = "/api/services/app/Devices/GetUserDevices";
pub const DEVICE_BY_ID_PATH: &str = "/api/services/app/Devices/GetUserDeviceById";
pub const UPDATE_DEVICE_PATH: &str = "/api/services/app/Devices/UpdateUserDevice";
pub const ENERGY_DATA_PATH: &str = "/api/services/app/Devices/GetUserDeviceEnergyData";

const REDACTED_FIELDS: &[&str] = &["password", "accessToken", "userNameOrEmailAddress"];

pub fn device_by_id_path(id: u64) -> String {
    format!("{DEVICE_BY_ID_PATH}?id={id}")
}

pub fn energy_data_path(id: u64, from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "{ENERGY_DATA_PATH}?Id={id}&From={}&To={}",
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d")
    )
}

pub fn login_request(username: &str, password: &str) -> LoginRequest {
    LoginRequest {
        user_name_or_email_address: username.to_string(),
        password: password.to_string(),
    }
}

/// Decode a response body and pull `result` out of the envelope.
pub fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if !envelope.success {
        let message = envelope
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "request was not successful".to_string());
        return Err(Error::Api(message));
    }
    envelope
        .result
        .ok_or_else(|| Error::Api("missing result in response".to_string()))
}

/// Error message carried in a non-2xx body, if the vendor sent an envelope.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<Envelope<Value>>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Copy of `value` with secrets replaced, for logging.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if REDACTED_FIELDS.contains(&k.as_str()) {
                        (k.clone(), Value::String("<redacted>".to_string()))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn energy_path_formats_dates() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            energy_data_path(5, from, to),
            "/api/services/app/Devices/GetUserDeviceEnergyData?Id=5&From=2024-01-01&To=2024-01-31"
        );
    }

    #[test]
    fn unwrap_envelope_returns_result() {
        let v: Vec<u32> = unwrap_envelope(r#"{"result":[1,2],"success":true}"#).unwrap();
        assert_eq!(v, vec![1, 2]);
    }

    #[test]
    fn unwrap_envelope_failure_surfaces_message() {
        let err = unwrap_envelope::<Value>(
            r#"{"result":null,"success":false,"error":{"code":0,"message":"nope"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Api(ref m) if m == "nope"));
    }

    #[test]
    fn redact_hides_nested_secrets() {
        let body = json!({"password": "x", "inner": [{"accessToken": "t", "id": 1}]});
        let out = redact(&body);
        assert_eq!(out["password"], "<redacted>");
        assert_eq!(out["inner"][0]["accessToken"], "<redacted>");
        assert_eq!(out["inner"][0]["id"], 1);
    }
}
