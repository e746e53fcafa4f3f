mod capability;
mod client;
mod device;
mod diff;
mod energy;
mod error;
mod logger;
mod mapper;
mod mock;
mod pairing;
mod poller;
mod protocol;
mod settings;
mod store;
mod token;
mod types;

pub use capability::{Capability, CapabilityHost, CapabilityValue, CapabilityValues, MemoryHost};
pub use client::{DEFAULT_TIMEOUT, EbecoClient, EbecoClientBuilder};
pub use device::{DeviceData, SUPPRESSION_WINDOW, ThermostatDevice};
pub use energy::{EnergyState, EnergyTracker, WATT_MINUTES_PER_KWH, kwh};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use mapper::{FLOOR_TITLE, IDLE_POWER_W, ROOM_TITLE, is_writable_program, map_status, regulator_titles};
pub use mock::MOCK_ACCESS_TOKEN;
pub use pairing::{PairingCandidate, PairingSession};
pub use poller::PeriodicTask;
pub use protocol::{DEFAULT_BASE_URL, DEFAULT_TENANT_ID, TENANT_HEADER};
pub use settings::{
    DEFAULT_INTERVAL_SECS, DeviceSettings, MIN_POLL_INTERVAL, SettingKey, SettingsChange, poll_interval,
};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use token::{AuthToken, Authenticator, Credentials, RENEWAL_MARGIN_SECS, TokenManager};
pub use types::*;
