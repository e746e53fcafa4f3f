use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::capability::{Capability, CapabilityHost};
use crate::client::EbecoClient;
use crate::energy::EnergyTracker;
use crate::mapper::{is_writable_program, map_status, regulator_titles};
use crate::poller::PeriodicTask;
use crate::settings::{DeviceSettings, SettingKey, SettingsChange};
use crate::store::Store;
use crate::types::{DeviceUpdate, Program, Regulator};
use crate::{Error, Result};

/// How long polls leave a user-set target temperature alone. The vendor
/// keeps returning the previous setpoint for a while after an update.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(120);

/// Identity of a paired thermostat as stored by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceData {
    pub id: u64,
    pub name: String,
}

pub struct ThermostatDevice {
    data: DeviceData,
    name: Mutex<String>,
    settings: Mutex<DeviceSettings>,
    client: Mutex<Arc<EbecoClient>>,
    host: Arc<dyn CapabilityHost>,
    store: Arc<dyn Store>,
    energy: tokio::sync::Mutex<EnergyTracker>,
    suppress_until: Mutex<Option<Instant>>,
    poller: Mutex<Option<PeriodicTask>>,
}

impl ThermostatDevice {
    pub fn new(
        data: DeviceData,
        settings: DeviceSettings,
        client: Arc<EbecoClient>,
        host: Arc<dyn CapabilityHost>,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Self>> {
        let energy = EnergyTracker::load(store.clone())?;
        Ok(Arc::new(Self {
            name: Mutex::new(data.name.clone()),
            data,
            settings: Mutex::new(settings),
            client: Mutex::new(client),
            host,
            store,
            energy: tokio::sync::Mutex::new(energy),
            suppress_until: Mutex::new(None),
            poller: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.data.id
    }

    pub fn name(&self) -> String {
        lock(&self.name).clone()
    }

    pub fn settings(&self) -> DeviceSettings {
        lock(&self.settings).clone()
    }

    pub fn client(&self) -> Arc<EbecoClient> {
        lock(&self.client).clone()
    }

    /// Load current state, then poll on the configured interval.
    pub async fn init(self: &Arc<Self>) {
        info!(device_id = self.id(), "device loaded");
        self.print_info();
        self.poll_logged().await;
        self.start_polling(self.settings().poll_interval());
    }

    pub fn on_added(&self) -> Result<()> {
        info!(device_id = self.id(), "device added");
        self.print_info();
        self.apply_regulator_titles(self.settings().regulator)
    }

    pub fn on_renamed(&self, name: &str) {
        info!(device_id = self.id(), "{name} renamed");
        *lock(&self.name) = name.to_string();
    }

    /// Stops polling and drops all persisted per-device state.
    pub async fn on_deleted(&self) -> Result<()> {
        info!(device_id = self.id(), "{} deleted", self.name());
        self.stop_polling();
        self.energy.lock().await.reset()?;
        self.store.clear()
    }

    pub fn on_settings(self: &Arc<Self>, change: &SettingsChange) -> Result<()> {
        for line in change.describe() {
            info!(device_id = self.id(), "{line}");
        }

        if change.credentials_changed() {
            let client = self.client().with_credentials(change.new.credentials())?;
            *lock(&self.client) = Arc::new(client);
            info!(device_id = self.id(), "account credentials replaced");
        }

        *lock(&self.settings) = change.new.clone();

        if change.contains(SettingKey::Regulator) {
            self.apply_regulator_titles(change.new.regulator)?;
        }

        if change.old.interval != change.new.interval {
            info!(
                device_id = self.id(),
                "replacing poll interval of {}s with {}s", change.old.interval, change.new.interval
            );
            self.restart_polling(change.new.poll_interval());
        }
        Ok(())
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.poller).as_ref().is_some_and(PeriodicTask::is_running)
    }

    pub fn poll_period(&self) -> Option<Duration> {
        lock(&self.poller).as_ref().and_then(PeriodicTask::period)
    }

    /// Fetch the device and write every capability. Uses today's local date
    /// for energy bookkeeping.
    pub async fn poll(&self) -> Result<()> {
        self.poll_on(Local::now().date_naive()).await
    }

    /// [`poll`](Self::poll) with an explicit calendar date.
    pub async fn poll_on(&self, today: NaiveDate) -> Result<()> {
        let client = self.client();
        let snapshot = match client.get_device(self.id()).await {
            Ok(s) => s,
            Err(e) => {
                if matches!(e, Error::Auth(_) | Error::TwoFactorRequired) {
                    self.host.set_unavailable(&e.to_string())?;
                }
                return Err(e);
            }
        };
        trace!(device_id = self.id(), ?snapshot, "device data");
        if snapshot.has_error {
            warn!(
                device_id = self.id(),
                message = snapshot.error_message.as_deref().unwrap_or("unknown"),
                "thermostat reports an error"
            );
        }

        let mut values = map_status(&snapshot, self.settings().regulator);
        match self
            .energy
            .lock()
            .await
            .update(snapshot.todays_on_minutes, snapshot.installed_effect, today)
        {
            Ok(kwh) => values.meter_power = Some(kwh),
            Err(e) => error!(device_id = self.id(), "error updating cumulative energy: {e}"),
        }

        let suppressed = self.target_suppressed();
        for (capability, value) in values.entries() {
            if suppressed && capability == Capability::TargetTemperature {
                trace!(device_id = self.id(), "target temperature update suppressed");
                continue;
            }
            self.host.set_capability_value(capability, value)?;
        }
        self.host.set_available()?;
        Ok(())
    }

    pub async fn set_target_temperature(&self, value: f64) -> Result<()> {
        self.host
            .set_capability_value(Capability::TargetTemperature, value.into())?;
        self.begin_suppression();
        if let Err(e) = self.push_state().await {
            self.end_suppression();
            return Err(e);
        }
        Ok(())
    }

    pub async fn set_on_off(&self, on: bool) -> Result<()> {
        self.host.set_capability_value(Capability::OnOff, on.into())?;
        self.push_state().await
    }

    /// `Hotel` and `Remote` are accepted and ignored.
    pub async fn set_program(&self, program: Program) -> Result<()> {
        if !is_writable_program(program) {
            debug!(device_id = self.id(), %program, "ignoring read-only program");
            return Ok(());
        }
        self.host
            .set_capability_value(Capability::ThermostatProgram, program.into())?;
        self.push_state().await
    }

    /// Condition used by host automations.
    pub fn program_equals(&self, program: Program) -> bool {
        self.host
            .capability_value(Capability::ThermostatProgram)
            .and_then(|v| v.as_program())
            == Some(program)
    }

    fn start_polling(self: &Arc<Self>, period: Duration) {
        let weak = Arc::downgrade(self);
        let mut poller = lock(&self.poller);
        if let Some(task) = poller.as_mut() {
            task.restart(period);
            return;
        }
        let mut task = PeriodicTask::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(device) = weak.upgrade() {
                    device.poll_logged().await;
                }
            }
        });
        task.start(period);
        info!(device_id = self.id(), interval_secs = period.as_secs(), "polling started");
        *poller = Some(task);
    }

    /// Only a live poller is restarted; a deleted device stays stopped.
    fn restart_polling(&self, period: Duration) {
        if let Some(task) = lock(&self.poller).as_mut() {
            task.restart(period);
        }
    }

    fn stop_polling(&self) {
        if let Some(mut task) = lock(&self.poller).take() {
            task.stop();
        }
    }

    async fn poll_logged(&self) {
        match self.poll().await {
            Ok(()) => {}
            Err(e) if e.is_retryable() => warn!(device_id = self.id(), "poll skipped: {e}"),
            Err(e) => error!(device_id = self.id(), "poll failed: {e}"),
        }
    }

    async fn push_state(&self) -> Result<()> {
        let update = DeviceUpdate {
            id: self.id(),
            temperature_set: self
                .host
                .capability_value(Capability::TargetTemperature)
                .and_then(|v| v.as_f64()),
            power_on: self
                .host
                .capability_value(Capability::OnOff)
                .and_then(|v| v.as_bool()),
            selected_program: self
                .host
                .capability_value(Capability::ThermostatProgram)
                .and_then(|v| v.as_program())
                .filter(|p| is_writable_program(*p)),
        };
        debug!(device_id = self.id(), ?update, "sending device update");
        if self.client().update_device(&update).await? {
            Ok(())
        } else {
            Err(Error::Api("device update was not accepted".to_string()))
        }
    }

    fn begin_suppression(&self) {
        *lock(&self.suppress_until) = Some(Instant::now() + SUPPRESSION_WINDOW);
    }

    fn end_suppression(&self) {
        *lock(&self.suppress_until) = None;
    }

    fn target_suppressed(&self) -> bool {
        let mut until = lock(&self.suppress_until);
        match *until {
            Some(deadline) if Instant::now() < deadline => true,
            Some(_) => {
                *until = None;
                false
            }
            None => false,
        }
    }

    fn apply_regulator_titles(&self, regulator: Regulator) -> Result<()> {
        let (primary, alt) = regulator_titles(regulator);
        debug!(device_id = self.id(), ?regulator, "updating measured temperature titles");
        self.host
            .set_capability_title(Capability::MeasureTemperature, primary)?;
        self.host
            .set_capability_title(Capability::MeasureTemperatureAlt, alt)
    }

    fn print_info(&self) {
        let settings = self.settings();
        info!(
            device_id = self.id(),
            name = %self.name(),
            interval = settings.interval,
            regulator = settings.regulator.as_vendor_str(),
            "device info"
        );
    }
}

impl Drop for ThermostatDevice {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
