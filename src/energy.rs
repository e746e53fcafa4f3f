use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;
use crate::store::{self, Store};

/// `watts * minutes / 60000 = kWh`
pub const WATT_MINUTES_PER_KWH: f64 = 60_000.0;

const ENERGY_KEY: &str = "energy";

pub fn kwh(minutes: u32, watts: f64) -> f64 {
    f64::from(minutes) * watts.max(0.0) / WATT_MINUTES_PER_KWH
}

/// Cumulative meter rebuilt from `todaysOnMinutes`, which restarts from zero
/// at local midnight. Each finished day is folded into the running total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyState {
    pub cumulative_energy_kwh: f64,
    pub last_todays_minutes: u32,
    pub last_date: NaiveDate,
}

impl EnergyState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            cumulative_energy_kwh: 0.0,
            last_todays_minutes: 0,
            last_date: today,
        }
    }

    /// Advance with a fresh reading and return the meter value in kWh.
    pub fn update(&mut self, todays_on_minutes: u32, installed_effect_watts: f64, today: NaiveDate) -> f64 {
        // A counter that went down means the vendor already started a new
        // day even if our calendar date has not moved yet.
        if today != self.last_date || todays_on_minutes < self.last_todays_minutes {
            let yesterday = kwh(self.last_todays_minutes, installed_effect_watts);
            self.cumulative_energy_kwh += yesterday;
            self.last_date = today;
            info!(
                added_kwh = yesterday,
                cumulative_kwh = self.cumulative_energy_kwh,
                "new day detected"
            );
        }

        let todays = kwh(todays_on_minutes, installed_effect_watts);
        self.last_todays_minutes = todays_on_minutes;
        let total = self.cumulative_energy_kwh + todays;
        debug!(today_kwh = todays, total_kwh = total, "energy updated");
        total
    }
}

/// Persists an [`EnergyState`] in a device store after every update.
pub struct EnergyTracker {
    store: Arc<dyn Store>,
    state: Option<EnergyState>,
}

impl EnergyTracker {
    pub fn load(store: Arc<dyn Store>) -> Result<Self> {
        let state = store::load(store.as_ref(), ENERGY_KEY)?;
        Ok(Self { store, state })
    }

    pub fn state(&self) -> Option<&EnergyState> {
        self.state.as_ref()
    }

    pub fn update(&mut self, todays_on_minutes: u32, installed_effect_watts: f64, today: NaiveDate) -> Result<f64> {
        let state = self.state.get_or_insert_with(|| EnergyState::new(today));
        let meter = state.update(todays_on_minutes, installed_effect_watts, today);
        store::save(self.store.as_ref(), ENERGY_KEY, &*state)?;
        Ok(meter)
    }

    /// Forget all history, as when the device is removed.
    pub fn reset(&mut self) -> Result<()> {
        self.state = None;
        self.store.remove(ENERGY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn first_reading_is_todays_energy() {
        let mut state = EnergyState::new(day(1));
        let meter = state.update(216, 470.0, day(1));
        assert!((meter - 1.692).abs() < 1e-9);
        assert_eq!(state.cumulative_energy_kwh, 0.0);
        assert_eq!(state.last_todays_minutes, 216);
    }

    #[test]
    fn counter_regression_without_date_change_is_a_rollover() {
        let mut state = EnergyState::new(day(1));
        state.update(100, 600.0, day(1));
        let meter = state.update(5, 600.0, day(1));
        assert!((state.cumulative_energy_kwh - 1.0).abs() < 1e-9);
        assert!((meter - 1.05).abs() < 1e-9);
    }

    #[test]
    fn zero_watts_contributes_nothing() {
        let mut state = EnergyState::new(day(1));
        assert_eq!(state.update(300, 0.0, day(1)), 0.0);
        assert_eq!(state.update(10, 0.0, day(2)), 0.0);
    }

    #[test]
    fn tracker_persists_and_reloads() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut tracker = EnergyTracker::load(store.clone()).unwrap();
        tracker.update(216, 470.0, day(1)).unwrap();

        let mut reloaded = EnergyTracker::load(store.clone()).unwrap();
        assert_eq!(reloaded.state().unwrap().last_todays_minutes, 216);
        let meter = reloaded.update(10, 470.0, day(2)).unwrap();
        assert!((meter - (1.692 + 10.0 * 470.0 / 60_000.0)).abs() < 1e-9);
    }

    #[test]
    fn reset_removes_persisted_state() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut tracker = EnergyTracker::load(store.clone()).unwrap();
        tracker.update(1, 100.0, day(1)).unwrap();
        tracker.reset().unwrap();
        assert!(store.get(ENERGY_KEY).unwrap().is_none());
        assert!(tracker.state().is_none());
    }
}
