use std::sync::Arc;

use chrono::NaiveDate;
use ebeco_connect::{EnergyState, EnergyTracker, JsonFileStore, Store, kwh};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn first_day_then_rollover() {
    let mut state = EnergyState::new(day(1));
    assert!(close(state.update(216, 470.0, day(1)), 1.692));

    let next = state.update(10, 470.0, day(2));
    assert!(close(next, 1.692 + kwh(10, 470.0)));
    assert!(close(next, 1.770_333));
    assert!(close(state.cumulative_energy_kwh, 1.692));
    assert_eq!(state.last_date, day(2));
}

#[test]
fn meter_never_decreases() {
    // (minutes, day) readings including resets, skipped days and repeats.
    let readings = [
        (0, 1),
        (30, 1),
        (30, 1),
        (400, 1),
        (5, 1),
        (5, 2),
        (120, 2),
        (0, 4),
        (0, 4),
        (1440, 4),
        (60, 5),
    ];
    let mut state = EnergyState::new(day(1));
    let mut last = 0.0;
    for (minutes, d) in readings {
        let meter = state.update(minutes, 850.0, day(d));
        assert!(meter >= last, "meter went from {last} to {meter}");
        last = meter;
    }
    assert!(state.cumulative_energy_kwh >= 0.0);
}

#[test]
fn negative_power_counts_as_zero() {
    let mut state = EnergyState::new(day(1));
    assert_eq!(state.update(100, -50.0, day(1)), 0.0);
}

#[test]
fn state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("device.json");

    {
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::open(&file).unwrap());
        let mut tracker = EnergyTracker::load(store).unwrap();
        tracker.update(216, 470.0, day(1)).unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(JsonFileStore::open(&file).unwrap());
    let mut tracker = EnergyTracker::load(store).unwrap();
    assert_eq!(tracker.state().unwrap().last_date, day(1));
    let meter = tracker.update(10, 470.0, day(2)).unwrap();
    assert!(close(meter, 1.770_333));
}
