use std::env;
use std::sync::Arc;
use std::time::Duration;

use ebeco_connect::{
    Capability, CapabilityHost, Credentials, DEFAULT_INTERVAL_SECS, MemoryHost, MemoryStore,
    PairingSession, Regulator, ThermostatDevice,
};

#[tokio::main]
async fn main() -> ebeco_connect::Result<()> {
    tracing_subscriber::fmt::init();

    // Without EBECO_USERNAME/EBECO_PASSWORD the built-in test account is used.
    let username = env::var("EBECO_USERNAME").unwrap_or_else(|_| "test".into());
    let password = env::var("EBECO_PASSWORD").unwrap_or_else(|_| "test".into());
    let interval = env::var("EBECO_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    let mut pairing = PairingSession::new();
    pairing.login(Credentials::new(username, password)).await?;
    let candidates = pairing.list_devices().await?;
    let Some(client) = pairing.client() else {
        return Ok(());
    };
    println!("Found {} thermostat(s)", candidates.len());

    let mut devices = Vec::new();
    for candidate in candidates {
        let mut settings = candidate.settings;
        settings.interval = interval;
        settings.regulator = Regulator::Floor;
        let host = Arc::new(MemoryHost::new());
        let device = ThermostatDevice::new(
            candidate.data,
            settings,
            client.clone(),
            host.clone(),
            Arc::new(MemoryStore::new()),
        )?;
        device.on_added()?;
        device.init().await;
        devices.push((device, host));
    }

    loop {
        for (device, host) in &devices {
            let value = |c: Capability| host.capability_value(c).and_then(|v| v.as_f64()).unwrap_or_default();
            println!(
                "[{}] set {:.1}\u{00b0}C | floor {:.1}\u{00b0}C | room {:.1}\u{00b0}C | {:.1} W | {:.3} kWh{}",
                device.name(),
                value(Capability::TargetTemperature),
                value(Capability::MeasureTemperature),
                value(Capability::MeasureTemperatureAlt),
                value(Capability::MeasurePower),
                value(Capability::MeterPower),
                match host.unavailable_reason() {
                    Some(reason) => format!(" | unavailable: {reason}"),
                    None => String::new(),
                },
            );
        }
        tokio::time::sleep(Duration::from_secs(interval.max(10))).await;
    }
}
