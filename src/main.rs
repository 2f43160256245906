use ble_sensor_gateway::domain::settings::SettingsService;
use ble_sensor_gateway::domain::telemetry::{LogPublisher, TelemetryPublisher};
use ble_sensor_gateway::gateway::Gateway;
use ble_sensor_gateway::infrastructure::bluetooth::simulated::{SimulatedDevice, SimulatedRadio};
use ble_sensor_gateway::infrastructure::logging;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = logging::init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    tracing::info!(
        "Starting BLE Sensor Gateway (settings: {})",
        settings_service.path().display()
    );

    match settings_service.save_if_missing() {
        Ok(true) => tracing::info!("Wrote default settings"),
        Ok(false) => {}
        Err(e) => tracing::warn!("Could not write default settings: {}", e),
    }

    let publishers: Vec<Arc<dyn TelemetryPublisher>> = vec![Arc::new(LogPublisher)];

    // No host radio binding yet: every configured sensor is served by the
    // in-process stack as a SensorTag reading 21.875 °C and 10 lux.
    let mut gateway = Gateway::build(&settings, publishers, |events| {
        let mut radio = SimulatedRadio::new(events);
        for sensor in &settings.sensors {
            radio.add_device(sensor, SimulatedDevice::sensortag(0x6000, 0x03E8));
        }
        radio
    })?;

    gateway
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await;

    tracing::info!("Gateway stopped");
    Ok(())
}
