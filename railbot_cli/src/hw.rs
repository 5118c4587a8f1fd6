//! Backend assembly: the simulated robot by default, Raspberry Pi I/O with the
//! `hardware` feature.

use std::sync::Arc;

use eyre::WrapErr;
use railbot_config::Config;
use railbot_traits::{Clock, IrChannel, IrSensors, MotorPair, StopSignal};

/// Fault-injection hook for tests: name an IR channel (e.g. `back_left`) whose
/// reads fail in the simulator.
pub const SIM_FAULT_ENV: &str = "RAILBOT_TEST_SIM_FAULT";

pub struct Backend {
    pub motors: Box<dyn MotorPair>,
    pub sensors: Box<dyn IrSensors>,
    /// Physical stop input, when the backend has one.
    pub button: Option<Box<dyn StopSignal>>,
    pub kind: &'static str,
}

#[cfg(not(feature = "hardware"))]
pub fn open(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<Backend> {
    use railbot_hardware::{SimParams, SimRobot};

    let params = SimParams {
        gain: [cfg.sim.left_gain, cfg.sim.right_gain],
        max_power: cfg.drive.max_power,
        wheel_width: cfg.drive.wheel_width,
        lateral_mm: cfg.sim.lateral_mm,
        heading_rad: cfg.sim.heading_deg.to_radians(),
        back_gap_mm: [cfg.sim.back_left_gap_mm, cfg.sim.back_right_gap_mm],
        noise: cfg.sim.noise,
        seed: cfg.sim.seed,
        ..SimParams::default()
    };
    let sim = SimRobot::new(params, clock);

    if let Ok(name) = std::env::var(SIM_FAULT_ENV) {
        let channel = IrChannel::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| eyre::eyre!("{SIM_FAULT_ENV}: unknown IR channel {name:?}"))?;
        tracing::warn!(channel = channel.name(), "injecting simulated sensor fault");
        sim.inject_sensor_fault(channel);
    }

    Ok(Backend {
        motors: Box::new(sim.motors()),
        sensors: Box::new(sim.sensors()),
        button: None,
        kind: "sim",
    })
}

#[cfg(feature = "hardware")]
pub fn open(cfg: &Config, _clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<Backend> {
    #[cfg(target_os = "linux")]
    {
        use railbot_hardware::pi::{Mcp3008Ir, PiMotors, PiStopButton};

        let pins = cfg
            .pins
            .as_ref()
            .ok_or_else(|| eyre::eyre!("hardware backend requires a [pins] section (missing)"))?;
        let motors = PiMotors::new(
            pins.left_pwm_channel,
            pins.right_pwm_channel,
            pins.left_dir,
            pins.right_dir,
            pins.left_encoder,
            pins.right_encoder,
            cfg.drive.max_power,
        )
        .wrap_err("open motor pins")?;
        let sensors = Mcp3008Ir::new(pins.adc_chip_select).wrap_err("open ir adc")?;
        let button = match pins.stop_in {
            Some(pin) => Some(Box::new(
                PiStopButton::new(pin, cfg.stop.active_low).wrap_err("open stop input")?,
            ) as Box<dyn StopSignal>),
            None => None,
        };
        Ok(Backend {
            motors: Box::new(motors),
            sensors: Box::new(sensors),
            button,
            kind: "pi",
        })
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = cfg;
        eyre::bail!("the hardware backend is only available on Linux")
    }
}

/// Read every IR channel and both encoders once, then make sure the motors are off.
pub fn self_check(backend: &mut Backend) -> eyre::Result<serde_json::Value> {
    use railbot_core::hw_error::map_hw_error;
    use railbot_traits::{Direction, Wheel};

    let mut ir = serde_json::Map::new();
    for channel in IrChannel::ALL {
        let raw = backend
            .sensors
            .read_raw(channel)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("reading {}", channel.name()))?;
        ir.insert(channel.name().to_string(), raw.into());
    }
    let mut encoders = Vec::with_capacity(2);
    for wheel in Wheel::ALL {
        let count = backend
            .motors
            .read_encoder(wheel)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading encoder")?;
        encoders.push(count);
        backend
            .motors
            .set_power(wheel, 0, Direction::Forward)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("set_power")?;
    }
    Ok(serde_json::json!({
        "backend": backend.kind,
        "ir": ir,
        "encoders": encoders,
    }))
}
