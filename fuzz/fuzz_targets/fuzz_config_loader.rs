#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = railbot_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A config that validates must also pass the runtime checks.
            let drive = railbot_core::DriveCfg::from(&cfg.drive);
            let primitives = railbot_core::PrimitiveCfg::from(&cfg.primitives);
            let calibration = railbot_core::CalibrationCfg::from(&cfg.calibration);
            assert!(
                railbot_core::validate(&drive, &primitives, &calibration).is_ok(),
                "config validate and runtime validate disagree"
            );
        }
    }
});
