#![no_main]
use libfuzzer_sys::fuzz_target;
use railbot_core::{CalibrationCommand, Movement};

fuzz_target!(|data: &str| {
    // Anything that parses must print back as the canonical selector.
    if let Ok(cmd) = data.parse::<CalibrationCommand>() {
        assert_eq!(cmd.selector(), data);
    }
    if let Ok(m) = data.parse::<Movement>() {
        assert!(matches!(data, "F" | "L" | "R" | "forward" | "left" | "right"), "{m:?}");
    }
});
