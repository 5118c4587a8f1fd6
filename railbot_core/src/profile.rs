//! Velocity profile and adaptive slave ratio of the master/slave drive.
//!
//! The master wheel follows a parabola over the fraction of the target covered:
//! slow at both ends and fastest half-way. `DriveCfg::reserve` is kept free
//! above `min_power` and below `max_power` so the slave, which runs at
//! `master * ratio`, can always be trimmed in both directions.

use crate::config::DriveCfg;

/// `-4r² + 4r`: 0 at both ends, 1 at `r = 0.5`.
#[inline]
pub fn parabola(r: f64) -> f64 {
    -4.0 * r * r + 4.0 * r
}

/// Fraction of `target` covered, clamped to `[0, 1]`. A non-positive target
/// counts as fully covered.
#[inline]
pub fn progress(traveled: i64, target: i64) -> f64 {
    if target <= 0 {
        return 1.0;
    }
    (traveled as f64 / target as f64).clamp(0.0, 1.0)
}

/// Unclamped master power at progress `r`.
#[inline]
pub fn master_power_raw(cfg: &DriveCfg, r: f64) -> f64 {
    let range = cfg.power_range();
    f64::from(cfg.min_power) + cfg.reserve() + range * parabola(r) * (cfg.chunks - 2.0) / cfg.chunks
}

/// Round to nearest and clamp into `[min_power, max_power]`. NaN maps to `min_power`.
#[inline]
pub fn clamp_power(cfg: &DriveCfg, p: f64) -> u16 {
    if p.is_nan() {
        return cfg.min_power;
    }
    let lo = f64::from(cfg.min_power);
    let hi = f64::from(cfg.max_power);
    // In range after the clamp; the cast cannot truncate.
    p.round().clamp(lo, hi) as u16
}

/// Master power at progress `r`, ready to command.
#[inline]
pub fn master_power(cfg: &DriveCfg, r: f64) -> u16 {
    clamp_power(cfg, master_power_raw(cfg, r))
}

/// Slave power for a given master power and ratio.
#[inline]
pub fn slave_power(cfg: &DriveCfg, master: u16, ratio: f64) -> u16 {
    clamp_power(cfg, f64::from(master) * ratio)
}

/// `(lower, upper)` bounds of the ratio: the slave must stay commandable when
/// the master sits at either end of its own range.
#[inline]
pub fn ratio_bounds(cfg: &DriveCfg) -> (f64, f64) {
    let min = f64::from(cfg.min_power);
    let max = f64::from(cfg.max_power);
    let reserve = cfg.reserve();
    (min / (min + reserve), max / (max - reserve))
}

/// Clamp `ratio` upper bound first, then lower bound.
#[inline]
pub fn clamp_ratio(cfg: &DriveCfg, ratio: f64) -> f64 {
    let (lo, hi) = ratio_bounds(cfg);
    ratio.min(hi).max(lo)
}

/// Blend the observed master/slave travel into the running ratio.
///
/// Slave travel at or below the noise floor keeps the previous ratio; the
/// result is clamped either way.
pub fn update_ratio(cfg: &DriveCfg, ratio: f64, master_traveled: i64, slave_traveled: i64) -> f64 {
    let next = if slave_traveled > cfg.ratio_noise_floor {
        let observed = master_traveled as f64 / slave_traveled as f64;
        cfg.ratio_weight * ratio + (1.0 - cfg.ratio_weight) * ratio * observed
    } else {
        ratio
    };
    clamp_ratio(cfg, next)
}
