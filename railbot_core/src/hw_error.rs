//! Maps `Box<dyn Error>` from trait boundaries to typed `RailError`.
//!
//! The traits in `railbot_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `railbot_hardware::HwError` downcasting.

use crate::error::RailError;

/// Map a trait-boundary error to a typed `RailError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RailError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<railbot_hardware::HwError>() {
            return match hw {
                railbot_hardware::HwError::Io(io) => RailError::Hardware(io.to_string()),
                other => RailError::HardwareFault(other.to_string()),
            };
        }
    }

    RailError::Hardware(e.to_string())
}

/// Wrap a boxed collaborator error into an `eyre::Report` with context.
pub(crate) fn hw_report(e: railbot_traits::BoxError, context: &'static str) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e)).wrap_err(context)
}
