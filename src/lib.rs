//! Process-isolated bridge to the JV-Link racing-data component.
//!
//! JV-Link is a 32-bit COM/ActiveX component. Calling its `JVRead` method
//! through a dynamic scripting host crashes the host process, so this crate
//! calls it the hard way: it walks the object's `IDispatch` vtable and passes
//! raw byte buffers as `VT_BYREF | VT_UI1` arguments.
//!
//! # Features
//!
//! - **Raw dispatch**: name resolution and `Invoke` through vtable slots 5 and 6
//! - **Named binding**: call frames bind arguments by parameter name and handle
//!   the reverse ordering `Invoke` expects
//! - **Growable reads**: zeroed per-attempt buffers that grow up to 8 MiB
//! - **Legacy text**: Shift_JIS decoding by default, configurable code page
//! - **Session protocol**: init, open, status poll, read and close, with the
//!   failure stage preserved in one JSON result
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jvbridge::{Bridge, config::BridgeConfig};
//!
//! let result = Bridge::run(&BridgeConfig::default());
//! println!("{}", result.to_json_line());
//! std::process::exit(i32::from(result.exit_code()));
//! ```
//!
//! Any [`JvLink`] implementation can be driven by the [`Orchestrator`], which
//! is how the protocol is tested away from Windows.

// Core types and error handling
pub mod clock;
pub mod codec;
pub mod config;
mod error;
#[cfg(test)]
pub mod test_utils;
pub mod types;

// Invocation layers
pub mod dispatch;
pub mod link;
pub mod methods;
pub mod orchestrator;
pub mod reader;

// Process shell
pub mod cli;
pub mod logging;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use clock::{Clock, SystemClock};
pub use error::*;
pub use link::JvLink;
pub use orchestrator::Orchestrator;
pub use types::*;

use config::BridgeConfig;

/// Entry point that picks the platform's JV-Link session.
pub struct Bridge;

impl Bridge {
    /// Activate JV-Link and run one session.
    ///
    /// Never fails; activation and platform errors are reported in the result.
    #[cfg(windows)]
    pub fn run(config: &BridgeConfig) -> BridgeResult {
        windows::run_session(config)
    }

    /// JV-Link only exists on Windows; report that as a setup failure.
    #[cfg(not(windows))]
    pub fn run(config: &BridgeConfig) -> BridgeResult {
        tracing::warn!(prog_id = %config.prog_id, "JV-Link is not available on this platform");
        BridgeResult::setup_failure(&BridgeError::unsupported_platform("JV-Link COM activation", "Windows"))
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn non_windows_run_reports_unsupported_platform() {
        let result = Bridge::run(&BridgeConfig::default());
        assert!(!result.ok);
        assert_eq!(result.stage, Some(Stage::Init));
        assert_eq!(result.error.as_deref(), Some("JV-Link COM activation is only available on Windows"));
        assert_eq!(result.exit_code(), 1);
    }
}
