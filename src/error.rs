//! Error types for the JV-Link bridge.
//!
//! Every failure the bridge can observe is represented by [`BridgeError`]. Errors
//! carry enough structured context (method names, raw HRESULTs, remote return
//! codes) to be folded into the single JSON result the bridge emits.
//!
//! ## Error Categories
//!
//! - **Dispatch Errors**: name resolution and raw `IDispatch::Invoke` failures
//! - **Protocol Errors**: JV-Link returned a code that ends a stage
//! - **Transport Faults**: an unexpected failure while talking to the component
//! - **Setup Errors**: COM activation, configuration, platform support
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use jvbridge::BridgeError;
//!
//! let error = BridgeError::SessionOpenFailed { code: -201 };
//! if !error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! ## Helper Constructors
//!
//! ```rust
//! use jvbridge::BridgeError;
//!
//! let invoke = BridgeError::remote_invocation("JVStatus", 0x8002_0009_u32 as i32);
//! assert_eq!(invoke.hresult(), Some(0x8002_0009_u32 as i32));
//!
//! let config = BridgeError::config("read_max_wait_sec must be a number");
//! assert!(config.hresult().is_none());
//! ```

use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for bridge operations.
pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

/// Main error type for bridge operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("IDispatch::GetIDsOfNames failed for '{name}' (hr={hresult:#010x})")]
    RemoteNameNotFound { name: String, hresult: i32 },

    #[error("IDispatch::Invoke failed for {method} (hr={hresult:#010x})")]
    RemoteInvocation { method: String, hresult: i32 },

    #[error("JVOpen returned {code}")]
    SessionOpenFailed { code: i32 },

    #[error(
        "JVStatus did not reach 0 within the poll window ({polls} polls); JVRead not attempted (require_status_zero)"
    )]
    StatusGateNotSatisfied { polls: usize },

    #[error("JVRead returned {code}; size={size}; filename={filename}")]
    ReadTerminal { code: i32, size: i32, filename: String },

    #[error("Transport fault during {operation}")]
    TransportFault {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Cannot build call frame for {method}: {details}")]
    FrameBinding { method: String, details: String },

    #[error("Failed to activate COM object '{prog_id}'")]
    Activation {
        prog_id: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl BridgeError {
    /// Returns whether this error is potentially recoverable by running the bridge again.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::RemoteNameNotFound { .. } => false,
            BridgeError::RemoteInvocation { .. } => true,
            BridgeError::SessionOpenFailed { .. } => false,
            BridgeError::StatusGateNotSatisfied { .. } => true,
            BridgeError::ReadTerminal { .. } => false,
            BridgeError::TransportFault { .. } => true,
            BridgeError::FrameBinding { .. } => false,
            BridgeError::Activation { .. } => false,
            BridgeError::Config { .. } => false,
            BridgeError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            BridgeError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            BridgeError::RemoteNameNotFound { .. } => vec![
                "Check the installed JV-Link version exposes this method",
                "Method names are case-sensitive",
            ],
            BridgeError::RemoteInvocation { .. } => vec![
                "Retry after JV-Link finishes its background download",
                "Check the JV-Link service key is registered",
            ],
            BridgeError::SessionOpenFailed { .. } => vec![
                "Verify the dataspec and fromdate combination",
                "Check the option flag is valid for this dataspec",
                "Run JV-Link setup to confirm the service key",
            ],
            BridgeError::StatusGateNotSatisfied { .. } => vec![
                "Increase status_poll_max_wait_sec",
                "Increase sleep_after_open_sec",
                "Disable require_status_zero to attempt the read anyway",
            ],
            BridgeError::ReadTerminal { .. } => vec![
                "Inspect attempts_tail for the sequence of return codes",
                "Increase read_max_wait_sec if the download was still running",
            ],
            BridgeError::TransportFault { .. } => vec![
                "Run the bridge again",
                "Build the bridge for 32-bit Windows to match JV-Link",
            ],
            BridgeError::FrameBinding { .. } => vec![
                "Bind every declared parameter exactly once",
            ],
            BridgeError::Activation { .. } => vec![
                "Ensure JV-Link is installed and registered",
                "Run a 32-bit build of the bridge",
                "Check prog_id in the configuration",
            ],
            BridgeError::Config { .. } => vec![
                "Check the YAML configuration file syntax",
                "Check environment variable values",
            ],
            BridgeError::UnsupportedPlatform { .. } => vec![
                "Run the bridge on Windows where JV-Link is installed",
            ],
            #[cfg(windows)]
            BridgeError::WindowsApi { .. } => vec![
                "Check COM registration of the component",
                "Verify the process apartment model",
            ],
        }
    }

    /// The raw HRESULT behind this error, when one exists.
    pub fn hresult(&self) -> Option<i32> {
        match self {
            BridgeError::RemoteNameNotFound { hresult, .. } => Some(*hresult),
            BridgeError::RemoteInvocation { hresult, .. } => Some(*hresult),
            #[cfg(windows)]
            BridgeError::WindowsApi { source, .. } => Some(source.code().0),
            #[cfg(windows)]
            BridgeError::Activation { source: Some(source), .. } => {
                source.downcast_ref::<core::Error>().map(|e| e.code().0)
            }
            _ => None,
        }
    }

    /// Helper constructor for raw invocation failures.
    pub fn remote_invocation(method: impl Into<String>, hresult: i32) -> Self {
        BridgeError::RemoteInvocation { method: method.into(), hresult }
    }

    /// Helper constructor for transport faults.
    pub fn transport_fault(
        operation: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        BridgeError::TransportFault { operation: operation.into(), source }
    }

    /// Helper constructor for call frame binding errors.
    pub fn frame_binding(method: impl Into<String>, details: impl Into<String>) -> Self {
        BridgeError::FrameBinding { method: method.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        BridgeError::Config { details: details.into() }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        BridgeError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        BridgeError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

/// Formats an HRESULT the way COM tooling prints it (`0x8002000E`).
pub fn format_hresult(hresult: i32) -> String {
    format!("0x{:08X}", hresult as u32)
}

impl From<serde_yaml_ng::Error> for BridgeError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        BridgeError::Config { details: err.to_string() }
    }
}

#[cfg(windows)]
impl From<core::Error> for BridgeError {
    fn from(err: core::Error) -> Self {
        BridgeError::WindowsApi { operation: "Unknown Windows operation".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            name in "[A-Za-z]{1,16}",
            hresult in any::<i32>(),
            code in -1000i32..1000i32,
            size in any::<i32>(),
            filename in "[A-Z0-9]{0,20}"
          ) {
            let name_err = BridgeError::RemoteNameNotFound { name: name.clone(), hresult };
            prop_assert!(name_err.to_string().contains(&name));
            prop_assert_eq!(name_err.hresult(), Some(hresult));

            let open_err = BridgeError::SessionOpenFailed { code };
            prop_assert_eq!(open_err.to_string(), format!("JVOpen returned {}", code));

            let read_err = BridgeError::ReadTerminal { code, size, filename: filename.clone() };
            let msg = read_err.to_string();
            let size_field = format!("size={size}");
            let filename_field = format!("filename={filename}");
            prop_assert!(msg.contains(&size_field), "{} lacks {}", msg, size_field);
            prop_assert!(msg.ends_with(&filename_field), "{} lacks {}", msg, filename_field);
          }

          #[test]
          fn hresult_formatting_is_fixed_width(hresult in any::<i32>()) {
            let text = format_hresult(hresult);
            prop_assert_eq!(text.len(), 10);
            prop_assert!(text.starts_with("0x"));
            prop_assert_eq!(u32::from_str_radix(&text[2..], 16).unwrap(), hresult as u32);
          }
        }
    }

    #[test]
    fn hresult_formats_like_com_tooling() {
        assert_eq!(format_hresult(0x8002_000E_u32 as i32), "0x8002000E");
        assert_eq!(format_hresult(0), "0x00000000");
    }

    #[test]
    fn transport_fault_keeps_source_chain() {
        let io = std::io::Error::other("RPC server unavailable");
        let fault = BridgeError::transport_fault("JVRead", Box::new(io));
        let source = std::error::Error::source(&fault).expect("source should be kept");
        assert_eq!(source.to_string(), "RPC server unavailable");
        assert!(fault.hresult().is_none());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<BridgeError>();

        let error = BridgeError::config("bad");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let gate = BridgeError::StatusGateNotSatisfied { polls: 3 };
        let open = BridgeError::SessionOpenFailed { code: -1 };

        assert!(gate.is_retryable());
        assert!(!open.is_retryable());

        for suggestion in gate.recovery_suggestions().iter().chain(open.recovery_suggestions().iter())
        {
            assert!(suggestion.len() > 5);
        }
    }

    #[test]
    fn yaml_errors_become_config_errors() {
        let err = serde_yaml_ng::from_str::<u32>("[unclosed").unwrap_err();
        let bridge: BridgeError = err.into();
        assert!(matches!(bridge, BridgeError::Config { .. }));
    }
}
