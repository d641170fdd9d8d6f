//! JV-Link over COM.
//!
//! JV-Link is an in-process 32-bit ActiveX component, so the bridge must be
//! built for `i686-pc-windows-msvc` to activate it.
//!
//! Teardown order is fixed by scope: the [`com::ComObject`] is released
//! before the [`com::Apartment`] is left, on every exit path.
//!
//! # Usage
//!
//! ```rust,ignore
//! use jvbridge::config::BridgeConfig;
//!
//! let result = jvbridge::windows::run_session(&BridgeConfig::default());
//! println!("{}", result.to_json_line());
//! ```

pub mod com;
mod link;
mod typeinfo;

pub use com::{Apartment, ComObject};
pub use link::DispatchLink;

use crate::clock::SystemClock;
use crate::codec::TextCodec;
use crate::config::BridgeConfig;
use crate::orchestrator::Orchestrator;
use crate::types::BridgeResult;
use tracing::{debug, info, warn};

/// Activate JV-Link and run one session against it.
///
/// Activation failures are reported as a result at stage `init`.
pub fn run_session(config: &BridgeConfig) -> BridgeResult {
    info!(
        dataspec = %config.dataspec,
        fromdate = %config.fromdate,
        option = config.option,
        save_path = %config.save_path,
        "Starting JV-Link session"
    );

    let apartment = match Apartment::enter() {
        Ok(apartment) => apartment,
        Err(err) => return setup_failed(err),
    };
    let object = match ComObject::activate(&apartment, &config.prog_id) {
        Ok(object) => object,
        Err(err) => return setup_failed(err),
    };
    let dispatch = match object.dispatch() {
        Ok(dispatch) => dispatch,
        Err(err) => return setup_failed(err),
    };

    if config.debug {
        debug!("Dumping IDispatch signature");
        crate::dispatch::dump_signatures(&dispatch, typeinfo::functions);
    }

    let mut link = DispatchLink::new(dispatch, TextCodec::for_code_page(config.text_code_page));
    Orchestrator::new(config, SystemClock).run(&mut link)
}

fn setup_failed(err: crate::BridgeError) -> BridgeResult {
    warn!(error = %err, "JV-Link activation failed");
    BridgeResult::setup_failure(&err)
}
