//! Session protocol: init, open, settle, status poll, gate, read, close.
//!
//! The orchestrator drives any [`JvLink`] through one session and folds
//! everything it observes into a [`BridgeResult`]. Once `JVOpen` has been
//! issued, `JVClose` runs exactly once no matter how the later stages end, and
//! the stage that failed is what the result reports.

use crate::clock::Clock;
use crate::config::BridgeConfig;
use crate::link::{JvLink, OpenRequest, READ_NOT_READY, ReadOutcome, UNKNOWN_RET};
use crate::types::{
    AttemptInfo, BridgeResult, OpenInfo, ReadInfo, SetupInfo, Stage, StatusSnapshot,
};
use crate::{BridgeError, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

/// Number of read attempts kept in the result.
pub const ATTEMPT_TAIL_LIMIT: usize = 10;

/// Runs one JV-Link session against a configuration.
pub struct Orchestrator<'a, C: Clock> {
    config: &'a BridgeConfig,
    clock: C,
}

/// Mutable state of a run in progress.
#[derive(Default)]
struct Session {
    result: BridgeResult,
    stage: Option<Stage>,
    open_issued: bool,
}

impl Session {
    fn enter(&mut self, stage: Stage) {
        debug!(stage = %stage, "STEP");
        self.stage = Some(stage);
    }
}

/// Bounded record of read attempts.
struct AttemptLog {
    tail: VecDeque<AttemptInfo>,
    count: usize,
}

impl AttemptLog {
    fn new() -> Self {
        Self { tail: VecDeque::with_capacity(ATTEMPT_TAIL_LIMIT), count: 0 }
    }

    fn push(&mut self, attempt: AttemptInfo) {
        if self.tail.len() == ATTEMPT_TAIL_LIMIT {
            self.tail.pop_front();
        }
        self.tail.push_back(attempt);
        self.count += 1;
    }

    fn into_parts(self) -> (usize, Vec<AttemptInfo>) {
        (self.count, self.tail.into())
    }
}

impl<'a, C: Clock> Orchestrator<'a, C> {
    pub fn new(config: &'a BridgeConfig, clock: C) -> Self {
        Self { config, clock }
    }

    /// Run the whole session. Never fails: every error ends up in the result.
    pub fn run<L: JvLink + ?Sized>(&self, link: &mut L) -> BridgeResult {
        let mut session = Session::default();

        if let Err(err) = self.run_stages(link, &mut session) {
            warn!(stage = ?session.stage, error = %err, "Session stage failed");
            if session.result.error.is_none() {
                session.result.record_error(&err);
            }
        }

        let failed_stage = session.result.error.is_some().then_some(session.stage).flatten();

        if session.open_issued {
            self.close(link, &mut session);
        }

        let result = &mut session.result;
        result.ok = result.error.is_none();
        result.stage = failed_stage.or(session.stage);
        info!(ok = result.ok, stage = ?result.stage, "Session finished");
        session.result
    }

    fn run_stages<L: JvLink + ?Sized>(&self, link: &mut L, session: &mut Session) -> Result<()> {
        self.init(link, session)?;
        self.open(link, session)?;
        self.settle();

        let snapshots = if self.config.enable_status_poll || self.config.require_status_zero {
            session.enter(Stage::StatusPoll);
            let snapshots = self.poll_status(link);
            session.result.status_poll = Some(snapshots.clone());
            snapshots
        } else {
            Vec::new()
        };

        if self.config.require_status_zero && !snapshots.iter().any(|s| s.status == 0) {
            warn!(polls = snapshots.len(), "JVStatus never reached 0, skipping JVRead");
            return Err(BridgeError::StatusGateNotSatisfied { polls: snapshots.len() });
        }

        self.read(link, session)
    }

    fn init<L: JvLink + ?Sized>(&self, link: &mut L, session: &mut Session) -> Result<()> {
        session.enter(Stage::Init);

        let init = link.init(0)?;
        let save_path = link.set_save_path(&self.config.save_path)?;
        let save_flag = link.set_save_flag(true)?;
        let pay_flag = link.set_pay_flag(false)?;
        debug!(init, save_path, save_flag, pay_flag, "Setup calls returned");

        let mut setup = SetupInfo { init, save_path, save_flag, pay_flag, ui_properties: None };
        if self.config.enable_ui_properties {
            match link.set_ui_properties() {
                Ok(code) => setup.ui_properties = Some(code),
                Err(err) => {
                    warn!(error = %err, "JVSetUIProperties failed, continuing");
                    setup.ui_properties = Some(UNKNOWN_RET);
                    session.result.ui_properties_error = Some(err.to_string());
                }
            }
        }

        session.result.setup = Some(setup);
        Ok(())
    }

    fn open<L: JvLink + ?Sized>(&self, link: &mut L, session: &mut Session) -> Result<()> {
        session.enter(Stage::Open);

        let request = OpenRequest {
            dataspec: &self.config.dataspec,
            fromdate: &self.config.fromdate,
            option: self.config.option,
        };
        debug!(dataspec = request.dataspec, fromdate = request.fromdate, option = request.option, "Calling JVOpen");

        session.open_issued = true;
        let outcome = link.open(&request)?;
        info!(
            ret = outcome.ret,
            readcount = outcome.readcount,
            downloadcount = outcome.downloadcount,
            lastfiletimestamp = %outcome.lastfiletimestamp,
            "JVOpen returned"
        );

        let code = outcome.ret;
        session.result.open = Some(OpenInfo::new(&request, outcome));
        if code < 0 {
            return Err(BridgeError::SessionOpenFailed { code });
        }
        Ok(())
    }

    fn settle(&self) {
        let delay = self.config.sleep_after_open;
        if !delay.is_zero() {
            debug!(?delay, "Settling after JVOpen");
            self.clock.sleep(delay);
        }
    }

    /// Poll `JVStatus` until it reports 0, the window closes or a call faults.
    fn poll_status<L: JvLink + ?Sized>(&self, link: &mut L) -> Vec<StatusSnapshot> {
        let deadline = self.deadline(self.config.status_poll_max_wait);
        let mut snapshots = Vec::new();

        while self.before(deadline) {
            match link.status() {
                Ok(status) => {
                    debug!(status, "JVStatus");
                    snapshots.push(StatusSnapshot::observed(self.timestamp(), status));
                    if status == 0 {
                        break;
                    }
                    self.clock.sleep(self.config.status_poll_interval);
                }
                Err(err) => {
                    warn!(error = %err, "JVStatus failed, ending status poll");
                    snapshots.push(StatusSnapshot::failed(self.timestamp(), UNKNOWN_RET, &err));
                    break;
                }
            }
        }

        snapshots
    }

    fn read<L: JvLink + ?Sized>(&self, link: &mut L, session: &mut Session) -> Result<()> {
        session.enter(Stage::Read);

        let deadline = self.deadline(self.config.read_max_wait);
        let types = link.read_argument_types();
        let mut attempts = AttemptLog::new();
        let mut last: Option<ReadOutcome> = None;
        let mut ret = UNKNOWN_RET;
        let mut found = false;

        while self.before(deadline) {
            let outcome = match link.read() {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, attempt = attempts.count + 1, "JVRead faulted");
                    attempts.push(AttemptInfo::faulted(ret, types.clone()));
                    let (attempt_count, tail) = attempts.into_parts();
                    session.result.read = Some(ReadInfo::new(false, ret, None, attempt_count, tail));
                    return Err(err);
                }
            };

            ret = outcome.ret;
            debug!(
                ret,
                size = outcome.size,
                filename = %outcome.filename,
                attempt = attempts.count + 1,
                "JVRead attempt"
            );
            attempts.push(AttemptInfo::from_outcome(&outcome, types.clone()));

            let size = outcome.size;
            last = Some(outcome);

            if ret == 0 && size > 0 {
                found = true;
                break;
            }
            if ret != READ_NOT_READY {
                break;
            }
            self.clock.sleep(self.config.read_interval);
        }

        let (attempt_count, tail) = attempts.into_parts();
        let info = ReadInfo::new(found, ret, last.as_ref(), attempt_count, tail);
        info!(found, ret, attempts = attempt_count, "Read loop finished");

        let terminal = (!found && ret != 0).then(|| BridgeError::ReadTerminal {
            code: ret,
            size: info.size,
            filename: info.filename.clone(),
        });
        session.result.read = Some(info);

        match terminal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn close<L: JvLink + ?Sized>(&self, link: &mut L, session: &mut Session) {
        session.enter(Stage::Close);
        match link.close() {
            Ok(code) => {
                debug!(code, "JVClose returned");
                session.result.close = Some(code);
            }
            Err(err) => {
                warn!(error = %err, "JVClose failed");
                session.result.close = Some(UNKNOWN_RET);
                if session.result.error.is_none() {
                    session.result.record_error(&err);
                }
            }
        }
    }

    /// End of a window starting now. `None` when the window reaches past what
    /// `Instant` can represent, which means the loop is unbounded.
    fn deadline(&self, window: Duration) -> Option<Instant> {
        let deadline = self.clock.now().checked_add(window);
        if deadline.is_none() {
            warn!(?window, "Wait window exceeds the clock range, running without a deadline");
        }
        deadline
    }

    fn before(&self, deadline: Option<Instant>) -> bool {
        deadline.is_none_or(|deadline| self.clock.now() < deadline)
    }

    fn timestamp(&self) -> String {
        self.clock.utc_now().format(&Rfc3339).unwrap_or_default()
    }
}
