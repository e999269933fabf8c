//! The per-frame execution scheduler.
//!
//! One session hosts at most one guest at a time and drives it through the
//! synchronous tick cycle: drain queued input, `update`, present. All state
//! is owned here, never global, so tests construct independent sessions.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use wasmtime::Engine;

use crate::error::{LoadError, PresentError, SessionError};
use crate::frame::{Frame, FrameBridge};
use crate::guest::GuestInstance;
use crate::input::{InputEvent, InputTranslator, SurfaceEvent, SurfaceScale};
use crate::package::Package;

/// Largest delta ever handed to the guest, in seconds. Keeps a stalled host
/// from feeding the guest one huge step when ticking resumes.
const DEFAULT_MAX_DELTA: f64 = 0.25;

/// Tunables for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper clamp on tick deltas, in seconds.
    pub max_delta: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_delta: DEFAULT_MAX_DELTA,
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No package loaded yet.
    Idle,
    /// Parse and instantiation in progress.
    Loading,
    /// A guest is live and ticking.
    Running,
    /// A load error or guest trap ended the session; terminal until the
    /// next load request.
    Faulted,
    /// Explicitly unloaded.
    Stopped,
}

/// Result of one tick, for the external presentation collaborator.
#[derive(Debug)]
pub enum TickOutcome<'a> {
    /// The current frame to show.
    Frame(&'a Frame),
    /// The guest has not published anything yet; show the previous or a
    /// blank frame.
    NoFrame,
    /// The published descriptor did not fit guest memory; this frame is
    /// skipped and the session keeps running.
    Skipped(PresentError),
}

/// A single host session: one engine, at most one live guest.
pub struct Session {
    engine: Engine,
    config: SessionConfig,
    state: SessionState,
    guest: Option<GuestInstance>,
    bridge: FrameBridge,
    pending: VecDeque<InputEvent>,
    translator: InputTranslator,
    title: String,
    last_tick: Option<Instant>,
}

impl Session {
    /// Create an idle session with a fresh engine.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            engine: Engine::default(),
            config,
            state: SessionState::Idle,
            guest: None,
            bridge: FrameBridge::new(),
            pending: VecDeque::new(),
            translator: InputTranslator::default(),
            title: String::new(),
            last_tick: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Resolved display title of the loaded package.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Load a package, replacing any live guest.
    ///
    /// The previous instance is torn down before the new bytes are parsed,
    /// so a failed load never leaves two instances alive; it leaves none,
    /// and the session `Faulted`.
    pub fn load(&mut self, bytes: &[u8], fallback_title: &str) -> Result<(), LoadError> {
        self.teardown();
        self.state = SessionState::Loading;

        let outcome = self.try_load(bytes, fallback_title);
        match &outcome {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(title = %self.title, len = bytes.len(), "package loaded");
            }
            Err(err) => {
                self.state = SessionState::Faulted;
                error!(error = %err, "package load failed");
            }
        }
        outcome
    }

    fn try_load(&mut self, bytes: &[u8], fallback_title: &str) -> Result<(), LoadError> {
        let package = Package::parse(bytes)?;
        let guest = GuestInstance::instantiate(&self.engine, package.payload())?;
        self.title = package.title_or(fallback_title).to_string();
        self.guest = Some(guest);
        Ok(())
    }

    /// Stop the session and drop the guest.
    ///
    /// Cooperative: callers invoke this between ticks; there is no mid-tick
    /// preemption.
    pub fn unload(&mut self) {
        if self.guest.is_some() {
            info!(title = %self.title, "package unloaded");
        }
        self.teardown();
        self.state = SessionState::Stopped;
    }

    /// Translate and queue a host surface event for the next tick.
    ///
    /// Events the translator drops (unmapped keys, unencoded buttons) are
    /// discarded here and never reach the guest.
    pub fn queue(&mut self, event: &SurfaceEvent) {
        if let Some(event) = self.translator.translate(event) {
            self.queue_input(event);
        }
    }

    /// Queue an already-translated event.
    pub fn queue_input(&mut self, event: InputEvent) {
        self.pending.push_back(event);
    }

    /// Update the pointer coordinate mapping (e.g. after a DPI change).
    pub fn set_surface_scale(&mut self, scale: SurfaceScale) {
        self.translator.set_scale(scale);
    }

    /// Notify the guest that the presentation surface was resized.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<(), SessionError> {
        let guest = self.guest.as_mut().ok_or(SessionError::NotRunning)?;
        match guest.resize(width, height) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fault(err)),
        }
    }

    /// Run one tick using wall-clock time since the previous tick.
    pub fn tick(&mut self) -> Result<TickOutcome<'_>, SessionError> {
        let now = Instant::now();
        let delta = match self.last_tick.replace(now) {
            Some(prev) => now.duration_since(prev).as_secs_f64(),
            None => 0.0,
        };
        self.step(delta)
    }

    /// Run one tick with an explicit delta, in seconds.
    ///
    /// Order within a tick: drain queued input in arrival order, call the
    /// guest's `update`, then snapshot the published frame.
    pub fn step(&mut self, delta: f64) -> Result<TickOutcome<'_>, SessionError> {
        if self.state != SessionState::Running {
            return Err(SessionError::NotRunning);
        }
        let delta = delta.clamp(0.0, self.config.max_delta);

        while let Some(event) = self.pending.pop_front() {
            if let Err(err) = self.guest_mut()?.dispatch(event) {
                return Err(self.fault(err));
            }
        }

        if let Err(err) = self.guest_mut()?.update(delta) {
            return Err(self.fault(err));
        }

        let Session { guest, bridge, .. } = self;
        let guest = guest.as_mut().ok_or(SessionError::NotRunning)?;
        match guest.present(bridge) {
            Ok(Some(frame)) => Ok(TickOutcome::Frame(frame)),
            Ok(None) => Ok(TickOutcome::NoFrame),
            Err(err) => {
                warn!(error = %err, "frame skipped");
                Ok(TickOutcome::Skipped(err))
            }
        }
    }

    fn guest_mut(&mut self) -> Result<&mut GuestInstance, SessionError> {
        self.guest.as_mut().ok_or(SessionError::NotRunning)
    }

    /// Tear the session down after a fatal guest trap. The instance is
    /// dropped here, so no further guest call can ever happen.
    fn fault(&mut self, err: SessionError) -> SessionError {
        error!(error = %err, "guest trapped, session faulted");
        self.teardown();
        self.state = SessionState::Faulted;
        err
    }

    fn teardown(&mut self) {
        self.guest = None;
        self.bridge.reset();
        self.pending.clear();
        self.last_tick = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;

    #[test]
    fn step_without_package_is_not_running() {
        let mut session = Session::default();
        assert!(matches!(session.step(0.016), Err(SessionError::NotRunning)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn resize_without_package_is_not_running() {
        let mut session = Session::default();
        assert!(matches!(
            session.resize(640, 480),
            Err(SessionError::NotRunning)
        ));
    }

    #[test]
    fn unload_stops_the_session() {
        let mut session = Session::default();
        session.unload();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(session.step(0.016), Err(SessionError::NotRunning)));
    }

    #[test]
    fn format_errors_fault_the_load() {
        let mut session = Session::default();
        let err = session.load(b"definitely not a package", "t").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Package(PackageError::BadMagic(_))
        ));
        assert_eq!(session.state(), SessionState::Faulted);
    }
}
