use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use strum::Display;
use tracing::{debug, info, warn};

use crate::enforce::FpsControl;
use crate::error::Result;
use crate::memory::layout::timing;
use crate::memory::{ProcessStatus, ReadMemory, WriteMemory};
use crate::shutdown::ShutdownSignal;
use crate::variable::ResolvedAddresses;

/// Frame-rate value the game holds until its settings are applied.
pub const UNINITIALIZED_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    Initializing,
    WaitingForFirstValidRead,
    Enforcing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StopReason {
    /// Shutdown was requested by the operator.
    Requested,
    /// The game exited or its memory became unreachable.
    ProcessExited,
}

/// What a single [`EnforcementSession::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still waiting for the game to initialize.
    Waiting,
    /// The game initialized; enforcement starts next tick.
    Started,
    /// Frame rate already matches.
    InSync,
    /// Frame rate was rewritten.
    Corrected { from: i64, to: i32 },
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcerConfig {
    /// Delay between ticks while enforcing
    pub tick_interval: Duration,
    /// Delay between reads while waiting for initialization
    pub poll_interval: Duration,
    /// Frame-rate value meaning "not initialized yet"
    pub sentinel: i64,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            tick_interval: timing::TICK_INTERVAL,
            poll_interval: timing::INIT_POLL_INTERVAL,
            sentinel: UNINITIALIZED_SENTINEL,
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: StopReason,
    pub ticks: u64,
    pub writes: u64,
}

/// Drives the enforcement state machine against one game process.
///
/// The session owns the process handle, so it is released when the session
/// finishes.
pub struct EnforcementSession<P> {
    process: P,
    addresses: ResolvedAddresses,
    control: FpsControl,
    shutdown: Arc<ShutdownSignal>,
    config: EnforcerConfig,
    state: SessionState,
    stop_reason: Option<StopReason>,
    ticks: u64,
    writes: u64,
}

impl<P> EnforcementSession<P>
where
    P: ReadMemory + WriteMemory + ProcessStatus,
{
    pub fn new(
        process: P,
        addresses: ResolvedAddresses,
        control: FpsControl,
        shutdown: Arc<ShutdownSignal>,
        config: EnforcerConfig,
    ) -> Self {
        Self {
            process,
            addresses,
            control,
            shutdown,
            config,
            state: SessionState::Initializing,
            stop_reason: None,
            ticks: 0,
            writes: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Advance the state machine by one iteration.
    ///
    /// Failed reads and writes stop the session with
    /// [`StopReason::ProcessExited`]; other errors are returned.
    pub fn step(&mut self) -> Result<TickOutcome> {
        if let Some(reason) = self.stop_reason {
            return Ok(TickOutcome::Stopped(reason));
        }
        if self.shutdown.is_shutdown() {
            return Ok(self.stop(StopReason::Requested));
        }

        self.ticks += 1;
        match self.state {
            SessionState::Initializing => {
                self.state = SessionState::WaitingForFirstValidRead;
                debug!("Waiting for the game to apply its frame rate");
                Ok(TickOutcome::Waiting)
            }
            SessionState::WaitingForFirstValidRead => self.wait_for_initialization(),
            SessionState::Enforcing => self.enforce(),
            SessionState::Stopped => Ok(TickOutcome::Stopped(StopReason::Requested)),
        }
    }

    fn wait_for_initialization(&mut self) -> Result<TickOutcome> {
        if !self.process.is_alive() {
            return Ok(self.stop(StopReason::ProcessExited));
        }

        let current = match self.addresses.frame_rate.read(&self.process) {
            Ok(value) => value,
            Err(e) if e.is_remote_access() => {
                debug!("Frame rate read failed while waiting: {}", e);
                return Ok(self.stop(StopReason::ProcessExited));
            }
            Err(e) => return Err(e),
        };

        if current == self.config.sentinel {
            return Ok(TickOutcome::Waiting);
        }

        info!("Game initialized (frame rate {}), enforcing", current);
        self.state = SessionState::Enforcing;
        Ok(TickOutcome::Started)
    }

    fn enforce(&mut self) -> Result<TickOutcome> {
        if !self.process.is_alive() {
            return Ok(self.stop(StopReason::ProcessExited));
        }

        match self.try_enforce() {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_remote_access() => {
                debug!("Enforcement I/O failed: {}", e);
                Ok(self.stop(StopReason::ProcessExited))
            }
            Err(e) => Err(e),
        }
    }

    fn try_enforce(&mut self) -> Result<TickOutcome> {
        let desired = self.control.get();
        let current = self.addresses.frame_rate.read(&self.process)?;
        if current == i64::from(desired) {
            return Ok(TickOutcome::InSync);
        }

        // Vsync first, otherwise the cap is bounded by the refresh rate.
        self.addresses.vsync.write(&self.process, 0)?;
        self.addresses
            .frame_rate
            .write(&self.process, i64::from(desired))?;
        self.writes += 1;

        debug!("Frame rate {} -> {}", current, desired);
        Ok(TickOutcome::Corrected {
            from: current,
            to: desired,
        })
    }

    fn stop(&mut self, reason: StopReason) -> TickOutcome {
        self.state = SessionState::Stopped;
        self.stop_reason = Some(reason);
        match reason {
            StopReason::Requested => info!("Enforcement stopped"),
            StopReason::ProcessExited => info!("Game exited, enforcement stopped"),
        }
        TickOutcome::Stopped(reason)
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            reason: self.stop_reason.unwrap_or(StopReason::Requested),
            ticks: self.ticks,
            writes: self.writes,
        }
    }

    /// Run until shutdown or until the game exits.
    pub fn run(mut self) -> Result<SessionReport> {
        loop {
            if let TickOutcome::Stopped(_) = self.step()? {
                break;
            }

            let delay = match self.state {
                SessionState::Enforcing => self.config.tick_interval,
                _ => self.config.poll_interval,
            };
            if self.shutdown.wait(delay) {
                debug!("Shutdown signalled during wait");
            }
        }

        let report = self.report();
        if report.writes > 0 {
            info!(
                "Session finished after {} ticks, {} corrections",
                report.ticks, report.writes
            );
        }
        Ok(report)
    }
}

impl<P> EnforcementSession<P>
where
    P: ReadMemory + WriteMemory + ProcessStatus + Send + 'static,
{
    /// Run the session on a background thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<SessionReport>>> {
        let handle = thread::Builder::new()
            .name("enforcer".to_string())
            .spawn(move || {
                let result = self.run();
                if let Err(e) = &result {
                    warn!("Enforcement failed: {}", e);
                }
                result
            })?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryOp, MockMemoryBuilder};
    use crate::variable::{TrackedVariable, VariableKind};

    const FPS_ADDR: u64 = 0x7000_1000;
    const VSYNC_ADDR: u64 = 0x7000_2000;

    fn addresses() -> ResolvedAddresses {
        ResolvedAddresses {
            frame_rate: TrackedVariable::new(VariableKind::FrameRate, FPS_ADDR),
            vsync: TrackedVariable::new(VariableKind::VSync, VSYNC_ADDR),
        }
    }

    fn instant() -> EnforcerConfig {
        EnforcerConfig {
            tick_interval: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    fn session<P>(process: P, fps: i32) -> (EnforcementSession<P>, FpsControl, Arc<ShutdownSignal>)
    where
        P: ReadMemory + WriteMemory + ProcessStatus,
    {
        let control = FpsControl::new(fps).unwrap();
        let shutdown = Arc::new(ShutdownSignal::new());
        let session = EnforcementSession::new(
            process,
            addresses(),
            control.clone(),
            Arc::clone(&shutdown),
            instant(),
        );
        (session, control, shutdown)
    }

    fn game(frame_rate: i32) -> MockMemoryBuilder {
        MockMemoryBuilder::new()
            .i32_at(FPS_ADDR, frame_rate)
            .u8_at(VSYNC_ADDR, 1)
    }

    #[test]
    fn test_waits_for_sentinel_then_corrects_once() {
        let mock = game(60).script_i32(FPS_ADDR, &[-1, -1]).build();
        let (mut session, _, _) = session(&mock, 144);

        assert_eq!(session.step().unwrap(), TickOutcome::Waiting);
        assert_eq!(session.state(), SessionState::WaitingForFirstValidRead);
        assert!(mock.ops().is_empty());

        assert_eq!(session.step().unwrap(), TickOutcome::Waiting);
        assert_eq!(session.step().unwrap(), TickOutcome::Waiting);
        assert_eq!(session.step().unwrap(), TickOutcome::Started);
        assert_eq!(session.state(), SessionState::Enforcing);
        assert!(mock.writes().is_empty());

        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Corrected { from: 60, to: 144 }
        );
        assert_eq!(
            mock.writes(),
            vec![
                (VSYNC_ADDR, vec![0]),
                (FPS_ADDR, 144i32.to_le_bytes().to_vec()),
            ]
        );

        mock.clear_ops();
        assert_eq!(session.step().unwrap(), TickOutcome::InSync);
        assert_eq!(session.step().unwrap(), TickOutcome::InSync);
        assert!(mock.writes().is_empty());
        assert_eq!(mock.peek_i32(FPS_ADDR), Some(144));
    }

    #[test]
    fn test_follows_control_changes() {
        let mock = game(60).build();
        let (mut session, control, _) = session(&mock, 60);

        session.step().unwrap();
        assert_eq!(session.step().unwrap(), TickOutcome::Started);
        assert_eq!(session.step().unwrap(), TickOutcome::InSync);

        control.set(90).unwrap();
        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Corrected { from: 60, to: 90 }
        );
        assert_eq!(mock.peek_i32(FPS_ADDR), Some(90));

        assert!(control.set(-5).is_err());
        assert_eq!(control.get(), 90);
        assert_eq!(session.step().unwrap(), TickOutcome::InSync);

        // The game resets its cap when the settings menu is closed.
        mock.write_i32(FPS_ADDR, 30).unwrap();
        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Corrected { from: 30, to: 90 }
        );
    }

    #[test]
    fn test_process_exit_stops_without_further_io() {
        let mock = game(60).build();
        let (mut session, _, _) = session(&mock, 120);

        session.step().unwrap();
        session.step().unwrap();
        session.step().unwrap();
        assert_eq!(session.state(), SessionState::Enforcing);

        mock.kill();
        mock.clear_ops();
        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Stopped(StopReason::ProcessExited)
        );
        assert_eq!(session.state(), SessionState::Stopped);

        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Stopped(StopReason::ProcessExited)
        );
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn test_read_failure_while_waiting_is_process_exit() {
        let mock = game(-1).exit_after_reads(2).build();
        let (session, _, _) = session(&mock, 120);

        let report = session.run().unwrap();
        assert_eq!(report.reason, StopReason::ProcessExited);
        assert_eq!(report.writes, 0);
        assert!(!mock.is_alive());
    }

    #[test]
    fn test_io_failure_while_enforcing_is_process_exit() {
        let mock = game(60).exit_after_reads(1).build();
        let (mut session, _, _) = session(&mock, 120);

        session.step().unwrap();
        assert_eq!(session.step().unwrap(), TickOutcome::Started);
        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Stopped(StopReason::ProcessExited)
        );
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_shutdown_stops_without_io() {
        let mock = game(60).build();
        let (mut session, _, shutdown) = session(&mock, 120);

        session.step().unwrap();
        shutdown.trigger();
        assert_eq!(
            session.step().unwrap(),
            TickOutcome::Stopped(StopReason::Requested)
        );
        assert_eq!(session.stop_reason(), Some(StopReason::Requested));
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn test_spawned_session_stops_on_shutdown() {
        let mock = Arc::new(game(60).build());
        let control = FpsControl::new(144).unwrap();
        let shutdown = Arc::new(ShutdownSignal::new());
        let config = EnforcerConfig {
            tick_interval: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        let session = EnforcementSession::new(
            Arc::clone(&mock),
            addresses(),
            control,
            Arc::clone(&shutdown),
            config,
        );

        let handle = session.spawn().unwrap();
        while mock.peek_i32(FPS_ADDR) != Some(144) {
            thread::sleep(Duration::from_millis(1));
        }
        shutdown.trigger();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.reason, StopReason::Requested);
        assert_eq!(report.writes, 1);
        assert!(mock.ops().iter().any(|op| matches!(
            op,
            MemoryOp::Write { address, bytes } if *address == VSYNC_ADDR && bytes == &[0]
        )));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(
            SessionState::WaitingForFirstValidRead.to_string(),
            "WaitingForFirstValidRead"
        );
        assert_eq!(StopReason::ProcessExited.to_string(), "ProcessExited");
    }
}
