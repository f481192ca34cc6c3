//! Main bypass command.

use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use fpsbypass_core::{
    Config, EnforcementSession, FpsControl, ProcessHandle, ResolutionProfile, SessionReport,
    ShutdownSignal, find_running_game,
};
use owo_colors::OwoColorize;
use tracing::{debug, info, warn};

use crate::commands::{install_shutdown_handler, setup};
use crate::input::spawn_line_reader;
use crate::prompter::CliPrompter;
use crate::retry::{resolve_with_retry, wait_for_game_exit_with_retry};
use crate::validation::{FpsInput, parse_fps_input};

/// How often the prompt checks for shutdown and game exit
const PROMPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launch the game and keep its frame rate pinned
pub fn run(config_path: &Path, profile: &ResolutionProfile) -> Result<()> {
    let shutdown = install_shutdown_handler()?;

    println!("FPS Bypass v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match Config::load_from(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
    {
        Some(config) => {
            debug!("Loaded config from {}", config_path.display());
            config
        }
        None => match setup::first_run(config_path, &shutdown)? {
            Some(config) => config,
            None => return Ok(()),
        },
    };
    let control = FpsControl::new(config.target_fps)
        .with_context(|| format!("Invalid target FPS in {}", config_path.display()))?;

    if find_running_game()?.is_some() {
        println!("Genshin Impact is already running. Please close it to continue.");
        if !wait_for_game_exit_with_retry(&shutdown)? {
            return Ok(());
        }
    }

    println!("Starting Genshin Impact...");
    let process = ProcessHandle::launch(&config.game_path)
        .with_context(|| format!("Failed to start {}", config.game_path.display()))?;
    println!("Started Genshin Impact with PID {}.", process.pid);
    let process = Arc::new(process);

    println!("Searching for pointers...");
    let Some(discovery) =
        resolve_with_retry(process.as_ref(), profile, config.anchors.as_ref(), &shutdown)?
    else {
        return Ok(());
    };
    let addresses = discovery.addresses;
    println!("Found offsets:");
    println!("FPS: {:#x}", addresses.frame_rate.address);
    println!("VSync: {:#x}", addresses.vsync.address);
    println!("Estimated: {}", discovery.used_estimates());

    if config.anchors != Some(discovery.estimates) {
        config.anchors = Some(discovery.estimates);
        if let Err(e) = config.save_to(config_path) {
            warn!("Failed to remember anchor offsets: {}", e);
        }
    }

    let session = EnforcementSession::new(
        process,
        addresses,
        control.clone(),
        Arc::clone(&shutdown),
        config.enforcer_config(),
    );
    let handle = session.spawn()?;
    println!("{}", "FPS Bypass is now running.".green().bold());

    prompt_loop(config, config_path, &control, &handle, &shutdown);

    shutdown.trigger();
    let report = join_session(handle)?;
    info!(
        "Session ended ({}): {} ticks, {} corrections",
        report.reason, report.ticks, report.writes
    );
    println!("FPS Bypass is no longer running.");
    Ok(())
}

/// Read new targets until the session ends or the operator quits.
fn prompt_loop(
    mut config: Config,
    config_path: &Path,
    control: &FpsControl,
    session: &JoinHandle<fpsbypass_core::Result<SessionReport>>,
    shutdown: &ShutdownSignal,
) {
    let mut prompter = CliPrompter::stdout();
    let (lines, _reader) = spawn_line_reader(BufReader::new(io::stdin()));
    let mut input_open = true;

    prompter.prompt(control.get());
    while !shutdown.is_shutdown() && !session.is_finished() {
        if !input_open {
            shutdown.wait(PROMPT_POLL_INTERVAL);
            continue;
        }

        let line = match lines.recv_timeout(PROMPT_POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Input closed; enforcing until the game exits");
                input_open = false;
                continue;
            }
        };

        match parse_fps_input(&line) {
            FpsInput::Accepted(fps) => {
                if let Err(e) = control.set(fps) {
                    prompter.display_warning(&e.to_string());
                } else {
                    config.target_fps = fps;
                    if let Err(e) = config.save_to(config_path) {
                        warn!("Failed to save config: {}", e);
                    }
                }
            }
            FpsInput::Quit => {
                prompter.display_message("Stopping FPS Bypass...");
                shutdown.trigger();
                break;
            }
            FpsInput::Empty => {}
            FpsInput::NotANumber => prompter.not_a_number(),
            FpsInput::OutOfRange(_) => prompter.out_of_range(),
        }
        prompter.prompt(control.get());
    }
    println!();
}

fn join_session(
    handle: JoinHandle<fpsbypass_core::Result<SessionReport>>,
) -> Result<SessionReport> {
    let report = handle
        .join()
        .map_err(|_| anyhow!("Enforcement thread panicked"))?
        .context("Enforcement failed")?;
    Ok(report)
}
