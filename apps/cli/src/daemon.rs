//! Daemon mode: the poll loop a home-automation host talks to.
//!
//! Requests arrive as JSON lines on stdin and are read on a separate thread.
//! Everything else, including every shell command, runs on the loop thread:
//! requests are served while waiting for the next poll cycle.
//!
//! ## Lifetime
//!
//! The daemon stops on a `shutdown` request, when stdin closes, or when its
//! parent process changes. On Linux it also asks for SIGTERM when the parent
//! dies.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{LevelFilter, debug, error, info, warn};
use macdisks_core::protocol::{HostCommand, HostEvent, HostRequest, JsonLinesPublisher};
use macdisks_core::{CommandRunner, Monitor, Result, Settings, ShellRunner};
use nix::unistd::getppid;
use snafu::ResultExt;

/// What the loop should do after a request.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Why the loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Shutdown,
    InputClosed,
    ParentExited,
}

/// Runs the poll loop until the host goes away or asks us to stop.
pub fn run_daemon(settings: &Settings) -> Result<()> {
    // Set up parent death signal to prevent orphan processes.
    #[cfg(target_os = "linux")]
    {
        use nix::libc;
        unsafe {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
        }
    }
    let parent = getppid();

    let mut monitor = Monitor::new(settings, ShellRunner::new())?;
    let mut publisher = JsonLinesPublisher::new(io::stdout());
    let requests = spawn_reader()?;

    info!(
        "watching {} device(s) every {}s",
        monitor.devices().len(),
        monitor.poll_interval().as_secs()
    );
    match serve(&mut monitor, &mut publisher, &requests, || getppid() == parent) {
        Exit::Shutdown => info!("shutdown requested"),
        Exit::InputClosed => info!("stdin closed, stopping"),
        Exit::ParentExited => info!("parent process exited, stopping"),
    }
    Ok(())
}

/// Time left until `deadline`; zero once it has passed.
fn remaining(deadline: Instant, now: Instant) -> Duration {
    deadline.saturating_duration_since(now)
}

/// The next cycle is due one interval after this one started, whenever
/// that was. Missed periods are not made up.
fn next_deadline(cycle_start: Instant, interval: Duration) -> Instant {
    cycle_start + interval
}

/// Reconciles every device, then alternates between serving requests and
/// running cycles. `parent_alive` is checked before each cycle.
fn serve<R: CommandRunner, W: Write>(
    monitor: &mut Monitor<R>,
    publisher: &mut JsonLinesPublisher<W>,
    requests: &Receiver<HostRequest>,
    mut parent_alive: impl FnMut() -> bool,
) -> Exit {
    let interval = monitor.poll_interval();
    monitor.start(publisher);
    let mut deadline = next_deadline(Instant::now(), interval);

    loop {
        // Serve requests until the next cycle is due. An overrun cycle leaves
        // a zero wait, which still drains pending requests first.
        loop {
            match requests.recv_timeout(remaining(deadline, Instant::now())) {
                Ok(request) => {
                    if handle_request(monitor, publisher, request) == Flow::Stop {
                        return Exit::Shutdown;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Exit::InputClosed,
            }
        }

        if !parent_alive() {
            return Exit::ParentExited;
        }

        let cycle_start = Instant::now();
        monitor.run_cycle(cycle_start, publisher);
        deadline = next_deadline(cycle_start, interval);
    }
}

/// Reads requests from stdin on a background thread.
///
/// The channel disconnects when stdin reaches EOF or fails.
fn spawn_reader() -> Result<Receiver<HostRequest>> {
    let (sender, receiver) = mpsc::channel();

    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        error!("can't read from stdin: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<HostRequest>(&line) {
                    Ok(request) => {
                        if sender.send(request).is_err() {
                            break;
                        }
                    }
                    // Can't respond without an ID
                    Err(e) => warn!("ignoring malformed request: {}", e),
                }
            }
        })
        .whatever_context("failed to start stdin reader")?;

    Ok(receiver)
}

fn handle_request<R: CommandRunner, W: Write>(
    monitor: &mut Monitor<R>,
    publisher: &mut JsonLinesPublisher<W>,
    request: HostRequest,
) -> Flow {
    debug!("request {}: {:?}", request.id, request.cmd);

    if let Some((device, action)) = request.cmd.device_action() {
        let response = match monitor.perform(device, action, publisher) {
            Ok(()) => HostEvent::success(request.id),
            Err(e) => {
                warn!("request {} failed: {}", request.id, e);
                HostEvent::failure(request.id, e.to_string())
            }
        };
        publisher.send(&response);
        return Flow::Continue;
    }

    let flow = match request.cmd {
        HostCommand::ToggleDebug => {
            toggle_debug();
            Flow::Continue
        }
        HostCommand::Shutdown => Flow::Stop,
        _ => Flow::Continue,
    };
    publisher.send(&HostEvent::success(request.id));
    flow
}

fn toggle_debug() {
    if log::max_level() >= LevelFilter::Debug {
        info!("debug logging off");
        log::set_max_level(LevelFilter::Info);
    } else {
        log::set_max_level(LevelFilter::Debug);
        info!("debug logging on");
    }
}
