//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate the first signal into the shutdown signal
//! - Force exit on a second signal while draining
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before `install` returns; a registration
//!   failure is returned to the caller instead of being logged away
//! - The handler owns a `Shutdown` clone; nothing reads a global signal table

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Exit status used when a second signal forces termination.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Register the termination handlers and spawn the signal listener.
///
/// The first SIGINT/SIGTERM fires `shutdown`. A second one means the operator
/// gave up waiting for the drain, so the process exits immediately.
///
/// Must be called from within a Tokio runtime.
pub fn install(shutdown: Shutdown) -> std::io::Result<JoinHandle<()>> {
    let mut signals = Signals::register()?;
    tracing::debug!("Signal handlers installed");

    Ok(tokio::spawn(async move {
        let signal = signals.recv().await;
        tracing::info!(signal, "Termination signal received, shutting down");
        shutdown.trigger();

        let signal = signals.recv().await;
        tracing::warn!(signal, "Second termination signal received, forcing exit");
        std::process::exit(FORCED_EXIT_CODE);
    }))
}

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        }
    }
}

#[cfg(windows)]
struct Signals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl Signals {
    fn register() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "ctrl-c"
    }
}
