//! OS signal handling.
//!
//! # Signals
//! **Unix platforms:**
//! - `SIGHUP`, `SIGUSR1`, `SIGUSR2` → reopen the log file
//! - `SIGINT`, `SIGTERM` → graceful shutdown
//!
//! **Other platforms:**
//! - `Ctrl-C` → graceful shutdown

use std::io;

/// What the process should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    RotateLog,
    Shutdown,
}

/// Registered signal listeners. Create once, then call [`Signals::recv`] in a loop.
#[cfg(unix)]
pub struct Signals {
    hangup: tokio::signal::unix::Signal,
    user1: tokio::signal::unix::Signal,
    user2: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    pub fn new() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            user1: signal(SignalKind::user_defined1())?,
            user2: signal(SignalKind::user_defined2())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    pub async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.hangup.recv() => log_signal("SIGHUP", Signal::RotateLog),
            _ = self.user1.recv() => log_signal("SIGUSR1", Signal::RotateLog),
            _ = self.user2.recv() => log_signal("SIGUSR2", Signal::RotateLog),
            _ = self.interrupt.recv() => log_signal("SIGINT", Signal::Shutdown),
            _ = self.terminate.recv() => log_signal("SIGTERM", Signal::Shutdown),
        }
    }
}

#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn new() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> Signal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log_signal("Ctrl-C", Signal::Shutdown),
            Err(e) => {
                tracing::warn!(error = %e, "Ctrl-C handler failed, waiting forever");
                std::future::pending().await
            }
        }
    }
}

fn log_signal(name: &str, action: Signal) -> Signal {
    tracing::info!(signal = name, action = ?action, "Signal received");
    action
}
