//! Interrupt and terminate requests aimed at the wrapper itself.

use crate::model::SignalKind;
use std::io;
use tracing::debug;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind as UnixSignal, signal};

#[cfg(windows)]
use tokio::signal::windows::{CtrlBreak, CtrlC, ctrl_break, ctrl_c};

/// Subscription to the wrapper's shutdown signals.
///
/// Holds the only listeners for SIGINT and SIGTERM while a run is supervised.
/// Call [`SignalBridge::close`] once teardown has started.
pub struct SignalBridge {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
    #[cfg(windows)]
    interrupt: CtrlC,
    #[cfg(windows)]
    terminate: CtrlBreak,
}

impl SignalBridge {
    #[cfg(unix)]
    pub fn subscribe() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(UnixSignal::interrupt())?,
            terminate: signal(UnixSignal::terminate())?,
        })
    }

    #[cfg(windows)]
    pub fn subscribe() -> io::Result<Self> {
        Ok(Self {
            interrupt: ctrl_c()?,
            terminate: ctrl_break()?,
        })
    }

    /// Resolves with the first signal received. Never resolves if both
    /// streams close.
    pub async fn recv(&mut self) -> SignalKind {
        let kind = tokio::select! {
            Some(()) = self.interrupt.recv() => SignalKind::Interrupt,
            Some(()) = self.terminate.recv() => SignalKind::Terminate,
            else => std::future::pending().await,
        };
        debug!(signal = kind.as_str(), "shutdown signal received");
        kind
    }

    pub fn close(self) {
        debug!("signal subscription closed");
        drop(self);
    }
}
