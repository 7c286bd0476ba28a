use crate::model::Operation;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TICK: Duration = Duration::from_secs(1);

/// Periodic single-line status on stderr while the build runs.
pub struct Progress {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Progress {
    pub fn start(operation: Operation, started: Instant) -> Self {
        Self::start_with(operation, started, TICK, std::io::stderr())
    }

    pub fn start_with<W>(operation: Operation, started: Instant, tick: Duration, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(tick_loop(operation, started, tick, writer, stop_rx));
        Self { stop, handle }
    }

    /// Stops ticking and clears the status line if one was drawn.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

pub fn status_line(operation: Operation, elapsed: Duration) -> String {
    format!("{}... {}s", operation.verb(), elapsed.as_secs())
}

async fn tick_loop<W: Write>(
    operation: Operation,
    started: Instant,
    tick: Duration,
    mut writer: W,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
    let mut drawn = false;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let _ = write!(writer, "\r{}", status_line(operation, started.elapsed()));
                let _ = writer.flush();
                drawn = true;
            }
        }
    }

    if drawn {
        let _ = write!(writer, "\r\x1b[2K");
        let _ = writer.flush();
    }
}
