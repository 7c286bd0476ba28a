//! Merges the child's stdout and stderr into one log file.
//!
//! The log is best-effort: a failing write is reported once and the rest of
//! the output is read and discarded, so the child never sees a closed pipe.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 8 * 1024;
const CHANNEL_DEPTH: usize = 64;

pub type OutputStream = Box<dyn AsyncRead + Unpin + Send>;

/// Creates (or truncates) the log file for this run.
pub async fn create_log(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    File::create(path).await
}

/// How the child's output reaches the sink.
pub enum Capture {
    /// stdout and stderr share one pipe, so writes keep the child's order.
    #[cfg(unix)]
    Merged(tokio::net::unix::pipe::Receiver),
    /// Separate pipes from the spawned child; order holds per stream only.
    #[cfg(windows)]
    Separate,
}

/// Points stdout and stderr of `cmd` at one pipe. Must run inside the
/// runtime, before spawning.
#[cfg(unix)]
pub fn capture(cmd: &mut Command) -> io::Result<Capture> {
    use std::os::fd::OwnedFd;
    use tokio::net::unix::pipe::Receiver;

    let (reader, writer) = std::io::pipe()?;
    cmd.stdout(writer.try_clone()?);
    cmd.stderr(writer);
    let receiver = Receiver::from_owned_fd(OwnedFd::from(reader))?;
    Ok(Capture::Merged(receiver))
}

#[cfg(windows)]
pub fn capture(_cmd: &mut Command) -> io::Result<Capture> {
    Ok(Capture::Separate)
}

impl Capture {
    pub fn into_streams(self, child: &mut Child) -> Vec<(&'static str, OutputStream)> {
        match self {
            #[cfg(unix)]
            Capture::Merged(receiver) => {
                let _ = child;
                vec![("output", Box::new(receiver) as OutputStream)]
            }
            #[cfg(windows)]
            Capture::Separate => {
                let mut streams: Vec<(&'static str, OutputStream)> = Vec::with_capacity(2);
                if let Some(stdout) = child.stdout.take() {
                    streams.push(("stdout", Box::new(stdout)));
                }
                if let Some(stderr) = child.stderr.take() {
                    streams.push(("stderr", Box::new(stderr)));
                }
                streams
            }
        }
    }
}

pub struct LogSink {
    readers: Vec<JoinHandle<()>>,
    writer: JoinHandle<io::Result<u64>>,
    last_output: Arc<Mutex<Option<Instant>>>,
}

impl LogSink {
    /// Starts draining every stream into `file`. Chunks are written in
    /// arrival order.
    pub fn start(file: File, streams: Vec<(&'static str, OutputStream)>) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(CHANNEL_DEPTH);
        let last_output = Arc::new(Mutex::new(None));

        let readers = streams
            .into_iter()
            .map(|(name, stream)| {
                tokio::spawn(drain(name, stream, tx.clone(), last_output.clone()))
            })
            .collect();
        drop(tx);

        let writer = tokio::spawn(write_all(file, rx));

        Self {
            readers,
            writer,
            last_output,
        }
    }

    /// When data last arrived from the child.
    pub fn last_output(&self) -> Option<Instant> {
        self.last_output.lock().ok().and_then(|slot| *slot)
    }

    /// Waits for the writer to finish until `deadline`, then gives up on
    /// whatever is still buffered. Returns the bytes written when the log
    /// was written completely and in time.
    pub async fn close(mut self, deadline: tokio::time::Instant) -> Option<u64> {
        match tokio::time::timeout_at(deadline, &mut self.writer).await {
            Ok(Ok(Ok(bytes))) => Some(bytes),
            Ok(Ok(Err(err))) => {
                debug!(error = %err, "build log incomplete");
                None
            }
            Ok(Err(err)) => {
                warn!(error = %err, "log writer task failed");
                None
            }
            Err(_) => {
                debug!("log sink still busy at grace deadline; abandoning");
                for reader in &self.readers {
                    reader.abort();
                }
                self.writer.abort();
                None
            }
        }
    }
}

/// Reads `reader` to EOF. Once the writer is gone the bytes are dropped, but
/// the pipe stays open and drained.
async fn drain(
    stream: &'static str,
    mut reader: OutputStream,
    tx: mpsc::Sender<Vec<u8>>,
    last_output: Arc<Mutex<Option<Instant>>>,
) {
    let mut buf = vec![0_u8; CHUNK_SIZE];
    let mut forwarding = true;

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!(stream, error = %err, "reading build output failed");
                break;
            }
        };

        if let Ok(mut slot) = last_output.lock() {
            *slot = Some(Instant::now());
        }

        if forwarding && tx.send(buf[..read].to_vec()).await.is_err() {
            debug!(stream, "log writer gone; discarding output");
            forwarding = false;
        }
    }
}

/// Writes chunks until every reader is done. After the first failed write the
/// remaining chunks are consumed and dropped; that error is returned at the end.
async fn write_all(mut file: File, mut rx: mpsc::Receiver<Vec<u8>>) -> io::Result<u64> {
    let mut written = 0_u64;
    let mut failed = None;

    while let Some(chunk) = rx.recv().await {
        if failed.is_some() {
            continue;
        }
        match file.write_all(&chunk).await {
            Ok(()) => written += chunk.len() as u64,
            Err(err) => {
                warn!(error = %err, "writing build log failed; discarding further output");
                failed = Some(err);
            }
        }
    }

    if let Some(err) = failed {
        return Err(err);
    }
    if let Err(err) = file.flush().await {
        warn!(error = %err, "flushing build log failed");
        return Err(err);
    }
    Ok(written)
}
