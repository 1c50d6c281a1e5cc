use std::io;
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use datachan_codec::UserMessage;
use datachan_frame::{pump, FrameConfig, RecordReader, RecordWriter, StreamEndpoint};
use datachan_stack::{ChannelEvent, DataChannel, Dispatcher, StackConfig};
use parking_lot::Mutex;

use crate::cmd::ServeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_event, print_message, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("bind {} failed", args.path.display()), err))?;

    listener
        .set_nonblocking(true)
        .map_err(|err| io_error("listener setup failed", err))?;
    let control = ServeControl::new();
    install_ctrlc_handler(control.clone())?;

    let config = StackConfig {
        inbox_capacity: args.inbox_capacity,
        ack_remote_opens: !args.no_ack,
    };
    tracing::info!(path = %args.path.display(), "serving data channels");

    while let Some(stream) =
        accept_next(&listener, &control).map_err(|err| io_error("accept failed", err))?
    {
        control
            .track(&stream)
            .map_err(|err| io_error("socket clone failed", err))?;
        let served = serve_association(stream, config, format);
        control.untrack();
        served?;
    }

    tracing::info!("serve stopped");
    let _ = std::fs::remove_file(&args.path);
    Ok(SUCCESS)
}

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stop flag plus the connection being served. Stopping shuts that
/// connection down so a blocked pump returns.
#[derive(Clone)]
struct ServeControl {
    running: Arc<AtomicBool>,
    active: Arc<Mutex<Option<UnixStream>>>,
}

impl ServeControl {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            active: Arc::default(),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(stream) = self.active.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn track(&self, stream: &UnixStream) -> io::Result<()> {
        *self.active.lock() = Some(stream.try_clone()?);
        // A stop that landed between accept and track.
        if !self.is_running() {
            self.stop();
        }
        Ok(())
    }

    fn untrack(&self) {
        self.active.lock().take();
    }
}

/// Wait for the next connection on a nonblocking listener. Returns `None`
/// once `control` is stopped.
fn accept_next(listener: &UnixListener, control: &ServeControl) -> io::Result<Option<UnixStream>> {
    while control.is_running() {
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(false)?;
                return Ok(Some(stream));
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Run one association to completion: every remote channel gets an echo
/// worker, every event and message is printed.
fn serve_association(stream: UnixStream, config: StackConfig, format: OutputFormat) -> CliResult<()> {
    let frame_config = FrameConfig::default();
    let write_half = stream
        .try_clone()
        .map_err(|err| io_error("socket clone failed", err))?;
    let mut reader = RecordReader::with_config_unix(stream, frame_config.clone())
        .map_err(|err| frame_error("reader setup failed", err))?;
    let writer = RecordWriter::with_config_unix(write_half, frame_config)
        .map_err(|err| frame_error("writer setup failed", err))?;
    let endpoint = Arc::new(StreamEndpoint::new(writer));

    let dispatcher = Dispatcher::with_config(endpoint.clone(), config);
    let workers: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::default();
    let echo_workers = Arc::clone(&workers);
    dispatcher.set_listener(Arc::new(move |event: &ChannelEvent| {
        print_event(event, format);
        if let ChannelEvent::Opened { channel, .. } = event {
            match spawn_echo(Arc::clone(channel), format) {
                Ok(handle) => echo_workers.lock().push(handle),
                Err(err) => tracing::warn!(
                    stream_id = channel.stream_id(),
                    error = %err,
                    "failed to start echo worker"
                ),
            }
        }
    }));

    tracing::info!("association accepted");
    match pump(&mut reader, &dispatcher) {
        Ok(delivered) => tracing::info!(delivered, "association ended"),
        Err(err) => tracing::warn!(error = %err, "association failed"),
    }

    endpoint.close();
    dispatcher.shutdown();

    let handles = std::mem::take(&mut *workers.lock());
    for handle in handles {
        if handle.join().is_err() {
            tracing::warn!("echo worker panicked");
        }
    }

    let diagnostics = dispatcher.diagnostics();
    if diagnostics.rejected_total() > 0 {
        tracing::warn!(
            parse_failures = diagnostics.parse_failures,
            unknown_stream_ids = diagnostics.unknown_stream_ids,
            duplicate_stream_ids = diagnostics.duplicate_stream_ids,
            inbox_full = diagnostics.inbox_full,
            "association dropped messages"
        );
    }
    Ok(())
}

fn spawn_echo(channel: Arc<DataChannel>, format: OutputFormat) -> std::io::Result<JoinHandle<()>> {
    let echo = Arc::clone(&channel);
    channel.spawn_listener(move |message: UserMessage| {
        print_message(&echo, &message, format);
        if let Err(err) = echo.send(&message) {
            tracing::warn!(stream_id = echo.stream_id(), error = %err, "echo send failed");
        }
    })
}

fn install_ctrlc_handler(control: ServeControl) -> CliResult<()> {
    ctrlc::set_handler(move || control.stop()).map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::path::PathBuf;

    use super::*;

    fn socket_path(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("dcserve-{tag}-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn accept_returns_none_once_stopped() {
        let path = socket_path("stopped");
        let listener = UnixListener::bind(&path).unwrap();
        listener.set_nonblocking(true).unwrap();
        let control = ServeControl::new();

        let stopper = {
            let control = control.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                control.stop();
            })
        };
        assert!(accept_next(&listener, &control).unwrap().is_none());
        stopper.join().unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn accepted_stream_is_blocking() {
        let path = socket_path("blocking");
        let listener = UnixListener::bind(&path).unwrap();
        listener.set_nonblocking(true).unwrap();
        let _client = UnixStream::connect(&path).unwrap();

        let mut stream = accept_next(&listener, &ServeControl::new()).unwrap().unwrap();
        stream.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let started = std::time::Instant::now();
        assert!(stream.read(&mut [0u8; 1]).is_err());
        assert!(started.elapsed() >= Duration::from_millis(80));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn stop_unblocks_active_connection() {
        let path = socket_path("active");
        let listener = UnixListener::bind(&path).unwrap();
        let _client = UnixStream::connect(&path).unwrap();
        let (stream, _) = listener.accept().unwrap();
        let control = ServeControl::new();
        control.track(&stream).unwrap();

        let reader = {
            let mut stream = stream.try_clone().unwrap();
            thread::spawn(move || stream.read(&mut [0u8; 1]))
        };
        thread::sleep(Duration::from_millis(50));
        control.stop();

        assert_eq!(reader.join().unwrap().unwrap(), 0);
        assert!(!control.is_running());
        let _ = std::fs::remove_file(&path);
    }
}
