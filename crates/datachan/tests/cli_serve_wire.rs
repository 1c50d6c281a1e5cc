#![cfg(all(unix, feature = "cli"))]

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use datachan::codec::{ChannelType, UserMessage};
use datachan::frame::{pump, RecordReader, RecordWriter, StreamEndpoint};
use datachan::stack::{Dispatcher, NoopListener};
use datachan::transport::{DeliveryFlags, TransportEndpoint};

const UNKNOWN_PPID: u32 = 99;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/dcwire-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn connect_with_retry(path: &Path, timeout: Duration) -> UnixStream {
    let start = Instant::now();
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return stream,
            Err(err) => {
                if start.elapsed() >= timeout {
                    panic!("connect timeout: {err}");
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[test]
fn server_echoes_per_channel_and_survives_garbage() {
    let dir = unique_temp_dir("multi");
    let sock_path = dir.join("serve.sock");

    let mut child = Command::new(env!("CARGO_BIN_EXE_datachan"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg(&sock_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");

    let stream = connect_with_retry(&sock_path, Duration::from_secs(3));
    let read_half = stream.try_clone().expect("clone should succeed");
    let write_half = stream.try_clone().expect("clone should succeed");

    let endpoint = Arc::new(StreamEndpoint::new(RecordWriter::new(write_half)));
    let dispatcher = Dispatcher::new(endpoint.clone()).with_listener(Arc::new(NoopListener));
    let pump_dispatcher = dispatcher.clone();
    let reader = thread::spawn(move || {
        let mut reader = RecordReader::new(read_half);
        pump(&mut reader, &pump_dispatcher)
    });

    let chat = dispatcher
        .create_channel(ChannelType::Reliable, 0, 0, 1, "chat")
        .expect("channel 1 should be created");
    let telemetry = dispatcher
        .create_channel(ChannelType::PartialReliableTimedUnordered, 256, 100, 2, "telemetry")
        .expect("channel 2 should be created");
    chat.announce().expect("announce chat");
    telemetry.announce().expect("announce telemetry");

    // Unparseable traffic is dropped server-side without ending the association.
    endpoint
        .send(1, UNKNOWN_PPID, "junk".into(), DeliveryFlags::NONE)
        .expect("raw send should succeed");

    chat.send_text("one").expect("send on chat");
    telemetry.send_binary(vec![1u8, 2, 3]).expect("send on telemetry");
    chat.send_text("two").expect("send on chat");

    let timeout = Duration::from_secs(3);
    assert_eq!(chat.recv_timeout(timeout).unwrap(), UserMessage::from("one"));
    assert_eq!(chat.recv_timeout(timeout).unwrap(), UserMessage::from("two"));
    assert_eq!(
        telemetry.recv_timeout(timeout).unwrap(),
        UserMessage::from(vec![1u8, 2, 3])
    );

    let diagnostics = dispatcher.diagnostics();
    assert_eq!(diagnostics.rejected_total(), 0);
    assert_eq!(diagnostics.delivered, 3);

    endpoint.close();
    let _ = stream.shutdown(Shutdown::Both);
    let _ = reader.join();
    dispatcher.shutdown();

    let _ = child.kill();
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(&dir);
}
