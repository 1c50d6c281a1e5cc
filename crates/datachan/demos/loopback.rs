//! Loopback example: two dispatchers on an in-memory association.
//!
//! The left side opens two channels; the right side learns about them from
//! the open requests and echoes every message from a listener thread.
//!
//! Run with:
//!   cargo run --example loopback

use std::sync::Arc;
use std::time::Duration;

use datachan::codec::{ChannelType, UserMessage};
use datachan::stack::{ChannelEvent, Dispatcher};
use datachan::transport::MemoryAssociation;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (left_end, right_end) = MemoryAssociation::pair();
    let (left_end, right_end) = (Arc::new(left_end), Arc::new(right_end));

    let left = Dispatcher::new(left_end.clone());
    let right = Dispatcher::new(right_end.clone());
    left.bind(left_end.as_ref())?;
    right.bind(right_end.as_ref())?;

    right.set_listener(Arc::new(|event: &ChannelEvent| {
        eprintln!("[right] {event}");
        if let ChannelEvent::Opened { channel, .. } = event {
            let echo = Arc::clone(channel);
            let spawned = channel.spawn_listener(move |message: UserMessage| {
                if let Err(err) = echo.send(&message) {
                    eprintln!("[right] echo failed: {err}");
                }
            });
            if let Err(err) = spawned {
                eprintln!("[right] listener failed to start: {err}");
            }
        }
    }));

    let chat = left.create_channel(ChannelType::Reliable, 0, 0, 1, "chat")?;
    let telemetry =
        left.create_channel(ChannelType::PartialReliableTimedUnordered, 256, 500, 2, "telemetry")?;
    chat.announce()?;
    telemetry.announce()?;

    chat.send_text("hello")?;
    telemetry.send_binary(vec![0x01, 0x02, 0x03])?;

    let timeout = Duration::from_secs(1);
    eprintln!("[left] chat echo: {:?}", chat.recv_timeout(timeout)?);
    eprintln!("[left] telemetry echo: {:?}", telemetry.recv_timeout(timeout)?);
    eprintln!(
        "[left] telemetry reliability: {:?}",
        telemetry.parameters().reliability()
    );

    right.shutdown();
    left.shutdown();
    left_end.close();
    eprintln!("[left] diagnostics: {:?}", left.diagnostics());
    Ok(())
}
