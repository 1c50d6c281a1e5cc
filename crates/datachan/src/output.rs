use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use datachan_codec::UserMessage;
use datachan_stack::{ChannelEvent, DataChannel};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'static str,
    stream_id: u16,
    origin: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_type: Option<&'static str>,
    timestamp: String,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    event: &'static str,
    stream_id: u16,
    label: &'a str,
    kind: &'static str,
    size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_event(event: &ChannelEvent, format: OutputFormat) {
    let (name, label, channel_type) = match event {
        ChannelEvent::Opened { channel, .. } => (
            "opened",
            Some(channel.label()),
            Some(channel.parameters().channel_type().name()),
        ),
        ChannelEvent::Closed { channel, .. } => ("closed", Some(channel.label()), None),
    };

    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event: name,
                stream_id: event.stream_id(),
                origin: event.origin().name(),
                label,
                channel_type,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "STREAM", "ORIGIN", "LABEL", "TYPE"])
                .add_row(vec![
                    name.to_string(),
                    event.stream_id().to_string(),
                    event.origin().to_string(),
                    label.unwrap_or("-").to_string(),
                    channel_type.unwrap_or("-").to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{event}"),
        OutputFormat::Raw => {}
    }
}

pub fn print_message(channel: &DataChannel, message: &UserMessage, format: OutputFormat) {
    let kind = if message.is_text() { "text" } else { "binary" };

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                event: "message",
                stream_id: channel.stream_id(),
                label: channel.label(),
                kind,
                size: message.len(),
                payload: payload_preview(message),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["STREAM", "LABEL", "KIND", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel.stream_id().to_string(),
                    channel.label().to_string(),
                    kind.to_string(),
                    message.len().to_string(),
                    payload_preview(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "stream={} label={} kind={} size={} payload={}",
                channel.stream_id(),
                channel.label(),
                kind,
                message.len(),
                payload_preview(message)
            );
        }
        OutputFormat::Raw => print_raw(message.as_bytes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(message: &UserMessage) -> String {
    match message {
        UserMessage::Text(text) => text.clone(),
        UserMessage::Binary(data) => match std::str::from_utf8(data) {
            Ok(text) => text.to_string(),
            Err(_) => format!("<binary {} bytes>", data.len()),
        },
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_text_and_summarizes_binary() {
        assert_eq!(payload_preview(&UserMessage::from("hi")), "hi");
        assert_eq!(payload_preview(&UserMessage::from(b"ok".to_vec())), "ok");
        assert_eq!(
            payload_preview(&UserMessage::from(vec![0xffu8, 0x00, 0x01])),
            "<binary 3 bytes>"
        );
    }
}
