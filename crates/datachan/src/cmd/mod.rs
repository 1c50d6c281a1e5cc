use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use datachan_codec::ChannelType;

use crate::exit::CliResult;
use crate::output::OutputFormat;

#[cfg(unix)]
pub mod open;
#[cfg(unix)]
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept associations and echo every channel message back.
    Serve(ServeArgs),
    /// Open one channel, send a message and optionally wait for a reply.
    Open(OpenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Serve(args) => serve::run(args, format),
        #[cfg(unix)]
        Command::Open(args) => open::run(args, format),
        #[cfg(not(unix))]
        Command::Serve(_) | Command::Open(_) => {
            let _ = format;
            Err(crate::exit::CliError::new(
                crate::exit::USAGE,
                "unix domain sockets are not available on this platform",
            ))
        }
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChannelTypeArg {
    Reliable,
    Rexmit,
    Timed,
    ReliableUnordered,
    RexmitUnordered,
    TimedUnordered,
}

impl From<ChannelTypeArg> for ChannelType {
    fn from(arg: ChannelTypeArg) -> Self {
        match arg {
            ChannelTypeArg::Reliable => ChannelType::Reliable,
            ChannelTypeArg::Rexmit => ChannelType::PartialReliableRexmit,
            ChannelTypeArg::Timed => ChannelType::PartialReliableTimed,
            ChannelTypeArg::ReliableUnordered => ChannelType::ReliableUnordered,
            ChannelTypeArg::RexmitUnordered => ChannelType::PartialReliableRexmitUnordered,
            ChannelTypeArg::TimedUnordered => ChannelType::PartialReliableTimedUnordered,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Per-channel inbound queue capacity.
    #[arg(long, default_value_t = datachan_stack::DEFAULT_INBOX_CAPACITY)]
    pub inbox_capacity: usize,
    /// Do not acknowledge remote open requests.
    #[arg(long)]
    pub no_ack: bool,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Stream id for the new channel.
    #[arg(long, short = 's')]
    pub stream_id: u16,
    /// Channel label.
    #[arg(long, short = 'l')]
    pub label: String,
    /// Delivery semantics.
    #[arg(long = "type", value_enum, default_value = "reliable")]
    pub channel_type: ChannelTypeArg,
    /// Priority; larger is lower.
    #[arg(long, default_value_t = 0)]
    pub priority: u16,
    /// Retransmission count or lifetime in ms, depending on --type.
    #[arg(long, default_value_t = 0)]
    pub reliability: u32,
    /// Sub-protocol announced with the channel.
    #[arg(long, default_value = "")]
    pub protocol: String,
    /// Text payload.
    #[arg(long, conflicts_with = "binary_file")]
    pub data: Option<String>,
    /// Read a binary payload from file.
    #[arg(long, value_name = "FILE", conflicts_with = "data")]
    pub binary_file: Option<PathBuf>,
    /// Wait for one message on the channel and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
