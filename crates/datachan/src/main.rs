mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "datachan", version, about = "Data channel multiplexing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::ChannelTypeArg;

    #[test]
    fn parses_open_subcommand() {
        let cli = Cli::try_parse_from([
            "datachan",
            "open",
            "/tmp/test.sock",
            "--stream-id",
            "3",
            "--label",
            "chat",
            "--type",
            "rexmit-unordered",
            "--reliability",
            "4",
            "--data",
            "hello",
        ])
        .expect("open args should parse");

        match cli.command {
            Command::Open(args) => {
                assert_eq!(args.stream_id, 3);
                assert_eq!(args.label, "chat");
                assert_eq!(args.channel_type, ChannelTypeArg::RexmitUnordered);
                assert_eq!(args.reliability, 4);
                assert_eq!(args.data.as_deref(), Some("hello"));
            }
            other => panic!("expected open, got {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "datachan",
            "open",
            "/tmp/test.sock",
            "--stream-id",
            "1",
            "--label",
            "x",
            "--binary-file",
            "/tmp/payload.bin",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn open_requires_stream_id() {
        let err = Cli::try_parse_from(["datachan", "open", "/tmp/test.sock", "--label", "x"])
            .expect_err("missing stream id should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "datachan",
            "--format",
            "json",
            "serve",
            "/tmp/test.sock",
            "--inbox-capacity",
            "8",
            "--no-ack",
        ])
        .expect("serve args should parse");
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.inbox_capacity, 8);
                assert!(args.no_ack);
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }
}
