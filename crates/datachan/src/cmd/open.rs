use std::fs;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use datachan_codec::UserMessage;
use datachan_frame::{pump, RecordReader, RecordWriter, StreamEndpoint};
use datachan_stack::{ChannelEvent, ChannelParameters, Dispatcher};

use crate::cmd::OpenArgs;
use crate::exit::{io_error, stack_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: OpenArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = resolve_message(&args)?;

    let stream = UnixStream::connect(&args.path).map_err(|err| io_error("connect failed", err))?;
    let write_half = stream
        .try_clone()
        .map_err(|err| io_error("socket clone failed", err))?;
    let read_half = stream
        .try_clone()
        .map_err(|err| io_error("socket clone failed", err))?;

    let endpoint = Arc::new(StreamEndpoint::new(RecordWriter::new(write_half)));
    let dispatcher = Dispatcher::new(endpoint.clone()).with_listener(Arc::new(
        |event: &ChannelEvent| tracing::debug!(%event, "channel event"),
    ));

    let pump_dispatcher = dispatcher.clone();
    let reader_thread = thread::Builder::new()
        .name("datachan-pump".to_string())
        .spawn(move || {
            let mut reader = RecordReader::new(read_half);
            pump(&mut reader, &pump_dispatcher)
        })
        .map_err(|err| io_error("failed to start reader", err))?;

    let parameters = ChannelParameters::new(
        args.channel_type.into(),
        args.priority,
        args.reliability,
        args.label.clone(),
    )
    .with_protocol(args.protocol.clone());

    let result = exchange(
        &dispatcher,
        args.stream_id,
        parameters,
        &message,
        args.wait,
        wait_timeout,
        format,
    );

    endpoint.close();
    let _ = stream.shutdown(Shutdown::Both);
    match reader_thread.join() {
        Ok(Ok(delivered)) => tracing::debug!(delivered, "reader finished"),
        Ok(Err(err)) => tracing::debug!(error = %err, "reader stopped"),
        Err(_) => tracing::warn!("reader thread panicked"),
    }
    dispatcher.shutdown();

    result.map(|()| SUCCESS)
}

fn exchange(
    dispatcher: &Dispatcher,
    stream_id: u16,
    parameters: ChannelParameters,
    message: &UserMessage,
    wait: bool,
    wait_timeout: Duration,
    format: OutputFormat,
) -> CliResult<()> {
    let channel = dispatcher
        .create_channel_with(stream_id, parameters)
        .map_err(|err| stack_error("create channel failed", err))?;
    channel
        .announce()
        .map_err(|err| stack_error("open failed", err))?;
    channel
        .send(message)
        .map_err(|err| stack_error("send failed", err))?;

    if wait {
        let reply = channel
            .recv_timeout(wait_timeout)
            .map_err(|err| stack_error("receive failed", err))?;
        print_message(&channel, &reply, format);
    }
    Ok(())
}

fn resolve_message(args: &OpenArgs) -> CliResult<UserMessage> {
    if let Some(data) = &args.data {
        return Ok(UserMessage::Text(data.clone()));
    }
    if let Some(path) = &args.binary_file {
        let data = fs::read(path).map_err(|err| {
            io_error(&format!("failed reading {}", path.display()), err)
        })?;
        return Ok(UserMessage::from(data));
    }
    Ok(UserMessage::Text(String::new()))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
