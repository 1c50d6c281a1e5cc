use std::fmt;
use std::io;

use datachan_frame::FrameError;
use datachan_stack::StackError;
use datachan_transport::TransportError;

// Process exit codes. TIMEOUT matches timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::AddrInUse => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn stack_error(context: &str, err: StackError) -> CliError {
    match err {
        StackError::Transport(err) => transport_error(context, err),
        StackError::Codec(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        StackError::DuplicateStreamId(_) => CliError::new(USAGE, format!("{context}: {err}")),
        StackError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        StackError::ChannelClosed(_)
        | StackError::UnknownStreamId(_)
        | StackError::InboxFull(_) => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use datachan_codec::CodecError;

    use super::*;

    #[test]
    fn stack_errors_map_to_exit_codes() {
        assert_eq!(
            stack_error("x", StackError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            stack_error("x", StackError::DuplicateStreamId(4)).code,
            USAGE
        );
        assert_eq!(
            stack_error("x", StackError::Codec(CodecError::Empty)).code,
            DATA_INVALID
        );
        assert_eq!(
            stack_error("x", StackError::Transport(TransportError::Closed)).code,
            TRANSPORT_ERROR
        );
    }

    #[test]
    fn missing_socket_is_plain_failure() {
        let err = io_error(
            "connect failed",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.code, FAILURE);
        assert_eq!(err.to_string(), "connect failed: no such file");
    }
}
