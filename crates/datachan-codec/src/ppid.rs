//! Payload protocol identifiers.
//!
//! Every association message carries one of these. The codec rejects any
//! other value, including the deprecated partial-message identifiers.

/// Channel establishment control message.
pub const CONTROL: u32 = 50;

/// UTF-8 text user message.
pub const STRING: u32 = 51;

/// Deprecated partial binary message. Rejected.
pub const BINARY_PARTIAL: u32 = 52;

/// Binary user message.
pub const BINARY: u32 = 53;

/// Deprecated partial text message. Rejected.
pub const STRING_PARTIAL: u32 = 54;

/// Empty text user message (payload is a single ignored filler byte).
pub const STRING_EMPTY: u32 = 56;

/// Empty binary user message (payload is a single ignored filler byte).
pub const BINARY_EMPTY: u32 = 57;

/// Returns a human-readable name for a payload protocol identifier.
pub fn ppid_name(ppid: u32) -> &'static str {
    match ppid {
        CONTROL => "CONTROL",
        STRING => "STRING",
        BINARY_PARTIAL => "BINARY_PARTIAL",
        BINARY => "BINARY",
        STRING_PARTIAL => "STRING_PARTIAL",
        STRING_EMPTY => "STRING_EMPTY",
        BINARY_EMPTY => "BINARY_EMPTY",
        _ => "UNKNOWN",
    }
}
