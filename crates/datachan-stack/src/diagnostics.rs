//! Dispatcher diagnostics.
//!
//! Every locally-contained fault (a dropped or rejected message) bumps one
//! counter here in addition to its log event, so embedders and tests can
//! observe what the dispatcher discarded without scraping logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters describing dispatcher activity.
#[derive(Debug, Default)]
pub struct Diagnostics {
    parse_failures: AtomicU64,
    unknown_stream_ids: AtomicU64,
    duplicate_stream_ids: AtomicU64,
    absent_listener: AtomicU64,
    inbox_full: AtomicU64,
    delivered: AtomicU64,
    opened_local: AtomicU64,
    opened_remote: AtomicU64,
    closed: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Inbound messages the codec could not parse.
    pub parse_failures: u64,
    /// Messages addressed to a stream id with no registered channel.
    pub unknown_stream_ids: u64,
    /// Local creates or remote opens rejected because the stream id was bound.
    pub duplicate_stream_ids: u64,
    /// Events that fired while no stack listener was registered.
    pub absent_listener: u64,
    /// User messages dropped because the target channel's queue was full.
    pub inbox_full: u64,
    /// User messages queued to a channel. Counted before the message becomes
    /// readable, so a consumer never observes more messages than this.
    pub delivered: u64,
    /// Channels created locally.
    pub opened_local: u64,
    /// Channels created on a remote open request.
    pub opened_remote: u64,
    /// Channels closed and removed.
    pub closed: u64,
}

impl Diagnostics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unknown_stream_id(&self) {
        self.unknown_stream_ids.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn duplicate_stream_id(&self) {
        self.duplicate_stream_ids.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn listener_absent(&self) {
        self.absent_listener.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inbox_overflow(&self) {
        self.inbox_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn message_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivery_reverted(&self) {
        self.delivered.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn channel_opened_local(&self) {
        self.opened_local.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn channel_opened_remote(&self) {
        self.opened_remote.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn channel_closed(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            unknown_stream_ids: self.unknown_stream_ids.load(Ordering::Relaxed),
            duplicate_stream_ids: self.duplicate_stream_ids.load(Ordering::Relaxed),
            absent_listener: self.absent_listener.load(Ordering::Relaxed),
            inbox_full: self.inbox_full.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            opened_local: self.opened_local.load(Ordering::Relaxed),
            opened_remote: self.opened_remote.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }
}

impl DiagnosticsSnapshot {
    /// Total messages dropped or requests rejected for any reason.
    pub fn rejected_total(&self) -> u64 {
        self.parse_failures + self.unknown_stream_ids + self.duplicate_stream_ids + self.inbox_full
    }
}
