/// Default per-channel inbound queue capacity, in messages.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Controls dispatcher behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Capacity of each channel's inbound queue. Messages arriving while the
    /// queue is full are dropped for that channel only. Minimum 1.
    pub inbox_capacity: usize,
    /// Send an ack control message on the stream of every accepted remote open.
    pub ack_remote_opens: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            ack_remote_opens: true,
        }
    }
}

impl StackConfig {
    pub(crate) fn effective_inbox_capacity(&self) -> usize {
        self.inbox_capacity.max(1)
    }
}
