use std::fmt;
use std::sync::Arc;

use datachan_codec::UserMessage;

use crate::channel::{DataChannel, Origin};

/// Channel lifecycle event, delivered to the [`StackListener`].
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A channel entered the Open state and is registered.
    Opened {
        channel: Arc<DataChannel>,
        origin: Origin,
    },
    /// A channel was closed and its stream id released. `channel` is the
    /// closed instance, not any successor later bound to the same id.
    Closed {
        channel: Arc<DataChannel>,
        origin: Origin,
    },
}

impl ChannelEvent {
    /// Stream id the event concerns.
    pub fn stream_id(&self) -> u16 {
        match self {
            Self::Opened { channel, .. } | Self::Closed { channel, .. } => channel.stream_id(),
        }
    }

    /// Channel the event concerns.
    pub fn channel(&self) -> &Arc<DataChannel> {
        match self {
            Self::Opened { channel, .. } | Self::Closed { channel, .. } => channel,
        }
    }

    /// Origin of the channel the event concerns.
    pub fn origin(&self) -> Origin {
        match self {
            Self::Opened { origin, .. } | Self::Closed { origin, .. } => *origin,
        }
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened { channel, origin } => write!(
                f,
                "opened stream {} ({origin}, label {:?})",
                channel.stream_id(),
                channel.parameters().label()
            ),
            Self::Closed { channel, origin } => {
                write!(f, "closed stream {} ({origin})", channel.stream_id())
            }
        }
    }
}

/// Receives channel lifecycle events for one dispatcher.
///
/// Called synchronously on the delivery path (remote opens) or the caller's
/// thread (local creates, closes). Implementations must not block.
pub trait StackListener: Send + Sync {
    /// Handle one lifecycle event. The default does nothing.
    fn on_event(&self, event: &ChannelEvent) {
        let _ = event;
    }
}

/// Listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl StackListener for NoopListener {}

impl<F> StackListener for F
where
    F: Fn(&ChannelEvent) + Send + Sync,
{
    fn on_event(&self, event: &ChannelEvent) {
        self(event)
    }
}

/// Consumes user messages of one channel, in arrival order.
///
/// Runs on the channel's own consumer thread, so it may take its time
/// without holding up other channels.
pub trait MessageListener: Send + 'static {
    /// Handle one message.
    fn on_message(&mut self, message: UserMessage);

    /// Called once after the channel closed and its queue drained.
    fn on_closed(&mut self) {}
}

impl<F> MessageListener for F
where
    F: FnMut(UserMessage) + Send + 'static,
{
    fn on_message(&mut self, message: UserMessage) {
        self(message)
    }
}
