use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use datachan_codec::{
    ChannelType, ControlMessage, DcepCodec, MessageCodec, OpenChannelMessage, ParsedMessage,
    UserMessage,
};
use datachan_transport::{
    Association, DeliveryFlags, DeliveryHandler, InboundMessage, TransportEndpoint,
};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelParameters, DataChannel, EnqueueError, Origin};
use crate::config::StackConfig;
use crate::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::error::Result;
use crate::events::{ChannelEvent, StackListener};
use crate::registry::ChannelRegistry;

/// Demultiplexes one association's inbound messages onto data channels.
///
/// The dispatcher is the association's single delivery target. It parses
/// every inbound message, creates channels for remote open requests, routes
/// user messages to the channel bound to their stream id and creates local
/// channels on request. Every rejected or dropped message is logged and
/// counted in [`Diagnostics`]; nothing on the delivery path returns an error
/// to the association.
///
/// `Dispatcher` is a cheap handle; clones share the same registry.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    endpoint: Arc<dyn TransportEndpoint>,
    codec: Arc<dyn MessageCodec>,
    registry: ChannelRegistry,
    listener: RwLock<Option<Arc<dyn StackListener>>>,
    diagnostics: Diagnostics,
    config: StackConfig,
}

impl Dispatcher {
    /// Create a dispatcher sending through `endpoint`, with default config
    /// and the standard codec.
    pub fn new(endpoint: Arc<dyn TransportEndpoint>) -> Self {
        Self::with_config(endpoint, StackConfig::default())
    }

    /// Create a dispatcher with explicit configuration.
    pub fn with_config(endpoint: Arc<dyn TransportEndpoint>, config: StackConfig) -> Self {
        Self::with_codec(endpoint, Arc::new(DcepCodec), config)
    }

    /// Create a dispatcher with a custom codec.
    pub fn with_codec(
        endpoint: Arc<dyn TransportEndpoint>,
        codec: Arc<dyn MessageCodec>,
        config: StackConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                endpoint,
                codec,
                registry: ChannelRegistry::new(),
                listener: RwLock::new(None),
                diagnostics: Diagnostics::new(),
                config,
            }),
        }
    }

    /// Install this dispatcher as `association`'s inbound handler.
    ///
    /// An association accepts one handler for its lifetime; a second bind
    /// fails with `TransportError::HandlerAlreadyBound`.
    pub fn bind(&self, association: &dyn Association) -> Result<()> {
        association.set_handler(Arc::new(self.clone()))?;
        debug!("dispatcher bound to association");
        Ok(())
    }

    /// Replace the stack listener.
    pub fn set_listener(&self, listener: Arc<dyn StackListener>) {
        *self.shared.listener.write() = Some(listener);
    }

    /// Builder-style [`set_listener`](Self::set_listener).
    pub fn with_listener(self, listener: Arc<dyn StackListener>) -> Self {
        self.set_listener(listener);
        self
    }

    /// Remove the stack listener. Later events are counted as
    /// `absent_listener`.
    pub fn clear_listener(&self) {
        self.shared.listener.write().take();
    }

    /// Handle one inbound message.
    ///
    /// Never fails: malformed, unroutable or rejected messages are dropped
    /// with a warning and a diagnostic count.
    pub fn deliver(&self, payload: Bytes, stream_id: u16, ppid: u32, flags: DeliveryFlags) {
        trace!(
            stream_id,
            ppid,
            unordered = flags.is_unordered(),
            size = payload.len(),
            "delivery"
        );

        let parsed = match self.shared.codec.parse(&payload, ppid) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.shared.diagnostics.parse_failure();
                warn!(stream_id, ppid, error = %err, "dropping unparseable message");
                return;
            }
        };

        match parsed {
            ParsedMessage::Control(ControlMessage::Open(open)) => self.accept_open(stream_id, open),
            ParsedMessage::Control(ControlMessage::Ack) => self.accept_ack(stream_id),
            ParsedMessage::User(message) => self.route(stream_id, message),
        }
    }

    /// Create and register a local channel on `stream_id`.
    ///
    /// The channel is Open on return. Announcing it to the peer is left to
    /// the caller, see [`DataChannel::announce`].
    pub fn create_channel(
        &self,
        channel_type: ChannelType,
        priority: u16,
        reliability_parameter: u32,
        stream_id: u16,
        label: impl Into<String>,
    ) -> Result<Arc<DataChannel>> {
        self.create_channel_with(
            stream_id,
            ChannelParameters::new(channel_type, priority, reliability_parameter, label),
        )
    }

    /// Create and register a local channel from prepared parameters.
    pub fn create_channel_with(
        &self,
        stream_id: u16,
        parameters: ChannelParameters,
    ) -> Result<Arc<DataChannel>> {
        let channel = self.new_channel(stream_id, parameters, Origin::Local);
        if let Err(err) = self.shared.registry.try_insert(Arc::clone(&channel)) {
            self.shared.diagnostics.duplicate_stream_id();
            warn!(stream_id, "local channel rejected: stream id in use");
            return Err(err);
        }

        self.shared.diagnostics.channel_opened_local();
        info!(
            stream_id,
            label = channel.label(),
            channel_type = %channel.parameters().channel_type(),
            "local channel opened"
        );
        self.shared.emit(ChannelEvent::Opened {
            channel: Arc::clone(&channel),
            origin: Origin::Local,
        });
        Ok(channel)
    }

    /// The channel bound to `stream_id`, if any.
    pub fn channel(&self, stream_id: u16) -> Option<Arc<DataChannel>> {
        self.shared.registry.get(stream_id)
    }

    /// Close the channel bound to `stream_id`, releasing the id.
    /// Returns false if no channel was bound.
    pub fn close_channel(&self, stream_id: u16) -> bool {
        match self.shared.registry.remove(stream_id) {
            Some(channel) => {
                self.shared.finish_close(&channel);
                true
            }
            None => false,
        }
    }

    /// Close every channel. Used at association teardown.
    pub fn shutdown(&self) {
        let channels = self.shared.registry.drain();
        let count = channels.len();
        for channel in channels {
            self.shared.finish_close(&channel);
        }
        info!(channels = count, "dispatcher shut down");
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// The registry of live channels.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.shared.registry
    }

    /// Current diagnostic counters.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.shared.diagnostics.snapshot()
    }

    /// Active configuration.
    pub fn config(&self) -> &StackConfig {
        &self.shared.config
    }

    fn new_channel(
        &self,
        stream_id: u16,
        parameters: ChannelParameters,
        origin: Origin,
    ) -> Arc<DataChannel> {
        Arc::new(DataChannel::new(
            stream_id,
            parameters,
            origin,
            Arc::clone(&self.shared.endpoint),
            Arc::clone(&self.shared.codec),
            self.shared.config.effective_inbox_capacity(),
            Arc::downgrade(&self.shared),
        ))
    }

    fn accept_open(&self, stream_id: u16, open: OpenChannelMessage) {
        let channel = self.new_channel(stream_id, ChannelParameters::from(open), Origin::Remote);
        if self.shared.registry.try_insert(Arc::clone(&channel)).is_err() {
            self.shared.diagnostics.duplicate_stream_id();
            warn!(stream_id, label = channel.label(), "remote open rejected: stream id in use");
            return;
        }

        self.shared.diagnostics.channel_opened_remote();
        info!(
            stream_id,
            label = channel.label(),
            channel_type = %channel.parameters().channel_type(),
            "remote channel opened"
        );

        if self.shared.config.ack_remote_opens {
            if let Err(err) = channel.acknowledge() {
                warn!(stream_id, error = %err, "failed to acknowledge remote open");
            }
        }

        self.shared.emit(ChannelEvent::Opened {
            channel,
            origin: Origin::Remote,
        });
    }

    fn accept_ack(&self, stream_id: u16) {
        if self.shared.registry.contains(stream_id) {
            debug!(stream_id, "open acknowledged by peer");
        } else {
            self.shared.diagnostics.unknown_stream_id();
            warn!(stream_id, "dropping ack for unknown stream id");
        }
    }

    fn route(&self, stream_id: u16, message: UserMessage) {
        let Some(channel) = self.shared.registry.get(stream_id) else {
            self.shared.diagnostics.unknown_stream_id();
            warn!(stream_id, size = message.len(), "dropping message for unknown stream id");
            return;
        };

        self.shared.diagnostics.message_delivered();
        match channel.enqueue(message) {
            Ok(()) => debug!(stream_id, "message queued"),
            Err(EnqueueError::Full) => {
                self.shared.diagnostics.delivery_reverted();
                self.shared.diagnostics.inbox_overflow();
                warn!(stream_id, "dropping message: channel queue full");
            }
            Err(EnqueueError::Closed) => {
                // Closed between lookup and enqueue.
                self.shared.diagnostics.delivery_reverted();
                self.shared.diagnostics.unknown_stream_id();
                debug!(stream_id, "dropping message for closing channel");
            }
        }
    }
}

impl Shared {
    pub(crate) fn close_channel_instance(&self, channel: &DataChannel) {
        match self.registry.remove_instance(channel) {
            Some(registered) => self.finish_close(&registered),
            None => {
                channel.mark_closed();
            }
        }
    }

    fn finish_close(&self, channel: &Arc<DataChannel>) {
        if !channel.mark_closed() {
            return;
        }
        self.diagnostics.channel_closed();
        info!(stream_id = channel.stream_id(), origin = %channel.origin(), "channel closed");
        self.emit(ChannelEvent::Closed {
            channel: Arc::clone(channel),
            origin: channel.origin(),
        });
    }

    fn emit(&self, event: ChannelEvent) {
        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => listener.on_event(&event),
            None => {
                self.diagnostics.listener_absent();
                warn!(stream_id = event.stream_id(), %event, "no stack listener registered");
            }
        }
    }
}

impl DeliveryHandler for Dispatcher {
    fn handle(&self, message: InboundMessage) {
        self.deliver(message.payload, message.stream_id, message.ppid, message.flags);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channels", &self.shared.registry.stream_ids())
            .field("config", &self.shared.config)
            .field("has_listener", &self.shared.listener.read().is_some())
            .finish()
    }
}
