use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use datachan_codec::{
    ppid, ChannelType, ControlMessage, MessageCodec, OpenChannelMessage, UserMessage,
};
use datachan_transport::{DeliveryFlags, TransportEndpoint};
use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::dispatcher::Shared;
use crate::error::{Result, StackError};
use crate::events::MessageListener;

/// Which side created a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Created by `Dispatcher::create_channel` on this side.
    Local,
    /// Created in response to an open request from the peer.
    Remote,
}

impl Origin {
    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel lifecycle state.
///
/// Both origins enter at `Open`. `Pending` is reserved for an
/// acknowledgement-gated open and is never entered today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Registered, waiting for the peer to acknowledge the open.
    Pending,
    /// Registered and exchanging messages.
    Open,
    /// Unregistered. Queued inbound messages can still be drained.
    Closed,
}

impl ChannelState {
    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpreted view of a (channel type, reliability parameter) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    /// Retransmit until delivered; the raw parameter carries no meaning.
    Reliable,
    /// Abandon a message after this many retransmissions.
    MaxRetransmits(u32),
    /// Abandon a message this long after its first transmission.
    MaxLifetime(Duration),
}

/// Immutable parameters captured when a channel is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelParameters {
    channel_type: ChannelType,
    priority: u16,
    reliability_parameter: u32,
    label: String,
    protocol: String,
}

impl ChannelParameters {
    /// Create parameters with an empty sub-protocol.
    pub fn new(
        channel_type: ChannelType,
        priority: u16,
        reliability_parameter: u32,
        label: impl Into<String>,
    ) -> Self {
        Self {
            channel_type,
            priority,
            reliability_parameter,
            label: label.into(),
            protocol: String::new(),
        }
    }

    /// Set the sub-protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Requested delivery semantics.
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    /// Scheduling priority; larger means lower priority.
    pub fn priority(&self) -> u16 {
        self.priority
    }

    /// The raw reliability parameter, exactly as supplied.
    pub fn reliability_parameter(&self) -> u32 {
        self.reliability_parameter
    }

    /// The reliability parameter read according to the channel type.
    pub fn reliability(&self) -> Reliability {
        if self.channel_type.is_rexmit_limited() {
            Reliability::MaxRetransmits(self.reliability_parameter)
        } else if self.channel_type.is_lifetime_limited() {
            Reliability::MaxLifetime(Duration::from_millis(u64::from(
                self.reliability_parameter,
            )))
        } else {
            Reliability::Reliable
        }
    }

    /// Channel label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sub-protocol; empty when unspecified.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Build the open request announcing these parameters.
    pub fn to_open_message(&self) -> OpenChannelMessage {
        OpenChannelMessage {
            channel_type: self.channel_type,
            priority: self.priority,
            reliability_parameter: self.reliability_parameter,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

impl From<OpenChannelMessage> for ChannelParameters {
    fn from(open: OpenChannelMessage) -> Self {
        Self {
            channel_type: open.channel_type,
            priority: open.priority,
            reliability_parameter: open.reliability_parameter,
            label: open.label,
            protocol: open.protocol,
        }
    }
}

/// One logical channel of an association.
///
/// Identity and parameters are fixed at creation. Inbound user messages are
/// queued in a bounded per-channel inbox and consumed with [`recv`],
/// [`try_recv`], [`recv_timeout`] or a listener thread started by
/// [`spawn_listener`]. Use a single consumer per channel; concurrent
/// consumers split the stream between them.
///
/// [`recv`]: DataChannel::recv
/// [`try_recv`]: DataChannel::try_recv
/// [`recv_timeout`]: DataChannel::recv_timeout
/// [`spawn_listener`]: DataChannel::spawn_listener
pub struct DataChannel {
    stream_id: u16,
    parameters: ChannelParameters,
    origin: Origin,
    state: Mutex<ChannelState>,
    endpoint: Arc<dyn TransportEndpoint>,
    codec: Arc<dyn MessageCodec>,
    inbox_tx: Mutex<Option<Sender<UserMessage>>>,
    inbox_rx: Receiver<UserMessage>,
    owner: Weak<Shared>,
}

/// Why an inbound message could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnqueueError {
    Full,
    Closed,
}

impl DataChannel {
    pub(crate) fn new(
        stream_id: u16,
        parameters: ChannelParameters,
        origin: Origin,
        endpoint: Arc<dyn TransportEndpoint>,
        codec: Arc<dyn MessageCodec>,
        inbox_capacity: usize,
        owner: Weak<Shared>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = flume::bounded(inbox_capacity);
        Self {
            stream_id,
            parameters,
            origin,
            state: Mutex::new(ChannelState::Open),
            endpoint,
            codec,
            inbox_tx: Mutex::new(Some(inbox_tx)),
            inbox_rx,
            owner,
        }
    }

    /// Stream id this channel is bound to.
    pub fn stream_id(&self) -> u16 {
        self.stream_id
    }

    /// Creation parameters.
    pub fn parameters(&self) -> &ChannelParameters {
        &self.parameters
    }

    /// Channel label.
    pub fn label(&self) -> &str {
        self.parameters.label()
    }

    /// Which side created the channel.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    /// Returns true while the channel is Open.
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Send the open request for this channel to the peer.
    ///
    /// Local channels are Open as soon as they are created; announcing them
    /// is up to the caller. Open requests always travel ordered.
    pub fn announce(&self) -> Result<()> {
        self.ensure_open()?;
        let payload = self
            .codec
            .encode_control(&ControlMessage::Open(self.parameters.to_open_message()))?;
        self.endpoint
            .send(self.stream_id, ppid::CONTROL, payload, DeliveryFlags::NONE)?;
        debug!(stream_id = self.stream_id, label = self.label(), "open request sent");
        Ok(())
    }

    pub(crate) fn acknowledge(&self) -> Result<()> {
        let payload = self.codec.encode_control(&ControlMessage::Ack)?;
        self.endpoint
            .send(self.stream_id, ppid::CONTROL, payload, DeliveryFlags::NONE)?;
        Ok(())
    }

    /// Send one user message.
    pub fn send(&self, message: &UserMessage) -> Result<()> {
        self.ensure_open()?;
        let (id, payload) = self.codec.encode_user(message);
        let flags = if self.parameters.channel_type().is_ordered() {
            DeliveryFlags::NONE
        } else {
            DeliveryFlags::UNORDERED
        };
        trace!(stream_id = self.stream_id, ppid = id, size = payload.len(), "sending");
        self.endpoint.send(self.stream_id, id, payload, flags)?;
        Ok(())
    }

    /// Send a text message.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.send(&UserMessage::Text(text.to_string()))
    }

    /// Send a binary message.
    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send(&UserMessage::Binary(data.into()))
    }

    /// Block until the next message arrives.
    ///
    /// Returns `StackError::ChannelClosed` once the channel is closed and
    /// every queued message has been consumed.
    pub fn recv(&self) -> Result<UserMessage> {
        self.inbox_rx
            .recv()
            .map_err(|_| StackError::ChannelClosed(self.stream_id))
    }

    /// Take the next queued message without blocking.
    pub fn try_recv(&self) -> Result<Option<UserMessage>> {
        match self.inbox_rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(StackError::ChannelClosed(self.stream_id)),
        }
    }

    /// Block until the next message arrives or `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<UserMessage> {
        self.inbox_rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => StackError::Timeout(timeout),
            RecvTimeoutError::Disconnected => StackError::ChannelClosed(self.stream_id),
        })
    }

    /// Wait for the next message without blocking the executor.
    #[cfg(feature = "async")]
    pub async fn recv_async(&self) -> Result<UserMessage> {
        self.inbox_rx
            .recv_async()
            .await
            .map_err(|_| StackError::ChannelClosed(self.stream_id))
    }

    /// Number of messages waiting in the inbox.
    pub fn pending_messages(&self) -> usize {
        self.inbox_rx.len()
    }

    /// Drain this channel's inbox on a dedicated thread.
    ///
    /// The listener sees every message in arrival order; once the channel is
    /// closed and the inbox is empty it gets `on_closed` and the thread exits.
    pub fn spawn_listener<L: MessageListener>(&self, mut listener: L) -> std::io::Result<JoinHandle<()>> {
        let inbox = self.inbox_rx.clone();
        let stream_id = self.stream_id;
        std::thread::Builder::new()
            .name(format!("datachan-stream-{stream_id}"))
            .spawn(move || {
                while let Ok(message) = inbox.recv() {
                    listener.on_message(message);
                }
                debug!(stream_id, "channel listener finished");
                listener.on_closed();
            })
    }

    /// Close the channel and release its stream id.
    ///
    /// Idempotent. Messages already queued stay readable.
    pub fn close(&self) {
        match self.owner.upgrade() {
            Some(shared) => shared.close_channel_instance(self),
            None => {
                self.mark_closed();
            }
        }
    }

    pub(crate) fn enqueue(&self, message: UserMessage) -> std::result::Result<(), EnqueueError> {
        let inbox = self.inbox_tx.lock();
        let Some(tx) = inbox.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        tx.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Disconnected(_) => EnqueueError::Closed,
        })
    }

    /// Transition to Closed and stop accepting inbound messages.
    /// Returns false if the channel was already closed.
    pub(crate) fn mark_closed(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ChannelState::Closed {
                return false;
            }
            *state = ChannelState::Closed;
        }
        self.inbox_tx.lock().take();
        true
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StackError::ChannelClosed(self.stream_id))
        }
    }
}

impl fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataChannel")
            .field("stream_id", &self.stream_id)
            .field("origin", &self.origin)
            .field("state", &self.state())
            .field("parameters", &self.parameters)
            .field("pending_messages", &self.pending_messages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use datachan_codec::{DcepCodec, ParsedMessage};

    use super::*;
    use crate::testing::RecordingEndpoint;

    fn channel(channel_type: ChannelType, capacity: usize) -> (DataChannel, Arc<RecordingEndpoint>) {
        let endpoint = Arc::new(RecordingEndpoint::default());
        let channel = DataChannel::new(
            12,
            ChannelParameters::new(channel_type, 7, 500, "ops").with_protocol("json"),
            Origin::Local,
            endpoint.clone(),
            Arc::new(DcepCodec),
            capacity,
            Weak::new(),
        );
        (channel, endpoint)
    }

    #[test]
    fn reliability_reads_parameter_by_type() {
        let rexmit = ChannelParameters::new(ChannelType::PartialReliableRexmit, 0, 3, "a");
        assert_eq!(rexmit.reliability(), Reliability::MaxRetransmits(3));
        assert_eq!(rexmit.reliability_parameter(), 3);

        let rexmit_unordered =
            ChannelParameters::new(ChannelType::PartialReliableRexmitUnordered, 0, 0, "a");
        assert_eq!(rexmit_unordered.reliability(), Reliability::MaxRetransmits(0));

        let timed = ChannelParameters::new(ChannelType::PartialReliableTimedUnordered, 0, 250, "a");
        assert_eq!(
            timed.reliability(),
            Reliability::MaxLifetime(Duration::from_millis(250))
        );
        assert_eq!(timed.reliability_parameter(), 250);
    }

    #[test]
    fn reliable_types_keep_but_ignore_parameter() {
        for channel_type in [ChannelType::Reliable, ChannelType::ReliableUnordered] {
            let params = ChannelParameters::new(channel_type, 0, 99, "a");
            assert_eq!(params.reliability(), Reliability::Reliable);
            assert_eq!(params.reliability_parameter(), 99);
        }
    }

    #[test]
    fn parameters_from_open_message() {
        let open = OpenChannelMessage {
            channel_type: ChannelType::PartialReliableTimed,
            priority: 512,
            reliability_parameter: 1000,
            label: "metrics".to_string(),
            protocol: "v1".to_string(),
        };
        let params = ChannelParameters::from(open.clone());
        assert_eq!(params.label(), "metrics");
        assert_eq!(params.protocol(), "v1");
        assert_eq!(params.priority(), 512);
        assert_eq!(params.to_open_message(), open);
    }

    #[test]
    fn announce_sends_open_request_on_own_stream() {
        let (channel, endpoint) = channel(ChannelType::PartialReliableRexmitUnordered, 4);
        channel.announce().unwrap();

        let sent = endpoint.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].stream_id, 12);
        assert_eq!(sent[0].ppid, ppid::CONTROL);
        assert!(!sent[0].flags.is_unordered());

        let parsed = DcepCodec.parse(&sent[0].payload, ppid::CONTROL).unwrap();
        assert_eq!(
            parsed,
            ParsedMessage::Control(ControlMessage::Open(channel.parameters().to_open_message()))
        );
    }

    #[test]
    fn unordered_channel_sends_unordered() {
        let (channel, endpoint) = channel(ChannelType::ReliableUnordered, 4);
        channel.send_text("hi").unwrap();
        channel.send_binary(vec![1u8, 2]).unwrap();

        let sent = endpoint.sent();
        assert_eq!(sent[0].ppid, ppid::STRING);
        assert_eq!(sent[1].ppid, ppid::BINARY);
        assert!(sent.iter().all(|m| m.flags.is_unordered()));
    }

    #[test]
    fn inbox_is_bounded() {
        let (channel, _endpoint) = channel(ChannelType::Reliable, 2);
        assert!(channel.enqueue(UserMessage::from("a")).is_ok());
        assert!(channel.enqueue(UserMessage::from("b")).is_ok());
        assert_eq!(
            channel.enqueue(UserMessage::from("c")),
            Err(EnqueueError::Full)
        );
        assert_eq!(channel.pending_messages(), 2);
        assert_eq!(channel.try_recv().unwrap(), Some(UserMessage::from("a")));
    }

    #[test]
    fn closed_channel_drains_then_reports_closed() {
        let (channel, _endpoint) = channel(ChannelType::Reliable, 4);
        channel.enqueue(UserMessage::from("last")).unwrap();

        channel.close();

        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(
            channel.enqueue(UserMessage::from("late")),
            Err(EnqueueError::Closed)
        );
        assert_eq!(channel.recv().unwrap(), UserMessage::from("last"));
        assert!(matches!(channel.recv(), Err(StackError::ChannelClosed(12))));
        assert!(matches!(
            channel.send_text("nope"),
            Err(StackError::ChannelClosed(12))
        ));
    }

    #[test]
    fn recv_timeout_reports_timeout() {
        let (channel, _endpoint) = channel(ChannelType::Reliable, 4);
        let err = channel.recv_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, StackError::Timeout(_)));
    }

    #[test]
    fn listener_thread_sees_messages_in_order_then_close() {
        let (channel, _endpoint) = channel(ChannelType::Reliable, 16);
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        struct Collect {
            seen: Vec<UserMessage>,
            done: std::sync::mpsc::Sender<Vec<UserMessage>>,
        }
        impl MessageListener for Collect {
            fn on_message(&mut self, message: UserMessage) {
                self.seen.push(message);
            }
            fn on_closed(&mut self) {
                let _ = self.done.send(std::mem::take(&mut self.seen));
            }
        }

        let handle = channel
            .spawn_listener(Collect {
                seen: Vec::new(),
                done: done_tx,
            })
            .unwrap();

        for i in 0..10 {
            channel.enqueue(UserMessage::from(format!("m{i}"))).unwrap();
        }
        channel.close();
        drop(channel);

        let seen = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        let expected: Vec<UserMessage> = (0..10).map(|i| UserMessage::from(format!("m{i}"))).collect();
        assert_eq!(seen, expected);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn recv_async_yields_queued_message() {
        let (channel, _endpoint) = channel(ChannelType::Reliable, 4);
        channel.enqueue(UserMessage::from("async")).unwrap();
        assert_eq!(channel.recv_async().await.unwrap(), UserMessage::from("async"));
    }
}
