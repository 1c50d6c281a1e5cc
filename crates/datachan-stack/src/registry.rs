use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::DataChannel;
use crate::error::{Result, StackError};

/// Map from stream id to the live channel bound to it.
///
/// Every operation takes the lock for the duration of one map access only;
/// callers never run listener code or transport sends while holding it.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<u16, Arc<DataChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `channel` to its stream id if the id is free.
    ///
    /// The check and the insert happen under one lock acquisition, so of two
    /// concurrent inserts for the same id exactly one wins.
    pub fn try_insert(&self, channel: Arc<DataChannel>) -> Result<()> {
        let stream_id = channel.stream_id();
        match self.channels.lock().entry(stream_id) {
            Entry::Occupied(_) => Err(StackError::DuplicateStreamId(stream_id)),
            Entry::Vacant(slot) => {
                slot.insert(channel);
                Ok(())
            }
        }
    }

    /// The channel bound to `stream_id`, if any.
    pub fn get(&self, stream_id: u16) -> Option<Arc<DataChannel>> {
        self.channels.lock().get(&stream_id).cloned()
    }

    /// Unbind and return the channel on `stream_id`.
    pub fn remove(&self, stream_id: u16) -> Option<Arc<DataChannel>> {
        self.channels.lock().remove(&stream_id)
    }

    /// Unbind the channel on `channel`'s stream id only if it is that exact
    /// instance.
    pub fn remove_instance(&self, channel: &DataChannel) -> Option<Arc<DataChannel>> {
        let mut channels = self.channels.lock();
        let stream_id = channel.stream_id();
        let same = channels
            .get(&stream_id)
            .is_some_and(|bound| std::ptr::eq(Arc::as_ptr(bound), channel));
        if same {
            channels.remove(&stream_id)
        } else {
            None
        }
    }

    /// Unbind every channel, in ascending stream id order.
    pub fn drain(&self) -> Vec<Arc<DataChannel>> {
        let mut drained: Vec<_> = self.channels.lock().drain().map(|(_, ch)| ch).collect();
        drained.sort_by_key(|ch| ch.stream_id());
        drained
    }

    pub fn contains(&self, stream_id: u16) -> bool {
        self.channels.lock().contains_key(&stream_id)
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Bound stream ids, ascending.
    pub fn stream_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.channels.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Snapshot of every bound channel, ascending by stream id.
    pub fn channels(&self) -> Vec<Arc<DataChannel>> {
        let mut channels: Vec<_> = self.channels.lock().values().cloned().collect();
        channels.sort_by_key(|ch| ch.stream_id());
        channels
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use datachan_codec::{ChannelType, DcepCodec};

    use super::*;
    use crate::channel::{ChannelParameters, Origin};
    use crate::testing::RecordingEndpoint;

    fn channel(stream_id: u16, label: &str) -> Arc<DataChannel> {
        Arc::new(DataChannel::new(
            stream_id,
            ChannelParameters::new(ChannelType::Reliable, 0, 0, label),
            Origin::Local,
            Arc::new(RecordingEndpoint::default()),
            Arc::new(DcepCodec),
            4,
            Weak::new(),
        ))
    }

    #[test]
    fn insert_rejects_bound_id_and_keeps_original() {
        let registry = ChannelRegistry::new();
        let first = channel(3, "first");
        registry.try_insert(first.clone()).unwrap();

        let err = registry.try_insert(channel(3, "second")).unwrap_err();
        assert!(matches!(err, StackError::DuplicateStreamId(3)));

        let bound = registry.get(3).unwrap();
        assert!(Arc::ptr_eq(&bound, &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_instance_ignores_replacement() {
        let registry = ChannelRegistry::new();
        let old = channel(8, "old");
        registry.try_insert(old.clone()).unwrap();
        registry.remove(8).unwrap();

        let new = channel(8, "new");
        registry.try_insert(new.clone()).unwrap();

        assert!(registry.remove_instance(&old).is_none());
        assert!(registry.contains(8));
        assert!(registry.remove_instance(&new).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn ids_and_drain_are_sorted() {
        let registry = ChannelRegistry::new();
        for id in [9, 1, 5] {
            registry.try_insert(channel(id, "c")).unwrap();
        }
        assert_eq!(registry.stream_ids(), vec![1, 5, 9]);

        let drained: Vec<u16> = registry.drain().iter().map(|c| c.stream_id()).collect();
        assert_eq!(drained, vec![1, 5, 9]);
        assert!(registry.is_empty());
        assert!(registry.get(5).is_none());
    }
}
