use std::collections::HashMap;

use crate::traits::DeliveryFlags;

/// Assigns sequence metadata to one direction of an association.
///
/// TSNs increase by one per message. SSNs increase by one per ordered
/// message on each stream; unordered messages carry SSN 0 and do not
/// advance the stream counter. Both wrap.
#[derive(Debug, Default)]
pub struct Sequencer {
    next_tsn: u32,
    next_ssn: HashMap<u16, u16>,
}

impl Sequencer {
    /// Create a sequencer starting at TSN 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `(ssn, tsn)` to the next message on `stream_id`.
    pub fn assign(&mut self, stream_id: u16, flags: DeliveryFlags) -> (u16, u32) {
        let tsn = self.next_tsn;
        self.next_tsn = self.next_tsn.wrapping_add(1);
        if flags.is_unordered() {
            return (0, tsn);
        }
        let ssn = self.next_ssn.entry(stream_id).or_insert(0);
        let assigned = *ssn;
        *ssn = ssn.wrapping_add(1);
        (assigned, tsn)
    }

    /// Forget the SSN counter of a stream so a reused stream id restarts at 0.
    pub fn reset_stream(&mut self, stream_id: u16) {
        self.next_ssn.remove(&stream_id);
    }
}
