//! `MessageBuffer` — one node's bounded store of message copies.
//!
//! # Invariant
//!
//! After every operation `used_bytes() <= capacity.bytes` and
//! `len() <= capacity.messages` (for whichever limits are set).

use dtn_core::{MessageId, SimTime};

use crate::{EvictionPolicy, MessageTable, StoreError, StoreResult};

// ── Capacity ──────────────────────────────────────────────────────────────────

/// Buffer limits.  `None` means unlimited in that dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capacity {
    pub bytes:    Option<u64>,
    pub messages: Option<usize>,
}

impl Capacity {
    pub const UNLIMITED: Capacity = Capacity { bytes: None, messages: None };

    pub fn bytes(bytes: u64) -> Self {
        Self { bytes: Some(bytes), messages: None }
    }

    pub fn messages(messages: usize) -> Self {
        Self { bytes: None, messages: Some(messages) }
    }

    /// Whether a single message of `size` bytes could ever fit.
    fn admits(&self, size: u64) -> bool {
        self.bytes.is_none_or(|b| size <= b) && self.messages.is_none_or(|m| m >= 1)
    }
}

// ── BufferedCopy ──────────────────────────────────────────────────────────────

/// Per-holder state of one message copy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferedCopy {
    pub msg:       MessageId,
    pub received:  SimTime,
    /// Replication tokens held (copy-limited policies).
    pub tokens:    u32,
    /// How many times this holder has sent the message on.
    pub forwards:  u32,
    /// Hops the message travelled to reach this holder.
    pub hop_count: u32,
    /// `true` while a transfer from this holder is in progress.
    pub sending:   bool,
}

impl BufferedCopy {
    pub fn new(msg: MessageId, received: SimTime) -> Self {
        Self { msg, received, tokens: 1, forwards: 0, hop_count: 0, sending: false }
    }
}

// ── MessageBuffer ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MessageBuffer {
    capacity:   Capacity,
    policy:     EvictionPolicy,
    /// Buffer order = insertion order.
    copies:     Vec<BufferedCopy>,
    used_bytes: u64,
}

impl MessageBuffer {
    pub fn new(capacity: Capacity, policy: EvictionPolicy) -> Self {
        Self { capacity, policy, copies: Vec::new(), used_bytes: 0 }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Fill level in `[0, 1]`: the larger of the byte and count ratios.
    /// Zero for an unlimited buffer.
    pub fn occupancy(&self) -> f64 {
        let by_bytes = match self.capacity.bytes {
            Some(0) => 1.0,
            Some(b) => self.used_bytes as f64 / b as f64,
            None    => 0.0,
        };
        let by_count = match self.capacity.messages {
            Some(0) => 1.0,
            Some(m) => self.copies.len() as f64 / m as f64,
            None    => 0.0,
        };
        by_bytes.max(by_count).clamp(0.0, 1.0)
    }

    pub fn contains(&self, msg: MessageId) -> bool {
        self.position(msg).is_some()
    }

    pub fn get(&self, msg: MessageId) -> Option<&BufferedCopy> {
        self.position(msg).map(|i| &self.copies[i])
    }

    pub fn get_mut(&mut self, msg: MessageId) -> Option<&mut BufferedCopy> {
        self.position(msg).map(|i| &mut self.copies[i])
    }

    /// Copies in buffer order.
    pub fn iter(&self) -> impl Iterator<Item = &BufferedCopy> {
        self.copies.iter()
    }

    /// Ids in buffer order.
    pub fn ids(&self) -> Vec<MessageId> {
        self.copies.iter().map(|c| c.msg).collect()
    }

    /// Mark or unmark a copy as in transit.  Returns `false` if absent.
    pub fn set_sending(&mut self, msg: MessageId, sending: bool) -> bool {
        match self.get_mut(msg) {
            Some(c) => {
                c.sending = sending;
                true
            }
            None => false,
        }
    }

    /// Store `copy`, evicting others as needed.
    ///
    /// Returns the evicted copies in buffer order.  On error nothing changes.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnknownMessage`] if `copy.msg` is not in `table`.
    /// - [`StoreError::Duplicate`] if the message is already buffered.
    /// - [`StoreError::CapacityExceeded`] if the message alone exceeds the
    ///   capacity, or no evictable copies free enough room.
    pub fn enqueue(&mut self, copy: BufferedCopy, table: &MessageTable) -> StoreResult<Vec<BufferedCopy>> {
        let size = table.try_get(copy.msg)?.size;
        if self.contains(copy.msg) {
            return Err(StoreError::Duplicate(copy.msg));
        }
        let exceeded = StoreError::CapacityExceeded { msg: copy.msg, size };
        if !self.capacity.admits(size) {
            return Err(exceeded);
        }

        // Choose victims without touching the buffer so failure is atomic.
        let mut victims: Vec<usize> = Vec::new();
        let mut bytes = self.used_bytes;
        let mut count = self.copies.len();
        while !self.fits(bytes, count, size) {
            let pick = self.policy.pick_victim(&self.copies, table, |i| victims.contains(&i));
            let Some(i) = pick else {
                return Err(exceeded);
            };
            bytes -= table.get(self.copies[i].msg).map_or(0, |m| m.size);
            count -= 1;
            victims.push(i);
        }

        victims.sort_unstable();
        let mut evicted = Vec::with_capacity(victims.len());
        for &i in victims.iter().rev() {
            evicted.push(self.copies.remove(i));
        }
        evicted.reverse();

        self.used_bytes = bytes + size;
        self.copies.push(copy);
        Ok(evicted)
    }

    /// Remove the copy of `msg`.  Idempotent: a second call returns `None`.
    pub fn remove(&mut self, msg: MessageId, table: &MessageTable) -> Option<BufferedCopy> {
        let i = self.position(msg)?;
        let copy = self.copies.remove(i);
        self.used_bytes -= table.get(msg).map_or(0, |m| m.size);
        Some(copy)
    }

    /// Remove and return every copy whose message has expired at `now`.
    pub fn take_expired(&mut self, now: SimTime, table: &MessageTable) -> Vec<BufferedCopy> {
        let mut expired = Vec::new();
        let mut freed = 0u64;
        self.copies.retain(|c| match table.get(c.msg) {
            Some(m) if m.is_expired(now) => {
                freed += m.size;
                expired.push(*c);
                false
            }
            _ => true,
        });
        self.used_bytes -= freed;
        expired
    }

    fn position(&self, msg: MessageId) -> Option<usize> {
        self.copies.iter().position(|c| c.msg == msg)
    }

    fn fits(&self, bytes: u64, count: usize, size: u64) -> bool {
        self.capacity.bytes.is_none_or(|b| bytes + size <= b)
            && self.capacity.messages.is_none_or(|m| count < m)
    }
}
