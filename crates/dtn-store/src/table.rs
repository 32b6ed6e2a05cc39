//! `MessageTable` — arena owning every message of a run.

use dtn_core::{MessageId, NodeId, SimDuration, SimTime};

use crate::{Message, StoreError, StoreResult};

/// Messages indexed by `MessageId`.  Ids are assigned sequentially, so
/// iteration order is creation order.
#[derive(Default, Debug)]
pub struct MessageTable {
    messages: Vec<Message>,
}

impl MessageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message and return its id.
    pub fn create(
        &mut self,
        source:      NodeId,
        destination: NodeId,
        created:     SimTime,
        ttl:         SimDuration,
        size:        u64,
        priority:    i32,
    ) -> MessageId {
        let id = MessageId(self.messages.len() as u32);
        let mut msg = Message::new(id, source, destination, created, ttl, size);
        msg.priority = priority;
        self.messages.push(msg);
        id
    }

    /// Insert a message built elsewhere (e.g. decoded from a bridge).  Its id
    /// is overwritten with the next free one.
    pub fn insert(&mut self, mut msg: Message) -> MessageId {
        let id = MessageId(self.messages.len() as u32);
        msg.id = id;
        self.messages.push(msg);
        id
    }

    #[inline]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id.index())
    }

    /// Like [`get`](Self::get) but as a `Result`.
    pub fn try_get(&self, id: MessageId) -> StoreResult<&Message> {
        self.get(id).ok_or(StoreError::UnknownMessage(id))
    }

    pub fn try_get_mut(&mut self, id: MessageId) -> StoreResult<&mut Message> {
        self.get_mut(id).ok_or(StoreError::UnknownMessage(id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}
