use std::mem;

use polyview_shared::{ViewError, ViewMessage};

/// Outbound message queue with transactional batching. Messages enqueued
/// between `begin` and `end` are appended to the queue as one unit when the
/// transaction ends, so the whole batch reaches the peer together and in
/// enqueue order.
pub(crate) struct PacketBuffer {
    queued: Vec<ViewMessage>,
    batch: Option<Vec<ViewMessage>>,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            queued: Vec::new(),
            batch: None,
        }
    }

    pub fn send(&mut self, message: ViewMessage) {
        match &mut self.batch {
            Some(batch) => batch.push(message),
            None => self.queued.push(message),
        }
    }

    pub fn begin_transaction(&mut self) -> Result<(), ViewError> {
        if self.batch.is_some() {
            return Err(ViewError::InvariantViolation("transaction already open"));
        }
        self.batch = Some(Vec::new());
        Ok(())
    }

    pub fn end_transaction(&mut self) -> Result<(), ViewError> {
        let batch = self
            .batch
            .take()
            .ok_or(ViewError::InvariantViolation("no open transaction"))?;
        self.queued.extend(batch);
        Ok(())
    }

    /// Drains everything queued so far. Messages inside an unfinished
    /// transaction stay held back.
    pub fn flush(&mut self) -> Vec<ViewMessage> {
        mem::take(&mut self.queued)
    }
}
