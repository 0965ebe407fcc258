use std::sync::mpsc;

use reel_core::StatusEvent;

/// Receiver side of the status channel. Emitting never blocks the pipeline.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

pub struct ChannelStatusSink {
    tx: mpsc::Sender<StatusEvent>,
}

impl ChannelStatusSink {
    pub fn new(tx: mpsc::Sender<StatusEvent>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelStatusSink {
    fn emit(&self, event: StatusEvent) {
        // The control side may already be gone during shutdown.
        let _ = self.tx.send(event);
    }
}
