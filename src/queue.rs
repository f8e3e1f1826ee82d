//! Handoff channel between the stream readers and the pipeline consumer.
//!
//! Unbounded FIFO of raw event lines. Producers (stream reader, playback
//! replay) clone the sender; the pipeline worker is the single consumer.
//! The channel closes when the last sender is dropped.

use std::sync::mpsc::{self, Receiver, Sender};

pub struct EventQueue {
    tx: Sender<String>,
    rx: Option<Receiver<String>>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx: Some(rx) }
    }

    /// A producer handle. Sends never block; a send after the consumer is
    /// gone is dropped on the floor.
    pub fn sender(&self) -> Sender<String> {
        self.tx.clone()
    }

    pub fn put(&self, line: String) {
        let _ = self.tx.send(line);
    }

    /// Take the consumer end. Single consumer; callable once.
    pub fn take_receiver(&mut self) -> Option<Receiver<String>> {
        self.rx.take()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
