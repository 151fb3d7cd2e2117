use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use check_relay_core::polling::PollSettings;
use check_relay_lambda::adapters::queue::{MessageQueue, ReceivedMessage};
use check_relay_lambda::poller::MessageHandler;
use tokio::sync::Notify;

pub fn message(id: &str, body: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: Some(id.to_string()),
        body: body.to_string(),
        receipt_handle: format!("rh-{id}"),
    }
}

/// Queue that replays scripted receive results, then reports itself drained.
#[derive(Default)]
pub struct ScriptedQueue {
    batches: Mutex<VecDeque<Result<Vec<ReceivedMessage>, String>>>,
    acknowledged: Mutex<Vec<String>>,
    failing_acks: HashSet<String>,
    receive_calls: Mutex<usize>,
    pub drained: Arc<Notify>,
}

impl ScriptedQueue {
    pub fn new(batches: Vec<Result<Vec<ReceivedMessage>, String>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Self::default()
        }
    }

    pub fn failing_ack(mut self, receipt_handle: &str) -> Self {
        self.failing_acks.insert(receipt_handle.to_string());
        self
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().expect("poisoned mutex").clone()
    }

    pub fn receive_calls(&self) -> usize {
        *self.receive_calls.lock().expect("poisoned mutex")
    }
}

#[async_trait]
impl MessageQueue for ScriptedQueue {
    async fn receive(&self, _settings: &PollSettings) -> Result<Vec<ReceivedMessage>, String> {
        *self.receive_calls.lock().expect("poisoned mutex") += 1;
        let next = self.batches.lock().expect("poisoned mutex").pop_front();
        match next {
            Some(batch) => batch,
            None => {
                self.drained.notify_one();
                tokio::task::yield_now().await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<(), String> {
        if self.failing_acks.contains(receipt_handle) {
            return Err(format!("receipt handle {receipt_handle} expired"));
        }
        self.acknowledged
            .lock()
            .expect("poisoned mutex")
            .push(receipt_handle.to_string());
        Ok(())
    }
}

/// Handler that records bodies and fails any body containing `fail`.
#[derive(Default)]
pub struct RecordingHandler {
    handled: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn handled(&self) -> Vec<String> {
        self.handled.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), String> {
        self.handled
            .lock()
            .expect("poisoned mutex")
            .push(message.body.clone());
        if message.body.contains("fail") {
            Err(format!("cannot handle {}", message.body))
        } else {
            Ok(())
        }
    }
}
