use std::sync::Arc;

use async_trait::async_trait;
use check_relay_core::contract::CheckSpec;
use check_relay_core::envelope::decode_notification;

use super::pipeline::{run_check, CheckConfig, CheckDeps, CheckOutcome};
use crate::adapters::command::CommandRunner;
use crate::adapters::notifier::StatusNotifier;
use crate::adapters::object_store::ObjectStore;
use crate::adapters::queue::ReceivedMessage;
use crate::poller::MessageHandler;

/// Work-queue consumer running one check per message.
pub struct CheckHandler {
    config: CheckConfig,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn StatusNotifier>,
}

impl CheckHandler {
    pub fn new(
        config: CheckConfig,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            config,
            runner,
            store,
            notifier,
        }
    }
}

#[async_trait]
impl MessageHandler for CheckHandler {
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), String> {
        let spec: CheckSpec = decode_notification(&message.body)
            .map_err(|error| format!("invalid check spec: {error}"))?;
        tracing::debug!(component = "check_worker", check_id = %spec.check_id, "got check spec");

        let deps = CheckDeps {
            runner: self.runner.as_ref(),
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
        };
        match run_check(&spec, &self.config, deps).await {
            CheckOutcome::Completed { .. } => Ok(()),
            CheckOutcome::Failed { error } => Err(format!(
                "check {} failed at {}: {error}",
                spec.check_id,
                error.stage.key()
            )),
            CheckOutcome::Rejected { error } => Err(format!("invalid check spec: {error}")),
        }
    }
}
