//! Command interface for external UI processes
//!
//! Requests arrive on an mpsc channel with a oneshot response slot per
//! request, the same shape UI surfaces use to talk to the daemon.
//! `getRules` answers from the cached snapshot without touching the
//! store; `toggleExtension` flips and persists the flag. Unsupported
//! actions get no response at all: the sender is dropped and the caller
//! times out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use intercept_core::Rule;

use crate::controller::SyncController;

/// Wire-level request: `{"action": "getRules"}` etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub action: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Rules { rules: Vec<Rule>, enabled: bool },
    Toggled { enabled: bool },
}

/// A request paired with its response slot
#[derive(Debug)]
pub struct CommandEnvelope {
    pub request: CommandRequest,
    pub respond_to: oneshot::Sender<CommandResponse>,
}

/// Handle for submitting commands to the daemon
#[derive(Debug, Clone)]
pub struct CommandClient {
    tx: mpsc::Sender<CommandEnvelope>,
}

impl CommandClient {
    /// Send a raw command; `None` means the action was unsupported (the
    /// handler dropped the response slot without answering).
    pub async fn send(&self, action: &str) -> Option<CommandResponse> {
        let (respond_to, rx) = oneshot::channel();
        let envelope = CommandEnvelope {
            request: CommandRequest {
                action: action.to_string(),
            },
            respond_to,
        };
        self.tx.send(envelope).await.ok()?;
        rx.await.ok()
    }

    pub async fn get_rules(&self) -> Option<(Vec<Rule>, bool)> {
        match self.send("getRules").await? {
            CommandResponse::Rules { rules, enabled } => Some((rules, enabled)),
            _ => None,
        }
    }

    pub async fn toggle_extension(&self) -> Option<bool> {
        match self.send("toggleExtension").await? {
            CommandResponse::Toggled { enabled } => Some(enabled),
            _ => None,
        }
    }
}

/// Command dispatch loop over the controller's cached state
pub struct CommandHandler {
    controller: Arc<SyncController>,
    rx: mpsc::Receiver<CommandEnvelope>,
}

impl CommandHandler {
    /// Build a handler and the client handle that feeds it
    pub fn new(controller: Arc<SyncController>) -> (Self, CommandClient) {
        let (tx, rx) = mpsc::channel(32);
        (Self { controller, rx }, CommandClient { tx })
    }

    /// Process commands until every client handle is dropped
    pub async fn run(mut self) {
        while let Some(envelope) = self.rx.recv().await {
            self.handle(envelope).await;
        }
    }

    async fn handle(&self, envelope: CommandEnvelope) {
        match envelope.request.action.as_str() {
            "getRules" => {
                let snapshot = self.controller.snapshot().await;
                let _ = envelope.respond_to.send(CommandResponse::Rules {
                    rules: snapshot.rules,
                    enabled: snapshot.enabled,
                });
            }
            "toggleExtension" => match self.controller.toggle().await {
                Ok(enabled) => {
                    let _ = envelope
                        .respond_to
                        .send(CommandResponse::Toggled { enabled });
                }
                Err(e) => {
                    // Persistence failed; drop the response slot so the
                    // caller sees the failure as silence
                    error!("toggle command failed: {}", e);
                }
            },
            other => {
                debug!("ignoring unsupported command action: {}", other);
            }
        }
    }
}
