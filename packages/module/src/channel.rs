//! Message channel between the module and its host.
//!
//! The module side receives [`HostMessage`]s in arrival order and sends
//! [`ModuleMessage`]s without ever blocking. [`pair`] wires both ends
//! together in-process; [`crate::stdio`] bridges the module end to
//! newline-delimited JSON on stdin/stdout.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{ModuleError, Result};
use crate::protocol::{HostMessage, ModuleMessage};

/// The module's end of the host channel.
#[derive(Debug)]
pub struct ModuleChannel {
    inbound: mpsc::Receiver<HostMessage>,
    outbound: mpsc::UnboundedSender<ModuleMessage>,
}

impl ModuleChannel {
    pub fn new(
        inbound: mpsc::Receiver<HostMessage>,
        outbound: mpsc::UnboundedSender<ModuleMessage>,
    ) -> Self {
        Self { inbound, outbound }
    }

    /// Wait for the next message from the host.
    ///
    /// Returns `None` once the host side is gone and every queued message
    /// has been received.
    pub async fn recv(&mut self) -> Option<HostMessage> {
        self.inbound.recv().await
    }

    /// Queue a message for the host. Never blocks.
    pub fn send(&self, message: ModuleMessage) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| ModuleError::ChannelClosed)
    }
}

/// The host's end of an in-process channel.
#[derive(Debug)]
pub struct HostChannel {
    tx: mpsc::Sender<HostMessage>,
    rx: mpsc::UnboundedReceiver<ModuleMessage>,
}

impl HostChannel {
    /// Send a message to the module, waiting for buffer space if needed.
    pub async fn send(&self, message: HostMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| ModuleError::ChannelClosed)
    }

    /// Send an `api_call` to the module.
    pub async fn call(
        &self,
        call_cmd: &str,
        data: Value,
        call_from: Value,
        nonce: Value,
    ) -> Result<()> {
        self.send(HostMessage::ApiCall {
            call_cmd: call_cmd.to_string(),
            data,
            call_from,
            nonce,
        })
        .await
    }

    /// Wait for the next message from the module.
    pub async fn recv(&mut self) -> Option<ModuleMessage> {
        self.rx.recv().await
    }

    /// Take a message from the module if one is already queued.
    pub fn try_recv(&mut self) -> Option<ModuleMessage> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected module/host channel pair.
///
/// `capacity` bounds the number of host messages waiting to be handled.
/// Messages to the host are unbounded so the module never blocks on send.
pub fn pair(capacity: usize) -> (ModuleChannel, HostChannel) {
    let (host_tx, module_rx) = mpsc::channel(capacity);
    let (module_tx, host_rx) = mpsc::unbounded_channel();

    (
        ModuleChannel::new(module_rx, module_tx),
        HostChannel {
            tx: host_tx,
            rx: host_rx,
        },
    )
}
