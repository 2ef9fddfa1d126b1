//! The module's session with its host.
//!
//! A session starts with the host's handshake, then answers calls one at a
//! time in arrival order until the host closes the channel. Every open
//! database is flushed and closed before [`Module::run`] returns.

use serde_json::Value;

use crate::channel::ModuleChannel;
use crate::config::ModuleConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ModuleError, Result};
use crate::protocol::{CallEnvelope, HostMessage, ModuleMessage};
use crate::registry::{JsonFileFactory, StoreFactory};

fn kind(message: &HostMessage) -> &'static str {
    match message {
        HostMessage::Handshake { .. } => "handshake",
        HostMessage::ApiCall { .. } => "api_call",
        HostMessage::Unknown => "unknown message",
    }
}

/// A database module bound to one host.
pub struct Module<F: StoreFactory> {
    dispatcher: Dispatcher<F>,
    instance_id: Option<Value>,
}

impl Module<JsonFileFactory> {
    /// A module storing each database in its own JSON file.
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self::new(JsonFileFactory::new(config.store.clone()), config)
    }
}

impl<F: StoreFactory> Module<F> {
    pub fn new(factory: F, config: &ModuleConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(factory, config.dispatcher()),
            instance_id: None,
        }
    }

    /// Instance id the host sent in its handshake.
    pub fn instance_id(&self) -> Option<&Value> {
        self.instance_id.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher<F> {
        &self.dispatcher
    }

    /// Serve the host until it closes the channel.
    ///
    /// Fails with [`ModuleError::Handshake`] if the first message is not a
    /// handshake; nothing is sent in that case.
    pub async fn run(&mut self, mut channel: ModuleChannel) -> Result<()> {
        let id = match channel.recv().await {
            Some(HostMessage::Handshake { id }) => id,
            Some(other) => {
                return Err(ModuleError::Handshake {
                    received: kind(&other).to_string(),
                })
            }
            None => {
                return Err(ModuleError::Handshake {
                    received: "end of input".to_string(),
                })
            }
        };

        tracing::info!(instance = %id, "handshake accepted");
        self.instance_id = Some(id);
        channel.send(ModuleMessage::handshake_success())?;

        let result = self.serve(&mut channel).await;
        self.dispatcher.shutdown().await;
        result
    }

    async fn serve(&mut self, channel: &mut ModuleChannel) -> Result<()> {
        while let Some(message) = channel.recv().await {
            let message_kind = kind(&message);
            let Some(call) = CallEnvelope::from_message(message) else {
                tracing::warn!("ignoring {} from host", message_kind);
                continue;
            };

            let response = self.dispatcher.dispatch(call).await;
            channel.send(response.into())?;
        }

        tracing::debug!("host channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::channel::{pair, HostChannel};
    use crate::registry::InMemoryFactory;

    type Session = tokio::task::JoinHandle<(Module<InMemoryFactory>, Result<()>)>;

    fn start() -> (HostChannel, Session) {
        let (channel, host) = pair(16);
        let mut module = Module::new(InMemoryFactory, &ModuleConfig::default());
        let session = tokio::spawn(async move {
            let result = module.run(channel).await;
            (module, result)
        });
        (host, session)
    }

    #[tokio::test]
    async fn handshake_then_calls() {
        let (mut host, session) = start();

        host.send(HostMessage::Handshake { id: json!("inst-1") })
            .await
            .unwrap();
        assert_eq!(host.recv().await, Some(ModuleMessage::handshake_success()));

        host.call(
            "connect_db",
            json!({"handle": 1, "displayName": "main"}),
            json!("core"),
            json!(10),
        )
        .await
        .unwrap();

        match host.recv().await {
            Some(ModuleMessage::ApiSendresponse {
                response_to,
                exist,
                error,
                data,
                nonce,
            }) => {
                assert_eq!(response_to, json!("core"));
                assert!(exist);
                assert_eq!(error, None);
                assert_eq!(data, json!({"success": true, "handle": 1}));
                assert_eq!(nonce, json!(10));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        drop(host);
        let (module, result) = session.await.unwrap();
        result.unwrap();
        assert_eq!(module.instance_id(), Some(&json!("inst-1")));
        assert!(module.dispatcher().registry().is_empty());
    }

    #[tokio::test]
    async fn first_message_must_be_handshake() {
        let (mut host, session) = start();

        host.call("list_db", Value::Null, json!("core"), json!(1))
            .await
            .unwrap();

        let (_, result) = session.await.unwrap();
        match result {
            Err(ModuleError::Handshake { received }) => assert_eq!(received, "api_call"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(host.try_recv().is_none());
    }

    #[tokio::test]
    async fn end_of_input_before_handshake() {
        let (host, session) = start();
        drop(host);

        let (module, result) = session.await.unwrap();
        assert!(matches!(result, Err(ModuleError::Handshake { .. })));
        assert!(module.instance_id().is_none());
    }

    #[tokio::test]
    async fn stray_messages_after_handshake_are_ignored() {
        let (mut host, session) = start();

        host.send(HostMessage::Handshake { id: json!(1) })
            .await
            .unwrap();
        host.send(HostMessage::Unknown).await.unwrap();
        host.send(HostMessage::Handshake { id: json!(2) })
            .await
            .unwrap();
        host.call("default_cfg", Value::Null, json!("core"), json!("n"))
            .await
            .unwrap();

        assert_eq!(host.recv().await, Some(ModuleMessage::handshake_success()));
        assert!(matches!(
            host.recv().await,
            Some(ModuleMessage::ApiSendresponse { ref nonce, .. }) if nonce == &json!("n")
        ));

        drop(host);
        let (module, result) = session.await.unwrap();
        result.unwrap();
        assert_eq!(module.instance_id(), Some(&json!(1)));
    }

    #[tokio::test]
    async fn host_gone_before_reply() {
        let (channel, host) = pair(4);
        host.send(HostMessage::Handshake { id: Value::Null })
            .await
            .unwrap();
        drop(host);

        let mut module = Module::new(InMemoryFactory, &ModuleConfig::default());
        assert!(matches!(
            module.run(channel).await,
            Err(ModuleError::ChannelClosed)
        ));
    }
}
