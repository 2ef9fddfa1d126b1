//! Newline-delimited JSON bridge between a [`ModuleChannel`] and a byte
//! stream, normally the process's stdin/stdout.
//!
//! Each line on the input is one [`HostMessage`]; each [`ModuleMessage`] is
//! written as one line and flushed immediately.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::ModuleChannel;
use crate::protocol::{HostMessage, ModuleMessage};

/// Bridge the process's stdin/stdout.
///
/// The returned task finishes once the channel is dropped and every queued
/// message has been written; await it before exiting.
pub fn spawn(capacity: usize) -> (ModuleChannel, JoinHandle<()>) {
    spawn_with(tokio::io::stdin(), tokio::io::stdout(), capacity)
}

/// Bridge arbitrary async streams.
pub fn spawn_with<R, W>(reader: R, writer: W, capacity: usize) -> (ModuleChannel, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(read_messages(reader, inbound_tx));
    let writer_task = tokio::spawn(write_messages(writer, outbound_rx));

    (ModuleChannel::new(inbound_rx, outbound_tx), writer_task)
}

/// Decode one input line. Lines that are not a host message decode as
/// [`HostMessage::Unknown`].
pub fn parse_line(line: &str) -> HostMessage {
    serde_json::from_str(line).unwrap_or_else(|e| {
        tracing::warn!("dropping malformed message from host: {}", e);
        HostMessage::Unknown
    })
}

async fn read_messages<R>(reader: R, tx: mpsc::Sender<HostMessage>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(parse_line(&line)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!("host closed its end of the channel");
                break;
            }
            Err(e) => {
                tracing::error!("failed to read from host: {}", e);
                break;
            }
        }
    }
}

async fn write_messages<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<ModuleMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut bytes = match serde_json::to_vec(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("failed to encode message for host: {}", e);
                continue;
            }
        };
        bytes.push(b'\n');

        if let Err(e) = writer.write_all(&bytes).await {
            tracing::error!("failed to write to host: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::error!("failed to flush output to host: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_line_variants() {
        assert_eq!(
            parse_line(r#"{"type":"handshake","id":"abc"}"#),
            HostMessage::Handshake { id: json!("abc") }
        );
        assert_eq!(parse_line("{broken"), HostMessage::Unknown);
        assert_eq!(parse_line(r#"{"no_type": 1}"#), HostMessage::Unknown);
        assert_eq!(parse_line(r#"{"type":"ping"}"#), HostMessage::Unknown);
    }

    #[tokio::test]
    async fn bridges_lines_both_ways() {
        let (mut host_write, module_read) = tokio::io::duplex(1024);
        let (module_write, host_read) = tokio::io::duplex(1024);

        let (mut channel, writer) = spawn_with(module_read, module_write, 8);

        host_write
            .write_all(b"{\"type\":\"handshake\",\"id\":1}\n\nnot json\n")
            .await
            .unwrap();

        assert_eq!(
            channel.recv().await,
            Some(HostMessage::Handshake { id: json!(1) })
        );
        assert_eq!(channel.recv().await, Some(HostMessage::Unknown));

        channel.send(ModuleMessage::handshake_success()).unwrap();
        drop(channel);
        writer.await.unwrap();

        let mut lines = BufReader::new(host_read).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        let message: ModuleMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(message, ModuleMessage::handshake_success());
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn input_eof_closes_inbound() {
        let (host_write, module_read) = tokio::io::duplex(64);
        let (module_write, _host_read) = tokio::io::duplex(64);

        let (mut channel, _writer) = spawn_with(module_read, module_write, 8);
        drop(host_write);

        assert_eq!(channel.recv().await, None);
    }
}
