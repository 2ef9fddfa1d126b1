//! Messages exchanged with the host, and the payloads of each operation.
//!
//! Wire messages are JSON objects tagged by their `type` field:
//!
//! ```text
//! host → module   {"type": "handshake", "id": ...}
//! module → host   {"type": "handshake_success", "module": "database", ...}
//! host → module   {"type": "api_call", "call_cmd": "get_data", "data": {...},
//!                  "call_from": ..., "nonce": ...}
//! module → host   {"type": "api_sendresponse", "response_to": ..., "exist": true,
//!                  "error": null, "data": {...}, "nonce": ...}
//! ```
//!
//! `call_from` and `nonce` are opaque to this module and are echoed back
//! untouched so the host can correlate responses with calls.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Module type announced in the handshake.
pub const MODULE_TYPE: &str = "database";

/// Human readable module name announced in the handshake.
pub const MODULE_DISPLAY_NAME: &str = "JSON database";

/// Namespace the host routes calls for this module under.
pub const MODULE_NAMESPACE: &str = "db_json";

/// Database file suggested to the host by `default_cfg`.
pub const DEFAULT_DATABASE_FILE: &str = "database_default.json";

/// Caller-assigned identifier of one open database connection.
pub type Handle = i64;

/// A message sent by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// First message of every session.
    Handshake {
        #[serde(default)]
        id: Value,
    },
    /// A call into this module.
    ApiCall {
        /// A missing or non-string command decodes as `""`, which names no
        /// operation, so the call is still answered.
        #[serde(default, deserialize_with = "lenient_call_cmd")]
        call_cmd: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        call_from: Value,
        #[serde(default)]
        nonce: Value,
    },
    /// Any message type this module does not handle.
    #[serde(other)]
    Unknown,
}

fn lenient_call_cmd<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(call_cmd) => call_cmd,
        _ => String::new(),
    })
}

/// A message sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleMessage {
    HandshakeSuccess {
        module: String,
        module_displayname: String,
        module_namespace: String,
    },
    ApiSendresponse {
        response_to: Value,
        exist: bool,
        error: Option<String>,
        data: Value,
        nonce: Value,
    },
}

impl ModuleMessage {
    /// The one reply to a valid handshake.
    pub fn handshake_success() -> Self {
        ModuleMessage::HandshakeSuccess {
            module: MODULE_TYPE.to_string(),
            module_displayname: MODULE_DISPLAY_NAME.to_string(),
            module_namespace: MODULE_NAMESPACE.to_string(),
        }
    }
}

/// An inbound call, decoupled from its wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope {
    pub operation: String,
    pub payload: Value,
    pub caller_id: Value,
    pub correlation_id: Value,
}

impl CallEnvelope {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
            caller_id: Value::Null,
            correlation_id: Value::Null,
        }
    }

    pub fn with_correlation(mut self, caller_id: Value, correlation_id: Value) -> Self {
        self.caller_id = caller_id;
        self.correlation_id = correlation_id;
        self
    }

    /// Extract the call carried by a host message, if it is one.
    pub fn from_message(message: HostMessage) -> Option<Self> {
        match message {
            HostMessage::ApiCall {
                call_cmd,
                data,
                call_from,
                nonce,
            } => Some(Self {
                operation: call_cmd,
                payload: data,
                caller_id: call_from,
                correlation_id: nonce,
            }),
            _ => None,
        }
    }
}

/// The answer to exactly one [`CallEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub in_reply_to: Value,
    pub caller_id: Value,
    /// Whether this module knows the requested operation.
    pub found: bool,
    pub error: Option<String>,
    pub payload: Value,
}

impl ResponseEnvelope {
    /// The operation is not one this module provides.
    pub fn not_found(call: &CallEnvelope) -> Self {
        Self {
            in_reply_to: call.correlation_id.clone(),
            caller_id: call.caller_id.clone(),
            found: false,
            error: None,
            payload: Value::Null,
        }
    }

    pub fn ok(call: &CallEnvelope, payload: Value) -> Self {
        Self {
            in_reply_to: call.correlation_id.clone(),
            caller_id: call.caller_id.clone(),
            found: true,
            error: None,
            payload,
        }
    }

    /// The operation is known but failed.
    pub fn failed(call: &CallEnvelope, message: impl Into<String>) -> Self {
        Self {
            in_reply_to: call.correlation_id.clone(),
            caller_id: call.caller_id.clone(),
            found: true,
            error: Some(message.into()),
            payload: Value::Null,
        }
    }
}

impl From<ResponseEnvelope> for ModuleMessage {
    fn from(response: ResponseEnvelope) -> Self {
        ModuleMessage::ApiSendresponse {
            response_to: response.caller_id,
            exist: response.found,
            error: response.error,
            data: response.payload,
            nonce: response.in_reply_to,
        }
    }
}

fn default_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

/// Payload of `default_cfg`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultConfig {
    pub file: String,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
        }
    }
}

/// `params` of `connect_db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectParams {
    #[serde(default = "default_file")]
    pub file: String,
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            file: default_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub handle: Handle,
    pub display_name: String,
    #[serde(default)]
    pub params: ConnectParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRequest {
    pub handle: Handle,
    pub table: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    pub handle: Handle,
    pub table: String,
    pub key: String,
    /// A missing value stores `null`.
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRequest {
    pub handle: Handle,
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleRequest {
    pub handle: Handle,
}

/// Result of `connect_db`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResult {
    pub success: bool,
    pub handle: Handle,
}

/// Result of `get_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResult {
    pub success: bool,
    pub data: Value,
}

/// Result of `set_data`, `delete_data` and `delete_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResult {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_handshake() {
        let msg: HostMessage =
            serde_json::from_value(json!({"type": "handshake", "id": "instance-7"})).unwrap();
        assert_eq!(
            msg,
            HostMessage::Handshake {
                id: json!("instance-7")
            }
        );
    }

    #[test]
    fn parse_api_call() {
        let msg: HostMessage = serde_json::from_value(json!({
            "type": "api_call",
            "call_cmd": "get_data",
            "data": {"handle": 1, "table": "users", "key": "alice"},
            "call_from": "core",
            "nonce": 17,
        }))
        .unwrap();

        let call = CallEnvelope::from_message(msg).unwrap();
        assert_eq!(call.operation, "get_data");
        assert_eq!(call.payload["table"], json!("users"));
        assert_eq!(call.caller_id, json!("core"));
        assert_eq!(call.correlation_id, json!(17));
    }

    #[test]
    fn api_call_with_bad_command_is_still_a_call() {
        let msg: HostMessage = serde_json::from_value(json!({
            "type": "api_call",
            "call_cmd": 5,
            "call_from": "core",
            "nonce": 1,
        }))
        .unwrap();
        let call = CallEnvelope::from_message(msg).unwrap();
        assert_eq!(call.operation, "");
        assert_eq!(call.correlation_id, json!(1));

        let msg: HostMessage =
            serde_json::from_value(json!({"type": "api_call", "nonce": 2})).unwrap();
        let call = CallEnvelope::from_message(msg).unwrap();
        assert_eq!(call.operation, "");
        assert_eq!(call.caller_id, Value::Null);
        assert_eq!(call.correlation_id, json!(2));
    }

    #[test]
    fn unknown_message_types_are_tolerated() {
        let msg: HostMessage =
            serde_json::from_value(json!({"type": "challenge", "payload": 1})).unwrap();
        assert_eq!(msg, HostMessage::Unknown);
        assert!(CallEnvelope::from_message(msg).is_none());
    }

    #[test]
    fn handshake_success_wire_shape() {
        let value = serde_json::to_value(ModuleMessage::handshake_success()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "handshake_success",
                "module": "database",
                "module_displayname": "JSON database",
                "module_namespace": "db_json",
            })
        );
    }

    #[test]
    fn response_echoes_correlation() {
        let nonce = json!({"seq": 3, "tag": ["a", "b"]});
        let call = CallEnvelope::new("list_db", Value::Null)
            .with_correlation(json!("core"), nonce.clone());

        let message: ModuleMessage = ResponseEnvelope::ok(&call, json!([])).into();
        let value = serde_json::to_value(message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "api_sendresponse",
                "response_to": "core",
                "exist": true,
                "error": null,
                "data": [],
                "nonce": nonce,
            })
        );
    }

    #[test]
    fn not_found_and_failed_shapes() {
        let call = CallEnvelope::new("x", Value::Null).with_correlation(json!(1), json!(2));

        let missing = ResponseEnvelope::not_found(&call);
        assert!(!missing.found);
        assert!(missing.error.is_none());

        let failed = ResponseEnvelope::failed(&call, "boom");
        assert!(failed.found);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert_eq!(failed.payload, Value::Null);
        assert_eq!(failed.in_reply_to, json!(2));
    }

    #[test]
    fn connect_request_defaults_file() {
        let req: ConnectRequest =
            serde_json::from_value(json!({"handle": 3, "displayName": "main"})).unwrap();
        assert_eq!(req.params.file, DEFAULT_DATABASE_FILE);

        let req: ConnectRequest = serde_json::from_value(json!({
            "handle": 3,
            "displayName": "main",
            "params": {"file": "a.json"},
        }))
        .unwrap();
        assert_eq!(req.params.file, "a.json");
        assert_eq!(req.display_name, "main");
    }

    #[test]
    fn set_request_missing_value_is_null() {
        let req: SetRequest =
            serde_json::from_value(json!({"handle": 1, "table": "t", "key": "k"})).unwrap();
        assert_eq!(req.value, Value::Null);
    }
}
