// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FmError, FmResult, SESSION_EXPIRED_CODE};

/// JSON-RPC methods understood by FortiManager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Add,
    Update,
    Delete,
    Move,
    Exec,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Add => "add",
            Method::Update => "update",
            Method::Delete => "delete",
            Method::Move => "move",
            Method::Exec => "exec",
        }
    }
}

/// The one optional input a call carries besides its URL
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    /// Single object, sent as `data: [item]`
    Item(Map<String, Value>),
    /// Sent as `data` unchanged
    Raw(Value),
    /// Result window `[from, to)`; an open end sends `range: [from]`
    Range { from: u64, to: Option<u64> },
    /// Extra keys merged into the call object (e.g. move options)
    Extra(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub id: u32,
    pub method: Method,
    pub params: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl RpcRequest {
    pub fn new(method: Method, url: &str, payload: &Payload) -> Self {
        let mut call = Map::new();
        call.insert("url".to_string(), Value::String(url.to_string()));

        match payload {
            Payload::None => {}
            Payload::Item(item) => {
                call.insert("data".to_string(), Value::Array(vec![Value::Object(item.clone())]));
            }
            Payload::Raw(data) => {
                call.insert("data".to_string(), data.clone());
            }
            Payload::Range { from, to } => {
                let mut range = vec![Value::from(*from)];
                if let Some(to) = to {
                    range.push(Value::from(*to));
                }
                call.insert("range".to_string(), Value::Array(range));
            }
            Payload::Extra(extra) => {
                for (key, value) in extra {
                    call.insert(key.clone(), value.clone());
                }
            }
        }

        Self {
            id: 1,
            method,
            params: vec![call],
            session: None,
        }
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.session = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        self.params
            .first()
            .and_then(|call| call.get("url"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> FmResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| FmError::Transport(format!("Failed to encode request: {e}")))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RpcStatus {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResult {
    #[serde(default)]
    pub status: Option<RpcStatus>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Vec<RpcResult>,
    /// Only present on login replies
    #[serde(default)]
    pub session: Option<String>,
}

impl RpcResponse {
    pub fn from_value(value: Value) -> FmResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| FmError::Transport(format!("Malformed RPC response: {e}")))
    }

    /// Classify `result[0].status` and hand back the data on success.
    pub fn into_data(self) -> FmResult<Value> {
        let first = self
            .result
            .into_iter()
            .next()
            .ok_or_else(|| FmError::Transport("Malformed RPC response: empty result".to_string()))?;

        let status = first
            .status
            .ok_or_else(|| FmError::Transport("Malformed RPC response: missing status".to_string()))?;

        match status.code {
            0 => Ok(first.data),
            SESSION_EXPIRED_CODE => Err(FmError::AuthExpired(status.message)),
            code => Err(FmError::Rpc {
                code,
                message: status.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_plain_request_shape() {
        let request = RpcRequest::new(Method::Get, "/dvmdb/adom/root/device", &Payload::None)
            .with_session("tok");
        assert_eq!(
            request.to_value().unwrap(),
            json!({
                "id": 1,
                "method": "get",
                "params": [{"url": "/dvmdb/adom/root/device"}],
                "session": "tok"
            })
        );
    }

    #[test]
    fn test_unauthenticated_request_has_no_session() {
        let request = RpcRequest::new(
            Method::Exec,
            "/sys/login/user",
            &Payload::Raw(json!({"user": "admin", "passwd": "pw"})),
        );
        let body = request.to_value().unwrap();
        assert!(body.get("session").is_none());
        assert_eq!(body["params"][0]["data"], json!({"user": "admin", "passwd": "pw"}));
    }

    #[test]
    fn test_item_payload_is_wrapped_in_list() {
        let request = RpcRequest::new(Method::Add, "/x", &Payload::Item(object(json!({"name": "a"}))));
        assert_eq!(request.params[0]["data"], json!([{"name": "a"}]));
    }

    #[test]
    fn test_range_payload() {
        let closed = RpcRequest::new(Method::Get, "/x", &Payload::Range { from: 0, to: Some(5) });
        assert_eq!(closed.params[0]["range"], json!([0, 5]));

        let open = RpcRequest::new(Method::Get, "/x", &Payload::Range { from: 3, to: None });
        assert_eq!(open.params[0]["range"], json!([3]));
    }

    #[test]
    fn test_extra_params_merge_into_call() {
        let request = RpcRequest::new(
            Method::Move,
            "/pm/config/adom/root/pkg/default/firewall/policy/4",
            &Payload::Extra(object(json!({"option": "before", "target": "2"}))),
        );
        assert_eq!(request.params[0]["option"], "before");
        assert_eq!(request.params[0]["target"], "2");
        assert_eq!(request.url(), "/pm/config/adom/root/pkg/default/firewall/policy/4");
    }

    #[test]
    fn test_status_classification() {
        let ok = RpcResponse::from_value(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "data": {"name": "foo"}}]
        }))
        .unwrap();
        assert_eq!(ok.into_data().unwrap(), json!({"name": "foo"}));

        let expired = RpcResponse::from_value(json!({
            "result": [{"status": {"code": -11, "message": "No permission"}}]
        }))
        .unwrap();
        assert!(matches!(expired.into_data(), Err(FmError::AuthExpired(_))));

        let failed = RpcResponse::from_value(json!({
            "result": [{"status": {"code": 5, "message": "no such object"}}]
        }))
        .unwrap();
        match failed.into_data() {
            Err(FmError::Rpc { code, message }) => {
                assert_eq!(code, 5);
                assert_eq!(message, "no such object");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_missing_data_is_null() {
        let response = RpcResponse::from_value(json!({
            "result": [{"status": {"code": 0, "message": "OK"}, "url": "/x"}]
        }))
        .unwrap();
        assert_eq!(response.into_data().unwrap(), Value::Null);
    }

    #[test]
    fn test_malformed_responses_are_transport_errors() {
        let empty = RpcResponse::from_value(json!({"result": []})).unwrap();
        assert!(matches!(empty.into_data(), Err(FmError::Transport(_))));

        let no_status = RpcResponse::from_value(json!({"result": [{"data": 1}]})).unwrap();
        assert!(matches!(no_status.into_data(), Err(FmError::Transport(_))));

        assert!(matches!(
            RpcResponse::from_value(json!({"result": "nope"})),
            Err(FmError::Transport(_))
        ));
    }
}
