// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::{Transport, JSONRPC_PATH};
use crate::config::FortiManagerSettings;
use crate::error::{FmError, FmResult};
use crate::session::{SessionStore, SESSION_KEY};
use crate::types::{Method, Payload, RpcRequest, RpcResponse};

/// ADOM value that addresses the global database instead of a named domain
pub const GLOBAL_SCOPE: &str = "global";

const LOGIN_URL: &str = "/sys/login/user";

/// Session-authenticated FortiManager client.
///
/// Every call reads the token from the injected [`SessionStore`], logs in
/// when none is stored, and on an expired session logs in again and
/// resends the request exactly once.
pub struct FortiClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    username: String,
    password: String,
    adom: String,
}

impl FortiClient {
    pub fn new(
        settings: &FortiManagerSettings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            transport,
            store,
            username: settings.username.clone(),
            password: settings.password.clone(),
            adom: settings.adom.clone(),
        }
    }

    /// Configured ADOM name, before scope resolution
    pub fn adom(&self) -> &str {
        &self.adom
    }

    /// Resolve an ADOM name (or the configured default) into an RPC path segment.
    pub fn scope(&self, adom: Option<&str>) -> String {
        scope_for(adom.unwrap_or(&self.adom))
    }

    /// Return the stored token, or log in when `force_new` is set or nothing is stored.
    pub async fn get_token(&self, force_new: bool) -> FmResult<String> {
        if !force_new {
            if let Some(token) = self.store.load(SESSION_KEY)? {
                return Ok(token);
            }
            tracing::debug!("no stored session token, logging in");
        }

        self.login().await
    }

    async fn login(&self) -> FmResult<String> {
        let request = RpcRequest::new(
            Method::Exec,
            LOGIN_URL,
            &Payload::Raw(json!({"user": self.username, "passwd": self.password})),
        );

        let response = self.send(&request).await?;
        let token = response.session.clone();

        // An expiry code on the login itself is not something a retry fixes
        response.into_data().map_err(FmError::into_terminal)?;

        let token = token.filter(|t| !t.is_empty()).ok_or_else(|| FmError::Rpc {
            code: 0,
            message: "Login succeeded but the response carried no session token".to_string(),
        })?;

        self.store.save(SESSION_KEY, &token)?;
        tracing::info!(user = %self.username, "obtained new FortiManager session");
        Ok(token)
    }

    /// Issue one logical RPC operation and return its `data`.
    pub async fn call(&self, method: Method, url: &str, payload: Payload) -> FmResult<Value> {
        let token = self.get_token(false).await?;
        let request = RpcRequest::new(method, url, &payload).with_session(token);

        match self.send(&request).await?.into_data() {
            Err(FmError::AuthExpired(message)) => {
                tracing::warn!(url, %message, "session expired, re-authenticating once");
                let token = self.get_token(true).await?;
                let retry = request.with_session(token);
                self.send(&retry)
                    .await?
                    .into_data()
                    .map_err(FmError::into_terminal)
            }
            outcome => outcome,
        }
    }

    async fn send(&self, request: &RpcRequest) -> FmResult<RpcResponse> {
        tracing::debug!(method = request.method.as_str(), url = request.url(), "rpc call");
        let body = request.to_value()?;
        let reply = self.transport.post(JSONRPC_PATH, &body).await?;
        RpcResponse::from_value(reply)
    }
}

/// `global` stays as is, anything else becomes `adom/<name>`.
pub fn scope_for(adom: &str) -> String {
    if adom == GLOBAL_SCOPE {
        GLOBAL_SCOPE.to_string()
    } else {
        format!("adom/{adom}")
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_stored_token_success_is_single_call() {
        let transport = ScriptedTransport::new(vec![ok(json!([{"name": "fw1"}]))]);
        let (client, _store) = client_with(transport.clone(), Some("tok-1"));

        let data = client.call(Method::Get, "/x", Payload::None).await.unwrap();

        assert_eq!(data, json!([{"name": "fw1"}]));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["session"], "tok-1");
        assert_eq!(sent[0]["method"], "get");
    }

    #[tokio::test]
    async fn test_missing_token_logs_in_first() {
        let transport = ScriptedTransport::new(vec![login_ok("fresh"), ok(json!({"name": "foo"}))]);
        let (client, store) = client_with(transport.clone(), None);

        let data = client.call(Method::Get, "/x", Payload::None).await.unwrap();
        assert_eq!(data, json!({"name": "foo"}));

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["method"], "exec");
        assert_eq!(sent[0]["params"][0]["url"], "/sys/login/user");
        assert_eq!(sent[0]["params"][0]["data"], json!({"user": "admin", "passwd": "secret"}));
        assert!(sent[0].get("session").is_none());
        assert_eq!(sent[1]["params"][0]["url"], "/x");
        assert_eq!(sent[1]["session"], "fresh");
        assert_eq!(store.load(SESSION_KEY).unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_expired_session_relogs_and_retries_once() {
        let transport = ScriptedTransport::new(vec![
            status(-11, "No permission for the resource"),
            login_ok("renewed"),
            ok(json!({"name": "foo"})),
        ]);
        let (client, store) = client_with(transport.clone(), Some("stale"));

        let data = client.call(Method::Get, "/x", Payload::None).await.unwrap();
        assert_eq!(data, json!({"name": "foo"}));

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0]["session"], "stale");
        assert_eq!(sent[1]["params"][0]["url"], "/sys/login/user");
        assert_eq!(sent[2]["session"], "renewed");

        // The retry is the original request with only the token swapped
        let mut original = sent[0].clone();
        original["session"] = json!("renewed");
        assert_eq!(sent[2], original);

        assert_eq!(store.load(SESSION_KEY).unwrap().as_deref(), Some("renewed"));
    }

    #[tokio::test]
    async fn test_other_error_fails_without_login() {
        let transport = ScriptedTransport::new(vec![status(5, "no such object")]);
        let (client, _store) = client_with(transport.clone(), Some("tok"));

        let err = client.call(Method::Get, "/x", Payload::None).await.unwrap_err();

        assert_eq!(err.to_string(), "no such object");
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_second_expiry_is_terminal() {
        let transport = ScriptedTransport::new(vec![
            status(-11, "expired"),
            login_ok("renewed"),
            status(-11, "expired again"),
        ]);
        let (client, _store) = client_with(transport.clone(), Some("stale"));

        let err = client.call(Method::Get, "/x", Payload::None).await.unwrap_err();

        assert_eq!(err.to_string(), "expired again");
        assert!(matches!(err, FmError::Rpc { code: -11, .. }));
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_retry_failure_carries_retry_message() {
        let transport = ScriptedTransport::new(vec![
            status(-11, "expired"),
            login_ok("renewed"),
            status(-3, "object does not exist"),
        ]);
        let (client, _store) = client_with(transport.clone(), Some("stale"));

        let err = client.call(Method::Delete, "/x", Payload::None).await.unwrap_err();
        assert_eq!(err.to_string(), "object does not exist");
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let transport = ScriptedTransport::with_results(vec![Err(FmError::Transport(
            "connection refused".to_string(),
        ))]);
        let (client, _store) = client_with(transport.clone(), Some("tok"));

        let err = client.call(Method::Get, "/x", Payload::None).await.unwrap_err();
        assert!(matches!(err, FmError::Transport(_)));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_get_token_uses_store_without_network() {
        let transport = ScriptedTransport::new(vec![]);
        let (client, _store) = client_with(transport.clone(), Some("cached"));

        assert_eq!(client.get_token(false).await.unwrap(), "cached");
        assert_eq!(client.get_token(false).await.unwrap(), "cached");
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_forced_token_overwrites_store() {
        let transport = ScriptedTransport::new(vec![login_ok("new")]);
        let (client, store) = client_with(transport.clone(), Some("old"));

        assert_eq!(client.get_token(true).await.unwrap(), "new");
        assert_eq!(store.load(SESSION_KEY).unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_login_failure_propagates() {
        let transport = ScriptedTransport::new(vec![status(-22, "Login fail")]);
        let (client, store) = client_with(transport.clone(), None);

        let err = client.call(Method::Get, "/x", Payload::None).await.unwrap_err();

        assert_eq!(err.to_string(), "Login fail");
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(store.load(SESSION_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_without_session_field_fails() {
        let transport = ScriptedTransport::new(vec![ok(Value::Null)]);
        let (client, _store) = client_with(transport, None);

        assert!(client.get_token(true).await.is_err());
    }

    #[test]
    fn test_scope_mapping() {
        assert_eq!(scope_for("global"), "global");
        assert_eq!(scope_for("root"), "adom/root");

        let transport = ScriptedTransport::new(vec![]);
        let (client, _store) = client_with(transport, None);
        assert_eq!(client.scope(None), "adom/root");
        assert_eq!(client.scope(Some("global")), "global");
        assert_eq!(client.scope(Some("branch")), "adom/branch");
    }
}
