//! Request correlation and notification fan-out for one server connection

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{BridgeError, Result};
use crate::protocol::{
    JsonRpcHandler, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId,
    ServerNotification, METHOD_NOT_FOUND,
};

type ResponseSender = oneshot::Sender<Result<Value>>;

/// Tracks in-flight requests to the server and relays what it pushes back.
///
/// Outgoing bodies are queued on an unbounded channel drained by the writer
/// task that owns the server's stdin.
pub struct LspConnection {
    handler: JsonRpcHandler,
    pending: Mutex<HashMap<u64, ResponseSender>>,
    outgoing: mpsc::UnboundedSender<String>,
    notification_tx: broadcast::Sender<ServerNotification>,
    closed: Mutex<Option<String>>,
}

impl LspConnection {
    pub fn new(outgoing: mpsc::UnboundedSender<String>) -> Self {
        let (notification_tx, _) = broadcast::channel(256);
        Self {
            handler: JsonRpcHandler::new(),
            pending: Mutex::new(HashMap::new()),
            outgoing,
            notification_tx,
            closed: Mutex::new(None),
        }
    }

    /// Send a request and wait for its response
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if let Some(reason) = self.closed.lock().clone() {
            return Err(BridgeError::ConnectionClosed(reason));
        }

        let request = self.handler.create_request(method, params);
        let id = match request.id {
            RequestId::Number(id) => id,
            RequestId::String(_) => return Err(BridgeError::protocol("Unexpected string id")),
        };
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        trace!(id, method = %method, "Sending request");
        if let Err(e) = self.send(&JsonRpcMessage::Request(request)) {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        rx.await
            .map_err(|_| BridgeError::ConnectionClosed("response channel dropped".to_string()))?
    }

    /// Send a notification
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = self.handler.create_notification(method, params);
        self.send(&JsonRpcMessage::Notification(notification))
    }

    /// Route one incoming message body
    pub fn handle_incoming(&self, body: &str) -> Result<()> {
        match JsonRpcMessage::parse(body)? {
            JsonRpcMessage::Response(response) => self.handle_response(response),
            JsonRpcMessage::Notification(notification) => {
                trace!(method = %notification.method, "Server notification");
                // no subscribers is fine
                let _ = self.notification_tx.send(notification.into());
                Ok(())
            }
            JsonRpcMessage::Request(request) => self.answer_server_request(request),
        }
    }

    fn handle_response(&self, response: JsonRpcResponse) -> Result<()> {
        let id = match response.id {
            Some(RequestId::Number(id)) => id,
            other => {
                return Err(BridgeError::protocol(format!(
                    "Response for unknown request id {:?}",
                    other
                )))
            }
        };

        let sender = self.pending.lock().remove(&id).ok_or_else(|| {
            BridgeError::protocol(format!("Response for unknown request id {}", id))
        })?;

        let result = match response.error {
            Some(error) => Err(BridgeError::Server {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        // the requester may have given up
        let _ = sender.send(result);
        Ok(())
    }

    /// The client keeps no settings or registrations of its own, so server
    /// requests get neutral answers.
    fn answer_server_request(&self, request: JsonRpcRequest) -> Result<()> {
        debug!(method = %request.method, "Answering server request");
        let response = match request.method.as_str() {
            "workspace/configuration" => {
                let count = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("items"))
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                JsonRpcHandler::create_response(request.id, json!(vec![Value::Null; count]))
            }
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create"
            | "window/showMessageRequest"
            | "workspace/applyEdit" => JsonRpcHandler::create_response(request.id, Value::Null),
            other => JsonRpcHandler::create_error_response(
                request.id,
                METHOD_NOT_FOUND,
                format!("Unhandled method {}", other),
            ),
        };
        self.send(&JsonRpcMessage::Response(response))
    }

    fn send(&self, message: &JsonRpcMessage) -> Result<()> {
        let body = serde_json::to_string(message)?;
        self.outgoing
            .send(body)
            .map_err(|_| BridgeError::ConnectionClosed("writer task stopped".to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerNotification> {
        self.notification_tx.subscribe()
    }

    /// Fail every waiting request; later requests fail immediately
    pub fn close(&self, reason: &str) {
        *self.closed.lock() = Some(reason.to_string());
        let pending: Vec<(u64, ResponseSender)> = self.pending.lock().drain().collect();
        if !pending.is_empty() {
            warn!(count = pending.len(), reason = %reason, "Failing pending requests");
        }
        for (_, sender) in pending {
            let _ = sender.send(Err(BridgeError::ConnectionClosed(reason.to_string())));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
