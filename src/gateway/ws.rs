//! Live message subscription over the `graphql-transport-ws` protocol.
//! Connection recovery is left to the transport; this client only opens,
//! initialises, subscribes, and forwards frames.

use std::rc::Rc;

use leptos::task::spawn_local;
use serde_json::{Map, Value, json};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MessageEvent, WebSocket};

use super::ops::MESSAGES_SUBSCRIPTION;
use crate::config;
use crate::errors::GatewayError;
use crate::models::Message;
use crate::session::SessionClient;

const WS_SUBPROTOCOL: &str = "graphql-transport-ws";

/// Handle to one live subscription. Closes the socket on drop, so switching
/// conversations tears the old stream down before the new one is opened.
pub struct MessageSubscription {
    ws: WebSocket,
}

impl MessageSubscription {
    pub fn close(&self) {
        let _ = self.ws.close();
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a WebSocket, initialises it with freshly-derived auth headers, and
/// subscribes to the ordered message stream of one conversation. Each
/// `next` frame delivers the full current snapshot in creation order.
pub fn subscribe_messages(
    session: SessionClient,
    chat_id: String,
    on_messages: impl Fn(Vec<Message>) + 'static,
    on_error: impl Fn(String) + 'static,
) -> Option<MessageSubscription> {
    let url = config::graphql_ws_url();
    let ws = match WebSocket::new_with_str(&url, WS_SUBPROTOCOL) {
        Ok(ws) => ws,
        Err(e) => {
            on_error(format!("Failed to connect: {e:?}"));
            return None;
        }
    };
    ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

    let on_error = Rc::new(on_error);

    // --- onopen: token must be awaited before connection_init ---
    let ws_clone = ws.clone();
    let err = on_error.clone();
    let onopen = Closure::<dyn Fn()>::new(move || {
        let ws = ws_clone.clone();
        let session = session.clone();
        let err = err.clone();
        spawn_local(async move {
            let Some(headers) = session.auth_headers().await else {
                err(GatewayError::NoSession.to_string());
                return;
            };
            if ws.send_with_str(&init_frame(&headers)).is_err() {
                err("Failed to initialise the subscription connection".to_string());
            }
        });
    });
    ws.set_onopen(Some(onopen.as_ref().unchecked_ref()));
    onopen.forget();

    // --- onmessage: dispatch protocol frames ---
    let ws_clone = ws.clone();
    let err = on_error.clone();
    let onmessage = Closure::<dyn Fn(MessageEvent)>::new(move |ev: MessageEvent| {
        let Some(text) = ev.data().as_string() else {
            return;
        };
        match parse_frame(&text) {
            Ok(ServerFrame::Ack) => {
                let _ = ws_clone.send_with_str(&subscribe_frame("1", &chat_id));
            }
            Ok(ServerFrame::Next(messages)) => on_messages(messages),
            Ok(ServerFrame::Error(message)) => err(message),
            Ok(ServerFrame::Ping) => {
                let _ = ws_clone.send_with_str(&pong_frame());
            }
            Ok(ServerFrame::Complete | ServerFrame::Ignored) => {}
            Err(e) => err(format!("Parse error: {e}")),
        }
    });
    ws.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
    onmessage.forget();

    // --- onerror ---
    let err = on_error.clone();
    let onerror = Closure::<dyn Fn()>::new(move || {
        log::error!("Subscription socket error");
        err("Subscription connection error".to_string());
    });
    ws.set_onerror(Some(onerror.as_ref().unchecked_ref()));
    onerror.forget();

    Some(MessageSubscription { ws })
}

// --- Protocol frames ---

pub(crate) enum ServerFrame {
    Ack,
    Next(Vec<Message>),
    Error(String),
    Complete,
    Ping,
    Ignored,
}

pub(crate) fn init_frame(headers: &[(String, String)]) -> String {
    let mut map = Map::new();
    for (name, value) in headers {
        map.insert(name.clone(), Value::String(value.clone()));
    }
    json!({ "type": "connection_init", "payload": { "headers": map } }).to_string()
}

pub(crate) fn subscribe_frame(sub_id: &str, chat_id: &str) -> String {
    json!({
        "id": sub_id,
        "type": "subscribe",
        "payload": {
            "query": MESSAGES_SUBSCRIPTION,
            "variables": { "chatId": chat_id },
        },
    })
    .to_string()
}

pub(crate) fn pong_frame() -> String {
    json!({ "type": "pong" }).to_string()
}

pub(crate) fn parse_frame(text: &str) -> Result<ServerFrame, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    match value["type"].as_str() {
        Some("connection_ack") => Ok(ServerFrame::Ack),
        Some("next") => {
            let messages = value["payload"]["data"]["messages"].clone();
            serde_json::from_value::<Vec<Message>>(messages)
                .map(ServerFrame::Next)
                .map_err(|e| e.to_string())
        }
        Some("error") => {
            let joined = value["payload"]
                .as_array()
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|e| e["message"].as_str())
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "subscription error".to_string());
            Ok(ServerFrame::Error(joined))
        }
        Some("complete") => Ok(ServerFrame::Complete),
        Some("ping") => Ok(ServerFrame::Ping),
        Some(_) => Ok(ServerFrame::Ignored),
        None => Err("frame without a type".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_frame_carries_auth_headers() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer tok".to_string()),
            ("x-hasura-user-id".to_string(), "u1".to_string()),
        ];
        let frame: Value = serde_json::from_str(&init_frame(&headers)).unwrap();
        assert_eq!(frame["type"], "connection_init");
        assert_eq!(frame["payload"]["headers"]["Authorization"], "Bearer tok");
        assert_eq!(frame["payload"]["headers"]["x-hasura-user-id"], "u1");
    }

    #[test]
    fn subscribe_frame_targets_one_conversation() {
        let frame: Value = serde_json::from_str(&subscribe_frame("1", "c42")).unwrap();
        assert_eq!(frame["id"], "1");
        assert_eq!(frame["type"], "subscribe");
        assert_eq!(frame["payload"]["variables"]["chatId"], "c42");
        let query = frame["payload"]["query"].as_str().unwrap();
        assert!(query.contains("subscription MessagesSubscription"));
        assert!(query.contains("order_by: {created_at: asc}"));
    }

    #[test]
    fn parse_next_frame_yields_ordered_messages() {
        let text = r#"{
            "id": "1",
            "type": "next",
            "payload": {"data": {"messages": [
                {"id": "m1", "content": "hi", "is_bot": false, "created_at": "2025-08-28T09:00:00Z"},
                {"id": "m2", "content": "hello", "is_bot": true, "created_at": "2025-08-28T09:00:01Z"}
            ]}}
        }"#;
        match parse_frame(text) {
            Ok(ServerFrame::Next(messages)) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].id, "m1");
                assert!(messages[1].is_bot);
            }
            _ => panic!("expected a next frame"),
        }
    }

    #[test]
    fn parse_error_frame_joins_messages() {
        let text = r#"{"id":"1","type":"error","payload":[{"message":"denied"},{"message":"bad"}]}"#;
        match parse_frame(text) {
            Ok(ServerFrame::Error(message)) => assert_eq!(message, "denied; bad"),
            _ => panic!("expected an error frame"),
        }
    }

    #[test]
    fn parse_control_frames() {
        assert!(matches!(parse_frame(r#"{"type":"connection_ack"}"#), Ok(ServerFrame::Ack)));
        assert!(matches!(parse_frame(r#"{"type":"ping"}"#), Ok(ServerFrame::Ping)));
        assert!(matches!(parse_frame(r#"{"type":"complete","id":"1"}"#), Ok(ServerFrame::Complete)));
        assert!(matches!(parse_frame(r#"{"type":"ka"}"#), Ok(ServerFrame::Ignored)));
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"payload":{}}"#).is_err());
    }
}
