use async_trait::async_trait;
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsValue;

use crate::errors::GatewayError;
use crate::gateway::ws::{self, MessageSubscription};
use crate::gateway::{FetchPolicy, GatewayClient};
use crate::models::{Conversation, CreatedChat, Message};
use crate::send::{self, SendOutcome};
use crate::session::SessionClient;

/// Shared application state, provided via Leptos context once the user is
/// authenticated.
#[derive(Clone)]
pub struct AppState {
    session: SessionClient,
    gateway: GatewayClient,

    // --- Read signals (for components to subscribe to) ---
    /// `None` until the first successful fetch; `Some(vec![])` means the
    /// user has no conversations (distinct from "still loading").
    pub conversations: ReadSignal<Option<Vec<Conversation>>>,
    pub list_loading: ReadSignal<bool>,
    pub list_error: ReadSignal<Option<String>>,
    pub selected_chat: ReadSignal<Option<String>>,
    pub messages: ReadSignal<Vec<Message>>,
    pub messages_error: ReadSignal<Option<String>>,
    pub sending: ReadSignal<bool>,

    // --- Write signals ---
    set_conversations: WriteSignal<Option<Vec<Conversation>>>,
    set_list_loading: WriteSignal<bool>,
    set_list_error: WriteSignal<Option<String>>,
    set_selected_chat: WriteSignal<Option<String>>,
    set_messages: WriteSignal<Vec<Message>>,
    set_messages_error: WriteSignal<Option<String>>,
    set_sending: WriteSignal<bool>,

    /// Live subscription for the selected conversation; not a signal, the
    /// socket handle is main-thread only.
    subscription: StoredValue<Option<MessageSubscription>, LocalStorage>,
}

impl AppState {
    /// Create a new `AppState` and provide it in the current Leptos context.
    pub fn provide(session: SessionClient, gateway: GatewayClient) -> Self {
        let (conversations, set_conversations) = signal(None::<Vec<Conversation>>);
        let (list_loading, set_list_loading) = signal(false);
        let (list_error, set_list_error) = signal(None::<String>);
        let (selected_chat, set_selected_chat) = signal(None::<String>);
        let (messages, set_messages) = signal(Vec::<Message>::new());
        let (messages_error, set_messages_error) = signal(None::<String>);
        let (sending, set_sending) = signal(false);

        let state = Self {
            session,
            gateway,
            conversations,
            list_loading,
            list_error,
            selected_chat,
            messages,
            messages_error,
            sending,
            set_conversations,
            set_list_loading,
            set_list_error,
            set_selected_chat,
            set_messages,
            set_messages_error,
            set_sending,
            subscription: StoredValue::new_local(None),
        };

        provide_context(state.clone());
        state
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    /// Fetch the conversation list. Skipped entirely while no user id is
    /// resolvable; the backend scopes results to the owning user.
    pub fn load_conversations(&self, policy: FetchPolicy) {
        let Some(user_id) = self.session.user_id_now() else {
            return;
        };
        let state = self.clone();
        self.set_list_loading.set(true);
        self.set_list_error.set(None);
        spawn_local(async move {
            match state.gateway.fetch_conversations(&user_id, policy).await {
                Ok(chats) => state.set_conversations.set(Some(chats)),
                Err(e) => {
                    log::error!("Failed to fetch conversations: {e}");
                    state.set_list_error.set(Some(e.to_string()));
                }
            }
            state.set_list_loading.set(false);
        });
    }

    /// Create a conversation titled with the current date/time, select it,
    /// and refresh the list.
    pub fn create_chat(&self) {
        let title = default_chat_title();
        let user_id = self.session.user_id_now();
        let state = self.clone();
        spawn_local(async move {
            match run_create(&state.gateway, &title, user_id).await {
                CreateOutcome::Selected(id) => {
                    state.select_chat(Some(id));
                    state.load_conversations(FetchPolicy::NetworkOnly);
                }
                CreateOutcome::Rejected(notice) => notify(&notice),
            }
        });
    }

    /// Delete a conversation, clearing the selection when it was the one
    /// being shown, and refresh the list.
    pub fn delete_chat(&self, chat_id: String) {
        let state = self.clone();
        spawn_local(async move {
            let selected = state.selected_chat.get_untracked();
            match run_delete(&state.gateway, &chat_id, selected.as_deref()).await {
                DeleteOutcome::Removed { clear_selection } => {
                    if clear_selection {
                        state.select_chat(None);
                    }
                    state.load_conversations(FetchPolicy::NetworkOnly);
                }
                DeleteOutcome::Rejected(notice) => notify(&notice),
            }
        });
    }

    /// Switch the active conversation. The previous subscription is torn
    /// down before the new one is established.
    pub fn select_chat(&self, chat_id: Option<String>) {
        self.subscription.update_value(|sub| *sub = None);
        self.set_messages.set(Vec::new());
        self.set_messages_error.set(None);
        self.set_selected_chat.set(chat_id.clone());

        let Some(id) = chat_id else {
            return;
        };
        let set_messages = self.set_messages;
        let set_messages_error = self.set_messages_error;
        let handle = ws::subscribe_messages(
            self.session.clone(),
            id,
            move |messages| set_messages.set(messages),
            move |err| {
                log::error!("Subscription error: {err}");
                set_messages_error.set(Some(err));
            },
        );
        self.subscription.set_value(handle);
    }

    /// Dispatch one send. The guard rejects empty drafts, a missing
    /// selection, and concurrent submits; `sending` flips before the first
    /// await and is cleared unconditionally when the flow finishes.
    pub fn send_message(&self, draft: &str) {
        let selected = self.selected_chat.get_untracked();
        if !can_send(draft, selected.as_deref(), self.sending.get_untracked()) {
            return;
        }
        let Some(chat_id) = selected else {
            return;
        };
        let text = draft.trim().to_string();
        let gateway = self.gateway.clone();
        let set_sending = self.set_sending;
        set_sending.set(true);
        spawn_local(async move {
            let report = send::run_send(&gateway, &chat_id, &text).await;
            log::debug!("Send flow phases: {:?}", report.phases);
            match report.outcome {
                SendOutcome::Delivered => {}
                // The apology fallback is the user-visible signal here.
                SendOutcome::Degraded { reason } => {
                    log::warn!("Response generation failed: {reason}");
                }
                SendOutcome::InsertFailed { error } => {
                    notify(&format!("Error sending message: {error}"));
                }
            }
            set_sending.set(false);
        });
    }
}

/// Whether a submit may start: non-empty draft, a selected conversation,
/// and no send currently in flight.
pub fn can_send(draft: &str, selected_chat: Option<&str>, sending: bool) -> bool {
    !draft.trim().is_empty() && selected_chat.is_some() && !sending
}

/// Backend operations the conversation-list flows depend on.
#[async_trait(?Send)]
pub trait ListOps {
    async fn create_conversation(
        &self,
        title: &str,
        user_id: &str,
    ) -> Result<CreatedChat, GatewayError>;

    /// Returns the id of the deleted row.
    async fn delete_conversation(&self, chat_id: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The new conversation's id; callers select it and refetch the list.
    Selected(String),
    Rejected(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed {
        /// True when the deleted conversation was the one being shown.
        clear_selection: bool,
    },
    Rejected(String),
}

/// Create flow: rejected client-side when no user id is resolvable, the
/// backend is never contacted in that case.
pub async fn run_create<O: ListOps + ?Sized>(
    ops: &O,
    title: &str,
    user_id: Option<String>,
) -> CreateOutcome {
    let Some(user_id) = user_id else {
        return CreateOutcome::Rejected("Cannot create chat: user id is missing".to_string());
    };
    match ops.create_conversation(title, &user_id).await {
        Ok(created) => CreateOutcome::Selected(created.id),
        Err(e) => CreateOutcome::Rejected(format!("Error creating chat: {e}")),
    }
}

/// Delete flow: the selection is cleared only when it pointed at the
/// deleted conversation.
pub async fn run_delete<O: ListOps + ?Sized>(
    ops: &O,
    chat_id: &str,
    selected: Option<&str>,
) -> DeleteOutcome {
    match ops.delete_conversation(chat_id).await {
        Ok(deleted) => DeleteOutcome::Removed { clear_selection: selected == Some(deleted.as_str()) },
        Err(e) => DeleteOutcome::Rejected(format!("Error deleting chat: {e}")),
    }
}

fn default_chat_title() -> String {
    let now = js_sys::Date::new_0().to_locale_string("en-US", &JsValue::UNDEFINED);
    format!("Chat {}", String::from(now))
}

/// Blocking notification for abandoned mutations.
fn notify(message: &str) {
    log::error!("{message}");
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::RefCell;

    #[test]
    fn send_requires_draft_and_selection() {
        assert!(can_send("Hello", Some("c1"), false));
        assert!(!can_send("", Some("c1"), false));
        assert!(!can_send("   ", Some("c1"), false));
        assert!(!can_send("Hello", None, false));
    }

    #[test]
    fn send_rejected_while_one_is_in_flight() {
        assert!(!can_send("Hello", Some("c1"), true));
    }

    #[derive(Default)]
    struct MockListOps {
        fail_create: bool,
        fail_delete: bool,
        calls: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl ListOps for MockListOps {
        async fn create_conversation(
            &self,
            title: &str,
            user_id: &str,
        ) -> Result<CreatedChat, GatewayError> {
            self.calls.borrow_mut().push(format!("create:{title}:{user_id}"));
            if self.fail_create {
                return Err(GatewayError::Status(500));
            }
            Ok(CreatedChat {
                id: "new-chat".to_string(),
                title: title.to_string(),
                created_at: "2025-08-28T09:00:00Z".to_string(),
            })
        }

        async fn delete_conversation(&self, chat_id: &str) -> Result<String, GatewayError> {
            self.calls.borrow_mut().push(format!("delete:{chat_id}"));
            if self.fail_delete {
                return Err(GatewayError::GraphQl("permission denied".to_string()));
            }
            Ok(chat_id.to_string())
        }
    }

    #[test]
    fn created_chat_becomes_the_selection() {
        let ops = MockListOps::default();
        let outcome = block_on(run_create(&ops, "Chat 8/28", Some("u1".to_string())));
        assert_eq!(outcome, CreateOutcome::Selected("new-chat".to_string()));
        assert_eq!(ops.calls.borrow().as_slice(), ["create:Chat 8/28:u1"]);
    }

    #[test]
    fn create_without_user_id_never_hits_network() {
        let ops = MockListOps::default();
        let outcome = block_on(run_create(&ops, "Chat 8/28", None));
        assert_eq!(
            outcome,
            CreateOutcome::Rejected("Cannot create chat: user id is missing".to_string())
        );
        assert!(ops.calls.borrow().is_empty());
    }

    #[test]
    fn create_failure_is_reported() {
        let ops = MockListOps { fail_create: true, ..Default::default() };
        let outcome = block_on(run_create(&ops, "Chat 8/28", Some("u1".to_string())));
        match outcome {
            CreateOutcome::Rejected(notice) => {
                assert!(notice.starts_with("Error creating chat:"));
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn deleting_selected_chat_clears_selection() {
        let ops = MockListOps::default();
        let outcome = block_on(run_delete(&ops, "c1", Some("c1")));
        assert_eq!(outcome, DeleteOutcome::Removed { clear_selection: true });
    }

    #[test]
    fn deleting_other_chat_keeps_selection() {
        let ops = MockListOps::default();
        assert_eq!(
            block_on(run_delete(&ops, "c2", Some("c1"))),
            DeleteOutcome::Removed { clear_selection: false }
        );
        assert_eq!(
            block_on(run_delete(&ops, "c2", None)),
            DeleteOutcome::Removed { clear_selection: false }
        );
    }

    #[test]
    fn delete_failure_is_reported() {
        let ops = MockListOps { fail_delete: true, ..Default::default() };
        let outcome = block_on(run_delete(&ops, "c1", Some("c1")));
        match outcome {
            DeleteOutcome::Rejected(notice) => {
                assert!(notice.contains("permission denied"));
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }
}
