use leptos::ev;
use leptos::prelude::*;

use crate::models::{Message, format_timestamp};
use crate::state::{AppState, can_send};

/// Chat window for the selected conversation: live message stream, typing
/// indicator while a send is in flight, and the input row.
#[component]
pub fn ChatWindow() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <main class="chat-window">
            {move || match state.selected_chat.get() {
                None => view! {
                    <div class="empty-chat-state">
                        <h3>"Select a chat or create a new one"</h3>
                        <p>"Start a conversation with the AI chatbot"</p>
                    </div>
                }
                .into_any(),
                Some(_) => view! { <ActiveChat /> }.into_any(),
            }}
        </main>
    }
}

#[component]
fn ActiveChat() -> impl IntoView {
    let state = expect_context::<AppState>();
    let state_error = state.clone();
    let state_typing = state.clone();

    view! {
        <div class="chat-header">"AI Chatbot"</div>

        // Subscription failures are inline diagnostics; reconnection is the
        // transport's concern.
        {move || {
            state_error.messages_error.get().map(|err| {
                view! {
                    <div class="messages-error">
                        <strong>"Message stream error:"</strong>
                        <pre>{err}</pre>
                    </div>
                }
            })
        }}

        <div class="messages-container">
            <For each=move || state.messages.get() key=|m| m.id.clone() let:msg>
                <MessageBubble message=msg />
            </For>

            {move || {
                state_typing.sending.get().then(|| {
                    view! {
                        <div class="message bot-message">
                            <div class="typing-indicator">
                                <span></span>
                                <span></span>
                                <span></span>
                            </div>
                        </div>
                    }
                })
            }}
        </div>

        <ChatInput />
    }
}

/// A single message bubble, tagged by sender-kind.
#[component]
fn MessageBubble(message: Message) -> impl IntoView {
    let css_class = if message.is_bot {
        "message bot-message"
    } else {
        "message user-message"
    };
    let time = format_timestamp(&message.created_at);

    view! {
        <div class=css_class>
            <div class="message-content">
                <p>{message.content.clone()}</p>
                <span class="message-time">{time}</span>
            </div>
        </div>
    }
}

/// Input row. The draft is captured and cleared before dispatch, so the
/// field is ready for new text while the send runs.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (draft, set_draft) = signal(String::new());

    let sending = state.sending;

    let submit = {
        let state = state.clone();
        move || {
            let text = draft.get_untracked();
            let selected = state.selected_chat.get_untracked();
            if !can_send(&text, selected.as_deref(), sending.get_untracked()) {
                return;
            }
            set_draft.set(String::new());
            state.send_message(&text);
        }
    };

    let submit_on_key = submit.clone();
    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            submit_on_key();
        }
    };
    let submit_on_click = submit.clone();

    view! {
        <div class="input-area">
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder="Type your message… (Enter to send, Shift+Enter for newline)"
                    prop:value=draft
                    on:input=move |ev| set_draft.set(event_target_value(&ev))
                    on:keydown=on_keydown
                    disabled=move || sending.get()
                />
                <button
                    class="send-button"
                    on:click=move |_| submit_on_click()
                    disabled=move || sending.get() || draft.get().trim().is_empty()
                >
                    {move || if sending.get() { "Sending…" } else { "Send" }}
                </button>
            </div>
        </div>
    }
}
