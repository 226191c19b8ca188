use leptos::prelude::*;

use crate::models::{preview_text, sender_prefix};
use crate::session::resolve_user_id;
use crate::state::AppState;

/// Sidebar with the conversation list: create, select, and delete chats,
/// with the latest-message preview per item.
#[component]
pub fn ChatList() -> impl IntoView {
    let state = expect_context::<AppState>();
    let session = state.session().clone();

    let user_ready = {
        let session = session.clone();
        move || resolve_user_id(session.user_id.get(), session.user.get().as_ref()).is_some()
    };
    let user_ready_label = user_ready.clone();
    let user_ready_pending = user_ready.clone();

    let on_new = {
        let state = state.clone();
        move |_| state.create_chat()
    };

    let state_loading = state.clone();
    let state_error = state.clone();
    let state_each = state.clone();
    let state_items = state.clone();
    let state_empty = state.clone();

    view! {
        <aside class="chat-list">
            <div class="chat-list-header">
                <h2>"Chats"</h2>
                <button
                    class="new-chat-button"
                    disabled=move || !user_ready()
                    on:click=on_new
                >
                    {move || if user_ready_label() { "+ New Chat" } else { "Loading..." }}
                </button>
            </div>

            {move || {
                (!user_ready_pending()).then(|| {
                    view! { <div class="list-placeholder">"Loading user data..."</div> }
                })
            }}

            {move || {
                state_loading.list_loading.get().then(|| {
                    view! { <div class="list-placeholder">"Loading chats..."</div> }
                })
            }}

            // Raw diagnostic detail, shown inline; the list stays interactive.
            {move || {
                state_error.list_error.get().map(|err| {
                    view! {
                        <div class="list-error">
                            <strong>"Could not load chats:"</strong>
                            <pre>{err}</pre>
                        </div>
                    }
                })
            }}

            <div class="conversation-list">
                <For
                    each=move || state_each.conversations.get().unwrap_or_default()
                    key=|c| c.id.clone()
                    let:conv
                >
                    {
                        let state = state_items.clone();
                        let state_select = state.clone();
                        let state_delete = state.clone();
                        let id_active = conv.id.clone();
                        let id_select = conv.id.clone();
                        let id_delete = conv.id.clone();
                        let preview = conv.latest_message().map(|m| {
                            format!("{}{}", sender_prefix(m.is_bot), preview_text(&m.content))
                        });
                        view! {
                            <div
                                class="chat-item"
                                class:selected=move || {
                                    state.selected_chat.get().as_deref() == Some(id_active.as_str())
                                }
                                on:click=move |_| {
                                    state_select.select_chat(Some(id_select.clone()));
                                }
                            >
                                <div class="chat-item-header">
                                    <span class="chat-title">{conv.title.clone()}</span>
                                    <button
                                        class="delete-chat-button"
                                        on:click=move |ev| {
                                            ev.stop_propagation();
                                            state_delete.delete_chat(id_delete.clone());
                                        }
                                    >
                                        "🗑"
                                    </button>
                                </div>
                                {preview.map(|p| view! { <p class="chat-preview">{p}</p> })}
                            </div>
                        }
                    }
                </For>

                {move || {
                    matches!(state_empty.conversations.get(), Some(ref chats) if chats.is_empty())
                        .then(|| {
                            view! {
                                <div class="empty-state">
                                    <p>"No chats yet"</p>
                                    <p>"Create a new chat to get started"</p>
                                </div>
                            }
                        })
                }}
            </div>
        </aside>
    }
}
