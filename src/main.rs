mod components;
mod config;
mod errors;
mod gateway;
mod models;
mod send;
mod session;
mod state;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::auth::AuthGuard;
use components::chat::ChatWindow;
use components::sidebar::ChatList;
use gateway::{FetchPolicy, GatewayClient};
use session::SessionClient;
use state::AppState;

/// Root application component: session provider, gateway client, and the
/// auth gate around the chat shell.
#[component]
fn App() -> impl IntoView {
    let session = SessionClient::provide();
    let gateway = GatewayClient::provide(session.clone());

    // A fresh sign-in must never observe the previous user's cached results.
    {
        let gateway = gateway.clone();
        session.on_auth_event(move |event| {
            if gateway::clears_cache(event) {
                gateway.clear_cache();
            }
        });
    }

    view! {
        <div class="app-container">
            <AuthGuard>
                <ChatApp />
            </AuthGuard>
        </div>
    }
}

/// Authenticated shell: header plus the chat list / chat window pair.
#[component]
fn ChatApp() -> impl IntoView {
    let session = expect_context::<SessionClient>();
    let gateway = expect_context::<GatewayClient>();
    let state = AppState::provide(session.clone(), gateway);

    // Fetch the list as soon as an identity is resolvable; the load itself
    // skips silently while the user id is still unknown.
    {
        let state = state.clone();
        Effect::new(move |_| {
            let _ = state.session().user_id.get();
            let _ = state.session().user.get();
            state.load_conversations(FetchPolicy::CacheFirst);
        });
    }

    let user_label = {
        let session = session.clone();
        move || session.user.get().map(|u| u.label()).unwrap_or_default()
    };
    let on_sign_out = {
        let session = session.clone();
        move |_| session.sign_out()
    };

    view! {
        <div class="chat-app">
            <div class="app-header">
                <h1>"Chatbot App"</h1>
                <div class="header-right">
                    <span>{move || format!("Welcome, {}", user_label())}</span>
                    <button class="logout-button" on:click=on_sign_out>
                        "Sign Out"
                    </button>
                </div>
            </div>
            <div class="chat-container">
                <ChatList />
                <ChatWindow />
            </div>
        </div>
    }
}

fn main() {
    console_log::init_with_level(log::Level::Debug).expect("Failed to init logger");
    mount_to_body(App);
}
