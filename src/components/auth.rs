use leptos::ev;
use leptos::prelude::*;

use crate::session::{AuthStatus, SessionClient};

/// Gates the app on session status: loading placeholder while the session
/// resolves, the auth form when signed out, children otherwise.
#[component]
pub fn AuthGuard(children: ChildrenFn) -> impl IntoView {
    let session = expect_context::<SessionClient>();

    view! {
        {move || match session.status.get() {
            AuthStatus::Loading => view! {
                <div class="loading-container">
                    <div class="loading-spinner"></div>
                    <p>"Loading..."</p>
                </div>
            }
            .into_any(),
            AuthStatus::Unauthenticated => view! { <AuthForm /> }.into_any(),
            AuthStatus::Authenticated => children(),
        }}
    }
}

/// Email/password form covering both sign-in and sign-up. Toggling modes
/// keeps the entered email and password; the name fields only exist in
/// sign-up mode.
#[component]
pub fn AuthForm() -> impl IntoView {
    let session = expect_context::<SessionClient>();

    let (is_signup, set_is_signup) = signal(false);
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (first_name, set_first_name) = signal(String::new());
    let (last_name, set_last_name) = signal(String::new());

    let busy = session.auth_busy;
    let error = session.auth_error;

    let on_submit = {
        let session = session.clone();
        move |ev: ev::SubmitEvent| {
            ev.prevent_default();
            if is_signup.get_untracked() {
                session.sign_up(
                    email.get_untracked(),
                    password.get_untracked(),
                    first_name.get_untracked(),
                    last_name.get_untracked(),
                );
            } else {
                session.sign_in(email.get_untracked(), password.get_untracked());
            }
        }
    };

    view! {
        <div class="auth-container">
            <div class="auth-card">
                <div class="auth-header">
                    <h1>"🤖 Chatbot App"</h1>
                    <p>
                        {move || {
                            if is_signup.get() { "Create your account" } else { "Sign in to continue" }
                        }}
                    </p>
                </div>

                <form class="auth-form" on:submit=on_submit>
                    {move || {
                        is_signup.get().then(|| {
                            view! {
                                <input
                                    type="text"
                                    class="auth-input"
                                    placeholder="First Name"
                                    required
                                    prop:value=first_name
                                    on:input=move |ev| set_first_name.set(event_target_value(&ev))
                                />
                                <input
                                    type="text"
                                    class="auth-input"
                                    placeholder="Last Name"
                                    required
                                    prop:value=last_name
                                    on:input=move |ev| set_last_name.set(event_target_value(&ev))
                                />
                            }
                        })
                    }}

                    <input
                        type="email"
                        class="auth-input"
                        placeholder="Email"
                        required
                        prop:value=email
                        on:input=move |ev| set_email.set(event_target_value(&ev))
                    />

                    <input
                        type="password"
                        class="auth-input"
                        placeholder="Password"
                        required
                        minlength="6"
                        prop:value=password
                        on:input=move |ev| set_password.set(event_target_value(&ev))
                    />

                    {move || {
                        error.get().map(|err| {
                            view! { <div class="error-message">{err}</div> }
                        })
                    }}

                    <button type="submit" class="auth-button" disabled=move || busy.get()>
                        {move || {
                            if busy.get() {
                                "Loading..."
                            } else if is_signup.get() {
                                "Sign Up"
                            } else {
                                "Sign In"
                            }
                        }}
                    </button>
                </form>

                <div class="auth-switch">
                    <p>
                        {move || {
                            if is_signup.get() {
                                "Already have an account?"
                            } else {
                                "Don't have an account?"
                            }
                        }}
                        <button
                            type="button"
                            class="switch-button"
                            on:click=move |_| set_is_signup.update(|v| *v = !*v)
                        >
                            {move || if is_signup.get() { "Sign In" } else { "Sign Up" }}
                        </button>
                    </p>
                </div>
            </div>
        </div>
    }
}
