//! Data gateway client: GraphQL over HTTP for queries/mutations, with a
//! shared result cache, and GraphQL over WebSocket for subscriptions
//! (see [`ws`]). Every outgoing operation carries headers derived fresh
//! from the current session.

pub mod ops;
pub mod ws;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use gloo_net::http::Request;
use leptos::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config;
use crate::errors::GatewayError;
use crate::session::{AuthEvent, SessionClient};

/// How a query interacts with the shared result cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve a cached result when present, populate the cache otherwise.
    CacheFirst,
    /// Always hit the network; the fresh result replaces the cached one.
    NetworkOnly,
}

/// The single configured client shared by all components.
#[derive(Clone)]
pub struct GatewayClient {
    session: SessionClient,
    cache: Arc<Mutex<QueryCache>>,
}

impl GatewayClient {
    /// Create the client and provide it in the Leptos context.
    pub fn provide(session: SessionClient) -> Self {
        let client = Self { session, cache: Arc::new(Mutex::new(QueryCache::new())) };
        provide_context(client.clone());
        client
    }

    /// Drop every cached result. Called on sign-out so a later sign-in
    /// cannot observe the previous user's data.
    pub fn clear_cache(&self) {
        self.cache_guard().clear();
    }

    /// Execute a query through the result cache.
    pub async fn query<T: DeserializeOwned>(
        &self,
        operation: &str,
        document: &str,
        variables: Value,
        policy: FetchPolicy,
    ) -> Result<T, GatewayError> {
        let key = cache_key(operation, &variables);
        if policy == FetchPolicy::CacheFirst {
            let cached = self.cache_guard().get(&key).cloned();
            if let Some(data) = cached {
                return serde_json::from_value(data)
                    .map_err(|e| GatewayError::Parse(e.to_string()));
            }
        }
        let data = self.execute(document, variables).await?;
        self.cache_guard().insert(key, data.clone());
        serde_json::from_value(data).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Execute a mutation. Never cached.
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        document: &str,
        variables: Value,
    ) -> Result<T, GatewayError> {
        let data = self.execute(document, variables).await?;
        serde_json::from_value(data).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// One GraphQL-over-HTTP round trip, headers attached at send time.
    async fn execute(&self, document: &str, variables: Value) -> Result<Value, GatewayError> {
        let headers = require_session(self.session.auth_headers().await)?;
        let mut request = Request::post(config::GRAPHQL_URL);
        for (name, value) in headers {
            request = request.header(&name, &value);
        }

        let resp = request
            .json(&GraphQlRequest { query: document, variables })
            .map_err(|e| GatewayError::Network(e.to_string()))?
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !resp.ok() {
            return Err(GatewayError::Status(resp.status()));
        }

        let envelope: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        if !envelope.errors.is_empty() {
            let joined = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GatewayError::GraphQl(joined));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::Parse("response carried no data".into()))
    }

    fn cache_guard(&self) -> MutexGuard<'_, QueryCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A session that yields no headers cannot reach the gateway; surfaced as
/// a session error rather than an opaque HTTP 401.
fn require_session(
    headers: Option<Vec<(String, String)>>,
) -> Result<Vec<(String, String)>, GatewayError> {
    headers.ok_or(GatewayError::NoSession)
}

/// Whether an auth event invalidates the shared result cache.
pub fn clears_cache(event: AuthEvent) -> bool {
    matches!(event, AuthEvent::SignedOut)
}

#[derive(serde::Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

/// Cache of raw query results, keyed by operation name + variables.
#[derive(Default)]
pub struct QueryCache {
    entries: HashMap<String, Value>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn cache_key(operation: &str, variables: &Value) -> String {
    format!("{operation}:{variables}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_distinguishes_variables() {
        let a = cache_key("GetChats", &json!({"userId": "u1"}));
        let b = cache_key("GetChats", &json!({"userId": "u2"}));
        assert_ne!(a, b);
        assert!(a.starts_with("GetChats:"));
    }

    #[test]
    fn cache_read_through() {
        let mut cache = QueryCache::new();
        let key = cache_key("GetChats", &json!({"userId": "u1"}));
        assert!(cache.get(&key).is_none());

        cache.insert(key.clone(), json!({"chats": []}));
        assert_eq!(cache.get(&key), Some(&json!({"chats": []})));
    }

    #[test]
    fn missing_headers_become_a_session_error() {
        assert!(matches!(require_session(None), Err(GatewayError::NoSession)));
        let headers = vec![("Authorization".to_string(), "Bearer tok".to_string())];
        assert_eq!(require_session(Some(headers.clone())), Ok(headers));
    }

    #[test]
    fn sign_out_invalidates_cached_results() {
        let mut cache = QueryCache::new();
        let key = cache_key("GetChats", &json!({"userId": "alice"}));
        cache.insert(key.clone(), json!({"chats": [{"id": "c1"}]}));

        assert!(!clears_cache(AuthEvent::SignedIn));
        assert!(clears_cache(AuthEvent::SignedOut));
        cache.clear();

        // The next sign-in starts from a cold cache, whoever it is.
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_every_entry() {
        let mut cache = QueryCache::new();
        cache.insert("a".into(), json!(1));
        cache.insert("b".into(), json!(2));
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }
}
