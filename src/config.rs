//! Endpoints of the hosted backend (auth service + Hasura GraphQL gateway).

/// Hasura GraphQL endpoint (queries and mutations over HTTP).
pub const GRAPHQL_URL: &str = "https://chatbot.hasura.eu-central-1.nhost.run/v1/graphql";

/// Base URL of the hosted auth service.
pub const AUTH_URL: &str = "https://chatbot.auth.eu-central-1.nhost.run/v1";

/// WebSocket endpoint for GraphQL subscriptions, derived from the HTTP one.
pub fn graphql_ws_url() -> String {
    GRAPHQL_URL.replacen("http", "ws", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_scheme_only() {
        let url = graphql_ws_url();
        assert!(url.starts_with("wss://"));
        assert!(url.ends_with("/v1/graphql"));
    }
}
