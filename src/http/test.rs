#[cfg(test)]
mod tests {
    use crate::api::ApiError;
    use crate::http::RateLimitedHttpClient;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> RateLimitedHttpClient {
        RateLimitedHttpClient::new(
            &server.uri(),
            token.map(str::to_string),
            50,
            50,
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_listing_is_cached_until_invalidated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/workspaces/ws1/integrations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let path = "/api/workspaces/ws1/integrations";

        client.get_json(path).await.unwrap();
        client.get_json(path).await.unwrap();

        client.invalidate_cache_pattern("ws1").await;
        client.get_json(path).await.unwrap();
    }

    #[tokio::test]
    async fn test_bearer_token_and_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workspaces/ws1/integrations/jira/delete-issue"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("secret"));
        let value = client
            .post_json("/api/workspaces/ws1/integrations/jira/delete-issue", &json!({}))
            .await
            .unwrap();

        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "exists"})))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client.post_json("/anything", &json!({})).await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Conflict {
                message: "exists".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let client = RateLimitedHttpClient::new(
            "http://127.0.0.1:9",
            None,
            10,
            10,
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client.post_json("/x", &json!({})).await.unwrap_err();
        assert!(err.is_network());
    }
}
