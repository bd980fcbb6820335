use health_sync_client::auth_code::StaticAuthorizationCodeProvider;
use health_sync_client::config::ClientConfig;
use health_sync_client::fitbit::{DEFAULT_EXPIRES_IN, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, FitbitClient};
use health_sync_client::{Credential, HealthSyncError, TokenedApi};
use secrecy::ExposeSecret;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// base64("client:secret")
const BASIC: &str = "Basic Y2xpZW50OnNlY3JldA==";

fn client_for(server: &MockServer) -> FitbitClient {
    FitbitClient::new(
        &ClientConfig::with_base_url(&server.uri()),
        Credential::new("client", "secret", "old-access", "old-refresh"),
    )
    .expect("client")
}

#[tokio::test]
async fn refresh_uses_basic_auth_and_rotates_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", BASIC))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 28800,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let credential = client.refresh_access_token().await.expect("refresh");
    assert_eq!(credential.access_token.expose_secret(), "new-access");
    assert_eq!(credential.refresh_token.expose_secret(), "new-refresh");
    assert_eq!(client.credential(), &credential);
}

#[tokio::test]
async fn refresh_keeps_refresh_token_when_not_rotated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "new-access"})),
        )
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let credential = client.refresh_access_token().await.expect("refresh");
    assert_eq!(credential.access_token.expose_secret(), "new-access");
    assert_eq!(credential.refresh_token.expose_secret(), "old-refresh");
}

#[tokio::test]
async fn rejected_refresh_is_auth_error_and_leaves_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "errors": [{"errorType": "invalid_token"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let before = client.credential().clone();
    let err = client.refresh_access_token().await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(client.credential(), &before);
}

#[tokio::test]
async fn invalid_grant_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": [{"errorType": "invalid_grant", "message": "Refresh token invalid"}]
        })))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    assert!(client.refresh_access_token().await.unwrap_err().is_auth());
}

#[tokio::test]
async fn authorization_code_flow_stores_token_pair() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", BASIC))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=pasted-code"))
        .and(body_string_contains("clientId=client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "first-access",
            "refresh_token": "first-refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let provider = StaticAuthorizationCodeProvider::new("pasted-code#_=_");
    let api = client.api_mut();
    api.fetch_authorization_code(DEFAULT_SCOPES, DEFAULT_REDIRECT_URI, DEFAULT_EXPIRES_IN, &provider)
        .await
        .expect("code");
    let credential = api
        .exchange_authorization_code(DEFAULT_REDIRECT_URI)
        .await
        .expect("exchange");
    assert_eq!(credential.authorization_code.expose_secret(), "pasted-code");
    assert_eq!(credential.access_token.expose_secret(), "first-access");
    assert_eq!(credential.refresh_token.expose_secret(), "first-refresh");
}

#[tokio::test]
async fn exchange_without_code_is_validation_error() {
    let server = MockServer::start().await;
    let mut client = client_for(&server);
    let err = client
        .api_mut()
        .exchange_authorization_code(DEFAULT_REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(matches!(err, HealthSyncError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
