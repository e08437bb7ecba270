//! Revocation by session, user, client and token value.

mod common;

use common::Server;
use keygate_auth::AuthError;
use keygate_auth::token::{AccessRevoker, TokenStore};
use keygate_auth::types::{Session, TokenRequest};

#[tokio::test]
async fn test_revoke_session() {
    let server = Server::new();
    server
        .backend
        .sessions
        .insert(Session::new("sess-1", "SESSION", "alice"));

    let redirect = server
        .authorize(&[("client_id", "c1"), ("response_type", "code")], "alice", "sess-1")
        .await
        .unwrap();
    let code = common::query_param(&redirect, "code").unwrap();
    let token = server
        .token(TokenRequest::new("c1", "authorization_code").with_parameter("code", code))
        .await
        .unwrap();
    let other = server.login("bob", &["read"]).await;

    server
        .revoker
        .revoke_with_session_id("sess-1", "SESSION")
        .await
        .unwrap();

    assert!(!server.backend.sessions.contains("sess-1"));
    assert!(server.tokens.read_access_token(&token.value).await.is_err());
    let refresh = token.refresh_token.unwrap();
    assert!(server.tokens.read_refresh_token(&refresh.value).await.is_err());
    assert!(server.tokens.read_access_token(&other.value).await.is_ok());
}

#[tokio::test]
async fn test_revoke_user() {
    let server = Server::new();
    server
        .backend
        .sessions
        .insert(Session::new("sess-a", "SESSION", "alice"));
    let first = server.login("alice", &["read"]).await;
    let second = server.login("alice", &["write"]).await;
    let bob = server.login("bob", &["read"]).await;

    server.revoker.revoke_with_username("alice", false).await.unwrap();

    assert!(!server.backend.sessions.contains("sess-a"));
    assert!(server.tokens.read_access_token(&first.value).await.is_err());
    assert!(server.tokens.read_access_token(&second.value).await.is_err());
    assert!(server.tokens.read_access_token(&bob.value).await.is_ok());
    // refresh tokens survive unless asked for
    let refresh = first.refresh_token.unwrap();
    assert!(server.tokens.read_refresh_token(&refresh.value).await.is_ok());
}

#[tokio::test]
async fn test_revoke_client() {
    let server = Server::new();
    let service = server
        .token(TokenRequest::new("svc", "client_credentials"))
        .await
        .unwrap();
    let alice = server.login("alice", &["read"]).await;

    server.revoker.revoke_with_client_id("svc", true).await.unwrap();

    assert!(server.tokens.read_access_token(&service.value).await.is_err());
    assert!(server.tokens.read_access_token(&alice.value).await.is_ok());
}

#[tokio::test]
async fn test_revoke_token_value() {
    let server = Server::new();
    let token = server.login("alice", &["read"]).await;
    let refresh = token.refresh_token.clone().unwrap();

    server
        .revoker
        .revoke_with_token_value(&token.value, "access_token")
        .await
        .unwrap();
    assert!(server.tokens.read_access_token(&token.value).await.is_err());
    assert!(server.tokens.read_refresh_token(&refresh.value).await.is_ok());

    server
        .revoker
        .revoke_with_token_value(&refresh.value, "refresh_token")
        .await
        .unwrap();
    assert!(server.tokens.read_refresh_token(&refresh.value).await.is_err());

    let result = server.revoker.revoke_with_token_value("x", "id_token").await;
    assert!(matches!(result, Err(AuthError::UnsupportedTokenType { .. })));
}
