mod common;

use axum::http::StatusCode;
use common::{PASSWORD, test_app};
use std::time::Duration;

#[tokio::test]
async fn test_register_success() {
    let app = test_app().await;

    let response = app
        .register("alice", "alice@example.com", PASSWORD, Some("203.0.113.1"))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let json = response.json();
    assert_eq!(json["username"], "alice");
    assert!(json["id"].as_i64().is_some());
}

#[tokio::test]
async fn test_register_stores_salted_hash() {
    let app = test_app().await;

    app.register("alice", "alice@example.com", PASSWORD, Some("203.0.113.1"))
        .await;
    app.register("bob", "bob@example.com", PASSWORD, Some("203.0.113.1"))
        .await;

    let alice = app.db.users().get_by_username("alice").await.unwrap().unwrap();
    let bob = app.db.users().get_by_username("bob").await.unwrap().unwrap();

    assert!(alice.password_hash.starts_with("$argon2id$"));
    assert!(!alice.password_hash.contains(PASSWORD));
    assert_ne!(alice.password_hash, bob.password_hash);
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = test_app().await;

    app.register("alice", "alice@example.com", PASSWORD, Some("203.0.113.1"))
        .await;
    let response = app
        .register("alice", "other@example.com", PASSWORD, Some("203.0.113.1"))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"], "Username already exists");
}

#[tokio::test]
async fn test_register_duplicate_email_ignores_case() {
    let app = test_app().await;

    app.register("alice", "alice@example.com", PASSWORD, Some("203.0.113.1"))
        .await;
    let response = app
        .register("alice2", "Alice@Example.com", PASSWORD, Some("203.0.113.1"))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.json()["error"], "Email already exists");
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = test_app().await;
    let long_name = "a".repeat(33);

    let cases = [
        ("", "empty@example.com", PASSWORD),
        (long_name.as_str(), "long@example.com", PASSWORD),
        ("alice bob", "space@example.com", PASSWORD),
        ("carol", "not-an-email", PASSWORD),
        ("dave", "dave@example.com", ""),
    ];

    for (i, (username, email, password)) in cases.iter().enumerate() {
        let client = format!("198.51.100.{}", i);
        let response = app
            .register(username, email, password, Some(&client))
            .await;
        assert_eq!(
            response.status,
            StatusCode::BAD_REQUEST,
            "case {} should be rejected",
            i
        );
    }
}

#[tokio::test]
async fn test_sixth_registration_is_throttled() {
    let app = test_app().await;

    for i in 0..5 {
        let response = app
            .register(
                &format!("user{}", i),
                &format!("user{}@example.com", i),
                PASSWORD,
                Some("203.0.113.9"),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let response = app
        .register("user5", "user5@example.com", PASSWORD, Some("203.0.113.9"))
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);

    // Nothing was created for the throttled attempt.
    assert!(
        app.db
            .users()
            .get_by_username("user5")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_throttling_precedes_validation() {
    let app = test_app().await;

    for _ in 0..5 {
        let response = app.register("", "", "", Some("203.0.113.9")).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    let response = app.register("", "", "", Some("203.0.113.9")).await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_clients_have_independent_budgets() {
    let app = test_app().await;

    for i in 0..5 {
        app.register(
            &format!("user{}", i),
            &format!("user{}@example.com", i),
            PASSWORD,
            Some("203.0.113.9"),
        )
        .await;
    }

    let response = app
        .register("other", "other@example.com", PASSWORD, Some("203.0.113.10"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_forwarded_chain_keys_on_first_entry() {
    let app = test_app().await;

    for i in 0..5 {
        app.register(
            &format!("user{}", i),
            &format!("user{}@example.com", i),
            PASSWORD,
            Some(&format!("203.0.113.9, 10.0.0.{}", i)),
        )
        .await;
    }

    let response = app
        .register("user5", "user5@example.com", PASSWORD, Some("203.0.113.9"))
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_clients_without_forwarded_header_share_a_bucket() {
    let app = test_app().await;

    for i in 0..5 {
        app.register(
            &format!("user{}", i),
            &format!("user{}@example.com", i),
            PASSWORD,
            None,
        )
        .await;
    }

    let response = app
        .register("user5", "user5@example.com", PASSWORD, None)
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .register("user5", "user5@example.com", PASSWORD, Some("203.0.113.1"))
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_register_and_login_budgets_are_separate() {
    let app = test_app().await;

    for i in 0..5 {
        app.register(
            &format!("user{}", i),
            &format!("user{}@example.com", i),
            PASSWORD,
            Some("203.0.113.9"),
        )
        .await;
    }

    let response = app.login("user0", PASSWORD, Some("203.0.113.9")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_slow_user_store_rejects_registration() {
    let app = common::slow_store_app(Duration::from_millis(50)).await;

    let response = app
        .register("alice", "alice@example.com", PASSWORD, Some("203.0.113.1"))
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json()["error"],
        "Registration could not be completed. Please try again."
    );
}
