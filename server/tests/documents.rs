mod common;

use common::spawn_server;
use notelite_api::{DocumentView, ErrorBody, MessageResponse, UserInfo};
use serde_json::json;

#[tokio::test]
async fn login_and_identity() {
    let srv = spawn_server().await;
    let user = srv.add_user("Alice@Example.com", "Alice", "password123");

    // email lookup ignores case
    let token = srv.login("alice@example.com", "password123").await;
    let resp = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let me: UserInfo = resp.json().await.unwrap();
    assert_eq!(me.id, user.id);

    let resp = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "alice@example.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let err: ErrorBody = resp.json().await.unwrap();
    assert_eq!(err.error, "Invalid credentials");

    let resp = srv
        .client
        .post(srv.url("/auth/refresh"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    srv.stop();
}

#[tokio::test]
async fn anonymous_requests_are_rejected() {
    let srv = spawn_server().await;
    for (method, path) in [
        (reqwest::Method::GET, "/documents"),
        (reqwest::Method::POST, "/documents"),
        (reqwest::Method::GET, "/documents/any"),
        (reqwest::Method::PUT, "/documents/any"),
        (reqwest::Method::DELETE, "/documents/any"),
        (reqwest::Method::POST, "/images/upload"),
    ] {
        let resp = srv
            .client
            .request(method.clone(), srv.url(path))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401, "{method} {path}");
        let err: ErrorBody = resp.json().await.unwrap();
        assert_eq!(err.error, "Unauthorized");
    }
    srv.stop();
}

#[tokio::test]
async fn private_document_shared_by_going_public() {
    let srv = spawn_server().await;
    let (alice, alice_token) = srv.user_token("alice@example.com", "Alice").await;
    let (bob, bob_token) = srv.user_token("bob@example.com", "Bob").await;

    let doc = srv
        .create_doc(&alice_token, json!({ "title": "Notes", "content": "x" }))
        .await;
    assert!(!doc.is_public);
    assert_eq!(doc.created_by_id, alice.id);
    assert_eq!(doc.last_edited_by, Some(alice.user_ref()));
    assert_eq!(doc.last_edited_by_id.as_deref(), Some(alice.id.as_str()));

    let path = srv.url(&format!("/documents/{}", doc.id));
    let resp = srv.client.get(&path).bearer_auth(&bob_token).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let err: ErrorBody = resp.json().await.unwrap();
    assert_eq!(err.error, "Forbidden");

    let listed: Vec<DocumentView> = srv
        .client
        .get(srv.url("/documents"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.iter().all(|d| d.id != doc.id));

    let resp = srv
        .client
        .put(&path)
        .bearer_auth(&alice_token)
        .json(&json!({ "isPublic": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let shared: DocumentView = resp.json().await.unwrap();
    assert!(shared.is_public);

    let resp = srv
        .client
        .put(&path)
        .bearer_auth(&bob_token)
        .json(&json!({ "content": "y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let edited: DocumentView = resp.json().await.unwrap();
    assert_eq!(edited.content, "y");
    assert_eq!(edited.last_edited_by_id.as_deref(), Some(bob.id.as_str()));
    assert_eq!(edited.last_edited_by.unwrap().email, "bob@example.com");
    assert_eq!(edited.created_by_id, alice.id);

    srv.stop();
}

#[tokio::test]
async fn non_owner_cannot_change_visibility() {
    let srv = spawn_server().await;
    let (_alice, alice_token) = srv.user_token("alice@example.com", "Alice").await;
    let (_bob, bob_token) = srv.user_token("bob@example.com", "Bob").await;

    let doc = srv
        .create_doc(&alice_token, json!({ "title": "Open", "isPublic": true }))
        .await;
    let resp = srv
        .client
        .put(srv.url(&format!("/documents/{}", doc.id)))
        .bearer_auth(&bob_token)
        .json(&json!({ "title": "Renamed", "isPublic": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: DocumentView = resp.json().await.unwrap();
    assert_eq!(updated.title, "Renamed");
    assert!(updated.is_public);

    srv.stop();
}

#[tokio::test]
async fn empty_update_still_stamps_the_editor() {
    let srv = spawn_server().await;
    let (alice, token) = srv.user_token("alice@example.com", "Alice").await;
    let doc = srv.create_doc(&token, json!({})).await;
    assert_eq!(doc.title, "Untitled Document");
    assert_eq!(doc.content, "");

    let resp = srv
        .client
        .put(srv.url(&format!("/documents/{}", doc.id)))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: DocumentView = resp.json().await.unwrap();
    assert_eq!(updated.title, doc.title);
    assert!(updated.last_edited_at > doc.last_edited_at);
    assert_eq!(updated.last_edited_by_id.as_deref(), Some(alice.id.as_str()));

    srv.stop();
}

#[tokio::test]
async fn only_the_owner_deletes() {
    let srv = spawn_server().await;
    let (_alice, alice_token) = srv.user_token("alice@example.com", "Alice").await;
    let (_bob, bob_token) = srv.user_token("bob@example.com", "Bob").await;
    let doc = srv
        .create_doc(&alice_token, json!({ "title": "Shared", "isPublic": true }))
        .await;
    let path = srv.url(&format!("/documents/{}", doc.id));

    let resp = srv.client.delete(&path).bearer_auth(&bob_token).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = srv.client.delete(&path).bearer_auth(&alice_token).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let msg: MessageResponse = resp.json().await.unwrap();
    assert_eq!(msg.message, "Document deleted successfully");

    let resp = srv.client.get(&path).bearer_auth(&alice_token).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let err: ErrorBody = resp.json().await.unwrap();
    assert_eq!(err.error, "Document not found");

    let listed: Vec<DocumentView> = srv
        .client
        .get(srv.url("/documents"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.is_empty());

    srv.stop();
}

#[tokio::test]
async fn list_is_most_recent_first() {
    let srv = spawn_server().await;
    let (_alice, token) = srv.user_token("alice@example.com", "Alice").await;
    let first = srv.create_doc(&token, json!({ "title": "first" })).await;
    let second = srv.create_doc(&token, json!({ "title": "second" })).await;

    // touching the older one moves it to the top
    let resp = srv
        .client
        .put(srv.url(&format!("/documents/{}", first.id)))
        .bearer_auth(&token)
        .json(&json!({ "content": "bump" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let listed: Vec<DocumentView> = srv
        .client
        .get(srv.url("/documents"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

    srv.stop();
}

#[tokio::test]
async fn rendered_html_is_escaped() {
    let srv = spawn_server().await;
    let (_alice, token) = srv.user_token("alice@example.com", "Alice").await;
    let doc = srv
        .create_doc(&token, json!({ "content": "# Hi\n<b>raw</b> **bold**" }))
        .await;
    let resp = srv
        .client
        .get(srv.url(&format!("/documents/{}/html", doc.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert_eq!(
        html,
        r#"<h1 class="md-h1">Hi</h1><br />&lt;b&gt;raw&lt;/b&gt; <strong>bold</strong>"#
    );

    srv.stop();
}

#[tokio::test]
async fn unreadable_bodies_answer_with_error_json() {
    let srv = spawn_server().await;
    let (_alice, token) = srv.user_token("alice@example.com", "Alice").await;

    let resp = srv
        .client
        .post(srv.url("/documents"))
        .bearer_auth(&token)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: ErrorBody = resp.json().await.unwrap();
    assert_eq!(err.error, "Invalid request body");

    let doc = srv.create_doc(&token, json!({ "title": "keep" })).await;
    let resp = srv
        .client
        .put(srv.url(&format!("/documents/{}", doc.id)))
        .bearer_auth(&token)
        .json(&json!({ "isPublic": "yes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: ErrorBody = resp.json().await.unwrap();
    assert_eq!(err.error, "Invalid request body");

    srv.stop();
}
