//! Full user lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every `users`
//! operation through a real `Client` and `Session` over HTTP. Validates URL
//! construction, header composition and status classification end-to-end.

use std::net::SocketAddr;

use auth_client::{
    Client, ClientConfig, Error, Payload, Query, ResourceCommand, TransportError,
};
use mock_auth_server::{ADMIN_PASSWORD, ADMIN_USERNAME};
use serde_json::{json, Value};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_auth_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config(addr: SocketAddr) -> ClientConfig {
    ClientConfig::new(addr.ip().to_string())
        .with_port(addr.port())
        .with_https(false)
}

fn admin_client(addr: SocketAddr) -> Client {
    Client::new(config(addr).with_credentials(ADMIN_USERNAME, ADMIN_PASSWORD))
}

fn body(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

/// Ask the mock which credentials it saw on the previous request.
fn last_auth(addr: SocketAddr) -> Value {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let mut response = agent
        .get(&format!("http://{addr}/_debug/last-auth"))
        .call()
        .expect("HTTP transport error");
    serde_json::from_str(&response.body_mut().read_to_string().unwrap()).unwrap()
}

fn open_session(addr: SocketAddr, uuid: &str) -> String {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let mut response = agent
        .post(&format!("http://{addr}/_debug/users/{uuid}/sessions"))
        .send_empty()
        .expect("HTTP transport error");
    let raw = response.body_mut().read_to_string().unwrap();
    let session: Value = serde_json::from_str(&raw).unwrap();
    session["uuid"].as_str().unwrap().to_string()
}

#[test]
fn user_lifecycle() {
    let addr = start_server();
    let client = admin_client(addr);
    let users = client.users().unwrap();

    // Step 1: create in a tenant.
    let created = users
        .new(Some("t1"), &body(json!({"username": "a", "password": "pw"})))
        .unwrap();
    let uuid = created["uuid"].as_str().unwrap().to_string();
    assert_eq!(created["tenant_uuid"], "t1");

    // Step 2: fetch it back, in and out of its tenant.
    assert_eq!(users.get(&uuid, Some("t1")).unwrap(), created);
    let err = users.get(&uuid, Some("t2")).unwrap_err();
    assert!(err.is_not_found());

    // Step 3: list with a search filter.
    let search = Query::from_json(&body(json!({"search": "a", "limit": null})));
    let listed = users.list(Some("t1"), &search).unwrap();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["uuid"], uuid.as_str());

    // Step 4: edit.
    let edited = users
        .edit(&uuid, None, &body(json!({"firstname": "Ada"})))
        .unwrap();
    assert_eq!(edited["firstname"], "Ada");

    // Step 5: policies and relations.
    users.add_policy(&uuid, "p1", Some("t1")).unwrap();
    let policies = users.get_policies(&uuid, None, &Query::new()).unwrap();
    assert_eq!(policies["items"][0]["uuid"], "p1");
    users.remove_policy(&uuid, "p1", None).unwrap();
    let policies = users.get_policies(&uuid, None, &Query::new()).unwrap();
    assert_eq!(policies["total"], 0);

    let tenants = users.get_tenants(&uuid, None, &Query::new()).unwrap();
    assert_eq!(tenants["items"][0]["uuid"], "t1");
    let groups = users.get_groups(&uuid, None, &Query::new()).unwrap();
    assert_eq!(groups["total"], 0);

    // Step 6: sessions.
    let session_uuid = open_session(addr, &uuid);
    let sessions = users.get_sessions(&uuid, None, &Query::new()).unwrap();
    assert_eq!(sessions["total"], 1);
    users.remove_session(&uuid, &session_uuid).unwrap();
    let err = users.remove_session(&uuid, &session_uuid).unwrap_err();
    assert!(matches!(err, Error::ClientRequest { status: 404, .. }));

    // Step 7: emails.
    let emails = users
        .update_emails(&uuid, &[json!({"address": "ada@example.com", "main": true})])
        .unwrap();
    let email_uuid = emails["items"][0]["uuid"].as_str().unwrap().to_string();
    users.request_confirmation_email(&uuid, &email_uuid).unwrap();

    // Step 8: passwords.
    users
        .change_password(&uuid, &body(json!({"old_password": "pw", "new_password": "pw2"})))
        .unwrap();
    let err = users
        .change_password(&uuid, &body(json!({"old_password": "pw", "new_password": "pw3"})))
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    users
        .reset_password(&Query::new().with("username", "a"))
        .unwrap();

    // Step 9: delete, then it is gone.
    users.delete(&uuid, Some("t1")).unwrap();
    let err = users.get(&uuid, None).unwrap_err();
    assert!(matches!(err, Error::ClientRequest { status: 404, .. }));
    assert_eq!(err.body().unwrap()["status_code"], 404);
}

#[test]
fn set_password_by_token_bypasses_basic_auth() {
    let addr = start_server();
    let admin = admin_client(addr);
    let created = admin
        .users()
        .unwrap()
        .new(None, &body(json!({"username": "b"})))
        .unwrap();
    let uuid = created["uuid"].as_str().unwrap();

    admin
        .users()
        .unwrap()
        .set_password(uuid, "fresh", Some("reset-token"))
        .unwrap();
    let seen = last_auth(addr);
    assert_eq!(seen["token"], "reset-token");
    assert!(seen["authorization"].is_null());

    admin.users().unwrap().set_password(uuid, "fresher", None).unwrap();
    let seen = last_auth(addr);
    assert!(seen["token"].is_null());
    assert!(seen["authorization"].as_str().unwrap().starts_with("Basic "));
}

#[test]
fn anonymous_client_can_register_but_not_list() {
    let addr = start_server();
    let anonymous = Client::new(config(addr));
    let users = anonymous.users().unwrap();

    let registered = users.register(&body(json!({"username": "self"}))).unwrap();
    assert_eq!(registered["username"], "self");

    let err = users.list(None, &Query::new()).unwrap_err();
    assert!(matches!(err, Error::ClientRequest { status: 401, .. }));
}

#[test]
fn partial_credentials_attach_no_auth() {
    let addr = start_server();
    let mut only_user = config(addr);
    only_user.username = Some(ADMIN_USERNAME.to_string());
    let client = Client::new(only_user);

    let err = client.users().unwrap().list(None, &Query::new()).unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(last_auth(addr)["authorization"].is_null());
}

#[test]
fn refused_connection_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = admin_client(addr);
    let err = client.users().unwrap().get("u1", None).unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
    assert!(!matches!(err, Error::Transport(TransportError::Timeout)));
}
