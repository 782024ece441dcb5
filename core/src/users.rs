//! The `users` resource.
//!
//! CRUD comes from [`ResourceCommand`]. This module adds registration,
//! policy attachment, session revocation, the password flows, email
//! management and the four relation getters.
//!
//! `remove_session`, `request_confirmation_email`, `update_emails`,
//! `register` and the password operations take no tenant; the service
//! applies its own tenant resolution to them.

use serde_json::{json, Value};

use crate::command::{build_request, resource_url, Payload, Query, ResourceCommand};
use crate::error::{Error, Result};
use crate::http::{HttpMethod, Transport};

#[derive(Debug, Clone)]
pub struct UsersCommand<T> {
    base_url: String,
    transport: T,
}

impl<T: Transport> ResourceCommand for UsersCommand<T> {
    const RESOURCE: &'static str = "users";

    type Transport = T;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> UsersCommand<T> {
    /// Bind to `{root}/users`, where `root` is the client URL.
    pub fn from_root(root: &str, transport: T) -> Self {
        Self {
            base_url: resource_url(root, Self::RESOURCE),
            transport,
        }
    }

    /// Self-registration: POST `base/register`.
    pub fn register(&self, body: &Payload) -> Result<Value> {
        let request = build_request(
            HttpMethod::Post,
            self.url(&["register"]),
            None,
            None,
            Query::new(),
            Some(body),
        )?;
        self.fetch(request)
    }

    pub fn add_policy(
        &self,
        user_uuid: &str,
        policy_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.associate(user_uuid, "policies", policy_uuid, tenant_uuid)
    }

    pub fn remove_policy(
        &self,
        user_uuid: &str,
        policy_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        self.dissociate(user_uuid, "policies", policy_uuid, tenant_uuid)
    }

    pub fn remove_session(&self, user_uuid: &str, session_uuid: &str) -> Result<()> {
        let request = build_request(
            HttpMethod::Delete,
            self.url(&[user_uuid, "sessions", session_uuid]),
            None,
            None,
            Query::new(),
            None,
        )?;
        self.execute(request)
    }

    /// PUT `base/{user_uuid}/password`; needs ambient credentials.
    pub fn change_password(&self, user_uuid: &str, body: &Payload) -> Result<()> {
        let request = build_request(
            HttpMethod::Put,
            self.url(&[user_uuid, "password"]),
            None,
            None,
            Query::new(),
            Some(body),
        )?;
        self.execute(request)
    }

    /// Complete a password reset.
    ///
    /// When `token` is given it is sent as `X-Auth-Token` and the session's
    /// Basic credentials are left off this request.
    pub fn set_password(&self, user_uuid: &str, password: &str, token: Option<&str>) -> Result<()> {
        let body = payload(json!({ "password": password }))?;
        let request = build_request(
            HttpMethod::Post,
            self.url(&["password", "reset"]),
            None,
            token,
            Query::new().with("user_uuid", user_uuid),
            Some(&body),
        )?;
        self.execute(request)
    }

    /// Ask the service to start a reset, typically by email.
    pub fn reset_password(&self, query: &Query) -> Result<()> {
        let request = build_request(
            HttpMethod::Get,
            self.url(&["password", "reset"]),
            None,
            None,
            query.clone(),
            None,
        )?;
        self.execute(request)
    }

    pub fn request_confirmation_email(&self, user_uuid: &str, email_uuid: &str) -> Result<()> {
        let request = build_request(
            HttpMethod::Get,
            self.url(&[user_uuid, "emails", email_uuid, "confirm"]),
            None,
            None,
            Query::new(),
            None,
        )?;
        self.execute(request)
    }

    pub fn update_emails(&self, user_uuid: &str, emails: &[Value]) -> Result<Value> {
        let body = payload(json!({ "emails": emails }))?;
        let request = build_request(
            HttpMethod::Put,
            self.url(&[user_uuid, "emails"]),
            None,
            None,
            Query::new(),
            Some(&body),
        )?;
        self.fetch(request)
    }

    pub fn get_groups(
        &self,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("groups", user_uuid, tenant_uuid, query)
    }

    pub fn get_policies(
        &self,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("policies", user_uuid, tenant_uuid, query)
    }

    pub fn get_tenants(
        &self,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("tenants", user_uuid, tenant_uuid, query)
    }

    pub fn get_sessions(
        &self,
        user_uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        self.get_relation("sessions", user_uuid, tenant_uuid, query)
    }
}

fn payload(value: Value) -> Result<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!("expected a JSON object, got {other}"))),
    }
}
