//! Blocking client for the identity service's REST API.
//!
//! # Overview
//! [`Client`] holds the connection configuration and lazily builds one
//! [`Session`]. Resource commands such as [`UsersCommand`] borrow that
//! session and turn typed operations into single HTTP round-trips, checking
//! each response against the one status code the operation expects.
//!
//! # Design
//! - Every resource implements [`ResourceCommand`]; CRUD, relation
//!   traversal and status classification are provided methods.
//! - Commands are generic over [`Transport`], so tests inject a recording
//!   transport in place of the real session.
//! - Tenant scoping and token overrides are explicit arguments; bodies and
//!   query strings are separate [`Payload`] and [`Query`] values.
//!
//! ```no_run
//! use auth_client::{Client, ClientConfig, Payload, ResourceCommand};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("auth.example.com").with_credentials("admin", "secret");
//! let client = Client::new(config);
//! let users = client.users()?;
//! let body: Payload = json!({"username": "alice"}).as_object().cloned().unwrap_or_default();
//! let created = users.new(Some("tenant-uuid"), &body)?;
//! println!("{}", created["uuid"]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod resources;
pub mod users;

#[cfg(test)]
mod testing;

pub use client::{Client, Session};
pub use command::{HeaderPreset, Payload, Query, ResourceCommand, TENANT_HEADER, TOKEN_HEADER};
pub use config::ClientConfig;
pub use error::{ClientError, Error, RequestContext, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use resources::{GroupsCommand, PoliciesCommand, TenantsCommand};
pub use users::UsersCommand;
