//! The contract shared by every resource command.
//!
//! # Design
//! A resource command is bound to one resource name (`users`, `groups`, ...)
//! and a base URL, and talks to the service through a borrowed
//! [`Transport`]. Every operation follows the same shape: build headers,
//! build the URL, issue one request, check the single expected status, then
//! decode or return nothing. [`ResourceCommand`] supplies that shape, the
//! generic CRUD operations and the relation traversal as provided methods,
//! so a concrete command only names its resource.
//!
//! Only the explicit `tenant_uuid` and `token` arguments ever reach request
//! headers. Bodies travel as a [`Payload`] and query strings as a [`Query`].

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{check_status, Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

pub const TENANT_HEADER: &str = "Wazo-Tenant";
pub const TOKEN_HEADER: &str = "X-Auth-Token";

pub const RO_HEADERS: &[(&str, &str)] = &[("Accept", "application/json")];
pub const RW_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("Content-Type", "application/json"),
];

/// JSON object sent verbatim as a request body.
pub type Payload = Map<String, Value>;

/// Which fixed header set a request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPreset {
    /// Requests without a body.
    ReadOnly,
    /// Requests carrying a JSON body.
    ReadWrite,
}

impl HeaderPreset {
    pub fn headers(self) -> &'static [(&'static str, &'static str)] {
        match self {
            HeaderPreset::ReadOnly => RO_HEADERS,
            HeaderPreset::ReadWrite => RW_HEADERS,
        }
    }
}

/// Ordered query string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    /// Build a query from a JSON object.
    ///
    /// Strings are sent unquoted, arrays expand into one parameter per
    /// element and nulls are dropped.
    pub fn from_json(params: &Map<String, Value>) -> Self {
        let mut query = Self::new();
        for (key, value) in params {
            query.push_json(key, value);
        }
        query
    }

    fn push_json(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(s) => self.0.push((key.to_string(), s.clone())),
            Value::Array(items) => {
                for item in items {
                    self.push_json(key, item);
                }
            }
            other => self.0.push((key.to_string(), other.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

/// Build headers from `preset`, adding the tenant and per-call token when
/// given. Empty values count as absent.
pub fn get_headers(
    preset: HeaderPreset,
    tenant_uuid: Option<&str>,
    token: Option<&str>,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = preset
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    if let Some(tenant) = tenant_uuid.filter(|t| !t.is_empty()) {
        headers.push((TENANT_HEADER.to_string(), tenant.to_string()));
    }
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        headers.push((TOKEN_HEADER.to_string(), token.to_string()));
    }
    headers
}

/// Build a request, choosing the header preset from whether a body is sent.
pub fn build_request(
    method: HttpMethod,
    url: String,
    tenant_uuid: Option<&str>,
    token: Option<&str>,
    query: Query,
    body: Option<&Payload>,
) -> Result<HttpRequest> {
    let preset = if body.is_some() {
        HeaderPreset::ReadWrite
    } else {
        HeaderPreset::ReadOnly
    };
    let body = body
        .map(|b| serde_json::to_string(b).map_err(|e| Error::Serialization(e.to_string())))
        .transpose()?;
    Ok(HttpRequest {
        method,
        url,
        headers: get_headers(preset, tenant_uuid, token),
        query: query.into_pairs(),
        body,
    })
}

fn decode(response: &HttpResponse) -> Result<Value> {
    serde_json::from_str(&response.body).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Operations common to every resource of the service.
pub trait ResourceCommand {
    /// Literal path segment naming the resource.
    const RESOURCE: &'static str;

    type Transport: Transport;

    /// Client root followed by `/` and [`Self::RESOURCE`].
    fn base_url(&self) -> &str;

    fn transport(&self) -> &Self::Transport;

    /// `base_url` followed by each segment in order.
    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url().to_string();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// Send `request` and accept only `expected` as its status.
    fn dispatch(&self, request: HttpRequest, expected: u16) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        debug!(resource = Self::RESOURCE, %method, %url, "sending request");

        let response = self.transport().send(request)?;
        if let Err(err) = check_status(&response, expected, method, &url) {
            warn!(
                resource = Self::RESOURCE,
                %method,
                %url,
                status = response.status,
                expected,
                "request failed"
            );
            return Err(err);
        }
        Ok(response)
    }

    /// Round-trip expecting 200, returning the decoded body.
    fn fetch(&self, request: HttpRequest) -> Result<Value> {
        let response = self.dispatch(request, 200)?;
        decode(&response)
    }

    /// Round-trip expecting 204, discarding any body.
    fn execute(&self, request: HttpRequest) -> Result<()> {
        self.dispatch(request, 204)?;
        Ok(())
    }

    fn list(&self, tenant_uuid: Option<&str>, query: &Query) -> Result<Value> {
        let request = build_request(
            HttpMethod::Get,
            self.url(&[]),
            tenant_uuid,
            None,
            query.clone(),
            None,
        )?;
        self.fetch(request)
    }

    fn new(&self, tenant_uuid: Option<&str>, body: &Payload) -> Result<Value> {
        let request = build_request(
            HttpMethod::Post,
            self.url(&[]),
            tenant_uuid,
            None,
            Query::new(),
            Some(body),
        )?;
        self.fetch(request)
    }

    fn get(&self, uuid: &str, tenant_uuid: Option<&str>) -> Result<Value> {
        let request = build_request(
            HttpMethod::Get,
            self.url(&[uuid]),
            tenant_uuid,
            None,
            Query::new(),
            None,
        )?;
        self.fetch(request)
    }

    fn edit(&self, uuid: &str, tenant_uuid: Option<&str>, body: &Payload) -> Result<Value> {
        let request = build_request(
            HttpMethod::Put,
            self.url(&[uuid]),
            tenant_uuid,
            None,
            Query::new(),
            Some(body),
        )?;
        self.fetch(request)
    }

    fn delete(&self, uuid: &str, tenant_uuid: Option<&str>) -> Result<()> {
        let request = build_request(
            HttpMethod::Delete,
            self.url(&[uuid]),
            tenant_uuid,
            None,
            Query::new(),
            None,
        )?;
        self.execute(request)
    }

    /// GET `base/{uuid}/{relation}`.
    fn get_relation(
        &self,
        relation: &str,
        uuid: &str,
        tenant_uuid: Option<&str>,
        query: &Query,
    ) -> Result<Value> {
        let request = build_request(
            HttpMethod::Get,
            self.url(&[uuid, relation]),
            tenant_uuid,
            None,
            query.clone(),
            None,
        )?;
        self.fetch(request)
    }

    /// PUT `base/{uuid}/{relation}/{other_uuid}`.
    fn associate(
        &self,
        uuid: &str,
        relation: &str,
        other_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        let request = build_request(
            HttpMethod::Put,
            self.url(&[uuid, relation, other_uuid]),
            tenant_uuid,
            None,
            Query::new(),
            None,
        )?;
        self.execute(request)
    }

    /// DELETE `base/{uuid}/{relation}/{other_uuid}`.
    fn dissociate(
        &self,
        uuid: &str,
        relation: &str,
        other_uuid: &str,
        tenant_uuid: Option<&str>,
    ) -> Result<()> {
        let request = build_request(
            HttpMethod::Delete,
            self.url(&[uuid, relation, other_uuid]),
            tenant_uuid,
            None,
            Query::new(),
            None,
        )?;
        self.execute(request)
    }
}

/// `root` joined with `resource`, tolerating a trailing slash on `root`.
pub(crate) fn resource_url(root: &str, resource: &str) -> String {
    format!("{}/{resource}", root.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tenant_header_only_when_given() {
        let headers = get_headers(HeaderPreset::ReadOnly, None, None);
        assert_eq!(
            headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );

        let headers = get_headers(HeaderPreset::ReadWrite, Some("t1"), None);
        assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert!(headers.contains(&(TENANT_HEADER.to_string(), "t1".to_string())));
        assert!(!headers.iter().any(|(k, _)| k == TOKEN_HEADER));
    }

    #[test]
    fn token_header_when_given() {
        let headers = get_headers(HeaderPreset::ReadWrite, None, Some("tok"));
        assert!(headers.contains(&(TOKEN_HEADER.to_string(), "tok".to_string())));
        assert!(!headers.iter().any(|(k, _)| k == TENANT_HEADER));
    }

    #[test]
    fn empty_tenant_and_token_are_dropped() {
        let headers = get_headers(HeaderPreset::ReadOnly, Some(""), Some(""));
        assert_eq!(
            headers,
            vec![("Accept".to_string(), "application/json".to_string())]
        );
    }

    #[test]
    fn query_from_json_flattens_values() {
        let params = json!({
            "search": "alice",
            "limit": 10,
            "recurse": true,
            "uuid": ["u1", "u2"],
            "tenant": null
        });
        let query = Query::from_json(params.as_object().unwrap());
        let pairs: Vec<(&str, &str)> = query
            .pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert!(pairs.contains(&("search", "alice")));
        assert!(pairs.contains(&("limit", "10")));
        assert!(pairs.contains(&("recurse", "true")));
        assert!(pairs.contains(&("uuid", "u1")));
        assert!(pairs.contains(&("uuid", "u2")));
        assert!(!pairs.iter().any(|(k, _)| *k == "tenant"));
    }

    #[test]
    fn body_selects_read_write_preset() {
        let body = json!({"username": "a"});
        let req = build_request(
            HttpMethod::Post,
            "http://h/users".to_string(),
            None,
            None,
            Query::new(),
            body.as_object(),
        )
        .unwrap();
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(sent, body);

        let req = build_request(
            HttpMethod::Get,
            "http://h/users".to_string(),
            None,
            None,
            Query::new(),
            None,
        )
        .unwrap();
        assert!(req.header("Content-Type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn resource_url_strips_trailing_slash() {
        assert_eq!(resource_url("http://h:1/0.1/", "users"), "http://h:1/0.1/users");
    }
}
