//! Client configuration owner and the ureq-backed session.
//!
//! # Design
//! `Client` does no I/O when it is built. The first call to
//! [`Client::session`] builds a [`Session`] from the configuration and
//! caches it. Resource commands borrow that session, so the client remains
//! its sole owner. `Session` decorates every outgoing request with the
//! ambient credentials before handing it to ureq. A per-call
//! `X-Auth-Token` on the request suppresses the Basic credentials for that
//! request only.

use std::cell::OnceCell;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::trace;

use crate::command::TOKEN_HEADER;
use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::resources::{GroupsCommand, PoliciesCommand, TenantsCommand};
use crate::users::UsersCommand;

/// Entry point: owns the configuration and the lazily built session.
pub struct Client {
    config: ClientConfig,
    url: String,
    session: OnceCell<Session>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let url = config.url();
        Self {
            config,
            url,
            session: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Root URL, without any resource name.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The session all commands created from this client go through.
    pub fn session(&self) -> Result<&Session, ClientError> {
        if let Some(session) = self.session.get() {
            return Ok(session);
        }
        let session = Session::new(&self.config)?;
        Ok(self.session.get_or_init(|| session))
    }

    pub fn users(&self) -> Result<UsersCommand<&Session>, ClientError> {
        Ok(UsersCommand::from_root(&self.url, self.session()?))
    }

    pub fn groups(&self) -> Result<GroupsCommand<&Session>, ClientError> {
        Ok(GroupsCommand::from_root(&self.url, self.session()?))
    }

    pub fn policies(&self) -> Result<PoliciesCommand<&Session>, ClientError> {
        Ok(PoliciesCommand::from_root(&self.url, self.session()?))
    }

    pub fn tenants(&self) -> Result<TenantsCommand<&Session>, ClientError> {
        Ok(TenantsCommand::from_root(&self.url, self.session()?))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("verify_certificate", &self.config.verify_certificate)
            .finish_non_exhaustive()
    }
}

/// Blocking HTTP session carrying the client's ambient credentials.
pub struct Session {
    agent: ureq::Agent,
    basic_auth: Option<String>,
    token: Option<String>,
    user_agent: Option<String>,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout);
        if !config.verify_certificate {
            builder = builder.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        if let Some(proxy) = &config.proxy {
            let parsed = ureq::Proxy::new(proxy).map_err(|e| ClientError::InvalidProxy {
                proxy: proxy.clone(),
                source: TransportError::from(e),
            })?;
            builder = builder.proxy(Some(parsed));
        }

        let basic_auth = basic_auth(config.username.as_deref(), config.password.as_deref());
        trace!(
            verify_certificate = config.verify_certificate,
            basic_auth = basic_auth.is_some(),
            "building session"
        );

        Ok(Self {
            agent: builder.build().new_agent(),
            basic_auth,
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn has_basic_auth(&self) -> bool {
        self.basic_auth.is_some()
    }

    /// Apply the ambient headers to `request` exactly as `send` would.
    pub fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(user_agent) = &self.user_agent {
            request
                .headers
                .push(("User-Agent".to_string(), user_agent.clone()));
        }
        let token_override = request
            .header(TOKEN_HEADER)
            .is_some_and(|token| !token.is_empty());
        if token_override {
            return request;
        }
        if let Some(token) = &self.token {
            request
                .headers
                .push((TOKEN_HEADER.to_string(), token.clone()));
        }
        if let Some(auth) = &self.basic_auth {
            request
                .headers
                .push(("Authorization".to_string(), auth.clone()));
        }
        request
    }
}

impl Transport for Session {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            query,
            body,
        } = self.prepare(request);

        let result = match method {
            HttpMethod::Get => with_parts(self.agent.get(&url), &headers, &query).call(),
            HttpMethod::Delete => with_parts(self.agent.delete(&url), &headers, &query).call(),
            HttpMethod::Post => {
                let builder = with_parts(self.agent.post(&url), &headers, &query);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_parts(self.agent.put(&url), &headers, &query);
                match body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("basic_auth", &self.basic_auth.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

fn with_parts<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    query: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in query {
        builder = builder.query(key, value);
    }
    builder
}

/// `Authorization` value, present only when both parts are non-empty.
fn basic_auth(username: Option<&str>, password: Option<&str>) -> Option<String> {
    match (username, password) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
            Some(format!("Basic {}", STANDARD.encode(format!("{user}:{pass}"))))
        }
        _ => None,
    }
}
