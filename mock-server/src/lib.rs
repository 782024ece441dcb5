//! In-memory stand-in for the identity service's `users` resource.
//!
//! Requests must carry either the admin Basic credentials or an
//! `X-Auth-Token`, except self-registration and the reset-request flow.
//! A `Wazo-Tenant` header restricts every lookup to that tenant.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const VERSION: &str = "0.1";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "secret";
pub const DEFAULT_TENANT: &str = "default-tenant";

const TENANT_HEADER: &str = "wazo-tenant";
const TOKEN_HEADER: &str = "x-auth-token";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Email {
    pub uuid: String,
    pub address: String,
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub uuid: String,
    pub username: String,
    pub tenant_uuid: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub emails: Vec<Email>,
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(skip)]
    pub policies: Vec<String>,
    #[serde(skip)]
    pub sessions: Vec<String>,
}

/// Credentials seen on the most recent request.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SeenAuth {
    pub authorization: Option<String>,
    pub token: Option<String>,
}

#[derive(Default)]
pub struct Store {
    pub users: HashMap<String, User>,
    pub last_auth: SeenAuth,
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Deserialize)]
pub struct EditUser {
    pub username: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct SetPassword {
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewEmail {
    pub address: String,
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Deserialize)]
pub struct UpdateEmails {
    pub emails: Vec<NewEmail>,
}

#[derive(Deserialize)]
pub struct ResetQuery {
    pub user_uuid: String,
}

/// Error reply in the service's `{"reason": [...], "status_code": n}` shape.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({"reason": [self.1], "status_code": self.0.as_u16()});
        (self.0, Json(body)).into_response()
    }
}

fn not_found(uuid: &str) -> ApiError {
    ApiError(StatusCode::NOT_FOUND, format!("No such user: {uuid}"))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let users = format!("/{VERSION}/users");
    Router::new()
        .route(&users, get(list_users).post(create_user))
        .route(&format!("{users}/register"), post(register_user))
        .route(
            &format!("{users}/password/reset"),
            get(request_reset).post(set_password),
        )
        .route(
            &format!("{users}/{{uuid}}"),
            get(get_user).put(edit_user).delete(delete_user),
        )
        .route(&format!("{users}/{{uuid}}/password"), put(change_password))
        .route(&format!("{users}/{{uuid}}/emails"), put(update_emails))
        .route(
            &format!("{users}/{{uuid}}/emails/{{email_uuid}}/confirm"),
            get(confirm_email),
        )
        .route(&format!("{users}/{{uuid}}/groups"), get(user_groups))
        .route(&format!("{users}/{{uuid}}/policies"), get(user_policies))
        .route(
            &format!("{users}/{{uuid}}/policies/{{policy_uuid}}"),
            put(add_policy).delete(remove_policy),
        )
        .route(&format!("{users}/{{uuid}}/tenants"), get(user_tenants))
        .route(&format!("{users}/{{uuid}}/sessions"), get(user_sessions))
        .route(
            &format!("{users}/{{uuid}}/sessions/{{session_uuid}}"),
            delete(remove_session),
        )
        .route("/_debug/last-auth", get(last_auth))
        .route("/_debug/users/{uuid}/sessions", post(open_session))
        .layer(middleware::from_fn_with_state(db.clone(), guard))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Record credentials and reject unauthenticated calls to protected routes.
async fn guard(State(db): State<Db>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if path.starts_with("/_debug") {
        return next.run(request).await;
    }

    let headers = request.headers();
    let seen = SeenAuth {
        authorization: header(headers, "authorization"),
        token: header(headers, TOKEN_HEADER),
    };
    let public = path.ends_with("/users/register")
        || (path.ends_with("/users/password/reset") && *request.method() == Method::GET);
    let admin = seen.authorization.as_deref().is_some_and(is_admin);
    let authorized = public || admin || seen.token.is_some();
    db.write().await.last_auth = seen;

    if !authorized {
        tracing::debug!(%path, "rejecting unauthenticated request");
        return ApiError(StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response();
    }
    next.run(request).await
}

fn is_admin(authorization: &str) -> bool {
    let Some(encoded) = authorization.strip_prefix("Basic ") else {
        return false;
    };
    STANDARD
        .decode(encoded)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .is_some_and(|pair| pair == format!("{ADMIN_USERNAME}:{ADMIN_PASSWORD}"))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn tenant(headers: &HeaderMap) -> Option<String> {
    header(headers, TENANT_HEADER)
}

fn visible(user: &User, tenant: Option<&str>) -> bool {
    tenant.is_none_or(|t| user.tenant_uuid == t)
}

fn find<'a>(store: &'a Store, uuid: &str, headers: &HeaderMap) -> Result<&'a User, ApiError> {
    let tenant = tenant(headers);
    store
        .users
        .get(uuid)
        .filter(|u| visible(u, tenant.as_deref()))
        .ok_or_else(|| not_found(uuid))
}

fn find_mut<'a>(
    store: &'a mut Store,
    uuid: &str,
    headers: &HeaderMap,
) -> Result<&'a mut User, ApiError> {
    let tenant = tenant(headers);
    store
        .users
        .get_mut(uuid)
        .filter(|u| visible(u, tenant.as_deref()))
        .ok_or_else(|| not_found(uuid))
}

fn listing<T: Serialize>(items: &[T], total: usize) -> Json<Value> {
    Json(json!({"items": items, "total": total, "filtered": items.len()}))
}

fn insert_user(store: &mut Store, input: NewUser, tenant_uuid: String) -> User {
    let emails = input
        .email_address
        .map(|address| Email {
            uuid: Uuid::new_v4().to_string(),
            address,
            main: true,
            confirmed: false,
        })
        .into_iter()
        .collect();
    let user = User {
        uuid: Uuid::new_v4().to_string(),
        username: input.username,
        tenant_uuid,
        firstname: input.firstname,
        lastname: input.lastname,
        emails,
        password: input.password,
        policies: Vec::new(),
        sessions: Vec::new(),
    };
    store.users.insert(user.uuid.clone(), user.clone());
    user
}

async fn list_users(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = db.read().await;
    let tenant = tenant(&headers);
    let scoped: Vec<&User> = store
        .users
        .values()
        .filter(|u| visible(u, tenant.as_deref()))
        .collect();
    let total = scoped.len();
    let items: Vec<&User> = match params.get("search") {
        Some(search) => scoped
            .into_iter()
            .filter(|u| u.username.contains(search.as_str()))
            .collect(),
        None => scoped,
    };
    listing(&items, total)
}

async fn create_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<NewUser>,
) -> Json<User> {
    let tenant_uuid = tenant(&headers).unwrap_or_else(|| DEFAULT_TENANT.to_string());
    let mut store = db.write().await;
    Json(insert_user(&mut store, input, tenant_uuid))
}

async fn register_user(State(db): State<Db>, Json(input): Json<NewUser>) -> Json<User> {
    let mut store = db.write().await;
    Json(insert_user(&mut store, input, DEFAULT_TENANT.to_string()))
}

async fn get_user(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let store = db.read().await;
    find(&store, &uuid, &headers).cloned().map(Json)
}

async fn edit_user(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    Json(input): Json<EditUser>,
) -> Result<Json<User>, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    if let Some(username) = input.username {
        user.username = username;
    }
    if input.firstname.is_some() {
        user.firstname = input.firstname;
    }
    if input.lastname.is_some() {
        user.lastname = input.lastname;
    }
    Ok(Json(user.clone()))
}

async fn delete_user(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    find(&store, &uuid, &headers)?;
    store.users.remove(&uuid);
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    Json(input): Json<ChangePassword>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    if user.password.as_deref() != Some(input.old_password.as_str()) {
        return Err(ApiError(
            StatusCode::UNAUTHORIZED,
            "Invalid old password".to_string(),
        ));
    }
    user.password = Some(input.new_password);
    Ok(StatusCode::NO_CONTENT)
}

async fn request_reset() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn set_password(
    State(db): State<Db>,
    Query(query): Query<ResetQuery>,
    Json(input): Json<SetPassword>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    let user = store
        .users
        .get_mut(&query.user_uuid)
        .ok_or_else(|| not_found(&query.user_uuid))?;
    user.password = Some(input.password);
    Ok(StatusCode::NO_CONTENT)
}

async fn update_emails(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    Json(input): Json<UpdateEmails>,
) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    user.emails = input
        .emails
        .into_iter()
        .map(|e| Email {
            uuid: Uuid::new_v4().to_string(),
            address: e.address,
            main: e.main,
            confirmed: e.confirmed,
        })
        .collect();
    Ok(listing(&user.emails, user.emails.len()))
}

async fn confirm_email(
    State(db): State<Db>,
    Path((uuid, email_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let store = db.read().await;
    let user = find(&store, &uuid, &headers)?;
    if user.emails.iter().any(|e| e.uuid == email_uuid) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("No such email: {email_uuid}"),
        ))
    }
}

async fn user_groups(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    find(&store, &uuid, &headers)?;
    Ok(listing::<Value>(&[], 0))
}

async fn user_policies(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    let user = find(&store, &uuid, &headers)?;
    let items: Vec<Value> = user
        .policies
        .iter()
        .filter(|p| params.get("search").is_none_or(|s| p.contains(s.as_str())))
        .map(|p| json!({"uuid": p}))
        .collect();
    Ok(listing(&items, user.policies.len()))
}

async fn user_tenants(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    let user = find(&store, &uuid, &headers)?;
    Ok(listing(&[json!({"uuid": user.tenant_uuid})], 1))
}

async fn user_sessions(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    let user = find(&store, &uuid, &headers)?;
    let items: Vec<Value> = user.sessions.iter().map(|s| json!({"uuid": s})).collect();
    Ok(listing(&items, items.len()))
}

async fn add_policy(
    State(db): State<Db>,
    Path((uuid, policy_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    if !user.policies.contains(&policy_uuid) {
        user.policies.push(policy_uuid);
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_policy(
    State(db): State<Db>,
    Path((uuid, policy_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    user.policies.retain(|p| *p != policy_uuid);
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_session(
    State(db): State<Db>,
    Path((uuid, session_uuid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    let user = find_mut(&mut store, &uuid, &headers)?;
    let before = user.sessions.len();
    user.sessions.retain(|s| *s != session_uuid);
    if user.sessions.len() == before {
        return Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("No such session: {session_uuid}"),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn last_auth(State(db): State<Db>) -> Json<SeenAuth> {
    Json(db.read().await.last_auth.clone())
}

/// Test hook: open a session for `uuid` and return its identifier.
async fn open_session(
    State(db): State<Db>,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut store = db.write().await;
    let user = store.users.get_mut(&uuid).ok_or_else(|| not_found(&uuid))?;
    let session = Uuid::new_v4().to_string();
    user.sessions.push(session.clone());
    Ok(Json(json!({"uuid": session})))
}
