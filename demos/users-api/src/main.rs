//! Users API demo.
//!
//! One `users` resource served across three API versions:
//!
//! | Version      | Change                                                   |
//! |--------------|----------------------------------------------------------|
//! | `2024-01-01` | `GET /users`, `GET /users/:id`, `POST /users` with `name` |
//! | `2024-02-01` | users split `name` into `first_name`/`last_name`          |
//! | `2024-06-01` | `DELETE /users/:id` added                                 |
//!
//! ```text
//! curl -H 'x-api-version: 2024-01-15' localhost:8080/users/1
//! ```

use std::collections::BTreeMap;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use chronos::prelude::*;
use chronos::server::HandlerRouter;
use chronos::ConfiguredExtractor;
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Versions this service has released, used when the config file names none.
const HISTORY: [&str; 3] = ["2024-01-01", "2024-02-01", "2024-06-01"];

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone)]
struct StoredUser {
    id: u64,
    first_name: String,
    last_name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl StoredUser {
    fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Store {
    users: Arc<RwLock<BTreeMap<u64, StoredUser>>>,
    next_id: Arc<AtomicU64>,
}

impl Store {
    fn seeded() -> Result<Self, HandlerError> {
        let store = Self::default();
        store.insert("Alice", "Smith", "alice@example.com")?;
        store.insert("Bob", "Johnson", "bob@example.com")?;
        Ok(store)
    }

    fn insert(&self, first_name: &str, last_name: &str, email: &str) -> Result<StoredUser, HandlerError> {
        let user = StoredUser {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.users
            .write()
            .map_err(|_| HandlerError::internal("user store lock poisoned"))?
            .insert(user.id, user.clone());
        Ok(user)
    }

    fn get(&self, id: u64) -> Result<StoredUser, HandlerError> {
        self.users
            .read()
            .map_err(|_| HandlerError::internal("user store lock poisoned"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| HandlerError::NotFound(format!("user {id} not found")))
    }

    fn list(&self) -> Result<Vec<StoredUser>, HandlerError> {
        Ok(self
            .users
            .read()
            .map_err(|_| HandlerError::internal("user store lock poisoned"))?
            .values()
            .cloned()
            .collect())
    }

    fn remove(&self, id: u64) -> Result<(), HandlerError> {
        self.users
            .write()
            .map_err(|_| HandlerError::internal("user store lock poisoned"))?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| HandlerError::NotFound(format!("user {id} not found")))
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct UserV1 {
    id: u64,
    name: String,
    email: String,
}

impl From<StoredUser> for UserV1 {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            name: user.full_name(),
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateUserV1 {
    name: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct UserV2 {
    id: u64,
    first_name: String,
    last_name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserV2 {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateUserV2 {
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct UserList<T> {
    users: Vec<T>,
    total: usize,
}

// =============================================================================
// Handlers
// =============================================================================

fn user_id(ctx: &RequestContext) -> Result<u64, HandlerError> {
    let raw = ctx.param("id").unwrap_or_default();
    raw.parse()
        .map_err(|_| HandlerError::BadRequest(format!("user id must be a number, got '{raw}'")))
}

fn list_users(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::no_body(move |_ctx: RequestContext| {
        let store = store.clone();
        async move {
            let users: Vec<UserV1> = store.list()?.into_iter().map(UserV1::from).collect();
            Ok(UserList {
                total: users.len(),
                users,
            })
        }
    })
}

fn get_user_v1(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::no_body(move |ctx: RequestContext| {
        let store = store.clone();
        async move { Ok(UserV1::from(store.get(user_id(&ctx)?)?)) }
    })
}

fn get_user_v2(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::no_body(move |ctx: RequestContext| {
        let store = store.clone();
        async move { Ok(UserV2::from(store.get(user_id(&ctx)?)?)) }
    })
}

fn create_user_v1(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::new(move |_ctx, body: Bytes| {
        let store = store.clone();
        async move {
            let request: CreateUserV1 = serde_json::from_slice(&body)?;
            let (first, last) = request
                .name
                .split_once(' ')
                .unwrap_or((request.name.as_str(), ""));
            let user = store.insert(first, last, &request.email)?;
            HandlerOutcome::json(StatusCode::CREATED, &UserV1::from(user))
        }
    })
}

fn create_user_v2(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::new(move |_ctx, body: Bytes| {
        let store = store.clone();
        async move {
            let request: CreateUserV2 = serde_json::from_slice(&body)?;
            let user = store.insert(&request.first_name, &request.last_name, &request.email)?;
            HandlerOutcome::json(StatusCode::CREATED, &UserV2::from(user))
        }
    })
}

fn delete_user(store: &Store) -> VersionedHandler {
    let store = store.clone();
    VersionedHandler::new(move |ctx: RequestContext, _body| {
        let store = store.clone();
        async move {
            store.remove(user_id(&ctx)?)?;
            Ok(HandlerOutcome::no_content())
        }
    })
}

// =============================================================================
// Wiring
// =============================================================================

fn build_router(config: &ChronosConfig, store: &Store) -> anyhow::Result<HandlerRouter<ConfiguredExtractor>> {
    let mut builder = router_builder(config)?;
    let mut users = builder.scope("/users");

    users.get("/").version("2024-01-01", list_users(store))?;
    users
        .get("/:id")
        .version("2024-01-01", get_user_v1(store))?
        .version("2024-02-01", get_user_v2(store))?;
    users
        .post("/")
        .version("2024-01-01", create_user_v1(store))?
        .version("2024-02-01", create_user_v2(store))?;
    users.delete("/:id").version("2024-06-01", delete_user(store))?;

    Ok(builder.build())
}

fn load_config() -> anyhow::Result<ChronosConfig> {
    let path = env::var("CHRONOS_CONFIG").unwrap_or_else(|_| "chronos.toml".to_string());
    let mut config = ConfigLoader::new()
        .with_dotenv()?
        .with_optional_file(&path)?
        .with_env_prefix("CHRONOS")
        .load()?;

    if config.versioning.history.is_empty() {
        config.versioning.history = HISTORY.iter().map(ToString::to_string).collect();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let metrics = init_telemetry(&config.logging, &config.metrics)?;

    let store = Store::seeded()?;
    let router = build_router(&config, &store)?;
    let server_config = server_config_builder(&config)?
        .service_name(env!("CARGO_PKG_NAME"))
        .service_version(env!("CARGO_PKG_VERSION"))
        .build();

    tracing::info!(
        addr = server_config.http_addr(),
        versions = ?config.versioning.history,
        "Starting users-api"
    );

    Server::new(server_config, router).with_metrics(metrics).run().await?;
    Ok(())
}
