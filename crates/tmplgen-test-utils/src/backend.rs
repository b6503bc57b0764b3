//! [`FakeBackend`]: an in-memory generation backend served over HTTP.
//!
//! The server runs on its own thread and runtime so it can back both async
//! tests and CLI processes spawned with `assert_cmd`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;

use serde_json::{Value, json};
use tokio::sync::oneshot;
use warp::Filter;
use warp::Reply;
use warp::http::StatusCode;
use warp::reply::{self, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredArtifact {
    checksum: String,
    generation: String,
}

#[derive(Debug, Default)]
struct Store {
    /// Template path -> checksum
    templates: HashMap<String, String>,
    artifacts: HashMap<String, StoredArtifact>,
    /// Targets whose generation fails with a 500
    failing: HashSet<String>,
    next_generation: u64,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<Store>>;

/// A running fake backend. Stops when dropped.
///
/// Artifact checksums are derived from the template (checksum or inline
/// content) and the context, so identical inputs produce identical
/// checksums. Every write bumps a global generation counter.
pub struct FakeBackend {
    addr: SocketAddr,
    store: Shared,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeBackend {
    /// Start the backend on an ephemeral local port.
    pub fn start() -> Self {
        let store: Shared = Arc::default();
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let routes_store = store.clone();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let (addr, server) =
                    warp::serve(routes(routes_store)).bind_ephemeral(([127, 0, 0, 1], 0));
                addr_tx.send(addr).unwrap();
                tokio::select! {
                    () = server => {}
                    _ = shutdown_rx => {}
                }
            });
        });

        let addr = addr_rx.recv().unwrap();
        Self {
            addr,
            store,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    /// Base URL of the backend.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a template available with the given checksum.
    pub fn set_template(&self, path: &str, checksum: &str) {
        self.lock().templates.insert(path.to_string(), checksum.to_string());
    }

    /// Make generation for `target` fail with a 500.
    pub fn fail_generate(&self, target: &str) {
        self.lock().failing.insert(target.to_string());
    }

    /// Delete an artifact out of band.
    pub fn remove_artifact(&self, target: &str) {
        self.lock().artifacts.remove(target);
    }

    /// Checksum and generation of the artifact at `target`.
    pub fn artifact(&self, target: &str) -> Option<(String, String)> {
        self.lock()
            .artifacts
            .get(target)
            .map(|a| (a.checksum.clone(), a.generation.clone()))
    }

    pub fn artifact_count(&self) -> usize {
        self.lock().artifacts.len()
    }

    /// Requests received, as `"<METHOD> <path> <subject>"`.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Number of `POST /generate` requests received.
    pub fn generate_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with("POST /generate"))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = DefaultHasher::new();
    parts.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn text(status: StatusCode, body: String) -> Response {
    reply::with_status(body, status).into_response()
}

fn routes(store: Shared) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let with_store = warp::any().map(move || store.clone());

    let generate = warp::path("generate")
        .and(warp::post())
        .and(with_store.clone())
        .and(warp::body::json())
        .map(|store: Shared, body: Value| handle_generate(&store, &body));

    let status = warp::path("status")
        .and(warp::get())
        .and(with_store.clone())
        .and(warp::query::<HashMap<String, String>>())
        .map(|store: Shared, query: HashMap<String, String>| {
            let target = query.get("target_gcs_path").cloned().unwrap_or_default();
            let mut store = store.lock().unwrap();
            store.requests.push(format!("GET /status {target}"));
            match store.artifacts.get(&target) {
                Some(a) => reply::json(&json!({"checksum": a.checksum, "generation": a.generation}))
                    .into_response(),
                None => text(StatusCode::NOT_FOUND, format!("file {target} not found")),
            }
        });

    let template_status = warp::path("template-status")
        .and(warp::get())
        .and(with_store.clone())
        .and(warp::query::<HashMap<String, String>>())
        .map(|store: Shared, query: HashMap<String, String>| {
            let path = query.get("template_gcs_path").cloned().unwrap_or_default();
            let mut store = store.lock().unwrap();
            store.requests.push(format!("GET /template-status {path}"));
            match store.templates.get(&path) {
                Some(checksum) => reply::json(&json!({
                    "checksum": checksum,
                    "last_modified": "2024-01-01T00:00:00Z",
                    "generation": "1",
                    "exists": true
                }))
                .into_response(),
                None => text(StatusCode::NOT_FOUND, format!("template {path} not found")),
            }
        });

    let delete = warp::path("delete")
        .and(warp::post())
        .and(with_store)
        .and(warp::body::json())
        .map(|store: Shared, body: Value| {
            let target = body["target_gcs_path"].as_str().unwrap_or_default().to_string();
            let mut store = store.lock().unwrap();
            store.requests.push(format!("POST /delete {target}"));
            match store.artifacts.remove(&target) {
                Some(_) => reply::json(&json!({"deleted": target})).into_response(),
                None => text(StatusCode::NOT_FOUND, format!("file {target} not found")),
            }
        });

    generate
        .or(status)
        .unify()
        .or(template_status)
        .unify()
        .or(delete)
        .unify()
}

fn handle_generate(store: &Shared, body: &Value) -> Response {
    let target = body["target_gcs_path"].as_str().unwrap_or_default().to_string();
    let context = body["context_json"].as_str().unwrap_or_default();

    let mut store = store.lock().unwrap();
    store.requests.push(format!("POST /generate {target}"));

    if store.failing.contains(&target) {
        return text(StatusCode::INTERNAL_SERVER_ERROR, "render failed".to_string());
    }

    let source = match body["template_gcs_path"].as_str() {
        Some(path) => match store.templates.get(path) {
            Some(checksum) => checksum.clone(),
            None => return text(StatusCode::BAD_REQUEST, format!("template {path} not found")),
        },
        None => body["template_content"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    };

    let checksum = fingerprint(&[&source, context]);
    store.next_generation += 1;
    let generation = store.next_generation.to_string();
    store.artifacts.insert(
        target,
        StoredArtifact {
            checksum: checksum.clone(),
            generation: generation.clone(),
        },
    );

    reply::json(&json!({"checksum": checksum, "generation": generation})).into_response()
}
