//! Construction of artifact services per connection

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tmplgen_client::config::DEFAULT_TIMEOUT;
use tmplgen_client::{ArtifactService, ClientConfig, HttpArtifactService};

use crate::resource::Connection;
use crate::{Error, Result};

/// Provides the artifact service a resource's connection points at
pub trait ServiceFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns a configuration error when no service can be built for the
    /// connection (e.g. an invalid endpoint URL).
    fn service_for(&self, connection: &Connection) -> Result<Arc<dyn ArtifactService>>;
}

/// Builds one HTTP client per distinct connection and reuses it
///
/// Token sources are resolved when a client is built, so reuse also means
/// credentials are discovered once per connection.
pub struct HttpServiceFactory {
    timeout: Duration,
    clients: Mutex<HashMap<Connection, Arc<dyn ArtifactService>>>,
}

impl Default for HttpServiceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpServiceFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl ServiceFactory for HttpServiceFactory {
    fn service_for(&self, connection: &Connection) -> Result<Arc<dyn ArtifactService>> {
        let mut clients = self.clients.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(client) = clients.get(connection) {
            return Ok(client.clone());
        }

        let config = ClientConfig::new(connection.backend_endpoint.clone(), connection.auth)
            .with_timeout(self.timeout);
        let client: Arc<dyn ArtifactService> = Arc::new(
            HttpArtifactService::new(&config).map_err(|e| Error::config(e.to_string()))?,
        );
        clients.insert(connection.clone(), client.clone());
        Ok(client)
    }
}
