//! [`MockArtifactService`]: scripted responses and recorded calls.
//!
//! Each operation has its own response queue. A call pops the next scripted
//! response; an empty queue answers with a backend error so that unexpected
//! calls fail loudly in assertions instead of passing silently.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tmplgen_client::{
    ArtifactService, ArtifactStatus, ClientError, GenerateRequest, Result, TemplateStatus,
};
use tokio_util::sync::CancellationToken;

/// A call received by the mock, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Generate(GenerateRequest),
    GetStatus(String),
    GetTemplateStatus(String),
    Delete(String),
}

/// In-memory [`ArtifactService`] driven by scripted responses.
///
/// # Example
///
/// ```rust,no_run
/// use tmplgen_test_utils::mock::{MockArtifactService, artifact};
///
/// let mock = MockArtifactService::new().on_generate(Ok(artifact("c1", "1")));
/// assert!(mock.calls().is_empty());
/// ```
#[derive(Default)]
pub struct MockArtifactService {
    calls: Mutex<Vec<Call>>,
    generate: Mutex<VecDeque<Result<ArtifactStatus>>>,
    status: Mutex<VecDeque<Result<ArtifactStatus>>>,
    template_status: Mutex<VecDeque<Result<TemplateStatus>>>,
    delete: Mutex<VecDeque<Result<()>>>,
}

impl MockArtifactService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `generate` response.
    pub fn on_generate(self, response: Result<ArtifactStatus>) -> Self {
        self.generate.lock().unwrap().push_back(response);
        self
    }

    /// Queue the next `get_status` response.
    pub fn on_status(self, response: Result<ArtifactStatus>) -> Self {
        self.status.lock().unwrap().push_back(response);
        self
    }

    /// Queue the next `get_template_status` response.
    pub fn on_template_status(self, response: Result<TemplateStatus>) -> Self {
        self.template_status.lock().unwrap().push_back(response);
        self
    }

    /// Queue the next `delete` response.
    pub fn on_delete(self, response: Result<()>) -> Self {
        self.delete.lock().unwrap().push_back(response);
        self
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `generate` calls received.
    pub fn generate_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Generate(_)))
            .count()
    }

    /// Whether every scripted response has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.generate.lock().unwrap().is_empty()
            && self.status.lock().unwrap().is_empty()
            && self.template_status.lock().unwrap().is_empty()
            && self.delete.lock().unwrap().is_empty()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn next<T>(queue: &Mutex<VecDeque<Result<T>>>, operation: &str) -> Result<T> {
    queue.lock().unwrap().pop_front().unwrap_or_else(|| {
        Err(ClientError::Backend {
            status: 599,
            body: format!("no scripted response for {operation}"),
        })
    })
}

#[async_trait]
impl ArtifactService for MockArtifactService {
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<ArtifactStatus> {
        self.record(Call::Generate(request.clone()));
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        next(&self.generate, "generate")
    }

    async fn get_status(&self, target: &str, cancel: &CancellationToken) -> Result<ArtifactStatus> {
        self.record(Call::GetStatus(target.to_string()));
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        next(&self.status, "get_status")
    }

    async fn get_template_status(
        &self,
        template_path: &str,
        cancel: &CancellationToken,
    ) -> Result<TemplateStatus> {
        self.record(Call::GetTemplateStatus(template_path.to_string()));
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        next(&self.template_status, "get_template_status")
    }

    async fn delete(&self, target: &str, cancel: &CancellationToken) -> Result<()> {
        self.record(Call::Delete(target.to_string()));
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        next(&self.delete, "delete")
    }
}

/// An artifact status response.
pub fn artifact(checksum: &str, generation: &str) -> ArtifactStatus {
    ArtifactStatus {
        checksum: checksum.to_string(),
        generation: generation.to_string(),
    }
}

/// A template status response for an existing template.
pub fn template(checksum: &str) -> TemplateStatus {
    TemplateStatus {
        checksum: checksum.to_string(),
        last_modified: "2024-01-01T00:00:00Z".to_string(),
        generation: "1".to_string(),
        exists: true,
    }
}

/// A non-success backend response.
pub fn backend_error(status: u16, body: &str) -> ClientError {
    ClientError::Backend {
        status,
        body: body.to_string(),
    }
}

/// The backend reporting `target` absent.
pub fn not_found(target: &str) -> ClientError {
    ClientError::NotFound {
        target: target.to_string(),
    }
}
