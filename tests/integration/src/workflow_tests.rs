//! Workflow tests
//!
//! Drive the full stack (manifest resolution, ApplyEngine, Reconciler, HTTP
//! client) against in-process fake backends across several cycles.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tmplgen_client::{AuthMode, ClientConfig, HttpArtifactService};
use tmplgen_core::{
    Action, ApplyEngine, CancellationToken, ConfigResolver, DeclaredInput, HttpServiceFactory,
    Lifecycle, ReadOutcome, Reconciler, RegenerateReason, ResolvedConfig, StateLedger,
};
use tmplgen_test_utils::{FakeBackend, TestProject};

fn engine() -> ApplyEngine {
    ApplyEngine::new(Arc::new(HttpServiceFactory::new(Duration::from_secs(5))))
}

fn resolve(project: &TestProject) -> ResolvedConfig {
    ConfigResolver::new(project.manifest_path())
        .resolve()
        .unwrap()
}

fn reconciler_for(backend: &FakeBackend) -> Reconciler {
    let config = ClientConfig::new(backend.url(), AuthMode::None);
    Reconciler::new(Arc::new(HttpArtifactService::new(&config).unwrap()))
}

/// One artifact through create, no-op, template change, relocation, drift, and delete
#[tokio::test]
async fn single_resource_lifecycle() {
    let backend = FakeBackend::start();
    backend.set_template("gs://t/a.tpl", "f1");
    let reconciler = reconciler_for(&backend);
    let cancel = CancellationToken::new();

    let input = DeclaredInput::remote("gs://t/a.tpl", "gs://o/a.yaml", r#"{"x":1}"#);
    let created = reconciler.create(&input, &cancel).await.unwrap();
    assert_eq!(created.state.id, "gs://o/a.yaml");
    assert_eq!(created.state.observed.template_checksum, "f1");

    let unchanged = reconciler
        .update(&created.state, &input, &cancel)
        .await
        .unwrap();
    assert_eq!(unchanged.action, Action::NoOp);
    assert_eq!(unchanged.state, created.state);

    backend.set_template("gs://t/a.tpl", "f2");
    let regenerated = reconciler
        .update(&unchanged.state, &input, &cancel)
        .await
        .unwrap();
    assert_eq!(
        regenerated.action,
        Action::Regenerate {
            reason: RegenerateReason::TemplateChanged
        }
    );
    assert_ne!(
        regenerated.state.observed.artifact_generation,
        created.state.observed.artifact_generation
    );

    let moved_input = DeclaredInput::remote("gs://t/a.tpl", "gs://o/b.yaml", r#"{"x":1}"#);
    let moved = reconciler
        .update(&regenerated.state, &moved_input, &cancel)
        .await
        .unwrap();
    assert_eq!(moved.state.id, "gs://o/b.yaml");
    assert!(backend.artifact("gs://o/a.yaml").is_none());
    assert!(backend.artifact("gs://o/b.yaml").is_some());

    backend.remove_artifact("gs://o/b.yaml");
    let outcome = reconciler.read(&moved.state, &cancel).await.unwrap();
    assert!(matches!(outcome, ReadOutcome::Vanished { .. }));

    let recreated = reconciler.create(&moved_input, &cancel).await.unwrap();
    reconciler.delete(&recreated.state, &cancel).await.unwrap();
    assert_eq!(backend.artifact_count(), 0);
}

#[tokio::test]
async fn local_override_redirects_backend() {
    let backend = FakeBackend::start();
    backend.set_template("gs://t/orders.j2", "t1");
    let project = TestProject::new();
    project.write_remote_manifest(
        "http://127.0.0.1:1",
        &[("orders", "gs://t/orders.j2", "gs://o/orders.py")],
    );
    project.write_file(
        "tmplgen.local.toml",
        &format!("[backend]\nendpoint = \"{}\"\n", backend.url()),
    );

    let mut ledger = StateLedger::new();
    let report = engine()
        .apply(&resolve(&project), &mut ledger, &CancellationToken::new())
        .await;

    assert!(report.success, "errors: {:?}", report.errors);
    assert!(backend.artifact("gs://o/orders.py").is_some());
    assert_eq!(
        ledger.get("orders").unwrap().state.connection().backend_endpoint,
        backend.url()
    );
}

#[tokio::test]
async fn template_file_edits_regenerate() {
    let backend = FakeBackend::start();
    let project = TestProject::new();
    project.write_file("templates/report.j2", "Report for {{ team }}\n");
    project.write_manifest(&format!(
        r#"
[backend]
endpoint = "{}"

[resources.report]
template_file = "templates/report.j2"
target = "gs://o/report.txt"
context = {{ team = "data" }}
"#,
        backend.url()
    ));
    let engine = engine();
    let cancel = CancellationToken::new();
    let mut ledger = StateLedger::new();

    engine.apply(&resolve(&project), &mut ledger, &cancel).await;
    let first = backend.artifact("gs://o/report.txt").unwrap();

    let report = engine.apply(&resolve(&project), &mut ledger, &cancel).await;
    assert_eq!(report.changes[0].action, Action::NoOp);

    project.write_file("templates/report.j2", "Weekly report for {{ team }}\n");
    let report = engine.apply(&resolve(&project), &mut ledger, &cancel).await;

    assert_eq!(
        report.changes[0].action,
        Action::Regenerate {
            reason: RegenerateReason::InputsChanged
        }
    );
    assert_ne!(backend.artifact("gs://o/report.txt").unwrap().0, first.0);
    assert!(
        backend
            .requests()
            .iter()
            .all(|r| !r.starts_with("GET /template-status"))
    );
}

#[tokio::test]
async fn context_edits_regenerate_remote_templates() {
    let backend = FakeBackend::start();
    backend.set_template("gs://t/dag.j2", "t1");
    let project = TestProject::new();
    let manifest = |schedule: &str| {
        format!(
            r#"
[backend]
endpoint = "{}"

[resources.dag]
template_path = "gs://t/dag.j2"
target = "gs://o/dag.py"
context = {{ schedule = "{}", owner = "data" }}
"#,
            backend.url(),
            schedule
        )
    };
    let engine = engine();
    let cancel = CancellationToken::new();
    let mut ledger = StateLedger::new();

    project.write_manifest(&manifest("@daily"));
    engine.apply(&resolve(&project), &mut ledger, &cancel).await;
    assert_eq!(
        ledger.get("dag").unwrap().state.input.context,
        r#"{"owner":"data","schedule":"@daily"}"#
    );

    project.write_manifest(&manifest("@hourly"));
    let report = engine.apply(&resolve(&project), &mut ledger, &cancel).await;

    assert_eq!(
        report.changes[0].action,
        Action::Regenerate {
            reason: RegenerateReason::InputsChanged
        }
    );
    assert_eq!(backend.generate_count(), 2);
}

#[tokio::test]
async fn resources_reach_their_own_backends() {
    let primary = FakeBackend::start();
    let secondary = FakeBackend::start();
    primary.set_template("gs://t/a.j2", "a1");
    secondary.set_template("gs://t/b.j2", "b1");
    let project = TestProject::new();
    project.write_manifest(&format!(
        r#"
[backend]
endpoint = "{}"

[resources.a]
template_path = "gs://t/a.j2"
target = "gs://o/a.py"

[resources.b]
template_path = "gs://t/b.j2"
target = "gs://o/b.py"
endpoint = "{}"
"#,
        primary.url(),
        secondary.url()
    ));

    let mut ledger = StateLedger::new();
    let report = engine()
        .apply(&resolve(&project), &mut ledger, &CancellationToken::new())
        .await;

    assert!(report.success, "errors: {:?}", report.errors);
    assert!(primary.artifact("gs://o/a.py").is_some());
    assert!(primary.artifact("gs://o/b.py").is_none());
    assert!(secondary.artifact("gs://o/b.py").is_some());
}

#[tokio::test]
async fn many_resources_with_bounded_parallelism() {
    let backend = FakeBackend::start();
    backend.set_template("gs://t/shared.j2", "s1");
    let project = TestProject::new();
    let names: Vec<String> = (0..12).map(|i| format!("r{:02}", i)).collect();
    let targets: Vec<String> = names.iter().map(|n| format!("gs://o/{}.py", n)).collect();
    let resources: Vec<(&str, &str, &str)> = names
        .iter()
        .zip(&targets)
        .map(|(n, t)| (n.as_str(), "gs://t/shared.j2", t.as_str()))
        .collect();
    project.write_remote_manifest(&backend.url(), &resources);

    let mut ledger = StateLedger::new();
    let report = engine()
        .with_max_parallel(3)
        .apply(&resolve(&project), &mut ledger, &CancellationToken::new())
        .await;

    assert!(report.success);
    assert_eq!(backend.artifact_count(), 12);
    let reported: Vec<&str> = report.changes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(reported, names.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(ledger.len(), 12);
}
