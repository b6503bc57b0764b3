//! Lifecycle behavior of the Reconciler against a scripted artifact service

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tmplgen_core::{
    Action, CancellationToken, DeclaredInput, Error, Lifecycle, ObservedOutput, Operation,
    ReadOutcome, Reconciler, RegenerateReason, ResourceState, ValidationError,
};
use tmplgen_test_utils::mock::{
    Call, MockArtifactService, artifact, backend_error, not_found, template,
};

const TEMPLATE: &str = "gs://t/dag.py.j2";
const TARGET: &str = "gs://o/dag.py";
const CONTEXT: &str = r#"{"x":1}"#;

fn reconciler(mock: MockArtifactService) -> (Reconciler, Arc<MockArtifactService>) {
    let mock = Arc::new(mock);
    (Reconciler::new(mock.clone()), mock)
}

fn tracked(input: DeclaredInput, artifact: &str, template: &str) -> ResourceState {
    ResourceState {
        id: input.target.clone(),
        input,
        observed: ObservedOutput {
            artifact_checksum: artifact.to_string(),
            artifact_generation: "1".to_string(),
            template_checksum: template.to_string(),
        },
    }
}

#[tokio::test]
async fn create_records_artifact_and_template_fingerprints() {
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_generate(Ok(artifact("c1", "1")))
            .on_template_status(Ok(template("t1"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);

    let applied = reconciler
        .create(&input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.action, Action::Create);
    assert_eq!(applied.state.id, TARGET);
    assert_eq!(
        applied.state.observed,
        ObservedOutput {
            artifact_checksum: "c1".to_string(),
            artifact_generation: "1".to_string(),
            template_checksum: "t1".to_string(),
        }
    );
    assert!(applied.diagnostics.is_empty());

    let calls = mock.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        Call::Generate(request) => {
            assert_eq!(request.template_path.as_deref(), Some(TEMPLATE));
            assert_eq!(request.template_content, None);
            assert_eq!(request.target, TARGET);
            assert_eq!(request.context, CONTEXT);
        }
        other => panic!("expected generate first, got {other:?}"),
    }
    assert_eq!(calls[1], Call::GetTemplateStatus(TEMPLATE.to_string()));
}

#[tokio::test]
async fn create_end_to_end_records_backend_output() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new()
            .on_generate(Ok(artifact("c1", "1")))
            .on_template_status(Ok(template("f1"))),
    );
    let input = DeclaredInput::remote("gs://t/a.tpl", "gs://o/a.yaml", r#"{"x":1}"#);

    let applied = reconciler
        .create(&input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.state.id, "gs://o/a.yaml");
    assert_eq!(applied.state.observed.artifact_checksum, "c1");
    assert_eq!(applied.state.observed.artifact_generation, "1");
    assert_eq!(applied.state.input, input);
}

#[tokio::test]
async fn create_with_inline_content_skips_template_status() {
    let (reconciler, mock) =
        reconciler(MockArtifactService::new().on_generate(Ok(artifact("c1", "7"))));
    let input = DeclaredInput::inline("hello {{ x }}", TARGET, CONTEXT);

    let applied = reconciler
        .create(&input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.state.observed.template_checksum, "");
    assert_eq!(applied.state.observed.artifact_generation, "7");
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn create_survives_template_status_failure_with_warning() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new()
            .on_generate(Ok(artifact("c1", "1")))
            .on_template_status(Err(backend_error(503, "unavailable"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);

    let applied = reconciler
        .create(&input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.state.observed.artifact_checksum, "c1");
    assert_eq!(applied.state.observed.template_checksum, "");
    assert_eq!(applied.diagnostics.len(), 1);
    assert_eq!(
        applied.diagnostics.warnings()[0].summary,
        "Could not get template status"
    );
}

#[tokio::test]
async fn create_failure_is_an_operation_error() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new().on_generate(Err(backend_error(500, "render failed"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);

    let err = reconciler
        .create(&input, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Operation {
            operation, target, ..
        } => {
            assert_eq!(operation, Operation::Create);
            assert_eq!(target, TARGET);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn update_is_noop_when_nothing_changed() {
    let (reconciler, mock) =
        reconciler(MockArtifactService::new().on_template_status(Ok(template("t1"))));
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(applied.action, Action::NoOp);
    assert_eq!(applied.state, prior);
    assert_eq!(mock.generate_count(), 0);
}

#[tokio::test]
async fn update_regenerates_when_template_changed() {
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_template_status(Ok(template("t2")))
            .on_generate(Ok(artifact("c2", "2")))
            .on_template_status(Ok(template("t2"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::Regenerate {
            reason: RegenerateReason::TemplateChanged
        }
    );
    assert_eq!(applied.state.observed.artifact_checksum, "c2");
    assert_eq!(applied.state.observed.template_checksum, "t2");
    assert!(mock.is_exhausted());
}

#[tokio::test]
async fn update_regenerates_when_template_status_unavailable() {
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_template_status(Err(backend_error(500, "boom")))
            .on_generate(Ok(artifact("c1", "2")))
            .on_template_status(Ok(template("t1"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::Regenerate {
            reason: RegenerateReason::TemplateStatusUnavailable
        }
    );
    assert_eq!(mock.generate_count(), 1);
    assert_eq!(
        applied.diagnostics.warnings()[0].summary,
        "Could not check template status"
    );
    assert!(
        applied.diagnostics.warnings()[0]
            .detail
            .contains("Proceeding with regeneration")
    );
}

#[tokio::test]
async fn update_regenerates_when_fingerprint_unknown() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new()
            .on_template_status(Ok(template("t1")))
            .on_generate(Ok(artifact("c1", "2")))
            .on_template_status(Ok(template("t1"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "");

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::Regenerate {
            reason: RegenerateReason::FingerprintUnknown
        }
    );
    assert_eq!(applied.state.observed.template_checksum, "t1");
}

#[tokio::test]
async fn update_inline_content_change_regenerates() {
    let (reconciler, mock) =
        reconciler(MockArtifactService::new().on_generate(Ok(artifact("c2", "2"))));
    let prior = tracked(DeclaredInput::inline("v1", TARGET, CONTEXT), "c1", "");
    let input = DeclaredInput::inline("v2", TARGET, CONTEXT);

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::Regenerate {
            reason: RegenerateReason::InputsChanged
        }
    );
    assert_eq!(applied.state.input.content(), "v2");
    assert!(
        !mock
            .calls()
            .iter()
            .any(|c| matches!(c, Call::GetTemplateStatus(_)))
    );
}

#[tokio::test]
async fn update_relocates_and_tolerates_delete_failure() {
    let new_target = "gs://o/moved.py";
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_delete(Err(backend_error(500, "nope")))
            .on_template_status(Ok(template("t1")))
            .on_generate(Ok(artifact("c1", "3")))
            .on_template_status(Ok(template("t1"))),
    );
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");
    let input = DeclaredInput::remote(TEMPLATE, new_target, CONTEXT);

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::RegenerateAndRelocate {
            from: TARGET.to_string()
        }
    );
    assert_eq!(applied.state.id, new_target);
    assert_eq!(mock.calls()[0], Call::Delete(TARGET.to_string()));
    assert_eq!(
        applied.diagnostics.warnings()[0].summary,
        "Failed to delete old file"
    );
}

#[tokio::test]
async fn update_clears_template_checksum_when_probe_fails_after_regeneration() {
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_template_status(Ok(template("t2")))
            .on_generate(Ok(artifact("c2", "2")))
            .on_template_status(Err(backend_error(503, "unavailable"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let applied = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        applied.action,
        Action::Regenerate {
            reason: RegenerateReason::TemplateChanged
        }
    );
    assert_eq!(applied.state.observed.artifact_checksum, "c2");
    assert_eq!(applied.state.observed.template_checksum, "");
    assert_eq!(applied.diagnostics.len(), 1);
    assert_eq!(
        applied.diagnostics.warnings()[0].summary,
        "Could not get template status"
    );
    assert!(mock.is_exhausted());
}

#[tokio::test]
async fn update_generate_failure_is_an_error_and_keeps_prior() {
    let (reconciler, mock) = reconciler(
        MockArtifactService::new()
            .on_template_status(Ok(template("t2")))
            .on_generate(Err(backend_error(500, "render failed"))),
    );
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");
    let snapshot = prior.clone();

    let err = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Operation {
            operation, target, ..
        } => {
            assert_eq!(operation, Operation::Update);
            assert_eq!(target, TARGET);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(prior, snapshot);
    assert_eq!(mock.generate_count(), 1);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn update_rejects_invalid_input_before_any_call() {
    let (reconciler, mock) = reconciler(MockArtifactService::new());
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");
    let mut input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    input.template_content = Some("inline".to_string());

    let err = reconciler
        .update(&prior, &input, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::TemplateSourceConflict)
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn read_refreshes_observed_output() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new()
            .on_status(Ok(artifact("c9", "9")))
            .on_template_status(Ok(template("t2"))),
    );
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

    let outcome = reconciler
        .read(&prior, &CancellationToken::new())
        .await
        .unwrap();

    let ReadOutcome::Present { state, diagnostics } = outcome else {
        panic!("expected the artifact to be present");
    };
    assert!(diagnostics.is_empty());
    assert_eq!(state.observed.artifact_checksum, "c9");
    assert_eq!(state.observed.artifact_generation, "9");
    assert_eq!(state.observed.template_checksum, "t2");
    assert_eq!(state.input, prior.input);
}

#[tokio::test]
async fn read_keeps_stale_template_checksum_when_probe_fails() {
    let (reconciler, _mock) = reconciler(
        MockArtifactService::new()
            .on_status(Ok(artifact("c1", "1")))
            .on_template_status(Err(backend_error(500, "boom"))),
    );
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

    let outcome = reconciler
        .read(&prior, &CancellationToken::new())
        .await
        .unwrap();

    let ReadOutcome::Present { state, diagnostics } = outcome else {
        panic!("expected the artifact to be present");
    };
    assert_eq!(state.observed.template_checksum, "t1");
    assert_eq!(diagnostics.len(), 1);
}

#[tokio::test]
async fn read_reports_vanished_artifact() {
    let (reconciler, _mock) =
        reconciler(MockArtifactService::new().on_status(Err(not_found(TARGET))));
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

    let outcome = reconciler
        .read(&prior, &CancellationToken::new())
        .await
        .unwrap();

    let ReadOutcome::Vanished { diagnostics } = outcome else {
        panic!("expected the artifact to have vanished");
    };
    assert_eq!(diagnostics.warnings()[0].summary, "File not found");
    assert!(diagnostics.warnings()[0].detail.contains(TARGET));
}

#[tokio::test]
async fn read_failure_other_than_not_found_is_an_error() {
    let (reconciler, _mock) =
        reconciler(MockArtifactService::new().on_status(Err(backend_error(500, "boom"))));
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

    let err = reconciler
        .read(&prior, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Operation {
            operation: Operation::Read,
            ..
        }
    ));
}

#[tokio::test]
async fn delete_failure_is_an_error() {
    let (reconciler, _mock) =
        reconciler(MockArtifactService::new().on_delete(Err(not_found(TARGET))));
    let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

    let err = reconciler
        .delete(&prior, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Operation {
            operation: Operation::Delete,
            ..
        }
    ));
}

#[tokio::test]
async fn import_then_read_populates_state() {
    let (reconciler, mock) =
        reconciler(MockArtifactService::new().on_status(Ok(artifact("c5", "5"))));
    let imported = reconciler.import(TARGET, Default::default());
    assert_eq!(imported.id, TARGET);

    let outcome = reconciler
        .read(&imported, &CancellationToken::new())
        .await
        .unwrap();

    let ReadOutcome::Present { state, .. } = outcome else {
        panic!("expected the artifact to be present");
    };
    assert_eq!(state.observed.artifact_checksum, "c5");
    assert_eq!(state.observed.template_checksum, "");
    assert_eq!(mock.calls(), vec![Call::GetStatus(TARGET.to_string())]);
}

#[tokio::test]
async fn cancelled_template_probe_aborts_update() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (reconciler, mock) = reconciler(MockArtifactService::new());
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let err = reconciler.update(&prior, &input, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(mock.generate_count(), 0);
}

#[tokio::test]
async fn plan_without_prior_is_create_and_makes_no_calls() {
    let (reconciler, mock) = reconciler(MockArtifactService::new());
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);

    let (action, diagnostics) = reconciler
        .plan(None, &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(action, Action::Create);
    assert!(diagnostics.is_empty());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn plan_with_prior_only_probes_the_template() {
    let (reconciler, mock) =
        reconciler(MockArtifactService::new().on_template_status(Ok(template("t2"))));
    let input = DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT);
    let prior = tracked(input.clone(), "c1", "t1");

    let (action, _) = reconciler
        .plan(Some(&prior), &input, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        action,
        Action::Regenerate {
            reason: RegenerateReason::TemplateChanged
        }
    );
    assert_eq!(
        mock.calls(),
        vec![Call::GetTemplateStatus(TEMPLATE.to_string())]
    );
}

fn invalid_input() -> impl Strategy<Value = DeclaredInput> {
    let blank = prop::sample::select(vec!["", " ", "\t", "  \n"]);
    let word = "[a-z]{1,8}";
    prop_oneof![
        // neither template source
        (blank.clone(), blank.clone(), word).prop_map(|(p, c, t)| DeclaredInput {
            template_path: Some(p.to_string()),
            template_content: Some(c.to_string()),
            target: format!("gs://o/{t}"),
            ..DeclaredInput::default()
        }),
        // both template sources
        (word, word, word).prop_map(|(p, c, t)| DeclaredInput {
            template_path: Some(format!("gs://t/{p}")),
            template_content: Some(c),
            target: format!("gs://o/{t}"),
            ..DeclaredInput::default()
        }),
        // blank target
        (word, blank).prop_map(|(p, t)| DeclaredInput::remote(format!("gs://t/{p}"), t, "{}")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn invalid_input_never_reaches_the_backend(input in invalid_input()) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (reconciler, mock) = reconciler(MockArtifactService::new());

        let cancel = CancellationToken::new();
        let prior = tracked(DeclaredInput::remote(TEMPLATE, TARGET, CONTEXT), "c1", "t1");

        let created = runtime.block_on(reconciler.create(&input, &cancel));
        let updated = runtime.block_on(reconciler.update(&prior, &input, &cancel));

        prop_assert!(matches!(created, Err(Error::Validation(_))));
        prop_assert!(matches!(updated, Err(Error::Validation(_))));
        prop_assert!(mock.calls().is_empty());
    }
}
