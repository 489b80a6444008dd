mod common;

use common::{loaded_report, RecordingStore, ScriptedRequester};
use report_extract::error::{AppError, PreconditionError};
use report_extract::{
    ExtractedReport, ExtractionSettings, ExtractionState, FieldKey, ReportOrchestrator,
    ReportStore, RunOutcome,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type TestOrchestrator = ReportOrchestrator<Arc<ScriptedRequester>, Arc<RecordingStore>>;

fn orchestrator(
    requester: ScriptedRequester,
    store: RecordingStore,
    settings: ExtractionSettings,
) -> (TestOrchestrator, Arc<ScriptedRequester>, Arc<RecordingStore>) {
    let requester = Arc::new(requester);
    let store = Arc::new(store);
    let orchestrator = ReportOrchestrator::new(requester.clone(), store.clone(), settings);
    (orchestrator, requester, store)
}

fn ignore(_: ExtractionState) {}

fn abc123_requester() -> ScriptedRequester {
    ScriptedRequester::new()
        .answer(
            FieldKey::Goals,
            json!([{ "id": 1, "description": "Reduce nitrogen", "completionRate": "80%" }]),
        )
        .answer(FieldKey::Bmps, json!([{ "name": "Buffer strip" }]))
}

#[tokio::test]
async fn test_extracts_goals_and_bmps_into_loaded_report() {
    let (orchestrator, requester, store) = orchestrator(
        abc123_requester(),
        RecordingStore::new(),
        ExtractionSettings::immediate(),
    );

    let outcome = orchestrator
        .run(ExtractedReport::skeleton("abc123"), &ignore)
        .await
        .unwrap();

    let RunOutcome::Completed { report, stats } = outcome else {
        panic!("expected a completed run");
    };
    assert!(report.is_loaded);
    assert_eq!(report.goals.len(), 1);
    assert_eq!(report.goals[0]["description"], "Reduce nitrogen");
    assert_eq!(report.bmps[0]["name"], "Buffer strip");
    assert!(report.pollutants.is_empty());
    assert_eq!(report.identity, ExtractedReport::skeleton("abc123").identity);
    assert_eq!(report.summary.total_goals, 1);
    assert_eq!(report.summary.total_bmps, 1);
    assert_eq!(report.summary.completion_rate, 80);
    assert_eq!(stats.filled, 2);
    assert_eq!(stats.failed, 6);

    assert_eq!(requester.calls(), 8);
    assert_eq!(requester.order(), FieldKey::ALL.to_vec());
    assert_eq!(store.writes(), 1);

    let stored = store.get("abc123").await.unwrap().unwrap();
    assert_eq!(stored, report);
}

#[tokio::test]
async fn test_loaded_report_is_a_no_op() {
    let (orchestrator, requester, store) = orchestrator(
        abc123_requester(),
        RecordingStore::new(),
        ExtractionSettings::immediate(),
    );
    let states = Mutex::new(Vec::new());

    let report = loaded_report("done-1");
    let outcome = orchestrator
        .run(report.clone(), &|state: ExtractionState| states.lock().unwrap().push(state))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::AlreadyLoaded(report));
    assert_eq!(requester.calls(), 0);
    assert_eq!(store.writes(), 0);
    assert_eq!(*states.lock().unwrap(), vec![ExtractionState::Done]);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_hundred() {
    let (orchestrator, _, _) = orchestrator(
        abc123_requester(),
        RecordingStore::new(),
        ExtractionSettings::immediate(),
    );
    let states = Mutex::new(Vec::new());

    orchestrator
        .run(ExtractedReport::skeleton("abc123"), &|state: ExtractionState| {
            states.lock().unwrap().push(state)
        })
        .await
        .unwrap();

    let states = states.into_inner().unwrap();
    assert_eq!(states.first(), Some(&ExtractionState::Idle));
    assert_eq!(
        &states[states.len() - 2..],
        &[ExtractionState::Finalizing, ExtractionState::Done]
    );

    let progress: Vec<u8> = states
        .iter()
        .filter_map(|state| match state {
            ExtractionState::Extracting { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last(), Some(&100));

    // 每个字段在请求前后各报告一次
    let steps: Vec<FieldKey> = states
        .iter()
        .filter_map(|state| match state {
            ExtractionState::Extracting { key, .. } => Some(*key),
            _ => None,
        })
        .collect();
    let expected: Vec<FieldKey> = FieldKey::ALL.iter().flat_map(|&key| [key, key]).collect();
    assert_eq!(steps, expected);
}

#[tokio::test]
async fn test_failed_fields_keep_previous_values() {
    let requester = ScriptedRequester::new()
        .answer(FieldKey::Identity, json!({ "huc": "07080205", "basinName": "Middle Cedar" }))
        .answer(FieldKey::Pollutants, json!({ "not": "an array" }))
        .answer(FieldKey::Bmps, json!([{ "name": "Cover crops" }]));
    let (orchestrator, _, _) =
        orchestrator(requester, RecordingStore::new(), ExtractionSettings::immediate());

    let mut seed = ExtractedReport::skeleton("r-2");
    seed.pollutants = vec![json!({ "name": "Phosphorus" })];
    seed.goals = vec![json!({ "description": "Keep me" })];

    let outcome = orchestrator.run(seed, &ignore).await.unwrap();
    let report = outcome.report().unwrap();

    assert!(report.is_loaded);
    assert_eq!(report.identity["huc"], "07080205");
    assert_eq!(report.pollutants.len(), 1);
    assert_eq!(report.pollutants[0]["name"], "Phosphorus");
    assert_eq!(report.goals[0]["description"], "Keep me");
    assert_eq!(report.bmps[0]["name"], "Cover crops");
    assert_eq!(report.summary.total_goals, 1);
    assert_eq!(report.summary.completion_rate, 0);
}

#[tokio::test]
async fn test_loosely_typed_answers_are_kept_whole() {
    let requester = ScriptedRequester::new()
        .answer(FieldKey::Identity, json!({ "huc": 7080205, "planYear": "2019" }))
        .answer(
            FieldKey::Goals,
            json!([
                {
                    "id": 1,
                    "description": "Reduce nitrogen",
                    "completionRate": "80%",
                    "relatedPollutants": "nitrogen"
                },
                { "id": 2, "description": "Restore riparian buffers", "completionRate": "Complete" }
            ]),
        )
        .answer(FieldKey::Bmps, json!([{ "name": "Buffer strip", "sizeUnits": 5 }]))
        .answer(FieldKey::Pollutants, json!(["Nitrogen", "Phosphorus"]));
    let (orchestrator, _, store) =
        orchestrator(requester, RecordingStore::new(), ExtractionSettings::immediate());

    let outcome = orchestrator
        .run(ExtractedReport::skeleton("mixed"), &ignore)
        .await
        .unwrap();
    let RunOutcome::Completed { report, stats } = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(report.identity["huc"], 7080205);
    assert_eq!(report.goals.len(), 2);
    assert_eq!(report.goals[0]["relatedPollutants"], "nitrogen");
    assert_eq!(report.bmps.len(), 1);
    assert_eq!(report.bmps[0]["sizeUnits"], 5);
    assert_eq!(report.pollutants, vec![json!("Nitrogen"), json!("Phosphorus")]);
    assert_eq!(report.summary.total_goals, 2);
    assert_eq!(report.summary.total_bmps, 1);
    assert_eq!(report.summary.completion_rate, 90);
    assert_eq!(stats.filled, 4);
    assert_eq!(stats.failed, 4);
    assert_eq!(store.get("mixed").await.unwrap(), Some(report));
}

#[tokio::test]
async fn test_every_field_failing_still_finalizes() {
    let (orchestrator, requester, store) = orchestrator(
        ScriptedRequester::new(),
        RecordingStore::new(),
        ExtractionSettings::immediate(),
    );

    let outcome = orchestrator
        .run(ExtractedReport::skeleton("empty"), &ignore)
        .await
        .unwrap();
    let report = outcome.report().unwrap();

    assert!(report.is_loaded);
    assert_eq!(report.summary, Default::default());
    assert_eq!(requester.calls(), 8);
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn test_empty_id_is_rejected_without_requests() {
    let (orchestrator, requester, store) = orchestrator(
        abc123_requester(),
        RecordingStore::new(),
        ExtractionSettings::immediate(),
    );

    let err = orchestrator
        .run(ExtractedReport::skeleton("  "), &ignore)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Precondition(PreconditionError::MissingReportId)
    ));
    assert_eq!(requester.calls(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_store_failure_is_surfaced_and_not_marked_loaded() {
    let (orchestrator, requester, store) = orchestrator(
        abc123_requester(),
        RecordingStore::failing(),
        ExtractionSettings::immediate(),
    );
    let states = Mutex::new(Vec::new());

    let err = orchestrator
        .run(ExtractedReport::skeleton("abc123"), &|state: ExtractionState| {
            states.lock().unwrap().push(state)
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(requester.calls(), 8);
    assert_eq!(store.writes(), 1);
    assert!(store.get("abc123").await.unwrap().is_none());
    assert!(!states.lock().unwrap().contains(&ExtractionState::Done));
    assert!(!orchestrator.is_in_flight("abc123"));
}

#[tokio::test]
async fn test_concurrent_run_for_same_id_is_in_flight() {
    let requester = abc123_requester().delay(Duration::from_millis(10));
    let (orchestrator, requester, store) =
        orchestrator(requester, RecordingStore::new(), ExtractionSettings::immediate());

    let (first, second) = tokio::join!(
        orchestrator.run(ExtractedReport::skeleton("abc123"), &ignore),
        orchestrator.run(ExtractedReport::skeleton("abc123"), &ignore),
    );

    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, RunOutcome::Completed { .. }))
            .count(),
        1
    );
    assert!(outcomes.contains(&RunOutcome::InFlight));
    assert_eq!(requester.calls(), 8);
    assert_eq!(store.writes(), 1);
    assert!(!orchestrator.is_in_flight("abc123"));
}

#[tokio::test]
async fn test_batches_keep_order_and_report_first_key() {
    let settings = ExtractionSettings {
        batch_size: 3,
        ..ExtractionSettings::immediate()
    };
    let (orchestrator, requester, store) =
        orchestrator(abc123_requester(), RecordingStore::new(), settings);
    let states = Mutex::new(Vec::new());

    let outcome = orchestrator
        .run(ExtractedReport::skeleton("abc123"), &|state: ExtractionState| {
            states.lock().unwrap().push(state)
        })
        .await
        .unwrap();

    assert_eq!(outcome.report().unwrap().summary.completion_rate, 80);
    assert_eq!(requester.calls(), 8);
    assert_eq!(requester.order(), FieldKey::ALL.to_vec());
    assert_eq!(store.writes(), 1);

    let states = states.into_inner().unwrap();
    for (key, progress) in [
        (FieldKey::Identity, 0),
        (FieldKey::Bmps, 38),
        (FieldKey::OutreachActivities, 75),
    ] {
        assert!(states.contains(&ExtractionState::Extracting { key, progress }));
    }
}

#[tokio::test]
async fn test_delay_is_applied_between_requests_only() {
    let settings = ExtractionSettings {
        ask_delay: Duration::from_millis(20),
        ..ExtractionSettings::immediate()
    };
    let (orchestrator, _, _) = orchestrator(abc123_requester(), RecordingStore::new(), settings);

    let started = Instant::now();
    orchestrator
        .run(ExtractedReport::skeleton("abc123"), &ignore)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(7 * 20));
}
