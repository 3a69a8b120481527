//! Pipeline runs persisted through the JSON file store

use chrono::NaiveDate;
use meridian::adapters::source::read_csv;
use meridian::adapters::storage::{load_snapshot, JsonFileStore, WarehouseStore};
use meridian::config::MeridianConfig;
use meridian::core::pipeline::PipelineCoordinator;
use meridian::core::state::StateManager;
use meridian::domain::{BatchId, WarehouseError};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

const CSV: &str = "\
Name,Age,Gender,Blood Type,Medical Condition,Date of Admission,Doctor,Hospital,Insurance Provider,Billing Amount,Room Number,Admission Type,Discharge Date,Medication,Test Results
Bobby JacksOn,30,Male,B-,Cancer,2024-01-31,Matthew Smith,Sons and Miller,Blue Cross,18856.28,328,Urgent,2024-02-02,Paracetamol,Normal
LesLie TErRy,62,Male,A+,Obesity,2019-08-20,Samantha Davies,Kim Inc,Medicare,33643.33,265,Emergency,2019-08-26,Ibuprofen,Inconclusive
DaNnY sMitH,76,Female,A-,Obesity,2022-09-22,Tiffany Mitchell,Cook PLC,Aetna,27955.10,205,Emergency,2022-10-07,Aspirin,Normal
";

fn coordinator(root: &std::path::Path) -> PipelineCoordinator {
    let store = Arc::new(JsonFileStore::new(root));
    let state = Arc::new(StateManager::new_with_storage(store));
    let (_tx, rx) = watch::channel(false);
    PipelineCoordinator::with_state_manager(&MeridianConfig::default(), state, rx).unwrap()
}

#[tokio::test]
async fn test_tables_survive_a_new_store() {
    let dir = TempDir::new().unwrap();
    let records = read_csv(CSV.as_bytes()).unwrap();
    assert_eq!(records.len(), 3);

    let report = coordinator(dir.path())
        .execute_run(
            BatchId::new("csv-1").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            records,
        )
        .await
        .unwrap();
    assert!(report.is_successful(), "{}", report.format_summary());
    assert_eq!(report.facts.inserted, 3);

    for table in ["fact_encounter", "dim_patient", "dim_facility", "dim_date", "runs"] {
        assert!(
            dir.path().join(format!("{table}.json")).exists(),
            "missing {table}.json"
        );
    }

    let reopened = JsonFileStore::new(dir.path());
    let snapshot = load_snapshot(&reopened).await.unwrap();
    assert_eq!(snapshot.facts().len(), 3);
    assert_eq!(snapshot.current_patients().count(), 3);

    let runs = reopened.list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].fact_rows_changed, 3);
}

#[tokio::test]
async fn test_replay_from_disk_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

    coordinator(dir.path())
        .execute_run(BatchId::new("csv-1").unwrap(), as_of, read_csv(CSV.as_bytes()).unwrap())
        .await
        .unwrap();
    let facts_before = std::fs::read_to_string(dir.path().join("fact_encounter.json")).unwrap();

    let replay = coordinator(dir.path())
        .execute_run(BatchId::new("csv-2").unwrap(), as_of, read_csv(CSV.as_bytes()).unwrap())
        .await
        .unwrap();
    assert_eq!(replay.fact_rows_changed(), 0);

    let facts_after = std::fs::read_to_string(dir.path().join("fact_encounter.json")).unwrap();
    assert_eq!(facts_before, facts_after);
}

#[tokio::test]
async fn test_corrupt_table_fails_the_run() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fact_encounter.json"), "{ not json").unwrap();

    let err = coordinator(dir.path())
        .execute_run(
            BatchId::new("csv-1").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            read_csv(CSV.as_bytes()).unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WarehouseError::Storage(_)));
}

#[tokio::test]
async fn test_short_row_is_rejected_without_failing_the_batch() {
    let dir = TempDir::new().unwrap();
    let input = format!("{CSV}Ann Lee,40\n");

    let records = read_csv(input.as_bytes()).unwrap();
    assert_eq!(records.len(), 4);

    let report = coordinator(dir.path())
        .execute_run(
            BatchId::new("csv-1").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            records,
        )
        .await
        .unwrap();

    assert!(report.is_successful(), "{}", report.format_summary());
    assert_eq!(report.rows_rejected(), 1);
    assert_eq!(report.rejections[0].source_row, 4);
    assert_eq!(report.facts.inserted, 3);
}
