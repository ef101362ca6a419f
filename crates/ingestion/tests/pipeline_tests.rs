//! End-to-end tests for file processing and event dispatch.
//!
//! Source objects live in an in-memory object store and tables in
//! `MemoryStore`, so no external services are needed.

use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;

use geo_common::{ObjectLocation, Stage, TableName};
use ingestion::{
    derive_table_name, DispatchConfig, EventDispatcher, Ingester, IngestionConfig,
    IngestionResult, S3Event, TaskLauncher,
};
use storage::{MemoryStore, ObjectStorage};
use test_utils::{fixtures, generators, require_test_file, TEST_BUCKET};

struct Harness {
    source: Arc<ObjectStorage>,
    store: Arc<MemoryStore>,
    ingester: Arc<Ingester>,
}

impl Harness {
    fn new(config: IngestionConfig) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    fn with_store(store: MemoryStore, config: IngestionConfig) -> Self {
        let source = Arc::new(ObjectStorage::in_memory());
        let store = Arc::new(store);
        let ingester = Arc::new(Ingester::new(source.clone(), store.clone(), config));
        Self {
            source,
            store,
            ingester,
        }
    }

    async fn upload(&self, key: &str, body: Vec<u8>) -> ObjectLocation {
        let location = ObjectLocation::new(TEST_BUCKET, key);
        self.source.put(&location, Bytes::from(body)).await.unwrap();
        location
    }
}

// ============================================================================
// Processing
// ============================================================================

#[tokio::test]
async fn test_single_point_upload() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("region/a.geojson", generators::to_bytes(&fixtures::single_point()))
        .await;

    let result = h.ingester.process_file(&location).await;

    assert_eq!(result.feature_count(), Some(1));
    assert_eq!(result.message(), "Processed 1 features");

    let table = TableName::new("geojson_region_a_geojson");
    let rows = h.store.rows(&table).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].file_source, "region/a.geojson");
    assert_eq!(rows[0].properties["name"], "San Francisco");
}

#[tokio::test]
async fn test_empty_collection_writes_nothing() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("empty.geojson", generators::to_bytes(&fixtures::empty_collection()))
        .await;

    let result = h.ingester.process_file(&location).await;

    assert_eq!(
        result,
        IngestionResult::Failure {
            stage: Stage::Validate,
            reason: "No features in collection".to_string(),
        }
    );
    assert_eq!(h.store.replacements(), 0);
    assert!(h.store.table_names().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_store_is_load_failure() {
    let h = Harness::with_store(
        MemoryStore::unreachable("connection refused"),
        IngestionConfig::default(),
    );
    let location = h
        .upload("a.geojson", generators::to_bytes(&generators::point_collection(5)))
        .await;

    match h.ingester.process_file(&location).await {
        IngestionResult::Failure { stage, reason } => {
            assert_eq!(stage, Stage::Load);
            assert!(reason.starts_with("load error: "), "{}", reason);
            assert!(reason.contains("connection refused"));
        }
        other => panic!("expected load failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_reprocessing_replaces_rows() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("repeat.geojson", generators::to_bytes(&generators::point_collection(4)))
        .await;

    let first = h.ingester.process_file(&location).await;
    let second = h.ingester.process_file(&location).await;

    assert_eq!(first.feature_count(), Some(4));
    assert_eq!(second.feature_count(), Some(4));

    let second_run = match second {
        IngestionResult::Success { processing_id, .. } => processing_id,
        other => panic!("expected success, got {:?}", other),
    };
    let rows = h.store.rows(&derive_table_name("repeat.geojson")).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.processing_id == second_run));
}

#[tokio::test]
async fn test_rows_share_run_stamp_across_chunks() {
    let h = Harness::new(IngestionConfig {
        chunk_size: 7,
        ..Default::default()
    });
    let location = h
        .upload("bulk.geojson", generators::to_bytes(&generators::point_collection(50)))
        .await;

    assert_eq!(h.ingester.process_file(&location).await.feature_count(), Some(50));

    let rows = h.store.rows(&derive_table_name("bulk.geojson")).await.unwrap();
    let runs: HashSet<_> = rows.iter().map(|r| r.processing_id).collect();
    let stamps: HashSet<_> = rows.iter().map(|r| r.processed_at).collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(stamps.len(), 1);
    assert_eq!(rows[49].feature_index, 49);
    assert_eq!(rows[49].properties["seq"], 49);
}

#[tokio::test]
async fn test_heterogeneous_properties_load() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("mixed.geojson", generators::to_bytes(&generators::heterogeneous_properties(6)))
        .await;

    assert!(h.ingester.process_file(&location).await.is_success());

    let rows = h.store.rows(&derive_table_name("mixed.geojson")).await.unwrap();
    assert_eq!(rows[1].properties["material"], "steel");
    assert_eq!(rows[2].properties["nested"]["depth"], 2);
}

#[tokio::test]
async fn test_missing_object_is_fetch_failure() {
    let h = Harness::new(IngestionConfig::default());
    let location = ObjectLocation::new(TEST_BUCKET, "nowhere.geojson");

    match h.ingester.process_file(&location).await {
        IngestionResult::Failure { stage, reason } => {
            assert_eq!(stage, Stage::Fetch);
            assert!(reason.starts_with("fetch error: "), "{}", reason);
        }
        other => panic!("expected fetch failure, got {:?}", other),
    }
    assert_eq!(h.store.replacements(), 0);
}

#[tokio::test]
async fn test_invalid_json_is_parse_failure() {
    let h = Harness::new(IngestionConfig::default());
    let location = h.upload("broken.geojson", b"{\"type\": ".to_vec()).await;

    match h.ingester.process_file(&location).await {
        IngestionResult::Failure { stage, reason } => {
            assert_eq!(stage, Stage::Parse);
            assert!(reason.starts_with("invalid JSON: "), "{}", reason);
        }
        other => panic!("expected parse failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validation_failure_reports_feature_index() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload(
            "orphan.geojson",
            generators::to_bytes(&fixtures::missing_geometry_at_index_2()),
        )
        .await;

    let result = h.ingester.process_file(&location).await;
    assert_eq!(result.message(), "Feature 2 missing geometry");
    assert_eq!(h.store.replacements(), 0);
}

#[tokio::test]
async fn test_bare_feature_is_rejected() {
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("feature.geojson", generators::to_bytes(&fixtures::bare_feature()))
        .await;

    assert_eq!(
        h.ingester.process_file(&location).await.message(),
        "Must be a FeatureCollection"
    );
}

#[tokio::test]
async fn test_sample_file() {
    let path = require_test_file!("sample.geojson");
    let h = Harness::new(IngestionConfig::default());
    let location = h
        .upload("samples/nyc-sample.geojson", std::fs::read(path).unwrap())
        .await;

    let result = h.ingester.process_file(&location).await;
    assert_eq!(result.feature_count(), Some(4));

    let rows = h
        .store
        .rows(&TableName::new("geojson_samples_nyc_sample_geojson"))
        .await
        .unwrap();
    assert_eq!(rows[0].feature_id.as_deref(), Some("station-001"));
    assert!(rows[3].geometry.is_null());
    assert_eq!(rows[3].properties["note"], "location withheld");
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_batch_dispatch_runs_only_geojson() {
    let h = Harness::new(IngestionConfig::default());
    h.upload("one.geojson", generators::to_bytes(&generators::point_collection(2)))
        .await;
    h.upload("three.geojson", generators::to_bytes(&fixtures::mixed_geometries()))
        .await;

    let launcher = Arc::new(TaskLauncher::new(h.ingester.clone()));
    let dispatcher = EventDispatcher::new(launcher.clone(), DispatchConfig::default());

    let event: S3Event = serde_json::from_value(generators::s3_event(
        TEST_BUCKET,
        &["one.geojson", "two.txt", "three.geojson"],
    ))
    .unwrap();
    let report = dispatcher.dispatch(event.into_notifications()).await;

    assert_eq!(report.received, 3);
    assert_eq!(report.dispatched_count(), 2);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.skipped[0].key, "two.txt");

    let results: Vec<IngestionResult> = launcher
        .join_all()
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(IngestionResult::is_success));
    assert_eq!(h.store.replacements(), 2);
    assert_eq!(launcher.pending().await, 0);
}

#[tokio::test]
async fn test_dispatch_decodes_keys_before_processing() {
    let h = Harness::new(IngestionConfig::default());
    h.upload("my uploads/field notes.geojson", generators::to_bytes(&fixtures::single_point()))
        .await;

    let launcher = Arc::new(TaskLauncher::new(h.ingester.clone()));
    let dispatcher = EventDispatcher::new(launcher.clone(), DispatchConfig::default());

    let event: S3Event = serde_json::from_value(generators::s3_event(
        TEST_BUCKET,
        &["my+uploads/field%20notes.geojson", "backups/old.geojson"],
    ))
    .unwrap();
    let report = dispatcher.dispatch(event.into_notifications()).await;

    assert_eq!(report.dispatched[0].key, "my uploads/field notes.geojson");
    assert_eq!(report.skipped[0].message, "File in system folder: backups");

    let results = launcher.join_all().await;
    assert!(results[0].as_ref().unwrap().is_success());
    assert!(h
        .store
        .rows(&TableName::new("geojson_my uploads_field notes_geojson"))
        .await
        .is_some());
}
