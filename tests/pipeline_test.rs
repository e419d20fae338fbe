mod helpers;

use helpers::{fixture_files, png_fixture, FailAt, MockStages};
use furnivec::pipeline::{queue_items, run_batch, run_single, BatchStatus, RunOptions};

fn no_previews() -> RunOptions {
    RunOptions {
        previews: false,
        pacing: None,
    }
}

#[tokio::test]
async fn batch_processes_items_in_lexicographic_path_order() {
    let (_dir, files) = fixture_files(&["b/2.jpg", "a/1.jpg", "a/10.jpg"]);
    let items = queue_items(files);
    let stages = MockStages::new();

    let (items, summary) = run_batch(&stages, items, &no_previews(), |_| {}).await;

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    let order: Vec<&str> = items.iter().map(|i| i.relative_path.as_str()).collect();
    assert_eq!(order, ["a/1.jpg", "a/10.jpg", "b/2.jpg"]);

    // Derived names follow the same order: file stems of the sorted paths.
    let ingested = stages.ingested.lock().unwrap();
    let names: Vec<&str> = ingested.iter().map(|r| r.name.as_deref().unwrap()).collect();
    assert_eq!(names, ["1", "10", "2"]);
}

#[tokio::test]
async fn one_failing_item_never_aborts_the_batch() {
    for stage in [FailAt::Describe, FailAt::Embed, FailAt::Ingest] {
        let (_dir, files) = fixture_files(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        let items = queue_items(files);
        let stages = MockStages::failing_at(&[(1, stage)]);

        let (items, summary) = run_batch(&stages, items, &no_previews(), |_| {}).await;

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 3, "stage {stage:?}");
        assert_eq!(summary.failed, 1, "stage {stage:?}");

        for (index, item) in items.iter().enumerate() {
            if index == 1 {
                assert_eq!(item.status, BatchStatus::Error, "stage {stage:?}");
                let message = item.message.as_deref().unwrap();
                assert!(message.contains("scripted"), "got message: {message}");
            } else {
                assert_eq!(item.status, BatchStatus::Success, "stage {stage:?}");
                assert!(item.message.is_none());
            }
        }
    }
}

#[tokio::test]
async fn summary_counts_match_number_of_forced_failures() {
    let (_dir, files) = fixture_files(&["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"]);
    let items = queue_items(files);
    let stages = MockStages::failing_at(&[(0, FailAt::Describe), (3, FailAt::Ingest)]);

    let (_, summary) = run_batch(&stages, items, &no_previews(), |_| {}).await;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(stages.ingested.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn unreadable_file_fails_only_its_own_item() {
    let (_dir, mut files) = fixture_files(&["a.jpg", "c.jpg"]);
    files.push(("/nonexistent/b.jpg".into(), "b.jpg".into()));
    let items = queue_items(files);
    let stages = MockStages::new();

    let (items, summary) = run_batch(&stages, items, &no_previews(), |_| {}).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    let failed = items.iter().find(|i| i.relative_path == "b.jpg").unwrap();
    assert_eq!(failed.status, BatchStatus::Error);
    assert!(failed.message.as_deref().unwrap().contains("unable to read"));
}

#[tokio::test]
async fn ingest_payload_carries_description_and_embedding_verbatim() {
    let (_dir, files) = fixture_files(&["chair.jpg"]);
    let items = queue_items(files);
    let stages = MockStages::new();

    let (_, summary) = run_batch(&stages, items, &no_previews(), |_| {}).await;
    assert_eq!(summary.succeeded, 1);

    let ingested = stages.ingested.lock().unwrap();
    let request = &ingested[0];
    assert_eq!(request.description, helpers::description_for(0));
    assert_eq!(request.embedding, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    assert_eq!(request.name.as_deref(), Some("chair"));
    // Offline variant: no preview payload, no image URL.
    assert!(request.image_base64.is_none());
    assert!(request.image_name.is_none());
    assert!(request.image_url.is_none());
}

#[tokio::test]
async fn preview_runs_attach_the_normalized_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = png_fixture(&dir, "armchair.png", 320, 240);
    let items = queue_items(vec![(path, "armchair.png".into())]);
    let stages = MockStages::new();
    let options = RunOptions {
        previews: true,
        pacing: None,
    };

    let (items, summary) = run_batch(&stages, items, &options, |_| {}).await;
    assert_eq!(summary.succeeded, 1, "item: {:?}", items[0].message);

    let ingested = stages.ingested.lock().unwrap();
    let request = &ingested[0];
    assert_eq!(request.image_name.as_deref(), Some("armchair.jpg"));

    use base64::Engine;
    let jpeg = base64::engine::general_purpose::STANDARD
        .decode(request.image_base64.as_deref().unwrap())
        .unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 200);
    assert_eq!(decoded.height(), 200);
}

#[tokio::test]
async fn observer_snapshots_never_regress() {
    let (_dir, files) = fixture_files(&["a.jpg", "b.jpg", "c.jpg"]);
    let items = queue_items(files);
    let stages = MockStages::failing_at(&[(1, FailAt::Embed)]);

    let mut snapshots: Vec<Vec<(String, BatchStatus)>> = Vec::new();
    let observer = |snapshot: &[furnivec::pipeline::BatchItem]| {
        snapshots.push(
            snapshot
                .iter()
                .map(|i| (i.id.clone(), i.status))
                .collect(),
        );
    };

    let (items, _) = run_batch(&stages, items, &no_previews(), observer).await;

    let rank = |status: BatchStatus| match status {
        BatchStatus::Pending => 0,
        BatchStatus::Processing => 1,
        BatchStatus::Success | BatchStatus::Error => 2,
    };
    for pair in snapshots.windows(2) {
        for (before, after) in pair[0].iter().zip(pair[1].iter()) {
            assert_eq!(before.0, after.0);
            assert!(
                rank(after.1) >= rank(before.1),
                "status regressed from {:?} to {:?}",
                before.1,
                after.1
            );
        }
    }

    let last = snapshots.last().unwrap();
    assert!(last.iter().all(|(_, status)| matches!(
        status,
        BatchStatus::Success | BatchStatus::Error
    )));
    assert!(items.iter().all(|i| i.status.is_terminal()));
}

#[tokio::test]
async fn single_run_aborts_on_first_stage_failure() {
    let (_dir, files) = fixture_files(&["sofa.jpg"]);
    let stages = MockStages::failing_at(&[(0, FailAt::Embed)]);
    let options = RunOptions {
        previews: true,
        pacing: None,
    };

    let result = run_single(&stages, &files[0].0, None, &options).await;
    assert!(result.is_err());
    // Nothing was persisted: the run stopped before the ingestion stage.
    assert!(stages.ingested.lock().unwrap().is_empty());
}

#[tokio::test]
async fn single_run_uses_explicit_name_over_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = png_fixture(&dir, "sofa.png", 100, 100);
    let stages = MockStages::new();
    let options = RunOptions {
        previews: true,
        pacing: None,
    };

    let item = run_single(&stages, &path, Some("Velvet Sofa"), &options)
        .await
        .unwrap();
    assert_eq!(item.get("name").and_then(|v| v.as_str()), Some("Velvet Sofa"));

    let ingested = stages.ingested.lock().unwrap();
    assert_eq!(ingested[0].name.as_deref(), Some("Velvet Sofa"));
}
