//! Full-pipeline integration tests over the deterministic mock backends.
//!
//! Everything here runs offline: embeddings come from the hash-based mock,
//! completions from the digest mock, so runs are reproducible end to end.

use std::sync::Arc;

use summarkov::{
    ChunkingConfig, ClusterFailurePolicy, EvaluationResult, MockCompletionClient,
    MockEmbeddingClient, Pipeline, PipelineConfig, PipelineError,
};

fn sample_document() -> String {
    let paragraphs: Vec<String> = (0..12)
        .map(|i| {
            format!(
                "Paragraph {i} dwells on subject {} with enough prose to fill a segment. \
                 It keeps adding clauses so the chunker has material to cut.",
                i % 3
            )
        })
        .collect();
    paragraphs.join("\n\n")
}

fn base_config() -> PipelineConfig {
    PipelineConfig::builder()
        .chunking(ChunkingConfig {
            max_length: 160,
            overlap: 10,
            ..ChunkingConfig::default()
        })
        .cluster_count(3)
        .top_k(4)
        .seed(42)
        .build()
}

fn mock_pipeline(completions: MockCompletionClient) -> Pipeline {
    Pipeline::new(Arc::new(MockEmbeddingClient::new()), Arc::new(completions))
}

#[tokio::test]
async fn run_produces_summary_and_report() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let outcome = pipeline
        .run(&sample_document(), &base_config())
        .await
        .unwrap();

    assert!(!outcome.summary.is_empty());
    assert!(outcome.report.segment_count >= 3);
    assert_eq!(outcome.report.cluster_count, 3);
    assert!(outcome.report.skipped_clusters.is_empty());
    assert!(outcome.report.ranking_converged);
}

#[tokio::test]
async fn no_reference_leaves_evaluation_empty() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let outcome = pipeline
        .run(&sample_document(), &base_config())
        .await
        .unwrap();
    assert_eq!(outcome.evaluation, EvaluationResult::default());
}

#[tokio::test]
async fn identical_runs_are_identical() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let mut config = base_config();
    config.reference_summary = Some("Twelve paragraphs circle three recurring subjects.".into());

    let document = sample_document();
    let first = pipeline.run(&document, &config).await.unwrap();
    let second = pipeline.run(&document, &config).await.unwrap();

    assert_eq!(first.summary, second.summary);
    assert_eq!(first.evaluation, second.evaluation);
    assert_eq!(first.report.segment_count, second.report.segment_count);
    assert_eq!(first.report.cluster_count, second.report.cluster_count);
}

#[tokio::test]
async fn reference_enables_all_metric_families() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let mut config = base_config();
    config.reference_summary = Some("Twelve paragraphs circle three recurring subjects.".into());

    let outcome = pipeline.run(&sample_document(), &config).await.unwrap();
    assert!(outcome.evaluation.lexical.is_some());
    assert!(outcome.evaluation.semantic_similarity.is_some());
    assert!(outcome.evaluation.coherence.is_some());
    assert!(outcome.evaluation.composite.is_some());
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let err = pipeline.run("   \n  ", &base_config()).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedInput(_)));
}

#[tokio::test]
async fn invalid_overlap_fails_before_any_call() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let config = PipelineConfig::builder()
        .chunking(ChunkingConfig {
            max_length: 100,
            overlap: 100,
            ..ChunkingConfig::default()
        })
        .build();
    let err = pipeline
        .run(&sample_document(), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[tokio::test]
async fn abort_policy_surfaces_the_failing_cluster() {
    let mut document = sample_document();
    document.push_str("\n\nThe final paragraph mentions the poisonword and nothing else of note.");

    let pipeline = mock_pipeline(
        MockCompletionClient::new().fail_when_prompt_contains("poisonword"),
    );
    let err = pipeline.run(&document, &base_config()).await.unwrap_err();
    match err {
        PipelineError::ClusterSummary { message, .. } => {
            assert!(message.contains("poisonword"));
        }
        other => panic!("expected ClusterSummary, got {other:?}"),
    }
}

#[tokio::test]
async fn skip_policy_reports_skipped_clusters_and_still_summarizes() {
    let mut document = sample_document();
    document.push_str("\n\nThe final paragraph mentions the poisonword and nothing else of note.");

    let mut config = base_config();
    config.failure_policy = ClusterFailurePolicy::Skip;

    let pipeline = mock_pipeline(
        MockCompletionClient::new().fail_when_prompt_contains("poisonword"),
    );
    let outcome = pipeline.run(&document, &config).await.unwrap();

    assert!(!outcome.summary.is_empty());
    assert_eq!(outcome.report.skipped_clusters.len(), 1);
    assert!(outcome.report.skipped_clusters[0]
        .message
        .contains("poisonword"));
}

#[tokio::test]
async fn all_clusters_failing_escalates_to_document_summary_error() {
    // Every paragraph carries the marker, so every cluster call fails.
    let document: String = (0..6)
        .map(|i| format!("Chronicle entry {i} records the same chronicle word again."))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut config = base_config();
    config.failure_policy = ClusterFailurePolicy::Skip;

    let pipeline =
        mock_pipeline(MockCompletionClient::new().fail_when_prompt_contains("hronicle"));
    let err = pipeline.run(&document, &config).await.unwrap_err();
    assert!(matches!(err, PipelineError::DocumentSummary { .. }));
}

#[tokio::test]
async fn more_clusters_than_segments_collapses_to_singletons() {
    let pipeline = mock_pipeline(MockCompletionClient::new());
    let config = PipelineConfig::builder()
        .chunking(ChunkingConfig {
            max_length: 5_000,
            overlap: 0,
            ..ChunkingConfig::default()
        })
        .cluster_count(8)
        .top_k(3)
        .build();

    // Fits one segment, so exactly one singleton cluster survives.
    let outcome = pipeline
        .run("A single short document that fits one segment.", &config)
        .await
        .unwrap();
    assert_eq!(outcome.report.segment_count, 1);
    assert_eq!(outcome.report.cluster_count, 1);
}
