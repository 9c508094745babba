use super::*;
use crate::ai::types::BackendError;
use crate::ai::{ChatOutcome, MockBackend};
use crate::frontend::test_support::{Delivery, RecordingFrontend};
use crate::plugins::{Plugin, PluginContext, PluginDescriptor, PluginResponse};
use crate::tools::{ToolManager, ToolRegistry};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct CountingPlugin {
    calls: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Plugin for CountingPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("count", "Counts its invocations")
    }

    async fn execute(
        &self,
        query: &str,
        _media: &[String],
        _context: &PluginContext,
    ) -> PluginResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.to_string());
        PluginResponse::text("counted")
    }
}

struct CrashingPlugin;

#[async_trait]
impl Plugin for CrashingPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("crash", "Panics on every invocation")
    }

    async fn execute(
        &self,
        _query: &str,
        _media: &[String],
        _context: &PluginContext,
    ) -> PluginResponse {
        panic!("turn gone wrong");
    }
}

struct QuietPlugin;

#[async_trait]
impl Plugin for QuietPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("quiet", "Replies with nothing at all")
    }

    async fn execute(
        &self,
        _query: &str,
        _media: &[String],
        _context: &PluginContext,
    ) -> PluginResponse {
        PluginResponse::text("")
    }
}

struct ArtPlugin;

#[async_trait]
impl Plugin for ArtPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("art", "Returns a canned image")
    }

    async fn execute(
        &self,
        _query: &str,
        _media: &[String],
        _context: &PluginContext,
    ) -> PluginResponse {
        PluginResponse::text("behold").with_media("/tmp/canned.png")
    }
}

struct TestHarness {
    router: MessageRouter,
    frontend: Arc<RecordingFrontend>,
    backend: Arc<MockBackend>,
    plugin_calls: Arc<AtomicUsize>,
    plugin_query: Arc<Mutex<Option<String>>>,
}

impl TestHarness {
    fn new(
        responses: Vec<Result<ChatOutcome, BackendError>>,
        frontend: Arc<RecordingFrontend>,
        egest_limit: usize,
    ) -> Self {
        let backend = Arc::new(MockBackend::new(responses));
        let tool_manager = Arc::new(ToolManager::new(ToolRegistry::new(), true));
        let plugin_calls = Arc::new(AtomicUsize::new(0));
        let plugin_query = Arc::new(Mutex::new(None));

        let mut dispatcher =
            PluginDispatcher::new(backend.clone(), None, tool_manager.clone());
        dispatcher.register(Arc::new(CountingPlugin {
            calls: plugin_calls.clone(),
            last_query: plugin_query.clone(),
        }));
        dispatcher.register(Arc::new(CrashingPlugin));
        dispatcher.register(Arc::new(ArtPlugin));
        dispatcher.register(Arc::new(QuietPlugin));

        let orchestrator = Arc::new(InferenceOrchestrator::new(
            backend.clone(),
            tool_manager,
            0.1,
            "/tmp/relay_media",
        ));

        let config = Config {
            poll_interval_ms: 5,
            egest_limit,
            ..Config::default()
        };
        let router = MessageRouter::spawn(
            Arc::new(dispatcher),
            orchestrator,
            frontend.clone(),
            &config,
        );

        TestHarness {
            router,
            frontend,
            backend,
            plugin_calls,
            plugin_query,
        }
    }

    async fn wait_for_deliveries(&self, n: usize) -> Vec<Delivery> {
        for _ in 0..400 {
            let recorded = self.frontend.recorded();
            if recorded.len() >= n {
                return recorded;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {} deliveries, got {:?}",
            n,
            self.frontend.recorded()
        );
    }
}

#[tokio::test]
async fn plain_text_takes_the_inference_path_once() {
    let harness = TestHarness::new(
        vec![Ok(ChatOutcome::text("hi there"))],
        Arc::new(RecordingFrontend::new()),
        3500,
    );
    harness
        .router
        .ingest("hello world", "alice", vec![], json!({"chan": 1}))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert_eq!(deliveries[0].text, "@alice: hi there");
    assert_eq!(deliveries[0].aux, json!({"chan": 1}));
    assert_eq!(harness.backend.recorded_calls().len(), 1);
    assert_eq!(harness.plugin_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn command_takes_the_plugin_path_with_query_stripped() {
    let harness = TestHarness::new(vec![], Arc::new(RecordingFrontend::new()), 3500);
    harness
        .router
        .ingest("/count some query", "bob", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert_eq!(deliveries[0].text, "@bob: counted");
    assert_eq!(harness.plugin_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.plugin_query.lock().unwrap().as_deref(),
        Some("some query")
    );
    // No inference call happened.
    assert!(harness.backend.recorded_calls().is_empty());
}

#[tokio::test]
async fn unknown_command_skips_inference() {
    let harness = TestHarness::new(vec![], Arc::new(RecordingFrontend::new()), 3500);
    harness
        .router
        .ingest("/ghost", "bob", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert_eq!(deliveries[0].text, "@bob: Plugin ghost not found.");
    assert!(harness.backend.recorded_calls().is_empty());
}

#[tokio::test]
async fn turns_run_in_enqueue_order() {
    let harness = TestHarness::new(
        vec![
            Ok(ChatOutcome::text("one")),
            Ok(ChatOutcome::text("two")),
            Ok(ChatOutcome::text("three")),
        ],
        Arc::new(RecordingFrontend::new()),
        3500,
    );
    for text in ["a", "b", "c"] {
        harness.router.ingest(text, "", vec![], json!(null)).unwrap();
    }

    let deliveries = harness.wait_for_deliveries(3).await;
    let texts: Vec<&str> = deliveries.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn incoming_media_is_deleted_even_when_the_plugin_panics() {
    let dir = tempfile::tempdir().unwrap();
    let attachment = dir.path().join("a.png");
    std::fs::write(&attachment, b"img").unwrap();
    let path = attachment.to_string_lossy().into_owned();

    let harness = TestHarness::new(vec![], Arc::new(RecordingFrontend::new()), 3500);
    harness
        .router
        .ingest("/crash now", "bob", vec![path], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert!(deliveries[0].text.contains("turn gone wrong"));
    assert!(!attachment.exists());
}

#[tokio::test]
async fn incoming_media_is_deleted_on_the_inference_path() {
    let dir = tempfile::tempdir().unwrap();
    let attachment = dir.path().join("photo.txt");
    std::fs::write(&attachment, b"not an image").unwrap();
    let path = attachment.to_string_lossy().into_owned();

    let harness = TestHarness::new(
        vec![Ok(ChatOutcome::text("looked at it"))],
        Arc::new(RecordingFrontend::new()),
        3500,
    );
    harness
        .router
        .ingest("what is this", "bob", vec![path], json!(null))
        .unwrap();

    harness.wait_for_deliveries(1).await;
    assert!(!attachment.exists());
}

#[tokio::test]
async fn failed_delivery_retries_with_preview_and_worker_survives() {
    let harness = TestHarness::new(
        vec![
            Ok(ChatOutcome::text("the original reply")),
            Ok(ChatOutcome::text("the next reply")),
        ],
        Arc::new(RecordingFrontend::failing_first(1)),
        3500,
    );
    harness
        .router
        .ingest("first", "bob", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert!(deliveries[0]
        .text
        .starts_with("An error occurred delivering the response"));
    assert!(deliveries[0].text.ends_with("the original reply"));
    assert!(deliveries[0].media.is_none());

    // The worker is still alive and takes the next turn.
    harness
        .router
        .ingest("second", "bob", vec![], json!(null))
        .unwrap();
    let deliveries = harness.wait_for_deliveries(2).await;
    assert_eq!(deliveries[1].text, "@bob: the next reply");
}

#[tokio::test]
async fn preview_is_bounded_to_a_thousand_characters() {
    let long_reply = "x".repeat(4000);
    let harness = TestHarness::new(
        vec![Ok(ChatOutcome::text(long_reply))],
        Arc::new(RecordingFrontend::failing_first(1)),
        5000,
    );
    harness
        .router
        .ingest("first", "", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    let notice_len = "An error occurred delivering the response to the frontend. The \
content may be too large or invalid. Showing a shortened preview:\n\n"
        .chars()
        .count();
    assert_eq!(deliveries[0].text.chars().count(), notice_len + 1000);
}

#[tokio::test]
async fn long_replies_are_chunked_with_prefix_on_first_block() {
    let reply = "First sentence goes here. Second sentence goes here. Third sentence here.";
    let harness = TestHarness::new(
        vec![Ok(ChatOutcome::text(reply))],
        Arc::new(RecordingFrontend::new()),
        40,
    );
    harness
        .router
        .ingest("talk a lot", "alice", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(2).await;
    assert!(deliveries.len() >= 2);
    assert!(deliveries[0].text.starts_with("@alice: "));
    for d in &deliveries[1..] {
        assert!(!d.text.starts_with("@alice: "));
    }
    for d in &deliveries {
        assert!(d.text.chars().count() <= 40);
    }
}

#[tokio::test]
async fn empty_reply_without_prefix_still_egests_once() {
    let harness = TestHarness::new(vec![], Arc::new(RecordingFrontend::new()), 3500);
    harness
        .router
        .ingest("/quiet", "", vec![], json!({"chan": 7}))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].text, "");
    assert_eq!(deliveries[0].aux, json!({"chan": 7}));
}

#[tokio::test]
async fn outgoing_media_rides_only_the_first_block() {
    let harness = TestHarness::new(vec![], Arc::new(RecordingFrontend::new()), 3500);
    harness
        .router
        .ingest("/art please", "bob", vec![], json!(null))
        .unwrap();

    let deliveries = harness.wait_for_deliveries(1).await;
    assert_eq!(deliveries[0].media.as_deref(), Some("/tmp/canned.png"));
}

#[tokio::test]
async fn shutdown_drains_the_queue() {
    let frontend = Arc::new(RecordingFrontend::new());
    let harness = TestHarness::new(
        vec![Ok(ChatOutcome::text("late reply"))],
        frontend.clone(),
        3500,
    );
    harness
        .router
        .ingest("last words", "", vec![], json!(null))
        .unwrap();
    harness.router.shutdown().await;
    assert_eq!(frontend.recorded().len(), 1);
}
