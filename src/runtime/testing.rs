//! Mock implementations for testing
//!
//! These mocks enable integration testing without a real inference server.

use crate::conversation::{ConversationStore, Message, Role};
use crate::generator::{
    Candidate, GenerationClient, GenerationError, GenerationOptions, GeneratorFactory, ModelSpec,
    TextGenerator,
};
use crate::prompt::{PromptBuilder, GREETING};
use crate::runtime::{
    spawn_conversation, ChatEvent, ChatHandle, ChatUpdate, ConversationRuntime,
    ConversationSnapshot,
};
use crate::state_machine::Event;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

// ============================================================================
// Mock Generator
// ============================================================================

struct MockGeneratorInner {
    responses: Mutex<VecDeque<Result<Vec<Candidate>, GenerationError>>>,
    calls: Mutex<Vec<(String, GenerationOptions)>>,
    delay: Option<Duration>,
    /// Notified when a call starts (for test synchronization)
    started: Notify,
}

/// Mock generator that returns queued responses.
///
/// Clones share the same queue and call record.
#[derive(Clone)]
pub struct MockGenerator {
    inner: Arc<MockGeneratorInner>,
    model_id: String,
}

impl MockGenerator {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MockGeneratorInner {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                delay: None,
                started: Notify::new(),
            }),
            model_id: model_id.into(),
        }
    }

    /// Delay every call (for timeout and cancellation testing).
    /// Must be called before cloning.
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            inner: Arc::new(MockGeneratorInner {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                delay: Some(delay),
                started: Notify::new(),
            }),
            model_id: self.model_id,
        }
    }

    /// Queue a single-candidate response
    pub fn queue_text(&self, text: impl Into<String>) {
        self.queue_candidates(vec![Candidate::new(text)]);
    }

    pub fn queue_candidates(&self, candidates: Vec<Candidate>) {
        self.inner.responses.lock().unwrap().push_back(Ok(candidates));
    }

    pub fn queue_error(&self, error: GenerationError) {
        self.inner.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded `(prompt, options)` pairs
    pub fn recorded_calls(&self) -> Vec<(String, GenerationOptions)> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Resolves once the next call has started
    pub async fn call_started(&self) {
        self.inner.started.notified().await;
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Vec<Candidate>, GenerationError> {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), *options));
        self.inner.started.notify_one();

        if let Some(delay) = self.inner.delay {
            tokio::time::sleep(delay).await;
        }

        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::generation("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Factories
// ============================================================================

/// Factory that always succeeds and counts constructions
pub struct CountingFactory {
    generator: MockGenerator,
    loads: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingFactory {
    pub fn new(generator: MockGenerator) -> Self {
        Self {
            generator,
            loads: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Make construction slow so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeneratorFactory for CountingFactory {
    async fn load(&self, _spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Arc::new(self.generator.clone()))
    }
}

/// Factory that fails the first `failures` loads, then succeeds
pub struct FailingFactory {
    failures: usize,
    attempts: AtomicUsize,
    generator: MockGenerator,
}

impl FailingFactory {
    pub fn new(failures: usize, generator: MockGenerator) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            generator,
        }
    }

    /// Factory that never succeeds
    pub fn always(generator: MockGenerator) -> Self {
        Self::new(usize::MAX, generator)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeneratorFactory for FailingFactory {
    async fn load(&self, _spec: &ModelSpec) -> Result<Arc<dyn TextGenerator>, GenerationError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(GenerationError::generation("network unreachable"));
        }
        Ok(Arc::new(self.generator.clone()))
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Client over a mock generator with default options
pub fn mock_client(factory: Arc<dyn GeneratorFactory>) -> Arc<GenerationClient> {
    Arc::new(GenerationClient::new(factory, ModelSpec::new("test-model", true)))
}

/// Runtime driven step by step from the test, without a background loop
pub struct ManualRuntime {
    pub runtime: ConversationRuntime,
    pub broadcast_rx: broadcast::Receiver<ChatUpdate>,
}

impl ManualRuntime {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let runtime = ConversationRuntime::new(
            "test-conv".to_string(),
            ConversationStore::with_greeting(GREETING),
            client,
            PromptBuilder::default(),
            event_rx,
            event_tx,
            broadcast_tx,
        );
        Self {
            runtime,
            broadcast_rx,
        }
    }

    pub fn submit(&mut self, text: &str) {
        let _ = self.runtime.process_event(Event::UserSubmit {
            text: text.to_string(),
        });
    }

    /// Process the next event the background tasks post (with timeout)
    pub async fn step(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(2), self.runtime.process_next())
            .await
            .unwrap_or(false)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.runtime.store().messages()
    }

    /// Drain broadcast events received so far
    pub fn drain_events(&mut self) -> Vec<ChatEvent> {
        self.drain_updates().into_iter().map(|u| u.event).collect()
    }

    /// Drain broadcast updates with their sequence numbers
    pub fn drain_updates(&mut self) -> Vec<ChatUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.broadcast_rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

/// Wait until a snapshot satisfies `predicate` (with timeout)
pub async fn wait_for_snapshot(
    handle: &ChatHandle,
    predicate: impl FnMut(&ConversationSnapshot) -> bool,
) -> Option<ConversationSnapshot> {
    let mut rx = handle.watch();
    let result = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate)).await;
    let snapshot = result.ok()?.ok()?.clone();
    Some(snapshot)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::EMPTY_OUTPUT_FALLBACK;
    use crate::runtime::SubmitError;
    use crate::state_machine::{
        ConvState, ModelStatus, TurnPhase, CANCELLED_REPLY, GENERATION_FALLBACK,
        INIT_FAILURE_NOTICE,
    };
    use std::sync::atomic::AtomicBool;

    fn setup() -> (MockGenerator, ManualRuntime) {
        let generator = MockGenerator::new("test-model");
        let client = mock_client(Arc::new(CountingFactory::new(generator.clone())));
        (generator, ManualRuntime::new(client))
    }

    #[tokio::test]
    async fn test_mock_generator_queue() {
        let mock = MockGenerator::new("test-model");
        mock.queue_text("Hello");

        let options = GenerationOptions::default();
        let out = mock.generate("p", &options).await.unwrap();
        assert_eq!(out, vec![Candidate::new("Hello")]);

        // Second call should fail (no more responses)
        assert!(mock.generate("p", &options).await.is_err());
        assert_eq!(mock.recorded_calls().len(), 2);
    }

    /// Greeting, then "Hello", then the mock echoes the cue back
    #[tokio::test]
    async fn test_hello_turn_end_to_end() {
        let (generator, mut rt) = setup();
        generator.queue_text("Assistant: Hi there!");

        assert_eq!(rt.messages().len(), 1);
        rt.submit("Hello");

        let msgs = rt.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].content, GREETING);
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "Hello");
        assert_eq!(msgs[2].role, Role::Assistant);
        assert!(msgs[2].pending);
        assert!(rt.runtime.store().is_busy());
        assert!(matches!(rt.runtime.state(), ConvState::Generating { .. }));

        assert!(rt.step().await);

        let msgs = rt.messages();
        assert_eq!(msgs.len(), 3);
        assert!(!msgs[2].pending);
        assert_eq!(msgs[2].content, "Hi there!");
        assert!(!rt.runtime.store().is_busy());
        assert_eq!(rt.runtime.state(), &ConvState::Idle);
    }

    #[tokio::test]
    async fn test_prompt_built_from_history_without_placeholder() {
        let (generator, mut rt) = setup();
        generator.queue_text("Hi there!");

        rt.submit("Hello");
        assert!(rt.step().await);

        let calls = generator.recorded_calls();
        assert_eq!(calls.len(), 1);
        let prompt = &calls[0].0;
        let expected_tail = format!("\n\nAssistant: {GREETING}\nUser: Hello\nAssistant:");
        assert!(prompt.ends_with(&expected_tail), "prompt was: {prompt}");
        assert_eq!(calls[0].1, GenerationOptions::default());
    }

    #[tokio::test]
    async fn test_failed_generation_uses_fallback() {
        let (generator, mut rt) = setup();
        generator.queue_error(GenerationError::generation("model crashed"));

        rt.submit("Hello");
        assert!(rt.step().await);

        let msgs = rt.messages();
        assert_eq!(msgs[2].content, GENERATION_FALLBACK);
        assert!(!msgs[2].pending);
        assert!(!rt.runtime.store().is_busy());

        // Conversation stays usable
        generator.queue_text("Second try works");
        rt.submit("Again");
        assert_eq!(rt.messages().len(), 5);
        assert!(rt.step().await);
        assert_eq!(rt.messages()[4].content, "Second try works");
    }

    #[tokio::test]
    async fn test_submit_while_busy_is_noop() {
        let (generator, mut rt) = setup();
        generator.queue_text("one");

        rt.submit("first");
        rt.drain_events();
        rt.submit("second");

        assert_eq!(rt.messages().len(), 3);
        assert!(rt.drain_events().is_empty());

        assert!(rt.step().await);
        assert_eq!(generator.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_submit_is_noop() {
        let (generator, mut rt) = setup();

        rt.submit("   ");
        rt.submit("");

        assert_eq!(rt.messages().len(), 1);
        assert!(!rt.runtime.store().is_busy());
        assert_eq!(rt.runtime.state(), &ConvState::Idle);
        assert!(generator.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_output_gets_default_reply() {
        let (generator, mut rt) = setup();
        generator.queue_candidates(vec![]);

        rt.submit("Hello");
        assert!(rt.step().await);

        assert_eq!(rt.messages()[2].content, EMPTY_OUTPUT_FALLBACK);
    }

    #[tokio::test]
    async fn test_turn_phase_notifications() {
        let (generator, mut rt) = setup();
        generator.queue_text("ok");

        rt.drain_events();
        rt.submit("Hello");
        assert!(rt.step().await);

        let phases: Vec<TurnPhase> = rt
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::TurnPhase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![TurnPhase::Submitted, TurnPhase::Generating, TurnPhase::Settled]
        );
    }

    #[tokio::test]
    async fn test_cancel_during_generation() {
        let generator = MockGenerator::new("test-model").with_delay(Duration::from_secs(5));
        generator.queue_text("Response that should be discarded");
        let client = mock_client(Arc::new(CountingFactory::new(generator.clone())));
        let mut rt = ManualRuntime::new(client);

        rt.submit("Hello");
        generator.call_started().await;

        rt.runtime.process_event(Event::UserCancel).unwrap();

        let msgs = rt.messages();
        assert_eq!(msgs[2].content, CANCELLED_REPLY);
        assert!(!msgs[2].pending);
        assert_eq!(rt.runtime.state(), &ConvState::Idle);

        // The aborted task reports back and is dropped as stale
        assert!(rt.step().await);
        let msgs = rt.messages();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[2].content, CANCELLED_REPLY);
        assert_eq!(generator.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_result_is_dropped() {
        let (_generator, mut rt) = setup();

        let err = rt
            .runtime
            .process_event(Event::GenerationSucceeded {
                pending_id: "old".into(),
                text: "late".to_string(),
            })
            .unwrap_err();
        assert!(err.is_noop());
        assert_eq!(rt.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_warm_up_failure_appends_notice_once() {
        let generator = MockGenerator::new("test-model");
        let factory = Arc::new(FailingFactory::always(generator));
        let mut rt = ManualRuntime::new(mock_client(factory.clone()));

        rt.runtime.warm_up();
        assert!(rt.step().await);

        let msgs = rt.messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1].content, INIT_FAILURE_NOTICE);
        assert_eq!(msgs[1].role, Role::Assistant);

        // Turns still fail gracefully, without more notices
        rt.submit("Hello");
        assert!(rt.step().await);
        let msgs = rt.messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[3].content, GENERATION_FALLBACK);
        assert_eq!(
            msgs.iter().filter(|m| m.content == INIT_FAILURE_NOTICE).count(),
            1
        );
        assert_eq!(factory.attempts(), 2);
    }

    #[tokio::test]
    async fn test_turn_recovers_after_failed_warm_up() {
        let generator = MockGenerator::new("test-model");
        generator.queue_text("Loaded now");
        let factory = Arc::new(FailingFactory::new(1, generator));
        let mut rt = ManualRuntime::new(mock_client(factory));

        rt.runtime.warm_up();
        assert!(rt.step().await);

        rt.submit("Hello");
        assert!(rt.step().await);

        assert_eq!(rt.messages().last().unwrap().content, "Loaded now");
        let statuses: Vec<ModelStatus> = rt
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::ModelStatus { status } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![ModelStatus::Failed, ModelStatus::Ready]);
    }

    /// Through the public handle with the background loop running
    #[tokio::test]
    async fn test_handle_round_trip() {
        let generator = MockGenerator::new("test-model");
        generator.queue_text("Assistant: Hi there!");
        let handle = spawn_conversation(
            mock_client(Arc::new(CountingFactory::new(generator))),
            PromptBuilder::default(),
        );

        let ready = wait_for_snapshot(&handle, |s| s.model_status == ModelStatus::Ready).await;
        assert!(ready.is_some());

        handle.submit("Hello").await.unwrap();
        let settled = wait_for_snapshot(&handle, |s| s.messages.len() == 3 && !s.busy)
            .await
            .unwrap();

        assert_eq!(settled.messages[2].content, "Hi there!");
        assert_eq!(settled.state, ConvState::Idle);
    }

    #[tokio::test]
    async fn test_handle_rejects_blank_and_busy() {
        let generator = MockGenerator::new("test-model").with_delay(Duration::from_secs(5));
        let handle = spawn_conversation(
            mock_client(Arc::new(CountingFactory::new(generator))),
            PromptBuilder::default(),
        );

        assert_eq!(handle.submit("  ").await, Err(SubmitError::Blank));

        handle.submit("Hello").await.unwrap();
        wait_for_snapshot(&handle, |s| s.busy).await.unwrap();
        assert_eq!(handle.submit("More").await, Err(SubmitError::Busy));

        handle.cancel().await.unwrap();
        let idle = wait_for_snapshot(&handle, |s| !s.busy).await.unwrap();
        assert_eq!(idle.messages.len(), 3);
        assert_eq!(idle.messages[2].content, CANCELLED_REPLY);
    }

    #[tokio::test]
    async fn test_failed_turn_after_recovered_load_marks_model_ready() {
        let generator = MockGenerator::new("test-model");
        generator.queue_error(GenerationError::generation("model crashed"));
        let factory = Arc::new(FailingFactory::new(1, generator));
        let mut rt = ManualRuntime::new(mock_client(factory));

        rt.runtime.warm_up();
        assert!(rt.step().await);

        rt.submit("Hello");
        assert!(rt.step().await);

        assert_eq!(rt.messages()[3].content, GENERATION_FALLBACK);
        let statuses: Vec<ModelStatus> = rt
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ChatEvent::ModelStatus { status } => Some(status),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![ModelStatus::Failed, ModelStatus::Ready]);
        assert_eq!(rt.runtime.watch().borrow().model_status, ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_updates_are_numbered_and_covered_by_snapshot() {
        let (generator, mut rt) = setup();
        generator.queue_text("Hi there!");
        let snapshots = rt.runtime.watch();

        rt.submit("Hello");
        assert!(rt.step().await);

        // Two appends, submitted, generating, reply, model ready, settled
        let seqs: Vec<u64> = rt.drain_updates().into_iter().map(|u| u.seq).collect();
        assert_eq!(seqs, (1..=7).collect::<Vec<u64>>());

        let snapshot = snapshots.borrow();
        assert_eq!(snapshot.last_seq, 7);
        assert_eq!(snapshot.messages.len(), 3);
    }

    /// Observers subscribe, then read the snapshot, while turns run on
    /// other workers. The first update newer than the snapshot must be the
    /// very next one: anything older is already in the snapshot.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscriber_sees_every_change_once_subscribed() {
        const TURNS: usize = 20;

        let generator = MockGenerator::new("test-model");
        for i in 0..TURNS {
            generator.queue_text(format!("reply {i}"));
        }
        let handle = spawn_conversation(
            mock_client(Arc::new(CountingFactory::new(generator))),
            PromptBuilder::default(),
        );
        wait_for_snapshot(&handle, |s| s.model_status == ModelStatus::Ready)
            .await
            .unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let observers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                let done = done.clone();
                tokio::spawn(async move {
                    while !done.load(Ordering::SeqCst) {
                        let mut rx = handle.subscribe();
                        let snapshot = handle.snapshot();
                        let next_seq = tokio::time::timeout(Duration::from_millis(20), async {
                            loop {
                                match rx.recv().await {
                                    Ok(update) if update.seq > snapshot.last_seq => {
                                        return Some(update.seq);
                                    }
                                    Ok(_) => {}
                                    Err(_) => return None,
                                }
                            }
                        })
                        .await;
                        if let Ok(Some(seq)) = next_seq {
                            assert_eq!(seq, snapshot.last_seq + 1);
                        }
                    }
                })
            })
            .collect();

        for i in 0..TURNS {
            handle.submit(&format!("turn {i}")).await.unwrap();
            wait_for_snapshot(&handle, |s| s.messages.len() == 3 + 2 * i && !s.busy)
                .await
                .unwrap();
        }

        done.store(true, Ordering::SeqCst);
        for observer in observers {
            observer.await.unwrap();
        }
        assert_eq!(handle.snapshot().messages.len(), 1 + 2 * TURNS);
    }
}

