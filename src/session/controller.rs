//! Session lifecycle controller.

use super::{ChatResponse, SessionRecord, SessionStatus, StartResponse};
use crate::config::{Prompts, Settings};
use crate::conversation::{ConversationMachine, OpenAiChat};
use crate::error::{AdbriefError, Result};
use crate::pipeline::{PipelineOrchestrator, ProcessedVideo};
use crate::search::{create_search, VideoCandidate, VideoSearch};
use crate::store::{JsonFileStore, SessionStore};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Binds completed conversations to background pipeline runs and keeps the
/// session records current.
pub struct SessionController {
    machine: ConversationMachine,
    search: Arc<dyn VideoSearch>,
    orchestrator: Arc<PipelineOrchestrator>,
    store: Arc<dyn SessionStore>,
    records: RwLock<HashMap<String, SessionRecord>>,
    runs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        machine: ConversationMachine,
        search: Arc<dyn VideoSearch>,
        orchestrator: PipelineOrchestrator,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            machine,
            search,
            orchestrator: Arc::new(orchestrator),
            store,
            records: RwLock::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
        })
    }

    /// Wire up the production collaborators from settings.
    pub fn from_settings(settings: &Settings) -> Result<Arc<Self>> {
        let chat = Arc::new(OpenAiChat::from_settings(&settings.chat)?);
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let machine = ConversationMachine::new(
            chat,
            prompts,
            settings.chat.sentinel.clone(),
            settings.chat.sentinel_policy,
        );

        Ok(Self::new(
            machine,
            create_search(settings)?,
            PipelineOrchestrator::new(settings)?,
            Arc::new(JsonFileStore::new(settings.sessions_dir())),
        ))
    }

    /// Open a new session and return its greeting.
    pub async fn start_session(&self) -> StartResponse {
        let (conversation, greeting) = self.machine.start().await;
        let record = SessionRecord::active(&conversation);
        self.records
            .write()
            .await
            .insert(conversation.session_id.clone(), record);

        StartResponse {
            session_id: conversation.session_id,
            message: greeting,
            is_complete: false,
        }
    }

    /// Apply one user message. When it completes the brief, search for
    /// candidates and start processing them in the background.
    ///
    /// Returns as soon as the candidates are known; processing progress is
    /// visible through [`get_results`](Self::get_results).
    #[instrument(skip(self, message))]
    pub async fn post_message(self: &Arc<Self>, session_id: &str, message: &str) -> Result<ChatResponse> {
        let reply = match self.machine.advance(session_id, message).await {
            Ok(reply) => reply,
            Err(AdbriefError::UnknownSession(id)) => return Err(self.not_live(id).await),
            Err(e) => {
                if matches!(e, AdbriefError::Collaborator { retryable: false, .. }) {
                    self.fail(session_id, None, e.to_string()).await;
                }
                return Err(e);
            }
        };

        let Some(query) = reply.query else {
            if let Some(conversation) = self.machine.snapshot(session_id).await {
                self.records
                    .write()
                    .await
                    .insert(session_id.to_string(), SessionRecord::active(&conversation));
            }
            return Ok(ChatResponse {
                message: reply.message,
                is_complete: false,
                session_id: session_id.to_string(),
                youtube_results: None,
                processed: false,
            });
        };

        let candidates = match self.search.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                let e = e.into_fatal();
                error!("Search failed for session {}: {}", session_id, e);
                self.fail(session_id, Some(query), e.to_string()).await;
                return Err(e);
            }
        };
        info!("Found {} videos for session {}", candidates.len(), session_id);

        let mut record = self.base_record(session_id).await;
        record.status = SessionStatus::Completed;
        record.query = Some(query);
        record.youtube_results = candidates.clone();
        record.processed_results = None;
        record.processed = false;
        record.error = None;
        self.commit(record).await;

        self.spawn_processing(session_id, candidates.clone()).await;

        Ok(ChatResponse {
            message: reply.message,
            is_complete: true,
            session_id: session_id.to_string(),
            youtube_results: Some(candidates),
            processed: false,
        })
    }

    /// The completed or failed record for a session.
    pub async fn get_results(&self, session_id: &str) -> Result<SessionRecord> {
        let record = self.get_session(session_id).await?;
        if record.status == SessionStatus::Active {
            return Err(AdbriefError::InvalidSessionState(format!(
                "session {} has no results yet",
                session_id
            )));
        }
        Ok(record)
    }

    /// Any record for a session, including the snapshot of a live conversation.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionRecord> {
        if let Some(record) = self.records.read().await.get(session_id) {
            return Ok(record.clone());
        }
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| AdbriefError::UnknownSession(session_id.to_string()))
    }

    /// All known session ids, sorted.
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut ids: BTreeSet<String> = self.store.list_keys().await?;
        ids.extend(self.records.read().await.keys().cloned());
        Ok(ids.into_iter().collect())
    }

    /// Wait for the background run of a session. Returns `true` once the
    /// session has a finished run, whether it ended now or earlier, and
    /// `false` when no run was ever started for it.
    pub async fn wait_for_processing(&self, session_id: &str) -> bool {
        let handle = self.runs.lock().await.remove(session_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Supervisor for session {} died: {}", session_id, e);
            }
        }
        self.records
            .read()
            .await
            .get(session_id)
            .is_some_and(|r| r.status == SessionStatus::Completed && !r.is_processing())
    }

    /// Wait for every background run to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.runs.lock().await.drain().collect();
        if !handles.is_empty() {
            info!("Waiting for {} background runs", handles.len());
        }
        for (session_id, handle) in handles {
            if let Err(e) = handle.await {
                error!("Supervisor for session {} died: {}", session_id, e);
            }
        }
    }

    async fn spawn_processing(self: &Arc<Self>, session_id: &str, candidates: Vec<VideoCandidate>) {
        let orchestrator = Arc::clone(&self.orchestrator);
        let run = tokio::spawn(async move { orchestrator.process_all(candidates).await });

        // The supervisor removes its own entry, so it must not finish before
        // the entry exists.
        let mut runs = self.runs.lock().await;
        let controller = Arc::clone(self);
        let id = session_id.to_string();
        let supervisor = tokio::spawn(async move {
            let outcome = match run.await {
                Ok(Ok(results)) => Ok(results),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("processing task failed: {}", e)),
            };
            controller.finish(&id, outcome).await;
            controller.runs.lock().await.remove(&id);
        });
        runs.insert(session_id.to_string(), supervisor);
    }

    #[instrument(skip(self, outcome))]
    async fn finish(&self, session_id: &str, outcome: std::result::Result<Vec<ProcessedVideo>, String>) {
        let mut record = self.base_record(session_id).await;
        match outcome {
            Ok(results) => {
                info!(
                    "Session {} processed: {} videos, {} failed",
                    session_id,
                    results.len(),
                    results.iter().filter(|r| !r.is_ok()).count()
                );
                record.processed_results = Some(results);
                record.processed = true;
            }
            Err(message) => {
                error!("Processing failed for session {}: {}", session_id, message);
                record.error = Some(message);
            }
        }
        self.commit(record).await;
        self.machine.retire(session_id).await;
    }

    /// Record a terminal failure and drop the live conversation.
    async fn fail(&self, session_id: &str, query: Option<String>, message: String) {
        let mut record = self.base_record(session_id).await;
        record.status = SessionStatus::Failed;
        record.query = query;
        record.error = Some(message);
        self.commit(record).await;
        self.machine.retire(session_id).await;
    }

    /// Latest record for a session with the live conversation folded in.
    async fn base_record(&self, session_id: &str) -> SessionRecord {
        let cached = self.records.read().await.get(session_id).cloned();
        let live = self.machine.snapshot(session_id).await;

        let mut record = match (cached, &live) {
            (Some(record), _) => record,
            (None, Some(conversation)) => SessionRecord::active(conversation),
            (None, None) => {
                warn!("No record for session {}, starting a new one", session_id);
                let now = Utc::now();
                SessionRecord {
                    session_id: session_id.to_string(),
                    status: SessionStatus::Active,
                    created_at: now,
                    updated_at: now,
                    query: None,
                    conversation: Vec::new(),
                    youtube_results: Vec::new(),
                    processed_results: None,
                    processed: false,
                    error: None,
                    persistence_error: None,
                }
            }
        };
        if let Some(conversation) = live {
            record.conversation = conversation.turns().to_vec();
        }
        record.touch();
        record
    }

    /// Write a record to the store and replace the cached copy. A failed write
    /// leaves the record cached with `persistence_error` set.
    async fn commit(&self, mut record: SessionRecord) {
        record.persistence_error = None;
        if let Err(e) = self.store.put(&record.session_id, &record).await {
            error!("Failed to persist session {}: {}", record.session_id, e);
            record.persistence_error = Some(e.to_string());
        }
        self.records
            .write()
            .await
            .insert(record.session_id.clone(), record);
    }

    /// Error for a message sent to a session without a live conversation.
    async fn not_live(&self, session_id: String) -> AdbriefError {
        match self.get_session(&session_id).await {
            Ok(record) => AdbriefError::InvalidSessionState(format!(
                "session {} is {}",
                session_id, record.status
            )),
            Err(_) => AdbriefError::UnknownSession(session_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentinelPolicy;
    use crate::pipeline::{ItemPipeline, ItemStage, TranscriptStore};
    use crate::store::MemoryStore;
    use crate::testing::{candidates, FailingStore, FakeFetcher, FakeSearch, FakeTranscriber, ScriptedChat};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    struct Harness {
        controller: Arc<SessionController>,
        chat: Arc<ScriptedChat>,
        search: Arc<FakeSearch>,
        _dir: tempfile::TempDir,
    }

    fn orchestrator(dir: &Path, fetcher: FakeFetcher) -> PipelineOrchestrator {
        PipelineOrchestrator::from_item(ItemPipeline::new(
            Arc::new(fetcher),
            Arc::new(FakeTranscriber::new()),
            TranscriptStore::new(dir.join("transcripts")),
            dir.join("audio"),
        ))
    }

    fn harness(search: FakeSearch, fetcher: FakeFetcher, store: Arc<dyn SessionStore>) -> Harness {
        harness_at(search, fetcher, store, Path::to_path_buf)
    }

    /// Like [`harness`], with the pipeline output rooted where `root` says.
    fn harness_at(
        search: FakeSearch,
        fetcher: FakeFetcher,
        store: Arc<dyn SessionStore>,
        root: impl FnOnce(&Path) -> PathBuf,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let output = root(dir.path());
        let chat = Arc::new(ScriptedChat::new());
        let search = Arc::new(search);
        let machine = ConversationMachine::new(
            chat.clone(),
            Prompts::default(),
            "[SUFFICIENT]",
            SentinelPolicy::Leading,
        );
        let controller = SessionController::new(
            machine,
            search.clone(),
            orchestrator(&output, fetcher),
            store,
        );
        Harness {
            controller,
            chat,
            search,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_brief_to_processed_results() {
        let store = Arc::new(MemoryStore::new());
        let h = harness(
            FakeSearch::returning(candidates(3)),
            FakeFetcher::failing_for(["vid1"]),
            store.clone(),
        );

        let start = h.controller.start_session().await;
        assert!(!start.is_complete);
        assert!(start.message.contains("advertisement"));

        h.chat.push_reply("Who is the audience?");
        let first = h
            .controller
            .post_message(&start.session_id, "running shoes ad for college athletes")
            .await
            .unwrap();
        assert!(!first.is_complete);
        assert_eq!(first.message, "Who is the audience?");
        assert!(first.youtube_results.is_none());

        h.chat.push_reply("[SUFFICIENT] running shoe ad college athletes");
        let done = h
            .controller
            .post_message(&start.session_id, "College runners, upbeat tone")
            .await
            .unwrap();
        assert!(done.is_complete);
        assert!(!done.processed);
        assert_eq!(done.youtube_results.as_ref().unwrap().len(), 3);
        assert_eq!(h.search.queries(), vec!["running shoe ad college athletes"]);

        assert!(h.controller.wait_for_processing(&start.session_id).await);

        let record = h.controller.get_results(&start.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert!(record.processed);
        assert_eq!(record.query.as_deref(), Some("running shoe ad college athletes"));
        let results = record.processed_results.as_ref().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(record.failed_items(), 1);
        assert_eq!(results[1].error.as_ref().unwrap().stage, ItemStage::Fetch);
        assert!(results[0].transcript.is_some() && results[2].transcript.is_some());
        assert!(record.persistence_error.is_none());

        // system, user, assistant, user: the sentinel reply is not kept.
        assert_eq!(record.conversation.len(), 4);

        let stored = store.get(&start.session_id).await.unwrap().unwrap();
        assert!(stored.processed);

        let again = h.controller.post_message(&start.session_id, "one more thing").await;
        assert!(matches!(again, Err(AdbriefError::InvalidSessionState(_))));
    }

    #[tokio::test]
    async fn test_provisional_record_visible_while_processing() {
        let h = harness(
            FakeSearch::returning(candidates(2)),
            FakeFetcher::new().with_delay(Duration::from_millis(200)),
            Arc::new(MemoryStore::new()),
        );

        let start = h.controller.start_session().await;
        h.chat.push_reply("[SUFFICIENT] coffee ads");
        h.controller.post_message(&start.session_id, "coffee").await.unwrap();

        let provisional = h.controller.get_results(&start.session_id).await.unwrap();
        assert_eq!(provisional.status, SessionStatus::Completed);
        assert!(!provisional.processed);
        assert!(provisional.is_processing());
        assert_eq!(provisional.youtube_results.len(), 2);

        h.controller.shutdown().await;
        let finished = h.controller.get_results(&start.session_id).await.unwrap();
        assert!(finished.processed);
        assert!(!finished.is_processing());
    }

    #[tokio::test]
    async fn test_store_failure_marks_record_degraded() {
        let h = harness(
            FakeSearch::returning(candidates(1)),
            FakeFetcher::new(),
            Arc::new(FailingStore),
        );

        let start = h.controller.start_session().await;
        h.chat.push_reply("[SUFFICIENT] bikes");
        h.controller.post_message(&start.session_id, "bikes").await.unwrap();
        h.controller.wait_for_processing(&start.session_id).await;

        let record = h.controller.get_results(&start.session_id).await.unwrap();
        assert!(record.processed);
        assert!(record.persistence_error.is_some());
    }

    #[tokio::test]
    async fn test_search_failure_fails_session() {
        let h = harness(FakeSearch::failing(), FakeFetcher::new(), Arc::new(MemoryStore::new()));

        let start = h.controller.start_session().await;
        h.chat.push_reply("[SUFFICIENT] tea");
        let err = h.controller.post_message(&start.session_id, "tea").await.unwrap_err();
        assert!(matches!(err, AdbriefError::Collaborator { retryable: false, .. }));
        assert!(err.to_string().contains("search provider unavailable"));

        // The session is over, so resending cannot succeed.
        let again = h.controller.post_message(&start.session_id, "tea").await;
        assert!(matches!(again, Err(AdbriefError::InvalidSessionState(_))));
        assert_eq!(h.search.queries(), vec!["tea"]);

        let record = h.controller.get_results(&start.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Failed);
        assert_eq!(record.query.as_deref(), Some("tea"));
        assert!(record.error.is_some());
        assert!(!h.controller.wait_for_processing(&start.session_id).await);
    }

    #[tokio::test]
    async fn test_fatal_chat_failure_fails_session() {
        let h = harness(FakeSearch::returning(candidates(1)), FakeFetcher::new(), Arc::new(MemoryStore::new()));

        let start = h.controller.start_session().await;
        h.chat.push_error(AdbriefError::fatal("invalid api key"));
        let err = h.controller.post_message(&start.session_id, "hello").await.unwrap_err();
        assert!(!err.is_retryable());

        let record = h.controller.get_session(&start.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("invalid api key"));
        assert_eq!(record.conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_retryable_chat_failure_keeps_session_active() {
        let h = harness(FakeSearch::returning(candidates(1)), FakeFetcher::new(), Arc::new(MemoryStore::new()));

        let start = h.controller.start_session().await;
        h.chat.push_error(AdbriefError::retryable("rate limited"));
        tokio_test::assert_err!(h.controller.post_message(&start.session_id, "hello").await);

        let record = h.controller.get_session(&start.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Active);

        let retried = tokio_test::assert_ok!(h.controller.post_message(&start.session_id, "hello").await);
        assert!(!retried.is_complete);
    }

    #[tokio::test]
    async fn test_unknown_and_active_sessions() {
        let h = harness(FakeSearch::returning(Vec::new()), FakeFetcher::new(), Arc::new(MemoryStore::new()));

        let missing = h.controller.post_message("nope", "hi").await;
        assert!(matches!(missing, Err(AdbriefError::UnknownSession(_))));
        assert!(matches!(
            h.controller.get_results("nope").await,
            Err(AdbriefError::UnknownSession(_))
        ));

        let start = h.controller.start_session().await;
        assert!(matches!(
            h.controller.get_results(&start.session_id).await,
            Err(AdbriefError::InvalidSessionState(_))
        ));
        assert_eq!(
            h.controller.get_session(&start.session_id).await.unwrap().status,
            SessionStatus::Active
        );
    }

    #[tokio::test]
    async fn test_list_sessions_merges_cache_and_store() {
        let store = Arc::new(MemoryStore::new());
        let old = SessionRecord::active(&crate::conversation::Conversation::new("20200101_000000_000000", "s"));
        store.put(&old.session_id, &old).await.unwrap();

        let h = harness(FakeSearch::returning(Vec::new()), FakeFetcher::new(), store);
        let start = h.controller.start_session().await;

        let ids = h.controller.list_sessions().await.unwrap();
        assert_eq!(ids, vec!["20200101_000000_000000".to_string(), start.session_id]);
    }

    #[tokio::test]
    async fn test_finished_runs_release_their_handles() {
        let h = harness(
            FakeSearch::returning(candidates(2)),
            FakeFetcher::new(),
            Arc::new(MemoryStore::new()),
        );

        let mut ids = Vec::new();
        for n in 0..5 {
            let start = h.controller.start_session().await;
            h.chat.push_reply(format!("[SUFFICIENT] ad {}", n));
            h.controller.post_message(&start.session_id, "brief").await.unwrap();
            ids.push(start.session_id);
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.controller.runs.lock().await.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background runs did not drain");

        for id in &ids {
            let record = h.controller.get_results(id).await.unwrap();
            assert!(record.processed);
            assert!(h.controller.wait_for_processing(id).await);
        }
    }

    #[tokio::test]
    async fn test_failed_run_records_error_without_retry() {
        let h = harness_at(
            FakeSearch::returning(candidates(2)),
            FakeFetcher::new(),
            Arc::new(MemoryStore::new()),
            |dir| {
                let blocker = dir.join("blocker");
                std::fs::write(&blocker, b"not a directory").unwrap();
                blocker
            },
        );

        let start = h.controller.start_session().await;
        h.chat.push_reply("[SUFFICIENT] soda");
        let reply = h.controller.post_message(&start.session_id, "soda").await.unwrap();
        assert_eq!(reply.youtube_results.unwrap().len(), 2);

        assert!(h.controller.wait_for_processing(&start.session_id).await);
        let record = h.controller.get_results(&start.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert!(record.error.is_some());
        assert!(!record.processed);
        assert!(record.processed_results.is_none());
        assert!(!record.is_processing());

        assert!(h.controller.runs.lock().await.is_empty());
        let again = h.controller.post_message(&start.session_id, "soda").await;
        assert!(matches!(again, Err(AdbriefError::InvalidSessionState(_))));
        assert_eq!(h.search.queries(), vec!["soda"]);
    }

    #[tokio::test]
    async fn test_no_candidates_still_completes() {
        let h = harness(FakeSearch::returning(Vec::new()), FakeFetcher::new(), Arc::new(MemoryStore::new()));

        let start = h.controller.start_session().await;
        h.chat.push_reply("[SUFFICIENT] obscure thing");
        let reply = h.controller.post_message(&start.session_id, "x").await.unwrap();
        assert!(reply.youtube_results.unwrap().is_empty());

        h.controller.wait_for_processing(&start.session_id).await;
        let record = h.controller.get_results(&start.session_id).await.unwrap();
        assert!(record.processed);
        assert_eq!(record.processed_results.unwrap().len(), 0);
    }
}
