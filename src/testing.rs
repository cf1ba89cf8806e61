//! In-process fakes for the external collaborators.

use crate::audio::{artifact_path, AudioFetcher};
use crate::conversation::{ChatCompleter, ConversationTurn};
use crate::error::{AdbriefError, Result};
use crate::search::{VideoCandidate, VideoSearch};
use crate::session::SessionRecord;
use crate::store::SessionStore;
use crate::transcription::{AudioClip, Transcriber};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

enum Scripted {
    Reply(String),
    Error(AdbriefError),
}

/// Chat model that replays queued replies and records what it was sent.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Scripted>>,
    histories: Mutex<Vec<Vec<ConversationTurn>>>,
    delay: Duration,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            histories: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chat = Self::new();
        for reply in replies {
            chat.push_reply(reply);
        }
        chat
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().unwrap().push_back(Scripted::Reply(reply.into()));
    }

    pub fn push_error(&self, error: AdbriefError) {
        self.script.lock().unwrap().push_back(Scripted::Error(error));
    }

    pub fn histories(&self) -> Vec<Vec<ConversationTurn>> {
        self.histories.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompleter for ScriptedChat {
    async fn complete(&self, history: &[ConversationTurn]) -> Result<String> {
        self.histories.lock().unwrap().push(history.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Error(error)) => Err(error),
            None => Ok("Tell me more.".to_string()),
        }
    }
}

/// Search provider returning a fixed candidate list.
pub struct FakeSearch {
    candidates: Vec<VideoCandidate>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn returning(candidates: Vec<VideoCandidate>) -> Self {
        Self {
            candidates,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSearch for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<VideoCandidate>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(AdbriefError::retryable("search provider unavailable"));
        }
        Ok(self.candidates.clone())
    }
}

/// Candidates `vid0`, `vid1`, ... with example.com locators.
pub fn candidates(n: usize) -> Vec<VideoCandidate> {
    (0..n)
        .map(|i| {
            VideoCandidate::new(
                format!("vid{}", i),
                format!("https://example.com/watch?v=vid{}", i),
                format!("Video {}", i),
            )
        })
        .collect()
}

/// Fetcher that writes a small file per video and fails for chosen ids.
pub struct FakeFetcher {
    failing: Mutex<HashSet<String>>,
    panicking: HashSet<String>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            panicking: HashSet::new(),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let fetcher = Self::new();
        for id in ids {
            fetcher.set_failing(id, true);
        }
        fetcher
    }

    pub fn panicking_for<'a>(mut self, ids: impl IntoIterator<Item = &'a str>) -> Self {
        self.panicking = ids.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Highest number of fetches observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str, video_id: &str, output_dir: &Path) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(video_id) {
            panic!("fetcher crashed on {}", video_id);
        }
        if self.failing.lock().unwrap().contains(video_id) {
            return Err(AdbriefError::Fetch(format!("cannot download {}", locator)));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let path = artifact_path(output_dir, video_id);
        tokio::fs::write(&path, format!("audio for {}", video_id)).await?;
        Ok(path)
    }
}

/// Transcriber that echoes the file name and fails for chosen file stems.
pub struct FakeTranscriber {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            failing: ids.into_iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: AudioClip) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = audio.file_name.split('.').next().unwrap_or_default().to_string();
        if self.failing.contains(&stem) {
            return Err(AdbriefError::Transcription(format!("provider rejected {}", audio.file_name)));
        }
        if audio.is_empty() {
            return Err(AdbriefError::Transcription("empty audio".to_string()));
        }
        Ok(format!("transcript of {}", String::from_utf8_lossy(&audio.bytes)))
    }
}

/// Session store whose writes always fail.
pub struct FailingStore;

#[async_trait]
impl SessionStore for FailingStore {
    async fn put(&self, _id: &str, _record: &SessionRecord) -> Result<()> {
        Err(AdbriefError::Persistence("disk full".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<SessionRecord>> {
        Ok(None)
    }

    async fn list_keys(&self) -> Result<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }
}
