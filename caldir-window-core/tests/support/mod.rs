//! Scripted collaborators for driving `CalendarMirror` in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use caldir_window_core::auth::{Auth, AuthState, Token};
use caldir_window_core::config::{AuthConfig, WindowConfig};
use caldir_window_core::remote::RemoteSource;
use caldir_window_core::settings::StaticSettings;
use caldir_window_core::store::{LocalStore, MemoryStore};
use caldir_window_core::{
    CalendarMirror, Collaborators, DateRange, EventRecord, SyncError, SyncOptions, SyncResult,
};
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;

pub fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

pub fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange::new(start, end).unwrap()
}

/// One 09:00-10:00 event per day.
pub fn daily_events(from: NaiveDate, to: NaiveDate) -> Vec<EventRecord> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let start = Utc
                .from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap());
            EventRecord::new(format!("evt-{day}"), format!("Daily {day}"), start, start + chrono::TimeDelta::hours(1))
        })
        .collect()
}

// AUTH:

pub struct ScriptedAuth {
    signed_in: AtomicBool,
    /// Answers for upcoming token requests; `true` yields a token. Empty means success.
    script: Mutex<VecDeque<bool>>,
    attempts: AtomicUsize,
}

impl ScriptedAuth {
    pub fn new() -> Self {
        ScriptedAuth {
            signed_in: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn fail_next(&self, count: usize) {
        let mut script = self.script.lock().unwrap();
        script.extend(std::iter::repeat_n(false, count));
    }

    pub fn set_signed_in(&self, signed_in: bool) {
        self.signed_in.store(signed_in, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Auth for ScriptedAuth {
    fn current_auth_state(&self) -> AuthState {
        if self.signed_in.load(Ordering::SeqCst) {
            AuthState::signed_in(Some("me@example.com".into()))
        } else {
            AuthState::signed_out()
        }
    }

    async fn fresh_token(&self) -> Option<Token> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let ok = self.script.lock().unwrap().pop_front().unwrap_or(true);
        ok.then(|| Token::new("test-token"))
    }
}

// REMOTE:

/// A fake server holding events, with a gate that can hold fetches open.
pub struct FakeRemote {
    server: Mutex<Vec<EventRecord>>,
    calls: Mutex<Vec<DateRange>>,
    gate: watch::Sender<bool>,
    fail_with: Mutex<Option<String>>,
    panic_next: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl FakeRemote {
    pub fn new(server: Vec<EventRecord>) -> Self {
        let (gate, _) = watch::channel(true);
        FakeRemote {
            server: Mutex::new(server),
            calls: Mutex::new(Vec::new()),
            gate,
            fail_with: Mutex::new(None),
            panic_next: AtomicBool::new(false),
            latency: Mutex::new(None),
        }
    }

    /// Server with one event per day through June and July 2025.
    pub fn seeded() -> Self {
        FakeRemote::new(daily_events(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
        ))
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.fail_with.lock().unwrap() = message.map(String::from);
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<DateRange> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until `count` fetches have reached the server.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn server_events(&self) -> Vec<EventRecord> {
        self.server.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch_events(&self, range: &DateRange, _token: &Token) -> SyncResult<Vec<EventRecord>> {
        self.calls.lock().unwrap().push(*range);

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("remote exploded");
        }
        let failure = self.fail_with.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(SyncError::Transport(message));
        }

        let (from, to) = range.millis_bounds(Tz::UTC);
        Ok(self
            .server
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.overlaps(from, to))
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: &EventRecord, _token: &Token) -> SyncResult<EventRecord> {
        let mut created = event.clone();
        created.id = format!("created-{}", event.id);
        self.server.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, event: &EventRecord, _token: &Token) -> SyncResult<EventRecord> {
        let mut server = self.server.lock().unwrap();
        let existing = server
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| SyncError::Transport(format!("no event {}", event.id)))?;
        *existing = event.clone();
        Ok(event.clone())
    }

    async fn delete_event(&self, event_id: &str, _token: &Token) -> SyncResult<()> {
        self.server.lock().unwrap().retain(|e| e.id != event_id);
        Ok(())
    }
}

// STORE:

/// Wraps `MemoryStore`, tracking concurrent writers and optionally failing writes.
pub struct TrackingStore {
    inner: MemoryStore,
    writing: AtomicUsize,
    max_writers: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    delete_gate: watch::Sender<bool>,
    deletes_started: AtomicUsize,
}

impl TrackingStore {
    pub fn new() -> Self {
        TrackingStore {
            inner: MemoryStore::new(),
            writing: AtomicUsize::new(0),
            max_writers: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            delete_gate: watch::channel(true).0,
            deletes_started: AtomicUsize::new(0),
        }
    }

    /// Make `delete_all` block until `release_deletes`.
    pub fn hold_deletes(&self) {
        self.delete_gate.send_replace(false);
    }

    pub fn release_deletes(&self) {
        self.delete_gate.send_replace(true);
    }

    /// Wait until some `delete_all` call has begun.
    pub async fn wait_for_delete(&self) {
        while self.deletes_started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn max_writers(&self) -> usize {
        self.max_writers.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inner
            .query_events_in_range(i64::MIN, i64::MAX)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect()
    }
}

#[async_trait]
impl LocalStore for TrackingStore {
    async fn query_events_in_range(&self, from_ms: i64, to_ms: i64) -> SyncResult<Vec<EventRecord>> {
        self.inner.query_events_in_range(from_ms, to_ms).await
    }

    async fn replace_range(&self, from_ms: i64, to_ms: i64, records: Vec<EventRecord>) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Storage("disk full".into()));
        }

        let now = self.writing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_writers.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let result = self.inner.replace_range(from_ms, to_ms, records).await;
        self.writing.fetch_sub(1, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn delete_all(&self) -> SyncResult<()> {
        self.deletes_started.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.delete_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        self.inner.delete_all().await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.subscribe()
    }
}

// HARNESS:

pub struct Harness {
    pub mirror: CalendarMirror,
    pub auth: Arc<ScriptedAuth>,
    pub remote: Arc<FakeRemote>,
    pub store: Arc<TrackingStore>,
}

/// Window of 5 days back and 5 forward, jump buffer 10, threshold 2, chunk 14.
pub fn small_window() -> WindowConfig {
    WindowConfig {
        backward_days: 5,
        forward_days: 5,
        jump_buffer_days: 10,
        prefetch_threshold_days: 2,
        prefetch_chunk_days: 14,
    }
}

pub fn harness(window: WindowConfig) -> Harness {
    let auth = Arc::new(ScriptedAuth::new());
    let remote = Arc::new(FakeRemote::seeded());
    let store = Arc::new(TrackingStore::new());

    let mirror = CalendarMirror::new(
        Collaborators {
            auth: auth.clone(),
            remote: remote.clone(),
            store: store.clone(),
            settings: Arc::new(StaticSettings::new(Tz::UTC)),
        },
        SyncOptions {
            window,
            auth: AuthConfig {
                token_retries: 3,
                token_retry_delay: Duration::from_millis(500),
            },
        },
    );

    Harness {
        mirror,
        auth,
        remote,
        store,
    }
}
