#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use radio_request_rs::{Artist, NowPlaying, RadioError, RadioService, Track};

pub fn track(id: &str, duration_ms: u64) -> Track {
    Track {
        track_id: id.to_string(),
        title: format!("Title {}", id),
        artists: vec![Artist {
            name: "Test Artist".to_string(),
        }],
        album: "Test Album".to_string(),
        cover_url: format!("https://covers.example/{}.jpg", id),
        duration_ms,
        votes: 1,
    }
}

pub fn playing(id: &str, duration_ms: u64, position_ms: u64) -> NowPlaying {
    NowPlaying::new(track(id, duration_ms), position_ms)
}

/// One scripted answer to a now-playing call.
pub enum Reply {
    Ready(Result<Option<NowPlaying>, RadioError>),
    /// Held until the test sends a value through the paired sender.
    Gated(oneshot::Receiver<Option<NowPlaying>>),
}

/// In-memory radio backend with scripted answers and call counters.
#[derive(Default)]
pub struct FakeRadio {
    pub now_playing_calls: AtomicUsize,
    pub queue_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub my_requests_calls: AtomicUsize,
    pub auth_calls: AtomicUsize,

    replies: Mutex<VecDeque<Reply>>,
    default_now_playing: Mutex<Option<NowPlaying>>,
    fail_now_playing: AtomicBool,

    queue: Mutex<Vec<Track>>,
    queue_gates: Mutex<VecDeque<oneshot::Receiver<Vec<Track>>>>,
    fail_queue: AtomicBool,

    searches: Mutex<Vec<String>>,
    search_results: Mutex<HashMap<String, Vec<Track>>>,
    search_latency: Mutex<HashMap<String, Duration>>,
    failing_searches: Mutex<Vec<String>>,

    authenticated: Mutex<Option<bool>>,
    fail_submit: AtomicBool,
    submit_echo_votes: Mutex<Option<u64>>,
    my_requests: Mutex<Vec<Track>>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_now_playing(np: NowPlaying) -> Self {
        let fake = Self::default();
        fake.set_now_playing(Some(np));
        fake
    }

    pub fn set_now_playing(&self, np: Option<NowPlaying>) {
        *self.default_now_playing.lock().unwrap() = np;
    }

    pub fn fail_now_playing(&self, fail: bool) {
        self.fail_now_playing.store(fail, Ordering::SeqCst);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Queues a gated reply and returns the sender that releases it.
    pub fn push_gate(&self) -> oneshot::Sender<Option<NowPlaying>> {
        let (tx, rx) = oneshot::channel();
        self.push_reply(Reply::Gated(rx));
        tx
    }

    pub fn set_queue(&self, tracks: Vec<Track>) {
        *self.queue.lock().unwrap() = tracks;
    }

    /// Holds the next queue call until the test releases it.
    pub fn push_queue_gate(&self) -> oneshot::Sender<Vec<Track>> {
        let (tx, rx) = oneshot::channel();
        self.queue_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn queue_count(&self) -> usize {
        self.queue_calls.load(Ordering::SeqCst)
    }

    pub fn fail_queue(&self, fail: bool) {
        self.fail_queue.store(fail, Ordering::SeqCst);
    }

    pub fn set_search_results(&self, query: &str, tracks: Vec<Track>) {
        self.search_results
            .lock()
            .unwrap()
            .insert(query.to_string(), tracks);
    }

    pub fn set_search_latency(&self, query: &str, latency: Duration) {
        self.search_latency
            .lock()
            .unwrap()
            .insert(query.to_string(), latency);
    }

    pub fn fail_search(&self, query: &str) {
        self.failing_searches.lock().unwrap().push(query.to_string());
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn set_authenticated(&self, answer: Option<bool>) {
        *self.authenticated.lock().unwrap() = answer;
    }

    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn echo_votes(&self, votes: Option<u64>) {
        *self.submit_echo_votes.lock().unwrap() = votes;
    }

    pub fn set_my_requests(&self, tracks: Vec<Track>) {
        *self.my_requests.lock().unwrap() = tracks;
    }

    pub fn now_playing_count(&self) -> usize {
        self.now_playing_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

impl RadioService for FakeRadio {
    fn now_playing(&self) -> BoxFuture<'_, Result<Option<NowPlaying>, RadioError>> {
        self.now_playing_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        let fail = self.fail_now_playing.load(Ordering::SeqCst);
        let fallback = self.default_now_playing.lock().unwrap().clone();
        async move {
            match reply {
                Some(Reply::Ready(result)) => result,
                Some(Reply::Gated(rx)) => rx
                    .await
                    .map_err(|_| RadioError::HttpStatus(504)),
                None if fail => Err(RadioError::HttpStatus(503)),
                None => Ok(fallback),
            }
        }
        .boxed()
    }

    fn queue(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        self.queue_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.queue_gates.lock().unwrap().pop_front();
        let result = if self.fail_queue.load(Ordering::SeqCst) {
            Err(RadioError::HttpStatus(500))
        } else {
            Ok(self.queue.lock().unwrap().clone())
        };
        async move {
            match gate {
                Some(rx) => rx.await.map_err(|_| RadioError::HttpStatus(504)),
                None => result,
            }
        }
        .boxed()
    }

    fn my_requests(&self) -> BoxFuture<'_, Result<Vec<Track>, RadioError>> {
        self.my_requests_calls.fetch_add(1, Ordering::SeqCst);
        let tracks = self.my_requests.lock().unwrap().clone();
        async move { Ok(tracks) }.boxed()
    }

    fn submit_request<'a>(
        &'a self,
        track_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Track>, RadioError>> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        async move {
            // Lets a test observe the in-flight window.
            tokio::task::yield_now().await;
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(RadioError::HttpStatus(502));
            }
            let votes = { *self.submit_echo_votes.lock().unwrap() };
            Ok(votes.map(|votes| Track {
                votes,
                ..track(track_id, 180_000)
            }))
        }
        .boxed()
    }

    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<Vec<Track>, RadioError>> {
        self.searches.lock().unwrap().push(query.to_string());
        let latency = self.search_latency.lock().unwrap().get(query).copied();
        let fails = self.failing_searches.lock().unwrap().iter().any(|q| q == query);
        let results = self
            .search_results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            if fails {
                Err(RadioError::HttpStatus(500))
            } else {
                Ok(results)
            }
        }
        .boxed()
    }

    fn is_authenticated(&self) -> BoxFuture<'_, Result<bool, RadioError>> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        let answer = *self.authenticated.lock().unwrap();
        async move { answer.ok_or(RadioError::HttpStatus(500)) }.boxed()
    }
}

/// Yields to the scheduler until `cond` holds, without letting paused time advance.
pub async fn settle<F: Fn() -> bool>(cond: F) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached after yielding");
}
