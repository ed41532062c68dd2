//! Test helpers for feedwatch integration tests.
//!
//! Provides a scripted in-memory feed source and an event recorder.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use feedwatch::feed::parse_feed;
use feedwatch::{EventBus, FeedEntry, FeedSource, FeedwatchError, Result};

/// URL used by detectors under test.
pub const FEED_URL: &str = "https://example.com/feed.xml";

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum Step {
    Entries(Vec<FeedEntry>),
    Fail(String),
    Panic(String),
}

/// Feed source replaying scripted results.
///
/// Steps are consumed in order; the last one repeats forever.
#[derive(Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    delay: Duration,
    fetches: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    /// Create a source with the given steps.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Make every fetch take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue another step.
    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    /// Number of fetches started.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of fetches that returned.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of fetches ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        match step {
            Some(Step::Entries(entries)) => Ok(entries),
            Some(Step::Fail(reason)) => Err(FeedwatchError::Fetch(reason)),
            Some(Step::Panic(reason)) => panic!("{}", reason),
            None => Ok(Vec::new()),
        }
    }
}

/// Feed source parsing the same RSS/Atom document on every fetch.
pub struct DocumentSource(pub &'static str);

#[async_trait]
impl FeedSource for DocumentSource {
    async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>> {
        parse_feed(self.0.as_bytes())
    }
}

/// Build entries from GUIDs, newest first, titled after their GUID.
pub fn entries(guids: &[&str]) -> Vec<FeedEntry> {
    guids
        .iter()
        .map(|g| FeedEntry::new(*g).with_title(format!("Title {}", g)))
        .collect()
}

/// Scripted step returning `guids`.
pub fn feed(guids: &[&str]) -> Step {
    Step::Entries(entries(guids))
}

/// Collects everything published on a bus.
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Arc<Mutex<Vec<Vec<FeedEntry>>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Subscribe a new recorder to `bus`.
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();

        let batches = Arc::clone(&recorder.batches);
        bus.on_new_items(move |entries| batches.lock().unwrap().push(entries.to_vec()));

        let errors = Arc::clone(&recorder.errors);
        bus.on_error(move |err| errors.lock().unwrap().push(err.to_string()));

        recorder
    }

    /// GUIDs of each published batch, in publication order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|e| e.guid.clone().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Full entries of each published batch.
    pub fn raw_batches(&self) -> Vec<Vec<FeedEntry>> {
        self.batches.lock().unwrap().clone()
    }

    /// Messages of each published error.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}
