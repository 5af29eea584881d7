//! Scripted answer source for tests
//!
//! [`FakeAnswerSource`] replays queued replies in order. A reply can be held
//! back until the test releases it, which lets a test interleave session
//! switches with an in-flight request.
//!
//! # Example
//!
//! ```
//! use askgenie::answer::fake::FakeAnswerSource;
//! use askgenie::answer::{AnswerRequest, AnswerSource};
//! use askgenie::sources::RawAnswer;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let source = FakeAnswerSource::new();
//! source.push_answer(RawAnswer { answer: "42".into(), ..Default::default() });
//! source.push_failure("boom");
//!
//! let first = source.ask(&AnswerRequest::new("q")).await.unwrap();
//! assert_eq!(first.text, "42");
//! assert!(source.ask(&AnswerRequest::new("q")).await.is_err());
//! # }
//! ```

use super::{Answer, AnswerRequest, AnswerSource};
use crate::error::{GenieError, Result};
use crate::sources::{normalize, RawAnswer};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

struct Scripted {
    reply: std::result::Result<RawAnswer, String>,
    gate: Option<oneshot::Receiver<()>>,
}

/// Releases a held reply
#[derive(Debug)]
pub struct HoldHandle {
    tx: oneshot::Sender<()>,
}

impl HoldHandle {
    /// Let the held reply complete
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

/// [`AnswerSource`] that replays scripted replies
#[derive(Default)]
pub struct FakeAnswerSource {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<AnswerRequest>>,
    started: Notify,
}

impl FakeAnswerSource {
    /// Create a source with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn push_answer(&self, raw: RawAnswer) {
        self.push(Ok(raw), None);
    }

    /// Queue a failing reply
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Err(message.into()), None);
    }

    /// Queue a successful reply that completes only after release
    pub fn push_held_answer(&self, raw: RawAnswer) -> HoldHandle {
        let (tx, rx) = oneshot::channel();
        self.push(Ok(raw), Some(rx));
        HoldHandle { tx }
    }

    /// Queue a failing reply that completes only after release
    pub fn push_held_failure(&self, message: impl Into<String>) -> HoldHandle {
        let (tx, rx) = oneshot::channel();
        self.push(Err(message.into()), Some(rx));
        HoldHandle { tx }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<AnswerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait until at least `count` requests have been received
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.started.notified();
            if self.requests().len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn push(&self, reply: std::result::Result<RawAnswer, String>, gate: Option<oneshot::Receiver<()>>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(Scripted { reply, gate });
    }
}

#[async_trait]
impl AnswerSource for FakeAnswerSource {
    async fn ask(&self, request: &AnswerRequest) -> Result<Answer> {
        let scripted = {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request.clone());
            self.script
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front()
        };
        self.started.notify_waiters();

        let Some(scripted) = scripted else {
            return Err(GenieError::FetchFailed("no scripted reply".to_string()).into());
        };

        if let Some(gate) = scripted.gate {
            let _ = gate.await;
        }

        match scripted.reply {
            Ok(raw) => Ok(Answer {
                citations: normalize(&raw),
                text: raw.answer,
            }),
            Err(message) => Err(GenieError::FetchFailed(message).into()),
        }
    }
}
