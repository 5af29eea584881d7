//! Conversation orchestrator
//!
//! Composes the quota tracker, session store and answer source into the
//! question lifecycle of one conversation view:
//!
//! ```text
//! Idle -> Gated -> UserTurnAppended -> AwaitingAnswer -> Settled -> Idle
//! ```
//!
//! The view (current session, transcript, phase) lives behind a mutex that is
//! never held across an `.await`. Every switch of the viewed session advances
//! a generation counter; work started under an older generation still writes
//! its turns to the session it started in, but never touches the view.

use crate::answer::{AnswerRequest, AnswerSource};
use crate::config::{ChatConfig, Config};
use crate::error::{GenieError, Result};
use crate::identity::{Identity, IdentityProvider};
use crate::persistence::{NewMessage, Persistence, Session, UsageRecord};
use crate::quota::{IncrementOutcome, QuotaDecision, QuotaPolicy, QuotaTracker};
use crate::session::SessionStore;
use crate::transcript::{Transcript, Turn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where the current view is in the question lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready for input
    Idle,
    /// Checking and counting quota
    Gated,
    /// User turn is in the transcript; storing it
    UserTurnAppended,
    /// Pending turn shown; waiting for the answer service
    AwaitingAnswer,
}

/// Identity of a view at the moment a request started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Session the request belongs to
    pub session_id: String,
    /// View generation when the request started
    pub generation: u64,
}

/// Why a submission did not start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The free-tier limit is reached
    QuotaDenied { used: i64, limit: i64 },
    /// The usage counter could not be read or incremented
    IncrementFailed(String),
}

/// Result of [`ChatOrchestrator::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Input was empty after trimming
    Ignored,
    /// Another question of this view is in flight
    Busy,
    /// No active session; call [`ChatOrchestrator::start`] first
    NotReady,
    /// Nothing was appended
    Blocked(BlockReason),
    /// The answer was appended
    Answered,
    /// The answer service failed; the apology was appended
    Recovered,
    /// The view switched sessions before the question settled
    Discarded,
}

/// Result of [`ChatOrchestrator::attach_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Attachments need the premium tier
    PremiumRequired,
    /// Premium, but attachment upload is not available
    Unsupported,
}

struct ViewState {
    owner: Option<Identity>,
    session: Option<Session>,
    generation: u64,
    transcript: Transcript,
    phase: Phase,
    recent: Vec<Session>,
}

struct Inner {
    chat: ChatConfig,
    include_video: bool,
    quota: QuotaTracker,
    sessions: SessionStore,
    answers: Arc<dyn AnswerSource>,
    identity: Arc<dyn IdentityProvider>,
    view: Mutex<ViewState>,
}

/// Handle onto one conversation view
///
/// Clones share the same view, so a UI can hand a clone to a spawned task
/// while it keeps reading snapshots.
#[derive(Clone)]
pub struct ChatOrchestrator {
    inner: Arc<Inner>,
}

impl ChatOrchestrator {
    /// Build an orchestrator over the given backends
    pub fn new(
        config: &Config,
        persistence: Arc<dyn Persistence>,
        answers: Arc<dyn AnswerSource>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let quota = QuotaTracker::new(persistence.clone(), QuotaPolicy::from(&config.quota));
        let sessions = SessionStore::new(persistence, &config.chat);
        let transcript = Transcript::greeting(&config.chat.greeting);

        Self {
            inner: Arc::new(Inner {
                chat: config.chat.clone(),
                include_video: config.answer.include_video,
                quota,
                sessions,
                answers,
                identity,
                view: Mutex::new(ViewState {
                    owner: None,
                    session: None,
                    generation: 0,
                    transcript,
                    phase: Phase::Idle,
                    recent: Vec::new(),
                }),
            }),
        }
    }

    fn view(&self) -> MutexGuard<'_, ViewState> {
        self.inner
            .view
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolve the signed-in user and open the most recent session
    ///
    /// A usage or history read failure is logged and leaves the badge
    /// unknown or the greeting shown.
    ///
    /// # Errors
    ///
    /// Returns `GenieError::Unauthenticated` when nobody is signed in, or a
    /// transport error when no session could be found or created.
    pub async fn start(&self) -> Result<Session> {
        let identity = self.inner.identity.current_user().await?.ok_or_else(|| {
            GenieError::Unauthenticated("sign in to start chatting".to_string())
        })?;
        tracing::info!(owner = %identity.id, "Starting conversation");

        if let Err(e) = self.inner.quota.load(&identity.id).await {
            tracing::warn!("Error fetching usage: {:#}", e);
        }

        let session = self.inner.sessions.ensure_active_session(&identity.id).await?;
        let transcript = self.history_transcript(&session.id).await;

        {
            let mut view = self.view();
            view.generation += 1;
            view.owner = Some(identity);
            view.session = Some(session.clone());
            view.transcript = transcript;
            view.phase = Phase::Idle;
        }

        self.refresh_recent().await;
        Ok(session)
    }

    async fn history_transcript(&self, session_id: &str) -> Transcript {
        match self.inner.sessions.load_history(session_id).await {
            Ok(history) => Transcript::from_history(history, &self.inner.chat.greeting),
            Err(e) => {
                tracing::warn!(session = session_id, "Error loading messages: {:#}", e);
                Transcript::greeting(&self.inner.chat.greeting)
            }
        }
    }

    /// Reload the recent-session list, best-effort
    pub async fn refresh_recent(&self) {
        let Some(owner_id) = self.owner_id() else {
            return;
        };
        match self
            .inner
            .sessions
            .list_recent(&owner_id, self.inner.chat.recent_limit)
            .await
        {
            Ok(recent) => {
                self.view().recent = recent;
            }
            Err(e) => tracing::warn!("Error loading chat sessions: {:#}", e),
        }
    }

    /// Ask one question in the current view
    ///
    /// Never fails: every error path ends in a settled transcript and a
    /// typed outcome.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        let question = input.trim();
        if question.is_empty() {
            return SubmitOutcome::Ignored;
        }

        let (ctx, owner_id) = {
            let mut view = self.view();
            if view.phase != Phase::Idle {
                return SubmitOutcome::Busy;
            }
            let (Some(session), Some(owner)) = (view.session.as_ref(), view.owner.as_ref()) else {
                return SubmitOutcome::NotReady;
            };
            let ctx = SessionContext {
                session_id: session.id.clone(),
                generation: view.generation,
            };
            let owner_id = owner.id.clone();
            view.phase = Phase::Gated;
            (ctx, owner_id)
        };

        if let Err(reason) = self.pass_gate(&owner_id).await {
            self.settle_phase(&ctx);
            tracing::info!(?reason, "Submission blocked");
            return SubmitOutcome::Blocked(reason);
        }

        let user_turn = NewMessage::user(question);
        let Some((user_index, first_user_turn)) = self.with_live_view(&ctx, |view| {
            let first_user_turn = view.transcript.len() == 1;
            view.transcript.push_settled(Turn::Local(user_turn.clone()));
            view.phase = Phase::UserTurnAppended;
            (view.transcript.len() - 1, first_user_turn)
        }) else {
            return SubmitOutcome::Discarded;
        };

        if let Some(stored) = self
            .inner
            .sessions
            .append_message(&ctx.session_id, &owner_id, &user_turn)
            .await
        {
            self.with_live_view(&ctx, |view| view.transcript.mark_persisted(user_index, stored));
        }

        if first_user_turn {
            if let Some(title) = self
                .inner
                .sessions
                .rename_from_first_user_turn(&ctx.session_id, question)
                .await
            {
                self.apply_title(&ctx.session_id, &title);
                self.refresh_recent().await;
            }
        }

        let thinking = self.inner.chat.thinking_text.clone();
        let awaiting = self.with_live_view(&ctx, |view| {
            view.transcript.push_pending(thinking);
            view.phase = Phase::AwaitingAnswer;
        });
        if awaiting.is_none() {
            return SubmitOutcome::Discarded;
        }

        let request = AnswerRequest {
            question: question.to_string(),
            include_video: self.inner.include_video,
        };
        let (reply, outcome) = match self.inner.answers.ask(&request).await {
            Ok(answer) => {
                tracing::debug!(citations = answer.citations.len(), "Answer received");
                (
                    NewMessage::assistant(answer.text, answer.citations),
                    SubmitOutcome::Answered,
                )
            }
            Err(e) => {
                tracing::error!("Error getting AI response: {:#}", e);
                (
                    NewMessage::assistant(self.inner.chat.apology_text.clone(), Vec::new()),
                    SubmitOutcome::Recovered,
                )
            }
        };

        let reply_index = self.with_live_view(&ctx, |view| {
            view.transcript.push_settled(Turn::Local(reply.clone()));
            view.phase = Phase::Idle;
            view.transcript.len() - 1
        });
        if reply_index.is_none() {
            tracing::debug!(
                session = %ctx.session_id,
                "View switched while awaiting answer; reply kept out of view"
            );
        }

        let stored = self
            .inner
            .sessions
            .append_message(&ctx.session_id, &owner_id, &reply)
            .await;

        match (reply_index, stored) {
            (Some(index), Some(stored)) => {
                self.with_live_view(&ctx, |view| view.transcript.mark_persisted(index, stored));
                outcome
            }
            (Some(_), None) => outcome,
            (None, _) => SubmitOutcome::Discarded,
        }
    }

    async fn pass_gate(&self, owner_id: &str) -> std::result::Result<(), BlockReason> {
        let quota = &self.inner.quota;
        let record = match quota.usage().filter(|u| u.owner_id == owner_id) {
            Some(record) => record,
            None => quota
                .load(owner_id)
                .await
                .map_err(|e| BlockReason::IncrementFailed(format!("{:#}", e)))?,
        };

        if let QuotaDecision::LimitReached { used, limit } = quota.check(&record) {
            return Err(BlockReason::QuotaDenied { used, limit });
        }

        match quota.increment(owner_id).await {
            IncrementOutcome::Counted(_) => Ok(()),
            IncrementOutcome::Denied(message) => Err(BlockReason::IncrementFailed(message)),
        }
    }

    /// Run `f` on the view only if it still shows the request's generation
    fn with_live_view<T>(
        &self,
        ctx: &SessionContext,
        f: impl FnOnce(&mut ViewState) -> T,
    ) -> Option<T> {
        let mut view = self.view();
        if view.generation == ctx.generation {
            Some(f(&mut *view))
        } else {
            None
        }
    }

    fn settle_phase(&self, ctx: &SessionContext) {
        self.with_live_view(ctx, |view| view.phase = Phase::Idle);
    }

    fn apply_title(&self, session_id: &str, title: &str) {
        let mut view = self.view();
        if let Some(session) = view.session.as_mut().filter(|s| s.id == session_id) {
            session.title = title.to_string();
        }
        if let Some(session) = view.recent.iter_mut().find(|s| s.id == session_id) {
            session.title = title.to_string();
        }
    }

    /// Switch the view to an existing session
    ///
    /// Any question still in flight keeps writing to its own session but no
    /// longer changes the view. A failed lookup leaves the view untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be read or does not exist.
    pub async fn load_chat(&self, session_id: &str) -> Result<Session> {
        let generation = self.view().generation;

        let session = self
            .inner
            .sessions
            .find_session(session_id)
            .await?
            .ok_or_else(|| GenieError::Validation(format!("Unknown session: {}", session_id)))?;
        let transcript = self.history_transcript(&session.id).await;

        let mut view = self.view();
        // Another switch won the race while the session was loading
        if view.generation != generation {
            tracing::debug!(session = %session.id, "View switched during load; not shown");
            return Ok(session);
        }
        view.generation += 1;
        view.phase = Phase::Idle;
        view.session = Some(session.clone());
        view.transcript = transcript;
        tracing::info!(session = %session.id, "Loaded chat");
        Ok(session)
    }

    /// Open a fresh session showing only the greeting
    ///
    /// # Errors
    ///
    /// Returns error if there is no signed-in owner or the session insert fails.
    pub async fn new_chat(&self) -> Result<Session> {
        let owner_id = self.owner_id().ok_or_else(|| {
            GenieError::Unauthenticated("sign in to start chatting".to_string())
        })?;
        let generation = self.advance_generation();

        let session = self.inner.sessions.create_session(&owner_id).await?;
        {
            let mut view = self.view();
            if view.generation == generation {
                view.session = Some(session.clone());
                view.transcript = Transcript::greeting(&self.inner.chat.greeting);
            }
        }

        self.refresh_recent().await;
        Ok(session)
    }

    fn advance_generation(&self) -> u64 {
        let mut view = self.view();
        view.generation += 1;
        view.phase = Phase::Idle;
        view.transcript.clear_pending();
        view.generation
    }

    /// Sign out and clear the view
    ///
    /// # Errors
    ///
    /// Returns error if the identity provider fails to sign out.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.identity.sign_out().await?;
        let mut view = self.view();
        view.generation += 1;
        view.owner = None;
        view.session = None;
        view.recent.clear();
        view.phase = Phase::Idle;
        view.transcript = Transcript::greeting(&self.inner.chat.greeting);
        tracing::info!("Signed out");
        Ok(())
    }

    /// Gate for file attachments
    pub fn attach_file(&self) -> AttachOutcome {
        match self.inner.quota.usage() {
            Some(record) if self.inner.quota.can_attach_files(&record) => {
                AttachOutcome::Unsupported
            }
            _ => AttachOutcome::PremiumRequired,
        }
    }

    /// Snapshot of the transcript
    pub fn transcript(&self) -> Transcript {
        self.view().transcript.clone()
    }

    /// The viewed session
    pub fn current_session(&self) -> Option<Session> {
        self.view().session.clone()
    }

    /// Recent sessions, newest first
    pub fn recent_sessions(&self) -> Vec<Session> {
        self.view().recent.clone()
    }

    /// Last known usage record
    pub fn usage(&self) -> Option<UsageRecord> {
        self.inner.quota.usage()
    }

    /// Messages left before the gate blocks; `None` when unlimited or unknown
    pub fn remaining_messages(&self) -> Option<i64> {
        let record = self.inner.quota.usage()?;
        if self.inner.quota.policy().enforce {
            self.inner.quota.remaining(&record)
        } else {
            None
        }
    }

    /// The active quota policy
    pub fn quota_policy(&self) -> QuotaPolicy {
        self.inner.quota.policy()
    }

    /// Lifecycle phase of the view
    pub fn phase(&self) -> Phase {
        self.view().phase
    }

    /// The signed-in owner id
    pub fn owner_id(&self) -> Option<String> {
        self.view().owner.as_ref().map(|o| o.id.clone())
    }
}
