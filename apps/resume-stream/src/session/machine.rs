#![allow(dead_code)]

//! Session state machine: `Idle → Streaming → {Completed | Failed | Cancelled}`.
//!
//! Synchronous and free of I/O: the worker in `session/mod.rs` feeds it
//! commands and transport events tagged with their generation, and publishes
//! `view()` whenever a step reports `Step::Published`.

use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::assembly::{decode, merge, score, RawSnapshot};
use crate::errors::{Failure, SessionError};
use crate::models::resume::ResumeDocument;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Failed(Failure),
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed(_) | SessionState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Failed(_) => "failed",
            SessionState::Cancelled => "cancelled",
        }
    }
}

/// What the renderer sees. The document sits behind an `Arc` and is replaced
/// wholesale on every update, so holding on to a view never observes a
/// half-merged document.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub generation: u64,
    pub state: SessionState,
    pub document: Arc<ResumeDocument>,
    pub score: u8,
}

/// Outcome of feeding one input to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The observable view changed and should be published.
    Published,
    /// Accepted, but the view is identical to the last published one.
    Unchanged,
    /// Undecodable event, skipped.
    Skipped,
    /// Stale generation or terminal state; nothing happened.
    Discarded,
}

/// Rejects blank input before any transport activity.
pub fn validate_input(text: &str) -> Result<(), SessionError> {
    if text.trim().is_empty() {
        return Err(SessionError::Validation(
            "Please enter resume text".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub struct SessionMachine {
    generation: u64,
    state: SessionState,
    document: Arc<ResumeDocument>,
    score: u8,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: SessionState::Idle,
            document: Arc::new(ResumeDocument::default()),
            score: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            generation: self.generation,
            state: self.state.clone(),
            document: Arc::clone(&self.document),
            score: self.score,
        }
    }

    /// Moves a still-streaming generation to `Cancelled` because `generation`
    /// is about to replace it. Run before `begin` so the cancelled view can be
    /// published on its own.
    pub fn supersede(&mut self, generation: u64) -> Step {
        if generation <= self.generation || self.state != SessionState::Streaming {
            return Step::Discarded;
        }
        info!(
            generation = self.generation,
            superseded_by = generation,
            "Session cancelled by a new start"
        );
        self.state = SessionState::Cancelled;
        Step::Published
    }

    /// Starts `generation`, replacing whatever ran before it. A generation
    /// still streaming here is cancelled first, as `supersede` would.
    ///
    /// Generations must increase; an older or repeated one is discarded.
    pub fn begin(&mut self, generation: u64, text: &str) -> Result<Step, SessionError> {
        validate_input(text)?;
        if generation <= self.generation {
            return Ok(Step::Discarded);
        }

        self.supersede(generation);
        self.reset(generation, SessionState::Streaming);
        info!(generation, input_len = text.len(), "Session started");
        Ok(Step::Published)
    }

    /// Handles one raw event payload from the transport.
    pub fn on_message(&mut self, generation: u64, raw: &str) -> Step {
        if !self.accepts(generation) {
            debug!(generation, current = self.generation, "Discarding stale event");
            return Step::Discarded;
        }

        match decode(raw) {
            RawSnapshot::DecodeFailure { raw, reason } => {
                warn!(generation, %reason, "Skipping undecodable snapshot");
                debug!(generation, %raw, "Undecodable snapshot payload");
                Step::Skipped
            }
            RawSnapshot::RemoteError(message) => {
                error!(generation, %message, "Extraction service reported an error");
                self.state = SessionState::Failed(Failure::Remote(message));
                Step::Published
            }
            RawSnapshot::Document(partial) => {
                let merged = merge(&self.document, partial);
                if merged == *self.document {
                    return Step::Unchanged;
                }
                self.score = score(&merged);
                self.document = Arc::new(merged);
                debug!(generation, score = self.score, "Snapshot merged");
                Step::Published
            }
        }
    }

    /// Normal end of stream. The score is forced to 100: no more updates are
    /// coming, which is not a claim that every section was found.
    pub fn on_close(&mut self, generation: u64) -> Step {
        if !self.accepts(generation) {
            return Step::Discarded;
        }
        info!(generation, computed_score = self.score, "Stream completed");
        self.state = SessionState::Completed;
        self.score = 100;
        Step::Published
    }

    /// Connection-level failure. The cause is logged; the view only carries
    /// the generic connection message.
    pub fn on_transport_error(&mut self, generation: u64, cause: impl Display) -> Step {
        if !self.accepts(generation) {
            return Step::Discarded;
        }
        error!(generation, %cause, "Extraction stream failed");
        self.state = SessionState::Failed(Failure::connection());
        Step::Published
    }

    /// Cancels the running generation. Only a streaming session can be
    /// cancelled; otherwise this is a no-op.
    pub fn cancel(&mut self) -> Step {
        if self.state != SessionState::Streaming {
            return Step::Discarded;
        }
        info!(generation = self.generation, "Session cancelled");
        self.state = SessionState::Cancelled;
        Step::Published
    }

    /// Drops the current session entirely and returns to `Idle`.
    pub fn clear(&mut self, generation: u64) -> Step {
        if generation <= self.generation {
            return Step::Discarded;
        }
        self.reset(generation, SessionState::Idle);
        Step::Published
    }

    fn reset(&mut self, generation: u64, state: SessionState) {
        self.generation = generation;
        self.state = state;
        self.document = Arc::new(ResumeDocument::default());
        self.score = 0;
    }

    fn accepts(&self, generation: u64) -> bool {
        generation == self.generation && self.state == SessionState::Streaming
    }
}
