use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::confidence::ConfidenceScorer;
use super::types::ReviewDecision;
use crate::models::{PolicyExtraction, ProcessingStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("Illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Document is {0}, expected PENDING_REVIEW for approval")]
    NotPendingReview(ProcessingStatus),
}

/// What moved a document between states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionCause {
    Pipeline,
    Approved { reviewer: String },
    Failure { message: String },
}

/// One audited state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: ProcessingStatus,
    pub to: ProcessingStatus,
    pub at: DateTime<Utc>,
    pub cause: TransitionCause,
}

pub fn is_terminal(status: ProcessingStatus) -> bool {
    matches!(status, ProcessingStatus::Complete | ProcessingStatus::Failed)
}

/// Transitions the pipeline itself may take. Approval of PENDING_REVIEW
/// goes through `StatusTracker::approve` instead.
fn pipeline_may_transition(from: ProcessingStatus, to: ProcessingStatus) -> bool {
    use ProcessingStatus::*;
    match (from, to) {
        (f, Failed) => !is_terminal(f),
        (Queued, ExtractingText) => true,
        (ExtractingText, StructuringData) => true,
        (StructuringData, Complete | PendingReview) => true,
        _ => false,
    }
}

/// Status state machine for one document, with its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTracker {
    document_id: Uuid,
    status: ProcessingStatus,
    history: Vec<StatusTransition>,
}

impl StatusTracker {
    pub fn new(document_id: Uuid) -> Self {
        Self {
            document_id,
            status: ProcessingStatus::Queued,
            history: Vec::new(),
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusTransition] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        is_terminal(self.status)
    }

    /// Move forward along the pipeline.
    pub fn advance(&mut self, to: ProcessingStatus) -> Result<(), RoutingError> {
        if !pipeline_may_transition(self.status, to) || to == ProcessingStatus::Failed {
            return Err(RoutingError::IllegalTransition {
                from: self.status,
                to,
            });
        }
        self.record(to, TransitionCause::Pipeline);
        Ok(())
    }

    /// Stop the run. Allowed from any non-terminal state.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), RoutingError> {
        if !pipeline_may_transition(self.status, ProcessingStatus::Failed) {
            return Err(RoutingError::IllegalTransition {
                from: self.status,
                to: ProcessingStatus::Failed,
            });
        }
        self.record(
            ProcessingStatus::Failed,
            TransitionCause::Failure {
                message: message.into(),
            },
        );
        Ok(())
    }

    /// Human sign-off: PENDING_REVIEW -> COMPLETE.
    pub fn approve(&mut self, reviewer: impl Into<String>) -> Result<(), RoutingError> {
        if self.status != ProcessingStatus::PendingReview {
            return Err(RoutingError::NotPendingReview(self.status));
        }
        self.record(
            ProcessingStatus::Complete,
            TransitionCause::Approved {
                reviewer: reviewer.into(),
            },
        );
        Ok(())
    }

    fn record(&mut self, to: ProcessingStatus, cause: TransitionCause) {
        let from = self.status;
        tracing::info!(
            document_id = %self.document_id,
            from = %from,
            to = %to,
            "Status transition"
        );
        self.history.push(StatusTransition {
            from,
            to,
            at: Utc::now(),
            cause,
        });
        self.status = to;
    }
}

/// Decides COMPLETE vs PENDING_REVIEW once structuring has finished.
#[derive(Debug, Clone, Default)]
pub struct ReviewRouter {
    scorer: ConfidenceScorer,
}

impl ReviewRouter {
    pub fn new(scorer: ConfidenceScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    /// Gate the extraction and move the tracker out of STRUCTURING_DATA.
    /// PENDING_REVIEW iff the decision requires review.
    pub fn route(
        &self,
        tracker: &mut StatusTracker,
        extraction: &PolicyExtraction,
        payer_policy_count: u32,
    ) -> Result<ReviewDecision, RoutingError> {
        let decision = self.scorer.evaluate(extraction, payer_policy_count);
        let target = if decision.requires_review {
            ProcessingStatus::PendingReview
        } else {
            ProcessingStatus::Complete
        };

        tracker.advance(target)?;

        tracing::info!(
            document_id = %tracker.document_id(),
            status = %target,
            overall_confidence = decision.overall_confidence,
            reasons = decision.reasons.len(),
            "Review routing decided"
        );
        Ok(decision)
    }

    pub fn approve_review(
        &self,
        tracker: &mut StatusTracker,
        reviewer: &str,
    ) -> Result<(), RoutingError> {
        tracker.approve(reviewer)
    }
}
