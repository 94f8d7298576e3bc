//! Upgrade requests: a citizen asks for the next level, an elevated reviewer
//! approves or rejects.

use crate::engine::{apply_level, load_citizen, LevelEngine};
use crate::error::LevelError;
use crate::transition::LevelTransition;
use arban_store::{TrustRead, TrustWrite, VerificationRequest};
use arban_types::{CitizenId, LevelSource, RequestId, RequestStatus, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};

/// A citizen's ask for the level above their current one.
#[derive(Clone, Debug)]
pub struct UpgradeRequest {
    pub requester: CitizenId,
    pub level: TrustLevel,
    pub justification: String,
    pub supporting_documents: Vec<String>,
}

impl UpgradeRequest {
    pub fn new(
        requester: impl Into<CitizenId>,
        level: TrustLevel,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            requester: requester.into(),
            level,
            justification: justification.into(),
            supporting_documents: Vec::new(),
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.supporting_documents.push(document.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub request: VerificationRequest,
    /// Set when an approval moved the requester up a level.
    pub transition: Option<LevelTransition>,
}

impl LevelEngine {
    pub fn request_upgrade<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        ask: UpgradeRequest,
        now: Timestamp,
    ) -> Result<VerificationRequest, LevelError> {
        let requester = load_citizen(&*txn, &ask.requester)?;
        if !ask.level.is_requestable() {
            return Err(LevelError::NotRequestable(ask.level));
        }
        if requester.trust_level.next() != Some(ask.level) {
            return Err(LevelError::WrongCurrentLevel {
                citizen: requester.id,
                current: requester.trust_level,
                requested: ask.level,
            });
        }
        let duplicate = txn
            .requests_by(&requester.id)?
            .into_iter()
            .any(|r| r.is_pending() && r.requested_level == ask.level);
        if duplicate {
            return Err(LevelError::DuplicatePendingRequest {
                citizen: requester.id,
                level: ask.level,
            });
        }

        let id = txn.next_request_id()?;
        let request = VerificationRequest::new(
            id,
            requester.id,
            ask.level,
            ask.justification,
            ask.supporting_documents,
            now,
        );
        txn.put_request(&request)?;
        tracing::info!(request = %id, requester = %request.requester, level = %ask.level, "upgrade requested");
        Ok(request)
    }

    pub fn review_request<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        id: RequestId,
        reviewer: &CitizenId,
        decision: ReviewDecision,
        notes: Option<String>,
        now: Timestamp,
    ) -> Result<ReviewOutcome, LevelError> {
        let reviewer = load_citizen(&*txn, reviewer)?;
        if !reviewer.role.can_approve() {
            return Err(LevelError::Unauthorized {
                actor: reviewer.id,
                action: "review upgrade requests",
            });
        }
        let mut request = txn.request(id)?.ok_or(LevelError::RequestNotFound(id))?;
        if !request.is_pending() {
            return Err(LevelError::AlreadyReviewed(id));
        }
        if request.requester == reviewer.id {
            return Err(LevelError::SelfReview(reviewer.id));
        }

        let transition = match decision {
            ReviewDecision::Approve => {
                let mut requester = load_citizen(&*txn, &request.requester)?;
                if requester.trust_level.next() != Some(request.requested_level) {
                    return Err(LevelError::WrongCurrentLevel {
                        citizen: requester.id,
                        current: requester.trust_level,
                        requested: request.requested_level,
                    });
                }
                let transition = apply_level(
                    &mut requester,
                    request.requested_level,
                    LevelSource::Review,
                    Some(reviewer.id.clone()),
                    now,
                );
                txn.put_citizen(&requester)?;
                request.status = RequestStatus::Approved;
                Some(transition)
            }
            ReviewDecision::Reject => {
                request.status = RequestStatus::Rejected;
                None
            }
        };
        request.reviewed_by = Some(reviewer.id);
        request.reviewed_at = Some(now);
        request.review_notes = notes;
        txn.put_request(&request)?;

        tracing::info!(
            request = %id,
            requester = %request.requester,
            decision = ?decision,
            "upgrade request reviewed"
        );
        Ok(ReviewOutcome {
            request,
            transition,
        })
    }

    /// Pending requests, oldest first.
    pub fn pending_requests<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
    ) -> Result<Vec<VerificationRequest>, LevelError> {
        let mut pending: Vec<_> = txn
            .requests()?
            .into_iter()
            .filter(VerificationRequest::is_pending)
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        Ok(pending)
    }

    /// Every request made by `citizen`, newest first.
    pub fn requests_of<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
    ) -> Result<Vec<VerificationRequest>, LevelError> {
        load_citizen(txn, citizen)?;
        let mut mine = txn.requests_by(citizen)?;
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(mine)
    }
}
