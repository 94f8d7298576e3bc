//! Level-upgrade requests.

use arban_types::{CitizenId, RequestId, RequestStatus, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub requester: CitizenId,
    pub requested_level: TrustLevel,
    pub status: RequestStatus,
    pub justification: String,
    pub supporting_documents: Vec<String>,
    pub created_at: Timestamp,
    pub reviewed_by: Option<CitizenId>,
    pub reviewed_at: Option<Timestamp>,
    pub review_notes: Option<String>,
}

impl VerificationRequest {
    pub fn new(
        id: RequestId,
        requester: CitizenId,
        requested_level: TrustLevel,
        justification: String,
        supporting_documents: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            requester,
            requested_level,
            status: RequestStatus::Pending,
            justification,
            supporting_documents,
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }
}
