// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentRequest, DeclinedBy, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Propose,
    Approve,
    Accept,
    Decline(DeclinedBy),
}

impl RequestAction {
    pub fn verb(&self) -> &'static str {
        match self {
            RequestAction::Propose => "propose",
            RequestAction::Approve => "approve",
            RequestAction::Accept => "accept",
            RequestAction::Decline(DeclinedBy::Patient) => "decline",
            RequestAction::Decline(DeclinedBy::Clinic) => "reject",
        }
    }
}

pub struct RequestLifecycleService;

impl RequestLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Statuses from which `action` may start.
    pub fn allowed_from(&self, action: RequestAction) -> &'static [RequestStatus] {
        match action {
            RequestAction::Propose | RequestAction::Approve | RequestAction::Accept => {
                &[RequestStatus::Pending, RequestStatus::Proposed]
            }
            RequestAction::Decline(DeclinedBy::Patient) => &[RequestStatus::Proposed],
            RequestAction::Decline(DeclinedBy::Clinic) => &[RequestStatus::Pending, RequestStatus::Proposed],
        }
    }

    pub fn validate(&self, request: &AppointmentRequest, action: RequestAction) -> Result<(), AppointmentError> {
        self.validate_with(request, action, true)
    }

    /// `proposals_tracked` is false when the write path cannot record that a
    /// proposal is outstanding; accept then takes the stored slot as offered.
    pub fn validate_with(
        &self,
        request: &AppointmentRequest,
        action: RequestAction,
        proposals_tracked: bool,
    ) -> Result<(), AppointmentError> {
        debug!("Validating {} on request {} in status {}", action.verb(), request.id, request.status);

        if request.status == RequestStatus::Approved
            && matches!(action, RequestAction::Approve | RequestAction::Accept)
        {
            return Err(AppointmentError::AlreadyApproved(request.id));
        }

        let untracked_decline = !proposals_tracked
            && action == RequestAction::Decline(DeclinedBy::Patient)
            && request.status == RequestStatus::Pending;

        if !untracked_decline && !self.allowed_from(action).contains(&request.status) {
            warn!("Rejected {} on request {} in status {}", action.verb(), request.id, request.status);
            return Err(AppointmentError::InvalidTransition {
                from: request.status,
                action: action.verb(),
            });
        }

        if action == RequestAction::Accept && proposals_tracked && !request.has_pending_proposal() {
            return Err(AppointmentError::NoPendingProposal);
        }

        Ok(())
    }
}

impl Default for RequestLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
