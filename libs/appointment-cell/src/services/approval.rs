// libs/appointment-cell/src/services/approval.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use identity_cell::IdentityResolver;
use messaging_cell::{
    feed_entry, AppointmentSummary, MessageKind, NotificationFeed, Notifier, Recipient, RecipientKind,
};
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentError, AppointmentRequest, ApproveRequest, DeclineRequest, DeclinedBy,
    ProposeRequest, RequestOutcome, RequestStatus,
};
use crate::services::context::{ContextCompletionService, SchedulingContext};
use crate::services::lifecycle::{RequestAction, RequestLifecycleService};
use crate::services::materializer::{AppointmentMaterializer, Materialized};
use crate::services::schema::ProposeWritePath;
use crate::services::store::AppointmentRequestStore;
use crate::state::AppointmentState;

/// Orchestrates the request lifecycle.
///
/// Approve and accept run as a saga: complete the context, materialize the
/// appointment, then flip the request status with a conditional write. The
/// flip is last so a crash in between leaves a retryable request. Messages
/// and feed entries go out only after the flip and never fail the operation.
pub struct AppointmentApprovalService {
    store: AppointmentRequestStore,
    completion: ContextCompletionService,
    materializer: AppointmentMaterializer,
    lifecycle: RequestLifecycleService,
    resolver: Arc<IdentityResolver>,
    notifier: Arc<Notifier>,
    feed: NotificationFeed,
    feed_token: String,
}

impl AppointmentApprovalService {
    pub fn new(state: &AppointmentState) -> Self {
        let supabase = Arc::new(SupabaseClient::new(&state.config));
        let resolver = Arc::new(IdentityResolver::with_client(supabase.clone()));

        Self {
            store: AppointmentRequestStore::new(supabase.clone(), state.write_path),
            completion: ContextCompletionService::new(resolver.clone()),
            materializer: AppointmentMaterializer::new(supabase.clone()),
            lifecycle: RequestLifecycleService::new(),
            resolver,
            notifier: state.notifier.clone(),
            feed: NotificationFeed::with_client(supabase),
            feed_token: state.config.service_token().to_string(),
        }
    }

    fn proposals_tracked(&self) -> bool {
        self.store.write_path() != ProposeWritePath::RewriteSlotWithoutStatus
    }

    pub async fn get_request(&self, request_id: Uuid, auth_token: &str) -> Result<AppointmentRequest, AppointmentError> {
        self.store.get(request_id, auth_token).await
    }

    /// True when `user` is the patient the request belongs to.
    pub async fn is_request_patient(
        &self,
        request: &AppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        if request.patient_id.to_string() == user.id {
            return Ok(true);
        }
        let patient = self
            .resolver
            .resolve_patient(request.patient_id, request.clinic_id, auth_token)
            .await?;
        Ok(patient.is_account(&user.id, user.email.as_deref()))
    }

    /// Re-reads a request whose conditional write matched nothing.
    async fn lost_race(&self, request_id: Uuid, action: RequestAction, auth_token: &str) -> AppointmentError {
        match self.store.get(request_id, auth_token).await {
            Ok(current) if current.status == RequestStatus::Approved => AppointmentError::AlreadyApproved(request_id),
            Ok(current) => AppointmentError::InvalidTransition {
                from: current.status,
                action: action.verb(),
            },
            Err(e) => e,
        }
    }

    // ==========================================================================
    // PROPOSE
    // ==========================================================================

    #[instrument(skip(self, input, auth_token))]
    pub async fn propose(
        &self,
        request_id: Uuid,
        input: ProposeRequest,
        auth_token: &str,
    ) -> Result<RequestOutcome, AppointmentError> {
        let slot = input.slot();
        slot.validate()?;

        let request = self.store.get(request_id, auth_token).await?;
        self.lifecycle
            .validate_with(&request, RequestAction::Propose, self.proposals_tracked())?;

        let updated = match self.store.write_proposal(request_id, &slot, auth_token).await? {
            Some(updated) => updated,
            None => return Err(self.lost_race(request_id, RequestAction::Propose, auth_token).await),
        };

        let summary = AppointmentSummary {
            date: slot.date,
            time: slot.time,
            end_time: slot.end_time,
            clinic_name: None,
            doctor_name: None,
            patient_name: None,
            reason: updated.reason.clone(),
        };
        self.notify_patient(&updated, MessageKind::ProposalOffered, summary, auth_token).await;

        Ok(RequestOutcome {
            id: request_id,
            status: self.store.write_path().resulting_status(updated.status),
        })
    }

    // ==========================================================================
    // APPROVE / ACCEPT
    // ==========================================================================

    #[instrument(skip(self, overrides, auth_token))]
    pub async fn approve(
        &self,
        request_id: Uuid,
        overrides: ApproveRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let request = self.store.get(request_id, auth_token).await?;
        self.lifecycle.validate(&request, RequestAction::Approve)?;

        let context = self
            .completion
            .complete_for_approval(&request, &overrides, auth_token)
            .await?;
        let (appointment, context) = self.commit(&request, context, RequestAction::Approve, auth_token).await?;

        let summary = context.summary();
        self.notifier
            .appointment_created(&patient_recipient(&context), &doctor_recipient(&context), &summary)
            .await;
        self.record_created(&context, request_id, &summary).await;

        Ok(appointment)
    }

    #[instrument(skip(self, auth_token))]
    pub async fn accept(&self, request_id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        let request = self.store.get(request_id, auth_token).await?;
        self.lifecycle
            .validate_with(&request, RequestAction::Accept, self.proposals_tracked())?;

        let context = self.completion.complete_for_acceptance(&request, auth_token).await?;
        let (appointment, context) = self.commit(&request, context, RequestAction::Accept, auth_token).await?;

        let summary = context.summary();
        let patient = patient_recipient(&context);
        let doctor = doctor_recipient(&context);
        self.notifier.appointment_created(&patient, &doctor, &summary).await;
        self.notifier.patient_accepted(&doctor, &summary).await;
        self.record_created(&context, request_id, &summary).await;

        Ok(appointment)
    }

    /// Materialize, then flip. A reused appointment overrides the context so
    /// the request, the stored row and the messages agree. When the flip
    /// loses, an approved request is reported as such and a declined one has
    /// its appointment removed.
    async fn commit(
        &self,
        request: &AppointmentRequest,
        context: SchedulingContext,
        action: RequestAction,
        auth_token: &str,
    ) -> Result<(Appointment, SchedulingContext), AppointmentError> {
        let Materialized { appointment, created } =
            self.materializer.materialize(&context, request.id, auth_token).await?;
        let context = if created {
            context
        } else {
            info!("Reusing appointment {} for request {}", appointment.id, request.id);
            self.completion.align_with_existing(context, &appointment, auth_token).await?
        };

        let flipped = self
            .store
            .finalize_approval(request.id, Some(context.clinic.id), Some(context.doctor.id), auth_token)
            .await?;
        if flipped.is_some() {
            return Ok((appointment, context));
        }

        let current = self.store.get(request.id, auth_token).await?;
        match current.status {
            RequestStatus::Approved => Err(AppointmentError::AlreadyApproved(request.id)),
            status => {
                if status == RequestStatus::Declined {
                    warn!("Request {} was declined during {}; discarding its appointment", request.id, action.verb());
                    self.materializer.discard(appointment.id, auth_token).await?;
                }
                Err(AppointmentError::InvalidTransition { from: status, action: action.verb() })
            }
        }
    }

    // ==========================================================================
    // DECLINE
    // ==========================================================================

    #[instrument(skip(self, input, auth_token))]
    pub async fn decline(
        &self,
        request_id: Uuid,
        input: DeclineRequest,
        declined_by: DeclinedBy,
        auth_token: &str,
    ) -> Result<RequestOutcome, AppointmentError> {
        let action = RequestAction::Decline(declined_by);
        let request = self.store.get(request_id, auth_token).await?;
        self.lifecycle.validate_with(&request, action, self.proposals_tracked())?;

        let reason = input.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let updated = match self
            .store
            .mark_declined(
                request_id,
                &[RequestStatus::Pending, RequestStatus::Proposed],
                declined_by,
                reason,
                auth_token,
            )
            .await?
        {
            Some(updated) => updated,
            None => return Err(self.lost_race(request_id, action, auth_token).await),
        };

        let slot = request.effective_slot();
        let summary = AppointmentSummary {
            date: slot.date,
            time: slot.time,
            end_time: slot.end_time,
            clinic_name: None,
            doctor_name: None,
            patient_name: None,
            reason: reason.map(str::to_string),
        };
        match declined_by {
            DeclinedBy::Clinic => {
                self.notify_patient(&updated, MessageKind::RequestDeclined, summary, auth_token).await
            }
            DeclinedBy::Patient => self.notify_clinic(&updated, summary, auth_token).await,
        }

        Ok(RequestOutcome { id: request_id, status: updated.status })
    }

    // ==========================================================================
    // BEST-EFFORT NOTIFICATIONS
    // ==========================================================================

    async fn notify_patient(
        &self,
        request: &AppointmentRequest,
        kind: MessageKind,
        summary: AppointmentSummary,
        auth_token: &str,
    ) {
        let patient = match self
            .resolver
            .resolve_patient(request.patient_id, request.clinic_id, auth_token)
            .await
        {
            Ok(patient) => patient,
            Err(e) => {
                warn!("Skipping {} notification for request {}: {}", kind, request.id, e);
                return;
            }
        };

        let recipient = Recipient::new(patient.email.clone(), patient.display_name.clone());
        let report = match kind {
            MessageKind::ProposalOffered => self.notifier.proposal_offered(&recipient, &summary).await,
            _ => self.notifier.request_declined(&recipient, &summary).await,
        };
        debug!("{} notification for request {}: {:?}", kind, request.id, report);

        self.feed
            .record(
                feed_entry(
                    kind,
                    patient.id,
                    RecipientKind::Patient,
                    &patient.display_name,
                    &summary,
                    Some(request.id),
                ),
                &self.feed_token,
            )
            .await;
    }

    async fn notify_clinic(&self, request: &AppointmentRequest, summary: AppointmentSummary, auth_token: &str) {
        let Some(clinic_id) = request.clinic_id else {
            debug!("Request {} has no clinic to notify", request.id);
            return;
        };
        let clinic = match self.resolver.resolve_clinic(clinic_id, auth_token).await {
            Ok(clinic) => clinic,
            Err(e) => {
                warn!("Skipping decline notification for request {}: {}", request.id, e);
                return;
            }
        };

        let recipient = Recipient::new(clinic.email.clone(), clinic.name.clone());
        self.notifier.request_declined(&recipient, &summary).await;
        self.feed
            .record(
                feed_entry(
                    MessageKind::RequestDeclined,
                    clinic.id,
                    RecipientKind::Clinic,
                    &clinic.name,
                    &summary,
                    Some(request.id),
                ),
                &self.feed_token,
            )
            .await;
    }

    async fn record_created(&self, context: &SchedulingContext, request_id: Uuid, summary: &AppointmentSummary) {
        let audience = self.notifier.audience();
        if audience.includes_patient() {
            self.feed
                .record(
                    feed_entry(
                        MessageKind::AppointmentCreated,
                        context.patient.id,
                        RecipientKind::Patient,
                        &context.patient.display_name,
                        summary,
                        Some(request_id),
                    ),
                    &self.feed_token,
                )
                .await;
        }
        if audience.includes_doctor() {
            self.feed
                .record(
                    feed_entry(
                        MessageKind::AppointmentCreated,
                        context.doctor.id,
                        RecipientKind::Doctor,
                        &context.doctor.display_name,
                        summary,
                        Some(request_id),
                    ),
                    &self.feed_token,
                )
                .await;
        }
    }
}

fn patient_recipient(context: &SchedulingContext) -> Recipient {
    Recipient::new(context.patient.email.clone(), context.patient.display_name.clone())
}

fn doctor_recipient(context: &SchedulingContext) -> Recipient {
    Recipient::new(context.doctor.email.clone(), context.doctor.display_name.clone())
}
