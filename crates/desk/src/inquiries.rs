use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use wayfare_core::forms::{
    AdminResponseForm, BulkInquiryAction, BulkInquiryForm, BulkProcessForm, ContactForm,
    InquiryAssignForm,
};
use wayfare_core::reporting::{inquiry_statistics, InquiryStatistics};
use wayfare_core::{
    new_id, Inquiry, InquiryAnalysis, InquiryPriority, InquiryStatus, ResponderDecision, User,
    UserRole,
};
use wayfare_storage::TravelStore;

use crate::notify;
use crate::{DeskError, DeskResult, TravelDesk};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub updated: usize,
    /// Ids that matched no inquiry.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkProcessSummary {
    pub processed: usize,
    pub auto_answered: usize,
    pub escalated: usize,
    /// Missing or already resolved.
    pub skipped: usize,
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    /// Stores a contact-form message, runs the auto-responder over it and
    /// either answers right away or queues it for a human.
    #[instrument(skip(self, sender, form), fields(subject = %form.subject))]
    pub async fn submit_inquiry(&self, sender: Option<&User>, form: ContactForm) -> DeskResult<Inquiry> {
        form.validate()?;
        let name = form.name.trim().to_string();
        let subject = form.subject.trim().to_string();
        let message = form.message.trim().to_string();
        let email = form.email.trim().to_lowercase();
        let decision = self.decide(&name, &email, &subject, &message).await?;

        let mut inquiry = Inquiry {
            inquiry_id: new_id(),
            user_id: sender.map(|user| user.user_id.clone()),
            name,
            email,
            phone: form.cleaned_phone(),
            subject,
            message,
            category: decision.analysis.category,
            bot_confidence: decision.analysis.confidence,
            bot_reply: None,
            requires_human_review: true,
            escalation_reasons: Vec::new(),
            status: InquiryStatus::New,
            priority: InquiryPriority::Medium,
            assigned_to: None,
            template_id: None,
            admin_response: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        apply_decision(&mut inquiry, &decision);
        self.store.insert_inquiry(&inquiry).await?;
        self.record_decision(&inquiry);

        for email in notify::inquiry_notification(&self.settings.admin_emails, &inquiry) {
            self.deliver(email).await;
        }
        if let Some(reply) = inquiry.bot_reply.as_deref() {
            self.deliver(notify::auto_reply(&inquiry, reply)).await;
        }
        Ok(inquiry)
    }

    pub async fn list_inquiries(&self, needs_review_only: bool) -> DeskResult<Vec<Inquiry>> {
        let inquiries = self.store.list_inquiries().await?;
        Ok(inquiries
            .into_iter()
            .filter(|inquiry| !needs_review_only || inquiry.status == InquiryStatus::NeedsReview)
            .collect())
    }

    pub async fn get_inquiry(&self, inquiry_id: &str) -> DeskResult<Inquiry> {
        self.store
            .get_inquiry(inquiry_id)
            .await?
            .ok_or(DeskError::NotFound("inquiry"))
    }

    /// Runs the responder again, e.g. after the threshold or the templates
    /// changed. Resolved inquiries are left as they are.
    pub async fn reprocess_inquiry(&self, inquiry_id: &str) -> DeskResult<Inquiry> {
        let inquiry = self.get_inquiry(inquiry_id).await?;
        if inquiry.status == InquiryStatus::Resolved {
            return Err(DeskError::Conflict(
                "Resolved inquiries cannot be reprocessed.".to_string(),
            ));
        }
        self.rerun(inquiry).await
    }

    async fn rerun(&self, mut inquiry: Inquiry) -> DeskResult<Inquiry> {
        let decision = self
            .decide(&inquiry.name, &inquiry.email, &inquiry.subject, &inquiry.message)
            .await?;
        let already_answered = inquiry.status == InquiryStatus::AutoAnswered;
        apply_decision(&mut inquiry, &decision);
        self.store.update_inquiry(&inquiry).await?;
        self.record_decision(&inquiry);

        if !already_answered {
            if let Some(reply) = inquiry.bot_reply.as_deref() {
                self.deliver(notify::auto_reply(&inquiry, reply)).await;
            }
        }
        Ok(inquiry)
    }

    /// Hands an open inquiry to an administrator, or back to the queue when
    /// `assigned_to` is empty.
    #[instrument(skip(self, form))]
    pub async fn assign_inquiry(
        &self,
        inquiry_id: &str,
        form: InquiryAssignForm,
    ) -> DeskResult<Inquiry> {
        let mut inquiry = self.get_inquiry(inquiry_id).await?;
        if inquiry.status == InquiryStatus::Resolved {
            return Err(DeskError::Conflict(
                "Resolved inquiries cannot be reassigned.".to_string(),
            ));
        }
        let assignee = form
            .assigned_to
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        match assignee {
            Some(user_id) => {
                let staff = self
                    .store
                    .get_user(&user_id)
                    .await?
                    .filter(|user| user.is_active && user.role == UserRole::Admin);
                if staff.is_none() {
                    return Err(DeskError::BadRequest(
                        "Inquiries can only be assigned to an active administrator.".to_string(),
                    ));
                }
                if matches!(inquiry.status, InquiryStatus::New | InquiryStatus::NeedsReview) {
                    inquiry.status = InquiryStatus::InProgress;
                }
                inquiry.assigned_to = Some(user_id);
            }
            None => {
                if inquiry.status == InquiryStatus::InProgress {
                    inquiry.status = InquiryStatus::NeedsReview;
                }
                inquiry.assigned_to = None;
            }
        }
        self.store.update_inquiry(&inquiry).await?;
        info!(
            inquiry_id = %inquiry.inquiry_id,
            assigned_to = inquiry.assigned_to.as_deref().unwrap_or("-"),
            "inquiry assignment changed"
        );
        Ok(inquiry)
    }

    /// Applies one action to each listed inquiry. Unknown ids are reported
    /// back rather than failing the batch.
    #[instrument(skip(self, form), fields(action = ?form.action, count = form.inquiry_ids.len()))]
    pub async fn bulk_update_inquiries(&self, form: BulkInquiryForm) -> DeskResult<BulkOutcome> {
        form.validate()?;
        let mut outcome = BulkOutcome::default();
        for inquiry_id in &form.inquiry_ids {
            let Some(mut inquiry) = self.store.get_inquiry(inquiry_id).await? else {
                outcome.missing.push(inquiry_id.clone());
                continue;
            };
            match form.action {
                BulkInquiryAction::Delete => {
                    self.store.delete_inquiry(inquiry_id).await?;
                }
                BulkInquiryAction::MarkResolved => {
                    inquiry.status = InquiryStatus::Resolved;
                    inquiry.resolved_at.get_or_insert_with(Utc::now);
                    self.store.update_inquiry(&inquiry).await?;
                }
                BulkInquiryAction::MarkInProgress => {
                    inquiry.status = InquiryStatus::InProgress;
                    inquiry.resolved_at = None;
                    self.store.update_inquiry(&inquiry).await?;
                }
                BulkInquiryAction::SetHighPriority => {
                    inquiry.priority = inquiry.priority.max(InquiryPriority::High);
                    self.store.update_inquiry(&inquiry).await?;
                }
            }
            outcome.updated += 1;
        }
        if !outcome.missing.is_empty() {
            warn!(missing = outcome.missing.len(), "bulk inquiry action skipped unknown ids");
        }
        Ok(outcome)
    }

    /// Reruns the responder over each listed open inquiry.
    pub async fn bulk_process_inquiries(
        &self,
        form: BulkProcessForm,
    ) -> DeskResult<BulkProcessSummary> {
        form.validate()?;
        let mut summary = BulkProcessSummary::default();
        for inquiry_id in &form.inquiry_ids {
            let inquiry = match self.store.get_inquiry(inquiry_id).await? {
                Some(inquiry) if inquiry.status != InquiryStatus::Resolved => inquiry,
                _ => {
                    summary.skipped += 1;
                    continue;
                }
            };
            let inquiry = self.rerun(inquiry).await?;
            summary.processed += 1;
            if inquiry.requires_human_review {
                summary.escalated += 1;
            } else {
                summary.auto_answered += 1;
            }
        }
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            "inquiries reprocessed in bulk"
        );
        Ok(summary)
    }

    pub async fn inquiry_stats(&self) -> DeskResult<InquiryStatistics> {
        let inquiries = self.store.list_inquiries().await?;
        Ok(inquiry_statistics(&inquiries))
    }

    #[instrument(skip(self, form))]
    pub async fn respond_to_inquiry(
        &self,
        inquiry_id: &str,
        form: AdminResponseForm,
    ) -> DeskResult<Inquiry> {
        form.validate()?;
        let mut inquiry = self.get_inquiry(inquiry_id).await?;
        let response = form.response.trim().to_string();
        inquiry.admin_response = Some(response.clone());
        inquiry.status = InquiryStatus::Resolved;
        inquiry.resolved_at = Some(Utc::now());
        self.store.update_inquiry(&inquiry).await?;
        info!(inquiry_id = %inquiry.inquiry_id, "inquiry resolved");

        self.deliver(notify::admin_response(&inquiry, &response)).await;
        Ok(inquiry)
    }

    pub async fn delete_inquiry(&self, inquiry_id: &str) -> DeskResult<()> {
        if !self.store.delete_inquiry(inquiry_id).await? {
            return Err(DeskError::NotFound("inquiry"));
        }
        Ok(())
    }

    async fn decide(
        &self,
        name: &str,
        email: &str,
        subject: &str,
        message: &str,
    ) -> DeskResult<ResponderDecision> {
        let templates = self.store.list_templates().await?;
        Ok(self
            .responder
            .decide_with_templates(name, email, subject, message, &templates))
    }

    /// Dry run of the classifier; nothing is stored.
    pub fn classify(&self, subject: &str, message: &str) -> InquiryAnalysis {
        self.responder.analyze(subject, message)
    }

    fn record_decision(&self, inquiry: &Inquiry) {
        if inquiry.requires_human_review {
            self.metrics.inc_inquiry_escalated();
        } else {
            self.metrics.inc_inquiry_auto_answered();
        }
        info!(
            inquiry_id = %inquiry.inquiry_id,
            category = inquiry.category.as_str(),
            confidence = inquiry.bot_confidence,
            needs_review = inquiry.requires_human_review,
            "inquiry classified"
        );
    }
}

/// Priority only ever goes up; an assigned inquiry that still needs a
/// person stays in progress.
fn apply_decision(inquiry: &mut Inquiry, decision: &ResponderDecision) {
    inquiry.category = decision.analysis.category;
    inquiry.bot_confidence = decision.analysis.confidence;
    inquiry.bot_reply = decision.reply.clone();
    inquiry.template_id = decision.template_id.clone();
    inquiry.requires_human_review = decision.requires_human_review;
    inquiry.escalation_reasons = decision.reasons.clone();
    inquiry.priority = inquiry.priority.max(decision.priority);
    inquiry.status = match (decision.requires_human_review, inquiry.assigned_to.is_some()) {
        (false, _) => InquiryStatus::AutoAnswered,
        (true, true) => InquiryStatus::InProgress,
        (true, false) => InquiryStatus::NeedsReview,
    };
}
