use chrono::Utc;
use tracing::{info, instrument};
use wayfare_core::forms::ReplyTemplateForm;
use wayfare_core::reporting::{responder_analytics, ResponderAnalytics};
use wayfare_core::responder::canned_reply;
use wayfare_core::{new_id, InquiryCategory, ReplyTemplate, ResponderDecision, User};
use wayfare_storage::TravelStore;

use crate::{DeskError, DeskResult, TravelDesk};

fn default_template_name(category: InquiryCategory) -> String {
    format!("Standard {} reply", category.as_str())
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    pub async fn list_reply_templates(&self) -> DeskResult<Vec<ReplyTemplate>> {
        Ok(self.store.list_templates().await?)
    }

    pub async fn get_reply_template(&self, template_id: &str) -> DeskResult<ReplyTemplate> {
        self.store
            .get_template(template_id)
            .await?
            .ok_or(DeskError::NotFound("reply template"))
    }

    #[instrument(skip(self, author, form), fields(name = %form.name))]
    pub async fn create_reply_template(
        &self,
        author: &User,
        form: ReplyTemplateForm,
    ) -> DeskResult<ReplyTemplate> {
        form.validate()?;
        let now = Utc::now();
        let template = ReplyTemplate {
            template_id: new_id(),
            name: form.name.trim().to_string(),
            category: form.category,
            trigger_keywords: form.cleaned_keywords(),
            body: form.body.trim().to_string(),
            confidence_threshold: form.confidence_threshold,
            is_active: form.is_active,
            created_by: Some(author.user_id.clone()),
            created_at: now,
            updated_at: now,
        };
        self.store.upsert_template(&template).await?;
        info!(template_id = %template.template_id, "reply template created");
        Ok(template)
    }

    #[instrument(skip(self, form))]
    pub async fn update_reply_template(
        &self,
        template_id: &str,
        form: ReplyTemplateForm,
    ) -> DeskResult<ReplyTemplate> {
        form.validate()?;
        let mut template = self.get_reply_template(template_id).await?;
        template.name = form.name.trim().to_string();
        template.category = form.category;
        template.trigger_keywords = form.cleaned_keywords();
        template.body = form.body.trim().to_string();
        template.confidence_threshold = form.confidence_threshold;
        template.is_active = form.is_active;
        template.updated_at = Utc::now();
        self.store.upsert_template(&template).await?;
        Ok(template)
    }

    pub async fn delete_reply_template(&self, template_id: &str) -> DeskResult<()> {
        if !self.store.delete_template(template_id).await? {
            return Err(DeskError::NotFound("reply template"));
        }
        info!(template_id = %template_id, "reply template deleted");
        Ok(())
    }

    pub async fn toggle_reply_template(&self, template_id: &str) -> DeskResult<ReplyTemplate> {
        let mut template = self.get_reply_template(template_id).await?;
        template.is_active = !template.is_active;
        template.updated_at = Utc::now();
        self.store.upsert_template(&template).await?;
        info!(template_id = %template_id, active = template.is_active, "reply template toggled");
        Ok(template)
    }

    /// Copies a template under the first free "(copy)" name. The copy starts
    /// inactive so it can be edited before it answers anyone.
    pub async fn duplicate_reply_template(
        &self,
        author: &User,
        template_id: &str,
    ) -> DeskResult<ReplyTemplate> {
        let source = self.get_reply_template(template_id).await?;
        let taken: Vec<String> = self
            .store
            .list_templates()
            .await?
            .into_iter()
            .map(|template| template.name.to_lowercase())
            .collect();
        let name = (1..)
            .map(|n| match n {
                1 => format!("{} (copy)", source.name),
                n => format!("{} (copy {n})", source.name),
            })
            .find(|candidate| !taken.contains(&candidate.to_lowercase()))
            .ok_or_else(|| DeskError::Conflict("No free name for the copy.".to_string()))?;

        let now = Utc::now();
        let copy = ReplyTemplate {
            template_id: new_id(),
            name,
            is_active: false,
            created_by: Some(author.user_id.clone()),
            created_at: now,
            updated_at: now,
            ..source
        };
        self.store.upsert_template(&copy).await?;
        Ok(copy)
    }

    /// Stores one catch-all template per category built from the standard
    /// replies. Categories that already have one are skipped.
    pub async fn install_default_templates(&self) -> DeskResult<usize> {
        let existing = self.store.list_templates().await?;
        let now = Utc::now();
        let mut installed = 0;
        for category in InquiryCategory::ALL {
            let name = default_template_name(category);
            if existing
                .iter()
                .any(|template| template.name.eq_ignore_ascii_case(&name))
            {
                continue;
            }
            let template = ReplyTemplate {
                template_id: new_id(),
                name,
                category,
                trigger_keywords: Vec::new(),
                body: canned_reply(category, "{name}"),
                confidence_threshold: self.responder.threshold(),
                is_active: true,
                created_by: None,
                created_at: now,
                updated_at: now,
            };
            self.store.upsert_template(&template).await?;
            installed += 1;
        }
        info!(installed, "default reply templates installed");
        Ok(installed)
    }

    pub async fn responder_analytics(&self) -> DeskResult<ResponderAnalytics> {
        let inquiries = self.store.list_inquiries().await?;
        let templates = self.store.list_templates().await?;
        Ok(responder_analytics(&inquiries, &templates))
    }

    /// Runs the responder and the stored templates over a message without
    /// storing or sending anything.
    pub async fn preview_reply(
        &self,
        name: &str,
        subject: &str,
        message: &str,
    ) -> DeskResult<ResponderDecision> {
        let templates = self.store.list_templates().await?;
        Ok(self
            .responder
            .decide_with_templates(name, "", subject, message, &templates))
    }
}
