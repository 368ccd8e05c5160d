use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tracing::warn;
use wayfare_core::{AutoResponder, BookingError, ReviewRefusal, ValidationErrors};
use wayfare_observability::AppMetrics;
use wayfare_storage::{duplicate_field, TravelStore};

pub mod accounts;
pub mod bookings;
pub mod catalog;
pub mod credentials;
pub mod inquiries;
pub mod notify;
pub mod reports;
pub mod templates;

pub use bookings::BookingDetail;
pub use catalog::TourDetail;
pub use inquiries::{BulkOutcome, BulkProcessSummary};
pub use notify::{Email, Mailer};

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Review(#[from] ReviewRefusal),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for DeskError {
    fn from(err: anyhow::Error) -> Self {
        let Some(field) = duplicate_field(&err) else {
            return Self::Internal(err);
        };
        let message = match field {
            "username" => "Username already taken. Please choose a different one.",
            "email" => "Email already registered. Please use a different one.",
            "name" => "A category with this name already exists.",
            "template_name" => "A reply template with this name already exists.",
            "token" => "Reset token collision, please retry.",
            "review" => "You have already reviewed this tour.",
            "transaction_id" => "This payment has already been recorded.",
            "reference" => "Booking reference collision, please retry.",
            _ => "A record with this value already exists.",
        };
        Self::Conflict(message.to_string())
    }
}

pub type DeskResult<T> = Result<T, DeskError>;

#[derive(Debug, Clone)]
pub struct DeskSettings {
    pub session_ttl: Duration,
    pub mail_from: String,
    pub admin_emails: Vec<String>,
    pub payment_simulation: bool,
    /// Base of the links sent in emails.
    pub public_url: String,
    pub password_reset_ttl: Duration,
}

impl Default for DeskSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::seconds(1800),
            mail_from: "bookings@wayfare.local".to_string(),
            admin_emails: vec!["admin@wayfare.local".to_string()],
            payment_simulation: true,
            public_url: "http://localhost:3000".to_string(),
            password_reset_ttl: Duration::hours(1),
        }
    }
}

/// The service layer: every workflow runs here against a store, a mailer and
/// the metrics registry.
pub struct TravelDesk<S> {
    store: Arc<S>,
    mailer: Mailer,
    responder: AutoResponder,
    metrics: Arc<AppMetrics>,
    settings: DeskSettings,
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    pub fn new(
        store: Arc<S>,
        mailer: Mailer,
        responder: AutoResponder,
        metrics: Arc<AppMetrics>,
        settings: DeskSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            responder,
            metrics,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    pub fn responder(&self) -> &AutoResponder {
        &self.responder
    }

    pub fn metrics(&self) -> &AppMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    /// Hands an email to the transport; failures are logged, never returned.
    async fn deliver(&self, email: Email) {
        match self.mailer.send(&self.settings.mail_from, &email).await {
            Ok(()) => self.metrics.inc_email_sent(),
            Err(err) => {
                self.metrics.inc_email_failed();
                warn!(to = %email.to, subject = %email.subject, error = %err, "email delivery failed");
            }
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use chrono::Duration;
    use wayfare_core::forms::{CategoryForm, RegistrationForm, TourForm};
    use wayfare_core::{Tour, User, UserRole};
    use wayfare_storage::{Store, UserRepository};

    pub fn desk() -> TravelDesk<Store> {
        TravelDesk::new(
            Arc::new(Store::memory()),
            Mailer::outbox(),
            AutoResponder::default(),
            AppMetrics::shared(),
            DeskSettings::default(),
        )
    }

    pub fn registration(username: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: "Rowan".to_string(),
            last_name: "Hale".to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            phone: None,
            password: "correct horse".to_string(),
            password_confirm: "correct horse".to_string(),
            terms_accepted: true,
        }
    }

    pub async fn traveler(desk: &TravelDesk<Store>, username: &str) -> User {
        desk.register(registration(username))
            .await
            .expect("registration succeeds")
    }

    pub async fn admin(desk: &TravelDesk<Store>) -> User {
        let mut user = traveler(desk, "admin1").await;
        user.role = UserRole::Admin;
        desk.store().update_user(&user).await.expect("promote");
        user
    }

    pub async fn tour(desk: &TravelDesk<Store>, max_participants: u32) -> Tour {
        let category = desk
            .create_category(CategoryForm {
                name: format!("Category {}", uuid::Uuid::new_v4()),
                description: None,
            })
            .await
            .expect("category");
        let today = today();
        desk.create_tour(TourForm {
            category_id: category.category_id,
            title: "Atlas Mountains Trek".to_string(),
            description: "Four days across the High Atlas".to_string(),
            destination: "Morocco".to_string(),
            price_cents: 25_000,
            currency: None,
            duration_days: 4,
            max_participants,
            available_from: today,
            available_to: today + Duration::days(365),
            difficulty: Some("hard".to_string()),
            featured: true,
            is_active: true,
        })
        .await
        .expect("tour")
    }
}
