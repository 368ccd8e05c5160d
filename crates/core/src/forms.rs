use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::InquiryCategory;

pub const MAX_PARTICIPANTS_PER_BOOKING: u32 = 10;
const MAX_EMAIL_LEN: usize = 120;
const MAX_PHONE_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} field(s) failed validation", .fields.len())]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|error| error.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Rejects a blank value and otherwise checks its length in characters.
    pub fn required_len(&mut self, field: &str, label: &str, value: &str, min: usize, max: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, format!("{label} is required"));
            return;
        }
        let count = trimmed.chars().count();
        if count < min || count > max {
            self.add(
                field,
                format!("{label} must be between {min} and {max} characters"),
            );
        }
    }

    pub fn optional_max(&mut self, field: &str, label: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            if value.trim().chars().count() > max {
                self.add(field, format!("{label} must be less than {max} characters"));
            }
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, "Email is required");
        } else if !is_email_shaped(trimmed) {
            self.add(field, "Please enter a valid email address");
        } else if trimmed.len() > MAX_EMAIL_LEN {
            self.add(
                field,
                format!("Email must be less than {MAX_EMAIL_LEN} characters"),
            );
        }
    }

    pub fn range<T>(&mut self, field: &str, label: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            self.add(field, format!("{label} must be between {min} and {max}"));
        }
    }
}

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(?:\.[^@\s.]+)+$").expect("email regex")
});

pub fn is_email_shaped(value: &str) -> bool {
    EMAIL.is_match(value)
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("first_name", "First name", &self.first_name, 2, 50);
        errors.required_len("last_name", "Last name", &self.last_name, 2, 50);
        errors.required_len("username", "Username", &self.username, 4, 20);
        errors.email("email", &self.email);
        errors.optional_max("phone", "Phone number", self.phone.as_deref(), MAX_PHONE_LEN);
        password_rules(&mut errors, "password", &self.password, &self.password_confirm);
        if !self.terms_accepted {
            errors.add("terms_accepted", "You must accept the terms and conditions");
        }
        errors.into_result()
    }

    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    pub fn cleaned_phone(&self) -> Option<String> {
        clean_optional(self.phone.clone())
    }
}

fn password_rules(errors: &mut ValidationErrors, field: &str, password: &str, confirm: &str) {
    if password.is_empty() {
        errors.add(field, "Password is required");
    } else if password.chars().count() < 8 {
        errors.add(field, "Password must be at least 8 characters long");
    }
    if password != confirm {
        errors.add(&format!("{field}_confirm"), "Passwords must match");
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username_or_email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len(
            "username_or_email",
            "Username or email",
            &self.username_or_email,
            1,
            MAX_EMAIL_LEN,
        );
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("first_name", "First name", &self.first_name, 2, 50);
        errors.required_len("last_name", "Last name", &self.last_name, 2, 50);
        errors.email("email", &self.email);
        errors.optional_max("phone", "Phone number", self.phone.as_deref(), MAX_PHONE_LEN);
        errors.optional_max("bio", "Bio", self.bio.as_deref(), 1_000);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.current_password.is_empty() {
            errors.add("current_password", "Current password is required");
        }
        password_rules(
            &mut errors,
            "new_password",
            &self.new_password,
            &self.new_password_confirm,
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingForm {
    pub tour_id: String,
    pub participants: u32,
    pub travel_date: NaiveDate,
    pub contact_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub special_requests: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
}

impl BookingForm {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.tour_id.trim().is_empty() {
            errors.add("tour_id", "Tour is required");
        }
        errors.range(
            "participants",
            "Participants",
            self.participants,
            1,
            MAX_PARTICIPANTS_PER_BOOKING,
        );
        if self.travel_date <= today {
            errors.add("travel_date", "Travel date must be in the future.");
        }
        contact_rules(
            &mut errors,
            self.contact_phone.as_deref(),
            self.emergency_contact.as_deref(),
            self.special_requests.as_deref(),
        );
        if !self.terms_accepted {
            errors.add(
                "terms_accepted",
                "You must accept the booking terms and conditions",
            );
        }
        errors.into_result()
    }

    pub fn contact(&self) -> ContactDetails {
        ContactDetails {
            contact_phone: clean_optional(self.contact_phone.clone()),
            emergency_contact: clean_optional(self.emergency_contact.clone()),
            special_requests: clean_optional(self.special_requests.clone()),
        }
    }
}

fn contact_rules(
    errors: &mut ValidationErrors,
    phone: Option<&str>,
    emergency: Option<&str>,
    requests: Option<&str>,
) {
    errors.optional_max("contact_phone", "Phone number", phone, MAX_PHONE_LEN);
    errors.optional_max("emergency_contact", "Emergency contact", emergency, 100);
    errors.optional_max("special_requests", "Special requests", requests, 500);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub contact_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingUpdateForm {
    pub participants: u32,
    pub travel_date: NaiveDate,
    pub contact_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub special_requests: Option<String>,
}

impl BookingUpdateForm {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.range(
            "participants",
            "Participants",
            self.participants,
            1,
            MAX_PARTICIPANTS_PER_BOOKING,
        );
        if self.travel_date <= today {
            errors.add("travel_date", "Travel date must be in the future.");
        }
        contact_rules(
            &mut errors,
            self.contact_phone.as_deref(),
            self.emergency_contact.as_deref(),
            self.special_requests.as_deref(),
        );
        errors.into_result()
    }

    pub fn contact(&self) -> ContactDetails {
        ContactDetails {
            contact_phone: clean_optional(self.contact_phone.clone()),
            emergency_contact: clean_optional(self.emergency_contact.clone()),
            special_requests: clean_optional(self.special_requests.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelForm {
    pub reason: Option<String>,
}

impl CancelForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.optional_max("reason", "Cancellation reason", self.reason.as_deref(), 500);
        errors.into_result()
    }

    pub fn cleaned_reason(&self) -> Option<String> {
        clean_optional(self.reason.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("name", "Name", &self.name, 2, 100);
        errors.email("email", &self.email);
        errors.optional_max("phone", "Phone number", self.phone.as_deref(), MAX_PHONE_LEN);
        errors.required_len("subject", "Subject", &self.subject, 5, 200);
        errors.required_len("message", "Message", &self.message, 10, 1_000);
        errors.into_result()
    }

    pub fn cleaned_phone(&self) -> Option<String> {
        clean_optional(self.phone.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    pub title: String,
    pub comment: String,
}

impl ReviewForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.range("rating", "Rating", self.rating, 1, 5);
        errors.required_len("title", "Review title", &self.title, 5, 200);
        errors.required_len("comment", "Review comment", &self.comment, 10, 1_000);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TourForm {
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub destination: String,
    pub price_cents: i64,
    pub currency: Option<String>,
    pub duration_days: u32,
    pub max_participants: u32,
    pub available_from: NaiveDate,
    pub available_to: NaiveDate,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl TourForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.category_id.trim().is_empty() {
            errors.add("category_id", "Category is required");
        }
        errors.required_len("title", "Title", &self.title, 3, 200);
        errors.required_len("description", "Description", &self.description, 10, 5_000);
        errors.required_len("destination", "Destination", &self.destination, 2, 200);
        if self.price_cents <= 0 {
            errors.add("price_cents", "Price must be positive");
        }
        errors.range("duration_days", "Duration", self.duration_days, 1, 365);
        errors.range(
            "max_participants",
            "Maximum participants",
            self.max_participants,
            1,
            500,
        );
        if self.available_to < self.available_from {
            errors.add(
                "available_to",
                "Availability must end on or after its start date",
            );
        }
        if let Some(currency) = self.currency.as_deref() {
            let currency = currency.trim();
            if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
                errors.add("currency", "Currency must be a three-letter code");
            }
        }
        if let Some(difficulty) = self.difficulty.as_deref() {
            if crate::models::Difficulty::parse(difficulty).is_none() {
                errors.add("difficulty", "Difficulty must be easy, medium or hard");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("name", "Name", &self.name, 2, 100);
        errors.optional_max("description", "Description", self.description.as_deref(), 1_000);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminResponseForm {
    pub response: String,
}

impl AdminResponseForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("response", "Response", &self.response, 2, 5_000);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

impl ForgotPasswordForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.into_result()
    }

    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

impl ResetPasswordForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.token.trim().is_empty() {
            errors.add("token", "Reset token is required");
        }
        password_rules(&mut errors, "password", &self.password, &self.password_confirm);
        errors.into_result()
    }
}

pub const MAX_ITINERARY_ACTIVITIES: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct ItineraryDayForm {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub activities: Vec<String>,
    pub accommodation: Option<String>,
    pub meals: Option<String>,
}

impl ItineraryDayForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("title", "Title", &self.title, 3, 200);
        errors.required_len("description", "Description", &self.description, 10, 2_000);
        if self.activities.len() > MAX_ITINERARY_ACTIVITIES {
            errors.add(
                "activities",
                format!("At most {MAX_ITINERARY_ACTIVITIES} activities per day"),
            );
        } else if self
            .activities
            .iter()
            .any(|activity| activity.trim().is_empty() || activity.trim().chars().count() > 200)
        {
            errors.add("activities", "Each activity must be 1 to 200 characters");
        }
        errors.optional_max("accommodation", "Accommodation", self.accommodation.as_deref(), 200);
        errors.optional_max("meals", "Meals", self.meals.as_deref(), 100);
        errors.into_result()
    }

    pub fn cleaned_activities(&self) -> Vec<String> {
        self.activities
            .iter()
            .map(|activity| activity.trim().to_string())
            .collect()
    }

    pub fn cleaned_accommodation(&self) -> Option<String> {
        clean_optional(self.accommodation.clone())
    }

    pub fn cleaned_meals(&self) -> Option<String> {
        clean_optional(self.meals.clone())
    }
}

const MAX_TRIGGER_KEYWORDS: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyTemplateForm {
    pub name: String,
    pub category: InquiryCategory,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    pub body: String,
    pub confidence_threshold: f32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl ReplyTemplateForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.required_len("name", "Name", &self.name, 3, 100);
        errors.required_len("body", "Reply text", &self.body, 20, 5_000);
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            errors.add(
                "confidence_threshold",
                "Confidence threshold must be between 0 and 1",
            );
        }
        if self.trigger_keywords.len() > MAX_TRIGGER_KEYWORDS {
            errors.add(
                "trigger_keywords",
                format!("At most {MAX_TRIGGER_KEYWORDS} trigger keywords"),
            );
        } else if self
            .trigger_keywords
            .iter()
            .any(|keyword| keyword.trim().is_empty() || keyword.trim().chars().count() > 50)
        {
            errors.add("trigger_keywords", "Each keyword must be 1 to 50 characters");
        }
        errors.into_result()
    }

    /// Lower-cased, de-duplicated keywords in their original order.
    pub fn cleaned_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in &self.trigger_keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        keywords
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InquiryAssignForm {
    /// `None` unassigns.
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkInquiryAction {
    MarkResolved,
    MarkInProgress,
    SetHighPriority,
    Delete,
}

pub const MAX_BULK_INQUIRIES: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct BulkInquiryForm {
    pub inquiry_ids: Vec<String>,
    pub action: BulkInquiryAction,
}

impl BulkInquiryForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        bulk_ids_rules(&self.inquiry_ids)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkProcessForm {
    pub inquiry_ids: Vec<String>,
}

impl BulkProcessForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        bulk_ids_rules(&self.inquiry_ids)
    }
}

fn bulk_ids_rules(ids: &[String]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if ids.is_empty() {
        errors.add("inquiry_ids", "Select at least one inquiry");
    } else if ids.len() > MAX_BULK_INQUIRIES {
        errors.add(
            "inquiry_ids",
            format!("At most {MAX_BULK_INQUIRIES} inquiries at a time"),
        );
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_form(participants: u32, travel_date: NaiveDate) -> BookingForm {
        BookingForm {
            tour_id: "tour-1".to_string(),
            participants,
            travel_date,
            contact_phone: Some("  +1 555 0100 ".to_string()),
            emergency_contact: None,
            special_requests: Some("   ".to_string()),
            terms_accepted: true,
        }
    }

    fn date(value: &str) -> NaiveDate {
        value.parse().expect("valid date")
    }

    #[test]
    fn email_shape_rejects_obvious_garbage() {
        assert!(is_email_shaped("ana@example.com"));
        assert!(!is_email_shaped("ana.example.com"));
        assert!(!is_email_shaped("ana@localhost"));
        assert!(!is_email_shaped("ana @example.com"));
        assert!(!is_email_shaped("@example.com"));
        assert!(!is_email_shaped("ana@example..com"));
        assert!(!is_email_shaped("ana@b@example.com"));
        assert!(is_email_shaped("ana.lima+trips@mail.example.co"));
    }

    #[test]
    fn registration_reports_every_bad_field() {
        let form = RegistrationForm {
            first_name: "A".to_string(),
            last_name: "Lovelace".to_string(),
            username: "ada".to_string(),
            email: "not-an-email".to_string(),
            phone: None,
            password: "short".to_string(),
            password_confirm: "shorter".to_string(),
            terms_accepted: false,
        };
        let errors = form.validate().expect_err("form is invalid");
        for field in [
            "first_name",
            "username",
            "email",
            "password",
            "password_confirm",
            "terms_accepted",
        ] {
            assert!(errors.has(field), "missing error for {field}");
        }
        assert!(!errors.has("last_name"));
    }

    #[test]
    fn booking_requires_future_date_and_bounded_party() {
        let today = date("2026-05-01");
        assert!(booking_form(2, date("2026-05-02")).validate(today).is_ok());

        let errors = booking_form(0, today).validate(today).expect_err("invalid");
        assert!(errors.has("participants"));
        assert!(errors.has("travel_date"));

        let errors = booking_form(MAX_PARTICIPANTS_PER_BOOKING + 1, date("2026-06-01"))
            .validate(today)
            .expect_err("too many participants");
        assert!(errors.has("participants"));
    }

    #[test]
    fn booking_contact_is_trimmed_and_blank_dropped() {
        let contact = booking_form(1, date("2026-06-01")).contact();
        assert_eq!(contact.contact_phone.as_deref(), Some("+1 555 0100"));
        assert!(contact.special_requests.is_none());
    }

    #[test]
    fn contact_form_enforces_message_length() {
        let form = ContactForm {
            name: "Jo".to_string(),
            email: "jo@example.com".to_string(),
            phone: None,
            subject: "Hi".to_string(),
            message: "short".to_string(),
        };
        let errors = form.validate().expect_err("invalid");
        assert!(errors.has("subject"));
        assert!(errors.has("message"));
        assert!(!errors.has("name"));
    }

    #[test]
    fn tour_form_checks_window_and_price() {
        let form = TourForm {
            category_id: "cat".to_string(),
            title: "Alpine Lakes".to_string(),
            description: "Five days of lakes and ridges".to_string(),
            destination: "Dolomites".to_string(),
            price_cents: 0,
            currency: Some("EURO".to_string()),
            duration_days: 5,
            max_participants: 12,
            available_from: date("2026-07-01"),
            available_to: date("2026-06-01"),
            difficulty: Some("extreme".to_string()),
            featured: false,
            is_active: true,
        };
        let errors = form.validate().expect_err("invalid");
        assert!(errors.has("price_cents"));
        assert!(errors.has("available_to"));
        assert!(errors.has("currency"));
        assert!(errors.has("difficulty"));
    }

    #[test]
    fn reset_needs_a_token_and_matching_passwords() {
        let form = ResetPasswordForm {
            token: "  ".to_string(),
            password: "longenough".to_string(),
            password_confirm: "different1".to_string(),
        };
        let errors = form.validate().expect_err("invalid");
        assert!(errors.has("token"));
        assert!(errors.has("password_confirm"));
    }

    #[test]
    fn template_keywords_are_normalized_and_threshold_bounded() {
        let form = ReplyTemplateForm {
            name: "Refund policy".to_string(),
            category: InquiryCategory::Cancellation,
            trigger_keywords: vec![" Refund ".to_string(), "refund".to_string(), "Money back".to_string()],
            body: "Refunds are processed within five working days.".to_string(),
            confidence_threshold: 1.5,
            is_active: true,
        };
        let errors = form.validate().expect_err("threshold out of range");
        assert!(errors.has("confidence_threshold"));
        assert_eq!(form.cleaned_keywords(), vec!["refund", "money back"]);
    }

    #[test]
    fn itinerary_day_rejects_blank_activities() {
        let form = ItineraryDayForm {
            title: "Arrival".to_string(),
            description: "Meet the guide in the village square.".to_string(),
            activities: vec!["Welcome dinner".to_string(), " ".to_string()],
            accommodation: Some("  ".to_string()),
            meals: None,
        };
        let errors = form.validate().expect_err("blank activity");
        assert!(errors.has("activities"));
        assert_eq!(form.cleaned_accommodation(), None);
    }

    #[test]
    fn bulk_forms_bound_the_selection() {
        let empty = BulkInquiryForm {
            inquiry_ids: Vec::new(),
            action: BulkInquiryAction::MarkResolved,
        };
        assert!(empty.validate().is_err());
        let too_many = BulkProcessForm {
            inquiry_ids: (0..=MAX_BULK_INQUIRIES).map(|n| n.to_string()).collect(),
        };
        assert!(too_many.validate().is_err());
    }
}
