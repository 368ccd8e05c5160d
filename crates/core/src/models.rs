use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Traveler,
    Admin,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Traveler => "traveler",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed bookings hold seats on the tour date.
    pub fn holds_capacity(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Unpaid,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" | "moderate" => Some(Self::Medium),
            "hard" | "challenging" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryCategory {
    Booking,
    Pricing,
    Cancellation,
    General,
}

impl InquiryCategory {
    pub const ALL: [InquiryCategory; 4] = [
        Self::Booking,
        Self::Pricing,
        Self::Cancellation,
        Self::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Pricing => "pricing",
            Self::Cancellation => "cancellation",
            Self::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryStatus {
    New,
    AutoAnswered,
    NeedsReview,
    InProgress,
    Resolved,
}

impl InquiryStatus {
    /// Still waiting on someone from the team.
    pub fn is_open(self) -> bool {
        matches!(self, Self::New | Self::NeedsReview | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub tour_id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
    pub destination: String,
    pub price_cents: i64,
    pub currency: String,
    pub duration_days: u32,
    pub max_participants: u32,
    pub available_from: NaiveDate,
    pub available_to: NaiveDate,
    pub difficulty: Difficulty,
    pub featured: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn offered_on(&self, date: NaiveDate) -> bool {
        self.available_from <= date && date <= self.available_to
    }

    /// Seats left once confirmed bookings are taken out, the figure shown on
    /// the tour page.
    pub fn available_spots(&self, bookings: &[Booking]) -> u32 {
        let confirmed = bookings
            .iter()
            .filter(|booking| {
                booking.tour_id == self.tour_id && booking.status == BookingStatus::Confirmed
            })
            .map(|booking| booking.participants)
            .sum::<u32>();
        self.max_participants.saturating_sub(confirmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: String,
    pub reference: String,
    pub user_id: String,
    pub tour_id: String,
    pub participants: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub travel_date: NaiveDate,
    pub status: BookingStatus,
    pub payment_state: PaymentState,
    pub contact_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub special_requests: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    pub fn days_until_travel(&self, today: NaiveDate) -> i64 {
        (self.travel_date - today).num_days()
    }

    pub fn tour_end(&self, duration_days: u32) -> NaiveDate {
        self.travel_date + Duration::days(i64::from(duration_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub booking_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

pub fn total_paid(payments: &[Payment]) -> i64 {
    payments
        .iter()
        .filter(|payment| payment.status == PaymentStatus::Completed)
        .map(|payment| payment.amount_cents)
        .sum()
}

pub fn outstanding_amount(booking: &Booking, payments: &[Payment]) -> i64 {
    (booking.total_cents - total_paid(payments)).max(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub user_id: String,
    pub tour_id: String,
    pub booking_id: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub inquiry_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub category: InquiryCategory,
    pub bot_confidence: f32,
    pub bot_reply: Option<String>,
    pub requires_human_review: bool,
    pub escalation_reasons: Vec<String>,
    pub status: InquiryStatus,
    #[serde(default)]
    pub priority: InquiryPriority,
    /// Admin the inquiry is assigned to.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Reply template the auto-answer came from, if any.
    #[serde(default)]
    pub template_id: Option<String>,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// An admin-maintained canned answer for one inquiry category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyTemplate {
    pub template_id: String,
    pub name: String,
    pub category: InquiryCategory,
    /// When non-empty, at least one of these must appear in the message.
    pub trigger_keywords: Vec<String>,
    /// Reply text; `{name}` and `{email}` are filled in per inquiry.
    pub body: String,
    /// Minimum classifier confidence for this template to answer.
    pub confidence_threshold: f32,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One day of a tour's programme; `day_number` is unique per tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub tour_id: String,
    pub day_number: u32,
    pub title: String,
    pub description: String,
    pub activities: Vec<String>,
    pub accommodation: Option<String>,
    pub meals: Option<String>,
}

/// A single-use password reset grant. Only the SHA-256 of the emailed token
/// is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordReset {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordReset {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

pub fn format_money(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02} {currency}", abs / 100, abs % 100)
}
