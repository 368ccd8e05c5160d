use anyhow::Result;
use chrono::{DateTime, Utc};
use wayfare_core::{
    Booking, Category, Inquiry, ItineraryDay, PasswordReset, Payment, ReplyTemplate, Review,
    Session, Tour, User,
};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Raised (inside `anyhow::Error`) when a write would break a unique column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate value for {field}")]
pub struct DuplicateKey {
    pub field: &'static str,
}

pub fn duplicate_field(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<DuplicateKey>().map(|dup| dup.field)
}

pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;
    /// Matches the exact username or the lower-cased email.
    async fn find_user_by_login(&self, username_or_email: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn delete_user(&self, user_id: &str) -> Result<bool>;
}

pub trait CategoryRepository: Send + Sync {
    async fn upsert_category(&self, category: &Category) -> Result<()>;
    async fn get_category(&self, category_id: &str) -> Result<Option<Category>>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn delete_category(&self, category_id: &str) -> Result<bool>;
}

pub trait TourRepository: Send + Sync {
    async fn upsert_tour(&self, tour: &Tour) -> Result<()>;
    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>>;
    async fn list_tours(&self) -> Result<Vec<Tour>>;
    async fn delete_tour(&self, tour_id: &str) -> Result<bool>;
}

pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;
    async fn update_booking(&self, booking: &Booking) -> Result<()>;
    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>>;
    async fn find_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>>;
    async fn reference_exists(&self, reference: &str) -> Result<bool>;
    async fn list_bookings(&self) -> Result<Vec<Booking>>;
    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>>;
    async fn list_bookings_for_tour(&self, tour_id: &str) -> Result<Vec<Booking>>;
}

pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;
    async fn update_payment(&self, payment: &Payment) -> Result<()>;
    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>>;
    async fn list_payments_for_booking(&self, booking_id: &str) -> Result<Vec<Payment>>;
}

pub trait ReviewRepository: Send + Sync {
    async fn insert_review(&self, review: &Review) -> Result<()>;
    async fn update_review(&self, review: &Review) -> Result<()>;
    async fn get_review(&self, review_id: &str) -> Result<Option<Review>>;
    async fn list_reviews(&self) -> Result<Vec<Review>>;
    async fn list_reviews_for_tour(&self, tour_id: &str) -> Result<Vec<Review>>;
    async fn delete_review(&self, review_id: &str) -> Result<bool>;
}

pub trait InquiryRepository: Send + Sync {
    async fn insert_inquiry(&self, inquiry: &Inquiry) -> Result<()>;
    async fn update_inquiry(&self, inquiry: &Inquiry) -> Result<()>;
    async fn get_inquiry(&self, inquiry_id: &str) -> Result<Option<Inquiry>>;
    async fn list_inquiries(&self) -> Result<Vec<Inquiry>>;
    async fn delete_inquiry(&self, inquiry_id: &str) -> Result<bool>;
}

pub trait SessionRepository: Send + Sync {
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn load_session(&self, session_id: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub trait ReplyTemplateRepository: Send + Sync {
    /// Template names are unique ignoring case.
    async fn upsert_template(&self, template: &ReplyTemplate) -> Result<()>;
    async fn get_template(&self, template_id: &str) -> Result<Option<ReplyTemplate>>;
    /// Ordered by name.
    async fn list_templates(&self) -> Result<Vec<ReplyTemplate>>;
    async fn delete_template(&self, template_id: &str) -> Result<bool>;
}

pub trait ItineraryRepository: Send + Sync {
    /// Keyed by tour and day number.
    async fn upsert_itinerary_day(&self, day: &ItineraryDay) -> Result<()>;
    /// Ordered by day number.
    async fn list_itinerary(&self, tour_id: &str) -> Result<Vec<ItineraryDay>>;
    async fn delete_itinerary_day(&self, tour_id: &str, day_number: u32) -> Result<bool>;
    async fn delete_itinerary(&self, tour_id: &str) -> Result<u64>;
}

pub trait PasswordResetRepository: Send + Sync {
    async fn insert_password_reset(&self, reset: &PasswordReset) -> Result<()>;
    async fn find_password_reset(&self, token_hash: &str) -> Result<Option<PasswordReset>>;
    async fn update_password_reset(&self, reset: &PasswordReset) -> Result<()>;
    async fn delete_password_resets_for_user(&self, user_id: &str) -> Result<u64>;
}

/// Everything the service layer needs from a backend.
pub trait TravelStore:
    UserRepository
    + CategoryRepository
    + TourRepository
    + BookingRepository
    + PaymentRepository
    + ReviewRepository
    + InquiryRepository
    + SessionRepository
    + ReplyTemplateRepository
    + ItineraryRepository
    + PasswordResetRepository
{
}

impl<T> TravelStore for T where
    T: UserRepository
        + CategoryRepository
        + TourRepository
        + BookingRepository
        + PaymentRepository
        + ReviewRepository
        + InquiryRepository
        + SessionRepository
        + ReplyTemplateRepository
        + ItineraryRepository
        + PasswordResetRepository
{
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Store::Memory($store) => $call,
            Store::Sqlite($store) => $call,
        }
    };
}

impl UserRepository for Store {
    async fn insert_user(&self, user: &User) -> Result<()> {
        dispatch!(self, store => store.insert_user(user).await)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        dispatch!(self, store => store.update_user(user).await)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        dispatch!(self, store => store.get_user(user_id).await)
    }

    async fn find_user_by_login(&self, username_or_email: &str) -> Result<Option<User>> {
        dispatch!(self, store => store.find_user_by_login(username_or_email).await)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        dispatch!(self, store => store.list_users().await)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_user(user_id).await)
    }
}

impl CategoryRepository for Store {
    async fn upsert_category(&self, category: &Category) -> Result<()> {
        dispatch!(self, store => store.upsert_category(category).await)
    }

    async fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        dispatch!(self, store => store.get_category(category_id).await)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        dispatch!(self, store => store.list_categories().await)
    }

    async fn delete_category(&self, category_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_category(category_id).await)
    }
}

impl TourRepository for Store {
    async fn upsert_tour(&self, tour: &Tour) -> Result<()> {
        dispatch!(self, store => store.upsert_tour(tour).await)
    }

    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>> {
        dispatch!(self, store => store.get_tour(tour_id).await)
    }

    async fn list_tours(&self) -> Result<Vec<Tour>> {
        dispatch!(self, store => store.list_tours().await)
    }

    async fn delete_tour(&self, tour_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_tour(tour_id).await)
    }
}

impl BookingRepository for Store {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        dispatch!(self, store => store.insert_booking(booking).await)
    }

    async fn update_booking(&self, booking: &Booking) -> Result<()> {
        dispatch!(self, store => store.update_booking(booking).await)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        dispatch!(self, store => store.get_booking(booking_id).await)
    }

    async fn find_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>> {
        dispatch!(self, store => store.find_booking_by_reference(reference).await)
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool> {
        dispatch!(self, store => store.reference_exists(reference).await)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        dispatch!(self, store => store.list_bookings().await)
    }

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        dispatch!(self, store => store.list_bookings_for_user(user_id).await)
    }

    async fn list_bookings_for_tour(&self, tour_id: &str) -> Result<Vec<Booking>> {
        dispatch!(self, store => store.list_bookings_for_tour(tour_id).await)
    }
}

impl PaymentRepository for Store {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        dispatch!(self, store => store.insert_payment(payment).await)
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        dispatch!(self, store => store.update_payment(payment).await)
    }

    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        dispatch!(self, store => store.find_payment_by_transaction(transaction_id).await)
    }

    async fn list_payments_for_booking(&self, booking_id: &str) -> Result<Vec<Payment>> {
        dispatch!(self, store => store.list_payments_for_booking(booking_id).await)
    }
}

impl ReviewRepository for Store {
    async fn insert_review(&self, review: &Review) -> Result<()> {
        dispatch!(self, store => store.insert_review(review).await)
    }

    async fn update_review(&self, review: &Review) -> Result<()> {
        dispatch!(self, store => store.update_review(review).await)
    }

    async fn get_review(&self, review_id: &str) -> Result<Option<Review>> {
        dispatch!(self, store => store.get_review(review_id).await)
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        dispatch!(self, store => store.list_reviews().await)
    }

    async fn list_reviews_for_tour(&self, tour_id: &str) -> Result<Vec<Review>> {
        dispatch!(self, store => store.list_reviews_for_tour(tour_id).await)
    }

    async fn delete_review(&self, review_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_review(review_id).await)
    }
}

impl InquiryRepository for Store {
    async fn insert_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        dispatch!(self, store => store.insert_inquiry(inquiry).await)
    }

    async fn update_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        dispatch!(self, store => store.update_inquiry(inquiry).await)
    }

    async fn get_inquiry(&self, inquiry_id: &str) -> Result<Option<Inquiry>> {
        dispatch!(self, store => store.get_inquiry(inquiry_id).await)
    }

    async fn list_inquiries(&self) -> Result<Vec<Inquiry>> {
        dispatch!(self, store => store.list_inquiries().await)
    }

    async fn delete_inquiry(&self, inquiry_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_inquiry(inquiry_id).await)
    }
}

impl SessionRepository for Store {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        dispatch!(self, store => store.insert_session(session).await)
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        dispatch!(self, store => store.load_session(session_id).await)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        dispatch!(self, store => store.delete_session(session_id).await)
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64> {
        dispatch!(self, store => store.delete_sessions_for_user(user_id).await)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        dispatch!(self, store => store.purge_expired(now).await)
    }
}

impl ReplyTemplateRepository for Store {
    async fn upsert_template(&self, template: &ReplyTemplate) -> Result<()> {
        dispatch!(self, store => store.upsert_template(template).await)
    }

    async fn get_template(&self, template_id: &str) -> Result<Option<ReplyTemplate>> {
        dispatch!(self, store => store.get_template(template_id).await)
    }

    async fn list_templates(&self) -> Result<Vec<ReplyTemplate>> {
        dispatch!(self, store => store.list_templates().await)
    }

    async fn delete_template(&self, template_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_template(template_id).await)
    }
}

impl ItineraryRepository for Store {
    async fn upsert_itinerary_day(&self, day: &ItineraryDay) -> Result<()> {
        dispatch!(self, store => store.upsert_itinerary_day(day).await)
    }

    async fn list_itinerary(&self, tour_id: &str) -> Result<Vec<ItineraryDay>> {
        dispatch!(self, store => store.list_itinerary(tour_id).await)
    }

    async fn delete_itinerary_day(&self, tour_id: &str, day_number: u32) -> Result<bool> {
        dispatch!(self, store => store.delete_itinerary_day(tour_id, day_number).await)
    }

    async fn delete_itinerary(&self, tour_id: &str) -> Result<u64> {
        dispatch!(self, store => store.delete_itinerary(tour_id).await)
    }
}

impl PasswordResetRepository for Store {
    async fn insert_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        dispatch!(self, store => store.insert_password_reset(reset).await)
    }

    async fn find_password_reset(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        dispatch!(self, store => store.find_password_reset(token_hash).await)
    }

    async fn update_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        dispatch!(self, store => store.update_password_reset(reset).await)
    }

    async fn delete_password_resets_for_user(&self, user_id: &str) -> Result<u64> {
        dispatch!(self, store => store.delete_password_resets_for_user(user_id).await)
    }
}
