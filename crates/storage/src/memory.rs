use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use wayfare_core::{
    Booking, Category, Inquiry, ItineraryDay, PasswordReset, Payment, ReplyTemplate, Review,
    Session, Tour, User,
};

use crate::{
    BookingRepository, CategoryRepository, DuplicateKey, InquiryRepository, ItineraryRepository,
    PasswordResetRepository, PaymentRepository, ReplyTemplateRepository, ReviewRepository,
    SessionRepository, TourRepository, UserRepository,
};

type Table<T> = Arc<RwLock<HashMap<String, T>>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Table<User>,
    categories: Table<Category>,
    tours: Table<Tour>,
    bookings: Table<Booking>,
    payments: Table<Payment>,
    reviews: Table<Review>,
    inquiries: Table<Inquiry>,
    sessions: Table<Session>,
    templates: Table<ReplyTemplate>,
    /// Keyed by `itinerary_key`.
    itinerary: Table<ItineraryDay>,
    password_resets: Table<PasswordReset>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn duplicate(field: &'static str) -> anyhow::Error {
    DuplicateKey { field }.into()
}

fn itinerary_key(tour_id: &str, day_number: u32) -> String {
    format!("{tour_id}#{day_number}")
}

fn newest_first<T: Clone>(
    table: &Table<T>,
    keep: impl Fn(&T) -> bool,
    created: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = table.read().values().filter(|row| keep(row)).cloned().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(created(row)));
    rows
}

impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        if users.values().any(|other| other.username == user.username) {
            return Err(duplicate("username"));
        }
        if users.values().any(|other| other.email == user.email) {
            return Err(duplicate("email"));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|other| other.user_id != user.user_id && other.email == user.email)
        {
            return Err(duplicate("email"));
        }
        if users
            .values()
            .any(|other| other.user_id != user.user_id && other.username == user.username)
        {
            return Err(duplicate("username"));
        }
        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn find_user_by_login(&self, username_or_email: &str) -> Result<Option<User>> {
        let email = username_or_email.to_lowercase();
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.username == username_or_email || user.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(newest_first(&self.users, |_| true, |user| user.created_at))
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.write().remove(user_id).is_some())
    }
}

impl CategoryRepository for MemoryStore {
    async fn upsert_category(&self, category: &Category) -> Result<()> {
        let mut categories = self.categories.write();
        if categories.values().any(|other| {
            other.category_id != category.category_id
                && other.name.eq_ignore_ascii_case(&category.name)
        }) {
            return Err(duplicate("name"));
        }
        categories.insert(category.category_id.clone(), category.clone());
        Ok(())
    }

    async fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        Ok(self.categories.read().get(category_id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = self.categories.read().values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn delete_category(&self, category_id: &str) -> Result<bool> {
        Ok(self.categories.write().remove(category_id).is_some())
    }
}

impl TourRepository for MemoryStore {
    async fn upsert_tour(&self, tour: &Tour) -> Result<()> {
        self.tours.write().insert(tour.tour_id.clone(), tour.clone());
        Ok(())
    }

    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>> {
        Ok(self.tours.read().get(tour_id).cloned())
    }

    async fn list_tours(&self) -> Result<Vec<Tour>> {
        Ok(newest_first(&self.tours, |_| true, |tour| tour.created_at))
    }

    async fn delete_tour(&self, tour_id: &str) -> Result<bool> {
        Ok(self.tours.write().remove(tour_id).is_some())
    }
}

impl BookingRepository for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let mut bookings = self.bookings.write();
        if bookings
            .values()
            .any(|other| other.reference == booking.reference)
        {
            return Err(duplicate("reference"));
        }
        bookings.insert(booking.booking_id.clone(), booking.clone());
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings
            .write()
            .insert(booking.booking_id.clone(), booking.clone());
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        Ok(self.bookings.read().get(booking_id).cloned())
    }

    async fn find_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .values()
            .find(|booking| booking.reference == reference)
            .cloned())
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool> {
        Ok(self
            .bookings
            .read()
            .values()
            .any(|booking| booking.reference == reference))
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        Ok(newest_first(&self.bookings, |_| true, |b| b.created_at))
    }

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        Ok(newest_first(
            &self.bookings,
            |b| b.user_id == user_id,
            |b| b.created_at,
        ))
    }

    async fn list_bookings_for_tour(&self, tour_id: &str) -> Result<Vec<Booking>> {
        Ok(newest_first(
            &self.bookings,
            |b| b.tour_id == tour_id,
            |b| b.created_at,
        ))
    }
}

impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write();
        if payments
            .values()
            .any(|other| other.transaction_id == payment.transaction_id)
        {
            return Err(duplicate("transaction_id"));
        }
        payments.insert(payment.payment_id.clone(), payment.clone());
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        self.payments
            .write()
            .insert(payment.payment_id.clone(), payment.clone());
        Ok(())
    }

    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .values()
            .find(|payment| payment.transaction_id == transaction_id)
            .cloned())
    }

    async fn list_payments_for_booking(&self, booking_id: &str) -> Result<Vec<Payment>> {
        Ok(newest_first(
            &self.payments,
            |p| p.booking_id == booking_id,
            |p| p.created_at,
        ))
    }
}

impl ReviewRepository for MemoryStore {
    async fn insert_review(&self, review: &Review) -> Result<()> {
        let mut reviews = self.reviews.write();
        if reviews
            .values()
            .any(|other| other.user_id == review.user_id && other.tour_id == review.tour_id)
        {
            return Err(duplicate("review"));
        }
        reviews.insert(review.review_id.clone(), review.clone());
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> Result<()> {
        self.reviews
            .write()
            .insert(review.review_id.clone(), review.clone());
        Ok(())
    }

    async fn get_review(&self, review_id: &str) -> Result<Option<Review>> {
        Ok(self.reviews.read().get(review_id).cloned())
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        Ok(newest_first(&self.reviews, |_| true, |r| r.created_at))
    }

    async fn list_reviews_for_tour(&self, tour_id: &str) -> Result<Vec<Review>> {
        Ok(newest_first(
            &self.reviews,
            |r| r.tour_id == tour_id,
            |r| r.created_at,
        ))
    }

    async fn delete_review(&self, review_id: &str) -> Result<bool> {
        Ok(self.reviews.write().remove(review_id).is_some())
    }
}

impl InquiryRepository for MemoryStore {
    async fn insert_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        self.inquiries
            .write()
            .insert(inquiry.inquiry_id.clone(), inquiry.clone());
        Ok(())
    }

    async fn update_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        self.insert_inquiry(inquiry).await
    }

    async fn get_inquiry(&self, inquiry_id: &str) -> Result<Option<Inquiry>> {
        Ok(self.inquiries.read().get(inquiry_id).cloned())
    }

    async fn list_inquiries(&self) -> Result<Vec<Inquiry>> {
        Ok(newest_first(&self.inquiries, |_| true, |i| i.created_at))
    }

    async fn delete_inquiry(&self, inquiry_id: &str) -> Result<bool> {
        Ok(self.inquiries.write().remove(inquiry_id).is_some())
    }
}

impl SessionRepository for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, session| {
            let keep = session.user_id != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;
        self.sessions.write().retain(|_, session| {
            let keep = session.is_live(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

impl ReplyTemplateRepository for MemoryStore {
    async fn upsert_template(&self, template: &ReplyTemplate) -> Result<()> {
        let mut templates = self.templates.write();
        if templates.values().any(|other| {
            other.template_id != template.template_id
                && other.name.eq_ignore_ascii_case(&template.name)
        }) {
            return Err(duplicate("template_name"));
        }
        templates.insert(template.template_id.clone(), template.clone());
        Ok(())
    }

    async fn get_template(&self, template_id: &str) -> Result<Option<ReplyTemplate>> {
        Ok(self.templates.read().get(template_id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<ReplyTemplate>> {
        let mut templates: Vec<ReplyTemplate> = self.templates.read().values().cloned().collect();
        templates.sort_by_key(|template| template.name.to_lowercase());
        Ok(templates)
    }

    async fn delete_template(&self, template_id: &str) -> Result<bool> {
        Ok(self.templates.write().remove(template_id).is_some())
    }
}

impl ItineraryRepository for MemoryStore {
    async fn upsert_itinerary_day(&self, day: &ItineraryDay) -> Result<()> {
        self.itinerary
            .write()
            .insert(itinerary_key(&day.tour_id, day.day_number), day.clone());
        Ok(())
    }

    async fn list_itinerary(&self, tour_id: &str) -> Result<Vec<ItineraryDay>> {
        let mut days: Vec<ItineraryDay> = self
            .itinerary
            .read()
            .values()
            .filter(|day| day.tour_id == tour_id)
            .cloned()
            .collect();
        days.sort_by_key(|day| day.day_number);
        Ok(days)
    }

    async fn delete_itinerary_day(&self, tour_id: &str, day_number: u32) -> Result<bool> {
        Ok(self
            .itinerary
            .write()
            .remove(&itinerary_key(tour_id, day_number))
            .is_some())
    }

    async fn delete_itinerary(&self, tour_id: &str) -> Result<u64> {
        let mut itinerary = self.itinerary.write();
        let before = itinerary.len();
        itinerary.retain(|_, day| day.tour_id != tour_id);
        Ok((before - itinerary.len()) as u64)
    }
}

impl PasswordResetRepository for MemoryStore {
    async fn insert_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        let mut resets = self.password_resets.write();
        if resets.contains_key(&reset.token_hash) {
            return Err(duplicate("token"));
        }
        resets.insert(reset.token_hash.clone(), reset.clone());
        Ok(())
    }

    async fn find_password_reset(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        Ok(self.password_resets.read().get(token_hash).cloned())
    }

    async fn update_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        self.password_resets
            .write()
            .insert(reset.token_hash.clone(), reset.clone());
        Ok(())
    }

    async fn delete_password_resets_for_user(&self, user_id: &str) -> Result<u64> {
        let mut resets = self.password_resets.write();
        let before = resets.len();
        resets.retain(|_, reset| reset.user_id != user_id);
        Ok((before - resets.len()) as u64)
    }
}
