use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use wayfare_core::{
    Booking, Category, Inquiry, ItineraryDay, PasswordReset, Payment, ReplyTemplate, Review,
    Session, Tour, User,
};

use crate::{
    BookingRepository, CategoryRepository, DuplicateKey, InquiryRepository, ItineraryRepository,
    PasswordResetRepository, PaymentRepository, ReplyTemplateRepository, ReviewRepository,
    SessionRepository, TourRepository, UserRepository,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
      user_id TEXT PRIMARY KEY,
      username TEXT NOT NULL UNIQUE,
      email TEXT NOT NULL UNIQUE,
      password_hash TEXT NOT NULL,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
      category_id TEXT PRIMARY KEY,
      name TEXT NOT NULL UNIQUE COLLATE NOCASE,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tours (
      tour_id TEXT PRIMARY KEY,
      category_id TEXT NOT NULL,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bookings (
      booking_id TEXT PRIMARY KEY,
      reference TEXT NOT NULL UNIQUE,
      user_id TEXT NOT NULL,
      tour_id TEXT NOT NULL,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
    "CREATE INDEX IF NOT EXISTS bookings_tour_idx ON bookings (tour_id);",
    "CREATE INDEX IF NOT EXISTS bookings_user_idx ON bookings (user_id);",
    r#"
    CREATE TABLE IF NOT EXISTS payments (
      payment_id TEXT PRIMARY KEY,
      booking_id TEXT NOT NULL,
      transaction_id TEXT NOT NULL UNIQUE,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
      review_id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      tour_id TEXT NOT NULL,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL,
      UNIQUE (user_id, tour_id)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inquiries (
      inquiry_id TEXT PRIMARY KEY,
      created_at TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
      session_id TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      created_at TEXT NOT NULL,
      expires_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reply_templates (
      template_id TEXT PRIMARY KEY,
      name TEXT NOT NULL UNIQUE COLLATE NOCASE,
      data_json TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS itinerary_days (
      tour_id TEXT NOT NULL,
      day_number INTEGER NOT NULL,
      data_json TEXT NOT NULL,
      PRIMARY KEY (tour_id, day_number)
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS password_resets (
      token_hash TEXT PRIMARY KEY,
      user_id TEXT NOT NULL,
      data_json TEXT NOT NULL
    );
    "#,
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url {database_url}"))?
            .create_if_missing(true);
        // An in-memory database lives and dies with its single connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed connecting to sqlite at {database_url}"))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed creating sqlite schema")?;
        }
        Ok(())
    }

    async fn fetch_one<T: DeserializeOwned>(&self, sql: &str, key: &str) -> Result<Option<T>> {
        let row = sqlx::query(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode(&row)).transpose()
    }

    async fn fetch_all<T: DeserializeOwned>(&self, sql: &str, key: Option<&str>) -> Result<Vec<T>> {
        let mut query = sqlx::query(sql);
        if let Some(key) = key {
            query = query.bind(key);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(decode).collect()
    }

    async fn delete_by_key(&self, sql: &str, key: &str) -> Result<bool> {
        let result = sqlx::query(sql).bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> Result<T> {
    let data: String = row.get("data_json");
    serde_json::from_str(&data).context("failed decoding stored row")
}

fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("failed encoding row")
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

/// Turns a unique-constraint failure into `DuplicateKey`, naming the field
/// whose `table.column` appears in the database message.
fn unique_violation(err: sqlx::Error, columns: &[(&str, &'static str)]) -> anyhow::Error {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            let message = db.message().to_string();
            let field = columns
                .iter()
                .find(|(column, _)| message.contains(column))
                .map(|(_, field)| *field)
                .unwrap_or("value");
            return DuplicateKey { field }.into();
        }
    }
    anyhow::Error::new(err)
}

const USER_COLUMNS: &[(&str, &str)] = &[("users.username", "username"), ("users.email", "email")];

fn decode_user(row: &SqliteRow) -> Result<User> {
    let mut user: User = decode(row)?;
    user.password_hash = row.get("password_hash");
    Ok(user)
}

impl UserRepository for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, email, password_hash, created_at, data_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(timestamp(user.created_at))
        .bind(encode(user)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, USER_COLUMNS))?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET username = ?2, email = ?3, password_hash = ?4, data_json = ?5
            WHERE user_id = ?1
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(encode(user)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, USER_COLUMNS))?;
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT password_hash, data_json FROM users WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_user(&row)).transpose()
    }

    async fn find_user_by_login(&self, username_or_email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT password_hash, data_json FROM users
            WHERE username = ?1 OR email = ?2
            LIMIT 1
            "#,
        )
        .bind(username_or_email)
        .bind(username_or_email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| decode_user(&row)).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows =
            sqlx::query("SELECT password_hash, data_json FROM users ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(decode_user).collect()
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.delete_by_key("DELETE FROM users WHERE user_id = ?1", user_id)
            .await
    }
}

impl CategoryRepository for SqliteStore {
    async fn upsert_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (category_id, name, data_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(category_id) DO UPDATE SET
              name=excluded.name,
              data_json=excluded.data_json
            "#,
        )
        .bind(&category.category_id)
        .bind(&category.name)
        .bind(encode(category)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("categories.name", "name")]))?;
        Ok(())
    }

    async fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        self.fetch_one(
            "SELECT data_json FROM categories WHERE category_id = ?1",
            category_id,
        )
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.fetch_all("SELECT data_json FROM categories ORDER BY name", None)
            .await
    }

    async fn delete_category(&self, category_id: &str) -> Result<bool> {
        self.delete_by_key("DELETE FROM categories WHERE category_id = ?1", category_id)
            .await
    }
}

impl TourRepository for SqliteStore {
    async fn upsert_tour(&self, tour: &Tour) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tours (tour_id, category_id, created_at, data_json)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(tour_id) DO UPDATE SET
              category_id=excluded.category_id,
              data_json=excluded.data_json
            "#,
        )
        .bind(&tour.tour_id)
        .bind(&tour.category_id)
        .bind(timestamp(tour.created_at))
        .bind(encode(tour)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>> {
        self.fetch_one("SELECT data_json FROM tours WHERE tour_id = ?1", tour_id)
            .await
    }

    async fn list_tours(&self) -> Result<Vec<Tour>> {
        self.fetch_all("SELECT data_json FROM tours ORDER BY created_at DESC", None)
            .await
    }

    async fn delete_tour(&self, tour_id: &str) -> Result<bool> {
        self.delete_by_key("DELETE FROM tours WHERE tour_id = ?1", tour_id)
            .await
    }
}

impl BookingRepository for SqliteStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (booking_id, reference, user_id, tour_id, created_at, data_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&booking.booking_id)
        .bind(&booking.reference)
        .bind(&booking.user_id)
        .bind(&booking.tour_id)
        .bind(timestamp(booking.created_at))
        .bind(encode(booking)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("bookings.reference", "reference")]))?;
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query("UPDATE bookings SET data_json = ?2 WHERE booking_id = ?1")
            .bind(&booking.booking_id)
            .bind(encode(booking)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>> {
        self.fetch_one(
            "SELECT data_json FROM bookings WHERE booking_id = ?1",
            booking_id,
        )
        .await
    }

    async fn find_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>> {
        self.fetch_one(
            "SELECT data_json FROM bookings WHERE reference = ?1",
            reference,
        )
        .await
    }

    async fn reference_exists(&self, reference: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 AS hit FROM bookings WHERE reference = ?1")
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>> {
        self.fetch_all(
            "SELECT data_json FROM bookings ORDER BY created_at DESC",
            None,
        )
        .await
    }

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>> {
        self.fetch_all(
            "SELECT data_json FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC",
            Some(user_id),
        )
        .await
    }

    async fn list_bookings_for_tour(&self, tour_id: &str) -> Result<Vec<Booking>> {
        self.fetch_all(
            "SELECT data_json FROM bookings WHERE tour_id = ?1 ORDER BY created_at DESC",
            Some(tour_id),
        )
        .await
    }
}

impl PaymentRepository for SqliteStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (payment_id, booking_id, transaction_id, created_at, data_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&payment.payment_id)
        .bind(&payment.booking_id)
        .bind(&payment.transaction_id)
        .bind(timestamp(payment.created_at))
        .bind(encode(payment)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("payments.transaction_id", "transaction_id")]))?;
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query("UPDATE payments SET data_json = ?2 WHERE payment_id = ?1")
            .bind(&payment.payment_id)
            .bind(encode(payment)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_payment_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        self.fetch_one(
            "SELECT data_json FROM payments WHERE transaction_id = ?1",
            transaction_id,
        )
        .await
    }

    async fn list_payments_for_booking(&self, booking_id: &str) -> Result<Vec<Payment>> {
        self.fetch_all(
            "SELECT data_json FROM payments WHERE booking_id = ?1 ORDER BY created_at DESC",
            Some(booking_id),
        )
        .await
    }
}

impl ReviewRepository for SqliteStore {
    async fn insert_review(&self, review: &Review) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (review_id, user_id, tour_id, created_at, data_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&review.review_id)
        .bind(&review.user_id)
        .bind(&review.tour_id)
        .bind(timestamp(review.created_at))
        .bind(encode(review)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("reviews.user_id", "review")]))?;
        Ok(())
    }

    async fn update_review(&self, review: &Review) -> Result<()> {
        sqlx::query("UPDATE reviews SET data_json = ?2 WHERE review_id = ?1")
            .bind(&review.review_id)
            .bind(encode(review)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_review(&self, review_id: &str) -> Result<Option<Review>> {
        self.fetch_one(
            "SELECT data_json FROM reviews WHERE review_id = ?1",
            review_id,
        )
        .await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        self.fetch_all("SELECT data_json FROM reviews ORDER BY created_at DESC", None)
            .await
    }

    async fn list_reviews_for_tour(&self, tour_id: &str) -> Result<Vec<Review>> {
        self.fetch_all(
            "SELECT data_json FROM reviews WHERE tour_id = ?1 ORDER BY created_at DESC",
            Some(tour_id),
        )
        .await
    }

    async fn delete_review(&self, review_id: &str) -> Result<bool> {
        self.delete_by_key("DELETE FROM reviews WHERE review_id = ?1", review_id)
            .await
    }
}

impl InquiryRepository for SqliteStore {
    async fn insert_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO inquiries (inquiry_id, created_at, data_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(inquiry_id) DO UPDATE SET data_json=excluded.data_json
            "#,
        )
        .bind(&inquiry.inquiry_id)
        .bind(timestamp(inquiry.created_at))
        .bind(encode(inquiry)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        self.insert_inquiry(inquiry).await
    }

    async fn get_inquiry(&self, inquiry_id: &str) -> Result<Option<Inquiry>> {
        self.fetch_one(
            "SELECT data_json FROM inquiries WHERE inquiry_id = ?1",
            inquiry_id,
        )
        .await
    }

    async fn list_inquiries(&self) -> Result<Vec<Inquiry>> {
        self.fetch_all(
            "SELECT data_json FROM inquiries ORDER BY created_at DESC",
            None,
        )
        .await
    }

    async fn delete_inquiry(&self, inquiry_id: &str) -> Result<bool> {
        self.delete_by_key("DELETE FROM inquiries WHERE inquiry_id = ?1", inquiry_id)
            .await
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("bad stored timestamp {value}"))?;
    Ok(parsed.with_timezone(&Utc))
}

impl SessionRepository for SqliteStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
              user_id=excluded.user_id,
              expires_at=excluded.expires_at
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(timestamp(session.created_at))
        .bind(timestamp(session.expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT session_id, user_id, created_at, expires_at
            FROM sessions
            WHERE session_id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Session {
            session_id: row.get("session_id"),
            user_id: row.get("user_id"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            expires_at: parse_timestamp(&row.get::<String, _>("expires_at"))?,
        }))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.delete_by_key("DELETE FROM sessions WHERE session_id = ?1", session_id)
            .await?;
        Ok(())
    }

    async fn delete_sessions_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?1")
            .bind(timestamp(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl ReplyTemplateRepository for SqliteStore {
    async fn upsert_template(&self, template: &ReplyTemplate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reply_templates (template_id, name, data_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(template_id) DO UPDATE SET
              name=excluded.name,
              data_json=excluded.data_json
            "#,
        )
        .bind(&template.template_id)
        .bind(&template.name)
        .bind(encode(template)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("reply_templates.name", "template_name")]))?;
        Ok(())
    }

    async fn get_template(&self, template_id: &str) -> Result<Option<ReplyTemplate>> {
        self.fetch_one(
            "SELECT data_json FROM reply_templates WHERE template_id = ?1",
            template_id,
        )
        .await
    }

    async fn list_templates(&self) -> Result<Vec<ReplyTemplate>> {
        self.fetch_all("SELECT data_json FROM reply_templates ORDER BY name", None)
            .await
    }

    async fn delete_template(&self, template_id: &str) -> Result<bool> {
        self.delete_by_key(
            "DELETE FROM reply_templates WHERE template_id = ?1",
            template_id,
        )
        .await
    }
}

impl ItineraryRepository for SqliteStore {
    async fn upsert_itinerary_day(&self, day: &ItineraryDay) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO itinerary_days (tour_id, day_number, data_json)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(tour_id, day_number) DO UPDATE SET data_json=excluded.data_json
            "#,
        )
        .bind(&day.tour_id)
        .bind(i64::from(day.day_number))
        .bind(encode(day)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_itinerary(&self, tour_id: &str) -> Result<Vec<ItineraryDay>> {
        self.fetch_all(
            "SELECT data_json FROM itinerary_days WHERE tour_id = ?1 ORDER BY day_number",
            Some(tour_id),
        )
        .await
    }

    async fn delete_itinerary_day(&self, tour_id: &str, day_number: u32) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM itinerary_days WHERE tour_id = ?1 AND day_number = ?2")
                .bind(tour_id)
                .bind(i64::from(day_number))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_itinerary(&self, tour_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM itinerary_days WHERE tour_id = ?1")
            .bind(tour_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

impl PasswordResetRepository for SqliteStore {
    async fn insert_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (token_hash, user_id, data_json)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&reset.token_hash)
        .bind(&reset.user_id)
        .bind(encode(reset)?)
        .execute(&self.pool)
        .await
        .map_err(|err| unique_violation(err, &[("password_resets.token_hash", "token")]))?;
        Ok(())
    }

    async fn find_password_reset(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        self.fetch_one(
            "SELECT data_json FROM password_resets WHERE token_hash = ?1",
            token_hash,
        )
        .await
    }

    async fn update_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        sqlx::query("UPDATE password_resets SET data_json = ?2 WHERE token_hash = ?1")
            .bind(&reset.token_hash)
            .bind(encode(reset)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_password_resets_for_user(&self, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_resets WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
