use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    bookings_created_total: AtomicU64,
    bookings_cancelled_total: AtomicU64,
    bookings_completed_total: AtomicU64,
    payments_confirmed_total: AtomicU64,
    inquiries_auto_answered_total: AtomicU64,
    inquiries_escalated_total: AtomicU64,
    emails_sent_total: AtomicU64,
    emails_failed_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub bookings_created_total: u64,
    pub bookings_cancelled_total: u64,
    pub bookings_completed_total: u64,
    pub payments_confirmed_total: u64,
    pub inquiries_auto_answered_total: u64,
    pub inquiries_escalated_total: u64,
    pub emails_sent_total: u64,
    pub emails_failed_total: u64,
    pub avg_latency_millis: f64,
}

fn bump(counter: &AtomicU64, name: &'static str, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
    metrics::counter!(name).increment(by);
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        bump(&self.requests_total, "wayfare_requests_total", 1);
    }

    pub fn inc_booking_created(&self) {
        bump(&self.bookings_created_total, "wayfare_bookings_created_total", 1);
    }

    pub fn inc_booking_cancelled(&self) {
        bump(
            &self.bookings_cancelled_total,
            "wayfare_bookings_cancelled_total",
            1,
        );
    }

    pub fn add_bookings_completed(&self, count: usize) {
        bump(
            &self.bookings_completed_total,
            "wayfare_bookings_completed_total",
            count as u64,
        );
    }

    pub fn inc_payment_confirmed(&self) {
        bump(
            &self.payments_confirmed_total,
            "wayfare_payments_confirmed_total",
            1,
        );
    }

    pub fn inc_inquiry_auto_answered(&self) {
        bump(
            &self.inquiries_auto_answered_total,
            "wayfare_inquiries_auto_answered_total",
            1,
        );
    }

    pub fn inc_inquiry_escalated(&self) {
        bump(
            &self.inquiries_escalated_total,
            "wayfare_inquiries_escalated_total",
            1,
        );
    }

    pub fn inc_email_sent(&self) {
        bump(&self.emails_sent_total, "wayfare_emails_sent_total", 1);
    }

    pub fn inc_email_failed(&self) {
        bump(&self.emails_failed_total, "wayfare_emails_failed_total", 1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        self.total_latency_millis
            .fetch_add(millis, Ordering::Relaxed);
        metrics::histogram!("wayfare_request_latency_millis").record(millis as f64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let requests = load(&self.requests_total);
        let latency = load(&self.total_latency_millis);

        MetricsSnapshot {
            requests_total: requests,
            bookings_created_total: load(&self.bookings_created_total),
            bookings_cancelled_total: load(&self.bookings_cancelled_total),
            bookings_completed_total: load(&self.bookings_completed_total),
            payments_confirmed_total: load(&self.payments_confirmed_total),
            inquiries_auto_answered_total: load(&self.inquiries_auto_answered_total),
            inquiries_escalated_total: load(&self.inquiries_escalated_total),
            emails_sent_total: load(&self.emails_sent_total),
            emails_failed_total: load(&self.emails_failed_total),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{service_name}=info,wayfare_api=info,wayfare_desk=info,wayfare_storage=info"
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
