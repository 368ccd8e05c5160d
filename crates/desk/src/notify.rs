use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;
use wayfare_core::{format_money, Booking, Inquiry, Tour, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail transport seam.
#[derive(Clone)]
pub enum Mailer {
    /// Writes each message to the log and drops it.
    Log,
    /// Keeps messages in memory for tests and local runs.
    Outbox(Arc<Mutex<Vec<Email>>>),
    /// POSTs `{from, to, subject, body}` JSON to a relay endpoint.
    Relay { client: reqwest::Client, url: String },
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl Mailer {
    pub fn outbox() -> Self {
        Self::Outbox(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn relay(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed building mail relay client")?;
        Ok(Self::Relay {
            client,
            url: url.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Mailer::Log => "log",
            Mailer::Outbox(_) => "outbox",
            Mailer::Relay { .. } => "relay",
        }
    }

    pub async fn send(&self, from: &str, email: &Email) -> Result<()> {
        match self {
            Mailer::Log => {
                info!(from = %from, to = %email.to, subject = %email.subject, "email (log transport)");
                Ok(())
            }
            Mailer::Outbox(outbox) => {
                outbox.lock().push(email.clone());
                Ok(())
            }
            Mailer::Relay { client, url } => {
                client
                    .post(url)
                    .json(&RelayMessage {
                        from,
                        to: &email.to,
                        subject: &email.subject,
                        body: &email.body,
                    })
                    .send()
                    .await
                    .with_context(|| format!("mail relay {url} unreachable"))?
                    .error_for_status()
                    .context("mail relay rejected message")?;
                Ok(())
            }
        }
    }

    /// Messages captured by the outbox transport; empty for the others.
    pub fn sent(&self) -> Vec<Email> {
        match self {
            Mailer::Outbox(outbox) => outbox.lock().clone(),
            _ => Vec::new(),
        }
    }
}

fn booking_lines(booking: &Booking, tour: &Tour) -> String {
    format!(
        "Booking reference: {}\nTour: {} ({})\nTravel date: {}\nParticipants: {}\nTotal: {}",
        booking.reference,
        tour.title,
        tour.destination,
        booking.travel_date.format("%B %d, %Y"),
        booking.participants,
        format_money(booking.total_cents, &booking.currency),
    )
}

pub fn booking_received(user: &User, booking: &Booking, tour: &Tour) -> Email {
    Email {
        to: user.email.clone(),
        subject: format!("Booking received - {}", booking.reference),
        body: format!(
            "Dear {},\n\nThank you for booking with Wayfare. Your booking is pending until \
             payment is completed.\n\n{}\n\nWe look forward to travelling with you!",
            user.first_name,
            booking_lines(booking, tour)
        ),
    }
}

pub fn booking_confirmed(user: &User, booking: &Booking, tour: &Tour) -> Email {
    Email {
        to: user.email.clone(),
        subject: format!("Booking confirmed - {}", booking.reference),
        body: format!(
            "Dear {},\n\nYour payment was received and your booking is confirmed.\n\n{}\n\n\
             Please arrive 15 minutes before departure.",
            user.first_name,
            booking_lines(booking, tour)
        ),
    }
}

pub fn booking_cancelled(user: &User, booking: &Booking, tour: &Tour) -> Email {
    let reason = booking
        .cancellation_reason
        .as_deref()
        .map(|reason| format!("\nReason: {reason}"))
        .unwrap_or_default();
    let refund = match booking.payment_state {
        wayfare_core::PaymentState::Refunded => {
            "\n\nA refund for your payment has been issued to the original payment method."
        }
        _ => "",
    };
    Email {
        to: user.email.clone(),
        subject: format!("Booking cancelled - {}", booking.reference),
        body: format!(
            "Dear {},\n\nYour booking has been cancelled.\n\n{}{reason}{refund}",
            user.first_name,
            booking_lines(booking, tour)
        ),
    }
}

pub fn inquiry_notification(admin_emails: &[String], inquiry: &Inquiry) -> Vec<Email> {
    let review = if inquiry.requires_human_review {
        format!(
            "Needs review: {}",
            if inquiry.escalation_reasons.is_empty() {
                "yes".to_string()
            } else {
                inquiry.escalation_reasons.join("; ")
            }
        )
    } else {
        "Auto-answered".to_string()
    };
    let body = format!(
        "New inquiry from {} <{}>\nPhone: {}\nCategory: {} (confidence {:.2})\n{review}\n\n\
         Subject: {}\n\n{}",
        inquiry.name,
        inquiry.email,
        inquiry.phone.as_deref().unwrap_or("-"),
        inquiry.category.as_str(),
        inquiry.bot_confidence,
        inquiry.subject,
        inquiry.message,
    );
    admin_emails
        .iter()
        .map(|to| Email {
            to: to.clone(),
            subject: format!("New inquiry: {}", inquiry.subject),
            body: body.clone(),
        })
        .collect()
}

pub fn auto_reply(inquiry: &Inquiry, reply: &str) -> Email {
    Email {
        to: inquiry.email.clone(),
        subject: format!("Re: {}", inquiry.subject),
        body: reply.to_string(),
    }
}

pub fn admin_response(inquiry: &Inquiry, response: &str) -> Email {
    Email {
        to: inquiry.email.clone(),
        subject: format!("Re: {}", inquiry.subject),
        body: format!(
            "Hello {},\n\n{response}\n\nThe Wayfare team\n\n> {}",
            inquiry.name,
            inquiry.message.replace('\n', "\n> ")
        ),
    }
}

pub fn password_reset(user: &User, link: &str, valid_minutes: i64) -> Email {
    Email {
        to: user.email.clone(),
        subject: "Reset your Wayfare password".to_string(),
        body: format!(
            "Dear {},\n\nWe received a request to reset your password. Use the link below \
             within {valid_minutes} minutes to choose a new one:\n\n{link}\n\nIf you did not \
             ask for this, you can ignore this email.",
            user.first_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbox_keeps_what_was_sent() {
        let mailer = Mailer::outbox();
        let email = Email {
            to: "sam@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        };
        mailer.send("desk@example.com", &email).await.expect("send");
        assert_eq!(mailer.sent(), vec![email]);
        assert!(Mailer::Log.sent().is_empty());
    }

    #[tokio::test]
    async fn unreachable_relay_is_an_error() {
        let mailer = Mailer::relay("http://127.0.0.1:9/send").expect("client");
        let email = Email {
            to: "sam@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "Body".to_string(),
        };
        assert!(mailer.send("desk@example.com", &email).await.is_err());
    }
}
