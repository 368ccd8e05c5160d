use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    format_money, Booking, BookingStatus, Inquiry, InquiryCategory, InquiryPriority, InquiryStatus,
    ReplyTemplate, Tour, User,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookingStatistics {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub revenue_cents: i64,
    pub average_booking_cents: i64,
}

pub fn booking_statistics(bookings: &[Booking]) -> BookingStatistics {
    let mut stats = BookingStatistics {
        total: bookings.len(),
        ..BookingStatistics::default()
    };
    let mut earning = 0i64;
    for booking in bookings {
        match booking.status {
            BookingStatus::Pending => stats.pending += 1,
            BookingStatus::Confirmed => stats.confirmed += 1,
            BookingStatus::Completed => stats.completed += 1,
            BookingStatus::Cancelled => stats.cancelled += 1,
        }
        if matches!(
            booking.status,
            BookingStatus::Confirmed | BookingStatus::Completed
        ) {
            stats.revenue_cents = stats.revenue_cents.saturating_add(booking.total_cents);
            earning += 1;
        }
    }
    if earning > 0 {
        stats.average_booking_cents = stats.revenue_cents / earning;
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularTour {
    pub tour_id: String,
    pub title: String,
    pub bookings: usize,
    pub participants: u32,
}

/// Tours ranked by number of non-cancelled bookings.
pub fn popular_tours(bookings: &[Booking], tours: &[Tour], limit: usize) -> Vec<PopularTour> {
    let mut counts: HashMap<&str, (usize, u32)> = HashMap::new();
    for booking in bookings
        .iter()
        .filter(|booking| booking.status != BookingStatus::Cancelled)
    {
        let entry = counts.entry(booking.tour_id.as_str()).or_default();
        entry.0 += 1;
        entry.1 += booking.participants;
    }

    let mut ranked: Vec<PopularTour> = tours
        .iter()
        .filter_map(|tour| {
            counts
                .get(tour.tour_id.as_str())
                .map(|(count, participants)| PopularTour {
                    tour_id: tour.tour_id.clone(),
                    title: tour.title.clone(),
                    bookings: *count,
                    participants: *participants,
                })
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.bookings
            .cmp(&a.bookings)
            .then_with(|| b.participants.cmp(&a.participants))
            .then_with(|| a.title.cmp(&b.title))
    });
    ranked.truncate(limit);
    ranked
}

pub fn in_date_range(booking: &Booking, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    let created = booking.created_at.date_naive();
    from.is_none_or(|from| created >= from) && to.is_none_or(|to| created <= to)
}

const CSV_HEADER: &str = "reference,created,customer,email,tour,travel_date,participants,total,status,payment";

pub fn bookings_csv(
    bookings: &[Booking],
    tours: &[Tour],
    users: &[User],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> String {
    let tours: HashMap<&str, &Tour> = tours.iter().map(|tour| (tour.tour_id.as_str(), tour)).collect();
    let users: HashMap<&str, &User> = users.iter().map(|user| (user.user_id.as_str(), user)).collect();

    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for booking in bookings
        .iter()
        .filter(|booking| in_date_range(booking, from, to))
    {
        let user = users.get(booking.user_id.as_str());
        let tour = tours.get(booking.tour_id.as_str());
        let row = [
            booking.reference.clone(),
            booking.created_at.format("%Y-%m-%d %H:%M").to_string(),
            user.map(|user| user.full_name()).unwrap_or_default(),
            user.map(|user| user.email.clone()).unwrap_or_default(),
            tour.map(|tour| tour.title.clone()).unwrap_or_default(),
            booking.travel_date.to_string(),
            booking.participants.to_string(),
            format_money(booking.total_cents, &booking.currency),
            booking.status.as_str().to_string(),
            serde_json::to_value(booking.payment_state)
                .ok()
                .and_then(|value| value.as_str().map(str::to_string))
                .unwrap_or_default(),
        ];
        let line: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InquiryStatistics {
    pub total: usize,
    pub new: usize,
    pub auto_answered: usize,
    pub needs_review: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub urgent: usize,
    /// Open inquiries nobody has picked up.
    pub unassigned: usize,
}

pub fn inquiry_statistics(inquiries: &[Inquiry]) -> InquiryStatistics {
    let mut stats = InquiryStatistics {
        total: inquiries.len(),
        ..InquiryStatistics::default()
    };
    for inquiry in inquiries {
        match inquiry.status {
            InquiryStatus::New => stats.new += 1,
            InquiryStatus::AutoAnswered => stats.auto_answered += 1,
            InquiryStatus::NeedsReview => stats.needs_review += 1,
            InquiryStatus::InProgress => stats.in_progress += 1,
            InquiryStatus::Resolved => stats.resolved += 1,
        }
        if inquiry.priority == InquiryPriority::Urgent && inquiry.status.is_open() {
            stats.urgent += 1;
        }
        if inquiry.assigned_to.is_none() && inquiry.status.is_open() {
            stats.unassigned += 1;
        }
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPerformance {
    pub category: InquiryCategory,
    pub total: usize,
    pub auto_answered: usize,
    pub average_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateUsage {
    pub template_id: String,
    pub name: String,
    pub category: InquiryCategory,
    pub is_active: bool,
    pub uses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponderAnalytics {
    pub total_inquiries: usize,
    pub auto_answered: usize,
    pub escalated: usize,
    /// Share of inquiries answered without a person, 0 to 1.
    pub automation_rate: f32,
    pub escalation_rate: f32,
    pub average_confidence: f32,
    pub categories: Vec<CategoryPerformance>,
    /// Most used first.
    pub templates: Vec<TemplateUsage>,
}

/// How the auto-responder has handled the given inquiries.
pub fn responder_analytics(inquiries: &[Inquiry], templates: &[ReplyTemplate]) -> ResponderAnalytics {
    let total = inquiries.len();
    let answered = |inquiry: &&Inquiry| inquiry.bot_reply.is_some();
    let auto_answered = inquiries.iter().filter(answered).count();
    let escalated = inquiries
        .iter()
        .filter(|inquiry| inquiry.requires_human_review)
        .count();

    let categories = InquiryCategory::ALL
        .iter()
        .map(|category| {
            let members: Vec<&Inquiry> = inquiries
                .iter()
                .filter(|inquiry| inquiry.category == *category)
                .collect();
            CategoryPerformance {
                category: *category,
                total: members.len(),
                auto_answered: members.iter().filter(|inquiry| inquiry.bot_reply.is_some()).count(),
                average_confidence: mean(members.iter().map(|inquiry| inquiry.bot_confidence)),
            }
        })
        .collect();

    let mut usage: Vec<TemplateUsage> = templates
        .iter()
        .map(|template| TemplateUsage {
            template_id: template.template_id.clone(),
            name: template.name.clone(),
            category: template.category,
            is_active: template.is_active,
            uses: inquiries
                .iter()
                .filter(|inquiry| inquiry.template_id.as_deref() == Some(template.template_id.as_str()))
                .count(),
        })
        .collect();
    usage.sort_by(|a, b| b.uses.cmp(&a.uses).then_with(|| a.name.cmp(&b.name)));

    ResponderAnalytics {
        total_inquiries: total,
        auto_answered,
        escalated,
        automation_rate: ratio(auto_answered, total),
        escalation_rate: ratio(escalated, total),
        average_confidence: mean(inquiries.iter().map(|inquiry| inquiry.bot_confidence)),
        categories,
        templates: usage,
    }
}

fn ratio(part: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}
