use serde::Serialize;

use crate::models::{Booking, BookingStatus, Review};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewRefusal {
    #[error("you can only review tours you have completed")]
    NoCompletedBooking,
    #[error("you have already reviewed this tour")]
    AlreadyReviewed,
}

/// Returns the completed booking the review will be attached to.
pub fn review_eligibility<'a>(
    user_id: &str,
    tour_id: &str,
    bookings: &'a [Booking],
    reviews: &[Review],
) -> Result<&'a Booking, ReviewRefusal> {
    if reviews
        .iter()
        .any(|review| review.user_id == user_id && review.tour_id == tour_id)
    {
        return Err(ReviewRefusal::AlreadyReviewed);
    }
    bookings
        .iter()
        .find(|booking| {
            booking.user_id == user_id
                && booking.tour_id == tour_id
                && booking.status == BookingStatus::Completed
        })
        .ok_or(ReviewRefusal::NoCompletedBooking)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: Option<f32>,
    pub count: usize,
}

pub fn rating_summary(reviews: &[Review]) -> RatingSummary {
    let approved: Vec<u8> = reviews
        .iter()
        .filter(|review| review.is_approved)
        .map(|review| review.rating)
        .collect();
    let count = approved.len();
    let average = (count > 0).then(|| {
        let sum: u32 = approved.iter().map(|rating| u32::from(*rating)).sum();
        let average = sum as f32 / count as f32;
        (average * 10.0).round() / 10.0
    });
    RatingSummary { average, count }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentState, DEFAULT_CURRENCY};
    use chrono::Utc;

    fn review(user: &str, rating: u8, approved: bool) -> Review {
        Review {
            review_id: format!("r-{user}-{rating}"),
            user_id: user.to_string(),
            tour_id: "tour-1".to_string(),
            booking_id: "b-1".to_string(),
            rating,
            title: "Lovely trip".to_string(),
            comment: "Would go again any time".to_string(),
            is_approved: approved,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            booking_id: "b-1".to_string(),
            reference: "BK-20260101-AAAAAA".to_string(),
            user_id: "u-1".to_string(),
            tour_id: "tour-1".to_string(),
            participants: 1,
            unit_price_cents: 100,
            total_cents: 100,
            currency: DEFAULT_CURRENCY.to_string(),
            travel_date: "2026-01-10".parse().expect("date"),
            status,
            payment_state: PaymentState::Paid,
            contact_phone: None,
            emergency_contact: None,
            special_requests: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn only_completed_travelers_review_once() {
        let confirmed = [booking(BookingStatus::Confirmed)];
        assert_eq!(
            review_eligibility("u-1", "tour-1", &confirmed, &[]).map(|b| b.booking_id.clone()),
            Err(ReviewRefusal::NoCompletedBooking)
        );

        let completed = [booking(BookingStatus::Completed)];
        assert!(review_eligibility("u-1", "tour-1", &completed, &[]).is_ok());
        assert_eq!(
            review_eligibility("u-1", "tour-1", &completed, &[review("u-1", 5, false)])
                .map(|b| b.booking_id.clone()),
            Err(ReviewRefusal::AlreadyReviewed)
        );
    }

    #[test]
    fn averages_only_approved_reviews() {
        let reviews = [review("a", 5, true), review("b", 4, true), review("c", 1, false)];
        let summary = rating_summary(&reviews);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));
        assert_eq!(rating_summary(&[]).average, None);
    }
}
