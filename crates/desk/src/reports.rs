use chrono::NaiveDate;
use serde::Serialize;
use wayfare_core::reporting::{self, BookingStatistics, PopularTour};
use wayfare_core::InquiryStatus;
use wayfare_storage::TravelStore;

use crate::{DeskResult, TravelDesk};

const DASHBOARD_POPULAR_TOURS: usize = 5;

/// Admin landing page figures.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub users: usize,
    pub active_tours: usize,
    pub reviews_awaiting_approval: usize,
    pub inquiries_needing_review: usize,
    pub bookings: BookingStatistics,
    pub popular_tours: Vec<PopularTour>,
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    pub async fn booking_statistics(&self) -> DeskResult<BookingStatistics> {
        let bookings = self.store.list_bookings().await?;
        Ok(reporting::booking_statistics(&bookings))
    }

    pub async fn popular_tours(&self, limit: usize) -> DeskResult<Vec<PopularTour>> {
        let bookings = self.store.list_bookings().await?;
        let tours = self.store.list_tours().await?;
        Ok(reporting::popular_tours(&bookings, &tours, limit))
    }

    /// Bookings created within `[from, to]` as CSV, newest first.
    pub async fn bookings_csv(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DeskResult<String> {
        let bookings = self.store.list_bookings().await?;
        let tours = self.store.list_tours().await?;
        let users = self.store.list_users().await?;
        Ok(reporting::bookings_csv(&bookings, &tours, &users, from, to))
    }

    pub async fn dashboard(&self) -> DeskResult<Dashboard> {
        let bookings = self.store.list_bookings().await?;
        let tours = self.store.list_tours().await?;
        let users = self.store.list_users().await?;
        let reviews = self.store.list_reviews().await?;
        let inquiries = self.store.list_inquiries().await?;
        Ok(Dashboard {
            users: users.len(),
            active_tours: tours.iter().filter(|tour| tour.is_active).count(),
            reviews_awaiting_approval: reviews.iter().filter(|review| !review.is_approved).count(),
            inquiries_needing_review: inquiries
                .iter()
                .filter(|inquiry| inquiry.status == InquiryStatus::NeedsReview)
                .count(),
            bookings: reporting::booking_statistics(&bookings),
            popular_tours: reporting::popular_tours(&bookings, &tours, DASHBOARD_POPULAR_TOURS),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use wayfare_core::forms::BookingForm;
    use wayfare_core::BookingStatus;

    use crate::{testkit, today};

    #[tokio::test]
    async fn reports_follow_bookings() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;
        let booking = desk
            .create_booking(
                &user,
                BookingForm {
                    tour_id: tour.tour_id.clone(),
                    participants: 2,
                    travel_date: today() + Duration::days(40),
                    contact_phone: None,
                    emergency_contact: None,
                    special_requests: Some("Window seat, please".to_string()),
                    terms_accepted: true,
                },
            )
            .await
            .expect("booking");
        desk.simulate_payment(&user, &booking.booking_id)
            .await
            .expect("paid");

        let stats = desk.booking_statistics().await.expect("stats");
        assert_eq!(stats.total, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.revenue_cents, booking.total_cents);

        let popular = desk.popular_tours(3).await.expect("popular");
        assert_eq!(popular[0].tour_id, tour.tour_id);

        let csv = desk.bookings_csv(None, None).await.expect("csv");
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").starts_with("reference,"));
        let row = lines.next().expect("row");
        assert!(row.starts_with(&booking.reference));
        assert!(row.contains(BookingStatus::Confirmed.as_str()));
        assert!(row.contains("Rowan Hale"));

        let dashboard = desk.dashboard().await.expect("dashboard");
        assert_eq!(dashboard.users, 1);
        assert_eq!(dashboard.active_tours, 1);
    }
}
