use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use wayfare_core::forms::{CategoryForm, ItineraryDayForm, ReviewForm, TourForm};
use wayfare_core::reviews::{rating_summary, review_eligibility};
use wayfare_core::search::{related_tours, search_tours};
use wayfare_core::{
    new_id, Category, Difficulty, ItineraryDay, Page, RatingSummary, Review, Tour, TourQuery,
    TourSearchParams, User, ValidationErrors, DEFAULT_CURRENCY,
};
use wayfare_storage::TravelStore;

use crate::{DeskError, DeskResult, TravelDesk};

const FEATURED_LIMIT: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct TourDetail {
    pub tour: Tour,
    pub category: Option<Category>,
    pub rating: RatingSummary,
    pub reviews: Vec<Review>,
    pub available_spots: u32,
    pub itinerary: Vec<ItineraryDay>,
    pub related: Vec<Tour>,
}

fn apply_tour_form(tour: &mut Tour, form: TourForm) {
    tour.category_id = form.category_id.trim().to_string();
    tour.title = form.title.trim().to_string();
    tour.description = form.description.trim().to_string();
    tour.destination = form.destination.trim().to_string();
    tour.price_cents = form.price_cents;
    tour.currency = form
        .currency
        .map(|currency| currency.trim().to_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    tour.duration_days = form.duration_days;
    tour.max_participants = form.max_participants;
    tour.available_from = form.available_from;
    tour.available_to = form.available_to;
    tour.difficulty = form
        .difficulty
        .as_deref()
        .and_then(Difficulty::parse)
        .unwrap_or(Difficulty::Medium);
    tour.featured = form.featured;
    tour.is_active = form.is_active;
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    pub async fn list_categories(&self, active_only: bool) -> DeskResult<Vec<Category>> {
        let categories = self.store.list_categories().await?;
        Ok(categories
            .into_iter()
            .filter(|category| !active_only || category.is_active)
            .collect())
    }

    #[instrument(skip(self, form), fields(name = %form.name))]
    pub async fn create_category(&self, form: CategoryForm) -> DeskResult<Category> {
        form.validate()?;
        let category = Category {
            category_id: new_id(),
            name: form.name.trim().to_string(),
            description: form.description.map(|text| text.trim().to_string()),
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.upsert_category(&category).await?;
        info!(category_id = %category.category_id, "category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        form: CategoryForm,
        is_active: Option<bool>,
    ) -> DeskResult<Category> {
        form.validate()?;
        let mut category = self
            .store
            .get_category(category_id)
            .await?
            .ok_or(DeskError::NotFound("category"))?;
        category.name = form.name.trim().to_string();
        category.description = form.description.map(|text| text.trim().to_string());
        if let Some(active) = is_active {
            category.is_active = active;
        }
        self.store.upsert_category(&category).await?;
        Ok(category)
    }

    pub async fn delete_category(&self, category_id: &str) -> DeskResult<()> {
        let tours = self.store.list_tours().await?;
        if tours.iter().any(|tour| tour.category_id == category_id) {
            return Err(DeskError::Conflict(
                "Cannot delete a category that still has tours.".to_string(),
            ));
        }
        if !self.store.delete_category(category_id).await? {
            return Err(DeskError::NotFound("category"));
        }
        Ok(())
    }

    async fn require_category(&self, category_id: &str) -> DeskResult<()> {
        match self.store.get_category(category_id.trim()).await? {
            Some(_) => Ok(()),
            None => Err(ValidationErrors::single(
                "category_id",
                "Unknown category",
            )
            .into()),
        }
    }

    #[instrument(skip(self, form), fields(title = %form.title))]
    pub async fn create_tour(&self, form: TourForm) -> DeskResult<Tour> {
        form.validate()?;
        self.require_category(&form.category_id).await?;
        let now = Utc::now();
        let mut tour = Tour {
            tour_id: new_id(),
            category_id: String::new(),
            title: String::new(),
            description: String::new(),
            destination: String::new(),
            price_cents: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            duration_days: 1,
            max_participants: 1,
            available_from: form.available_from,
            available_to: form.available_to,
            difficulty: Difficulty::Medium,
            featured: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        apply_tour_form(&mut tour, form);
        self.store.upsert_tour(&tour).await?;
        info!(tour_id = %tour.tour_id, "tour created");
        Ok(tour)
    }

    #[instrument(skip(self, form))]
    pub async fn update_tour(&self, tour_id: &str, form: TourForm) -> DeskResult<Tour> {
        form.validate()?;
        self.require_category(&form.category_id).await?;
        let mut tour = self.get_tour(tour_id).await?;
        apply_tour_form(&mut tour, form);
        tour.updated_at = Utc::now();
        self.store.upsert_tour(&tour).await?;
        info!(tour_id = %tour.tour_id, "tour updated");
        Ok(tour)
    }

    /// Tours with bookings cannot be removed, only deactivated.
    pub async fn delete_tour(&self, tour_id: &str) -> DeskResult<()> {
        self.get_tour(tour_id).await?;
        if !self.store.list_bookings_for_tour(tour_id).await?.is_empty() {
            return Err(DeskError::Conflict(
                "Cannot delete a tour with bookings. Deactivate it instead.".to_string(),
            ));
        }
        self.store.delete_tour(tour_id).await?;
        self.store.delete_itinerary(tour_id).await?;
        info!(tour_id = %tour_id, "tour deleted");
        Ok(())
    }

    pub async fn get_tour(&self, tour_id: &str) -> DeskResult<Tour> {
        self.store
            .get_tour(tour_id)
            .await?
            .ok_or(DeskError::NotFound("tour"))
    }

    pub async fn list_all_tours(&self) -> DeskResult<Vec<Tour>> {
        Ok(self.store.list_tours().await?)
    }

    pub async fn search_tours(&self, params: &TourSearchParams) -> DeskResult<Page<Tour>> {
        let query = TourQuery::from_params(params);
        let tours = self.store.list_tours().await?;
        Ok(search_tours(tours, &query))
    }

    pub async fn featured_tours(&self) -> DeskResult<Vec<Tour>> {
        let tours = self.store.list_tours().await?;
        Ok(tours
            .into_iter()
            .filter(|tour| tour.is_active && tour.featured)
            .take(FEATURED_LIMIT)
            .collect())
    }

    /// Public view of an active tour.
    pub async fn tour_detail(&self, tour_id: &str) -> DeskResult<TourDetail> {
        let tour = self.get_tour(tour_id).await?;
        if !tour.is_active {
            return Err(DeskError::NotFound("tour"));
        }
        let category = self.store.get_category(&tour.category_id).await?;
        let reviews = self.store.list_reviews_for_tour(tour_id).await?;
        let rating = rating_summary(&reviews);
        let bookings = self.store.list_bookings_for_tour(tour_id).await?;
        let available_spots = tour.available_spots(&bookings);
        let all_tours = self.store.list_tours().await?;
        let related = related_tours(&all_tours, &tour);
        let itinerary = self.store.list_itinerary(tour_id).await?;
        Ok(TourDetail {
            rating,
            reviews: reviews.into_iter().filter(|r| r.is_approved).collect(),
            available_spots,
            itinerary,
            related,
            category,
            tour,
        })
    }

    pub async fn list_itinerary(&self, tour_id: &str) -> DeskResult<Vec<ItineraryDay>> {
        self.get_tour(tour_id).await?;
        Ok(self.store.list_itinerary(tour_id).await?)
    }

    /// Creates or replaces one day of a tour's plan. Days run from 1 to the
    /// tour's duration.
    #[instrument(skip(self, form))]
    pub async fn set_itinerary_day(
        &self,
        tour_id: &str,
        day_number: u32,
        form: ItineraryDayForm,
    ) -> DeskResult<ItineraryDay> {
        form.validate()?;
        let tour = self.get_tour(tour_id).await?;
        if day_number == 0 || day_number > tour.duration_days {
            return Err(ValidationErrors::single(
                "day_number",
                format!("Day must be between 1 and {}", tour.duration_days),
            )
            .into());
        }
        let day = ItineraryDay {
            tour_id: tour.tour_id,
            day_number,
            title: form.title.trim().to_string(),
            description: form.description.trim().to_string(),
            activities: form.cleaned_activities(),
            accommodation: form.cleaned_accommodation(),
            meals: form.cleaned_meals(),
        };
        self.store.upsert_itinerary_day(&day).await?;
        info!(tour_id = %day.tour_id, day = day_number, "itinerary day saved");
        Ok(day)
    }

    pub async fn remove_itinerary_day(&self, tour_id: &str, day_number: u32) -> DeskResult<()> {
        if !self.store.delete_itinerary_day(tour_id, day_number).await? {
            return Err(DeskError::NotFound("itinerary day"));
        }
        Ok(())
    }

    #[instrument(skip(self, user, form), fields(user_id = %user.user_id))]
    pub async fn submit_review(
        &self,
        user: &User,
        tour_id: &str,
        form: ReviewForm,
    ) -> DeskResult<Review> {
        form.validate()?;
        self.get_tour(tour_id).await?;
        let bookings = self.store.list_bookings_for_user(&user.user_id).await?;
        let reviews = self.store.list_reviews_for_tour(tour_id).await?;
        let booking = review_eligibility(&user.user_id, tour_id, &bookings, &reviews)?;
        let review = Review {
            review_id: new_id(),
            user_id: user.user_id.clone(),
            tour_id: tour_id.to_string(),
            booking_id: booking.booking_id.clone(),
            rating: form.rating,
            title: form.title.trim().to_string(),
            comment: form.comment.trim().to_string(),
            is_approved: false,
            created_at: Utc::now(),
            approved_at: None,
        };
        self.store.insert_review(&review).await?;
        info!(review_id = %review.review_id, "review submitted for moderation");
        Ok(review)
    }

    pub async fn list_reviews(&self, pending_only: bool) -> DeskResult<Vec<Review>> {
        let reviews = self.store.list_reviews().await?;
        Ok(reviews
            .into_iter()
            .filter(|review| !pending_only || !review.is_approved)
            .collect())
    }

    pub async fn approve_review(&self, review_id: &str) -> DeskResult<Review> {
        let mut review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or(DeskError::NotFound("review"))?;
        if !review.is_approved {
            review.is_approved = true;
            review.approved_at = Some(Utc::now());
            self.store.update_review(&review).await?;
        }
        Ok(review)
    }

    pub async fn delete_review(&self, review_id: &str) -> DeskResult<()> {
        if !self.store.delete_review(review_id).await? {
            return Err(DeskError::NotFound("review"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wayfare_core::forms::{ItineraryDayForm, ReviewForm};
    use wayfare_core::{BookingStatus, TourSearchParams};
    use wayfare_storage::{BookingRepository, ItineraryRepository, TourRepository};

    use crate::testkit;
    use crate::DeskError;

    fn review_form() -> ReviewForm {
        ReviewForm {
            rating: 5,
            title: "Unforgettable".to_string(),
            comment: "The guides were superb and the views endless.".to_string(),
        }
    }

    #[tokio::test]
    async fn search_hides_inactive_tours() {
        let desk = testkit::desk();
        let tour = testkit::tour(&desk, 10).await;
        let page = desk
            .search_tours(&TourSearchParams {
                search: Some("atlas".to_string()),
                ..TourSearchParams::default()
            })
            .await
            .expect("search");
        assert_eq!(page.total, 1);

        let mut hidden = tour.clone();
        hidden.is_active = false;
        desk.store().upsert_tour(&hidden).await.expect("upsert");
        let page = desk
            .search_tours(&TourSearchParams::default())
            .await
            .expect("search");
        assert_eq!(page.total, 0);
        assert!(matches!(
            desk.tour_detail(&tour.tour_id).await,
            Err(DeskError::NotFound("tour"))
        ));
    }

    #[tokio::test]
    async fn reviews_need_a_completed_booking_and_moderation() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 10).await;

        let err = desk
            .submit_review(&user, &tour.tour_id, review_form())
            .await
            .expect_err("no booking yet");
        assert!(matches!(err, DeskError::Review(_)));

        let booking = crate::bookings::tests::seed_booking(
            &desk,
            &user,
            &tour,
            BookingStatus::Completed,
            Utc::now().date_naive() - chrono::Duration::days(10),
        )
        .await;
        assert_eq!(
            desk.store()
                .get_booking(&booking.booking_id)
                .await
                .expect("query")
                .map(|b| b.status),
            Some(BookingStatus::Completed)
        );

        let review = desk
            .submit_review(&user, &tour.tour_id, review_form())
            .await
            .expect("review");
        assert!(!review.is_approved);
        let detail = desk.tour_detail(&tour.tour_id).await.expect("detail");
        assert_eq!(detail.rating.count, 0);

        desk.approve_review(&review.review_id).await.expect("approve");
        let detail = desk.tour_detail(&tour.tour_id).await.expect("detail");
        assert_eq!(detail.rating.count, 1);
        assert_eq!(detail.rating.average, Some(5.0));

        let err = desk
            .submit_review(&user, &tour.tour_id, review_form())
            .await
            .expect_err("second review");
        assert!(matches!(err, DeskError::Review(_)));
    }

    #[tokio::test]
    async fn tours_with_bookings_cannot_be_deleted() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 10).await;
        crate::bookings::tests::seed_booking(
            &desk,
            &user,
            &tour,
            BookingStatus::Pending,
            Utc::now().date_naive() + chrono::Duration::days(30),
        )
        .await;
        let err = desk.delete_tour(&tour.tour_id).await.expect_err("has bookings");
        assert!(matches!(err, DeskError::Conflict(_)));
    }

    fn day_form(title: &str) -> ItineraryDayForm {
        ItineraryDayForm {
            title: title.to_string(),
            description: "Mule trails between Berber villages.".to_string(),
            activities: vec![" Village walk ".to_string()],
            accommodation: Some("Guesthouse".to_string()),
            meals: Some("".to_string()),
        }
    }

    #[tokio::test]
    async fn itinerary_days_stay_inside_the_tour_length() {
        let desk = testkit::desk();
        let tour = testkit::tour(&desk, 10).await;

        desk.set_itinerary_day(&tour.tour_id, 2, day_form("Up to the refuge"))
            .await
            .expect("day 2");
        let first = desk
            .set_itinerary_day(&tour.tour_id, 1, day_form("Arrival in Imlil"))
            .await
            .expect("day 1");
        assert_eq!(first.activities, vec!["Village walk"]);
        assert_eq!(first.meals, None);

        for day in [0, tour.duration_days + 1] {
            let err = desk
                .set_itinerary_day(&tour.tour_id, day, day_form("Out of range"))
                .await
                .expect_err("outside the tour");
            assert!(matches!(err, DeskError::Validation(fields) if fields.has("day_number")));
        }

        let detail = desk.tour_detail(&tour.tour_id).await.expect("detail");
        let days: Vec<u32> = detail.itinerary.iter().map(|day| day.day_number).collect();
        assert_eq!(days, vec![1, 2]);

        desk.remove_itinerary_day(&tour.tour_id, 2).await.expect("remove");
        let err = desk
            .remove_itinerary_day(&tour.tour_id, 2)
            .await
            .expect_err("already gone");
        assert!(matches!(err, DeskError::NotFound("itinerary day")));

        desk.delete_tour(&tour.tour_id).await.expect("delete tour");
        assert!(desk
            .store()
            .list_itinerary(&tour.tour_id)
            .await
            .expect("list")
            .is_empty());
    }
}
