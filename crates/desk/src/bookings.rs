use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use wayfare_core::booking::{
    check_availability, completion_due, ensure_cancellable, ensure_modifiable,
    ensure_payment_settles, generate_reference, quote_total, transition, REFERENCE_ATTEMPTS,
};
use wayfare_core::forms::{BookingForm, BookingUpdateForm, CancelForm};
use wayfare_core::{
    new_id, outstanding_amount, Booking, BookingError, BookingStatus, Payment, PaymentMethod,
    PaymentState, PaymentStatus, Tour, User,
};
use wayfare_storage::TravelStore;

use crate::notify;
use crate::{today, DeskError, DeskResult, TravelDesk};

#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub tour: Option<Tour>,
    pub payments: Vec<Payment>,
    pub outstanding_cents: i64,
}

/// A successful charge reported by a gateway or the simulator.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub amount_cents: i64,
    pub currency: String,
    pub method: PaymentMethod,
    pub transaction_id: String,
}

impl<S> TravelDesk<S>
where
    S: TravelStore,
{
    #[instrument(skip(self, user, form), fields(user_id = %user.user_id, tour_id = %form.tour_id))]
    pub async fn create_booking(&self, user: &User, form: BookingForm) -> DeskResult<Booking> {
        if !user.is_active {
            return Err(DeskError::Forbidden("Your account is disabled.".to_string()));
        }
        let today = today();
        form.validate(today)?;
        let tour = self
            .store
            .get_tour(form.tour_id.trim())
            .await?
            .ok_or(DeskError::NotFound("tour"))?;

        let existing = self.store.list_bookings_for_tour(&tour.tour_id).await?;
        check_availability(
            &tour,
            &existing,
            form.participants,
            form.travel_date,
            today,
            None,
        )?;
        let total_cents = quote_total(tour.price_cents, form.participants)?;
        let reference = self.allocate_reference().await?;
        let contact = form.contact();

        let now = Utc::now();
        let booking = Booking {
            booking_id: new_id(),
            reference,
            user_id: user.user_id.clone(),
            tour_id: tour.tour_id.clone(),
            participants: form.participants,
            unit_price_cents: tour.price_cents,
            total_cents,
            currency: tour.currency.clone(),
            travel_date: form.travel_date,
            status: BookingStatus::Pending,
            payment_state: PaymentState::Unpaid,
            contact_phone: contact.contact_phone,
            emergency_contact: contact.emergency_contact,
            special_requests: contact.special_requests,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };
        self.store.insert_booking(&booking).await?;
        self.metrics.inc_booking_created();
        info!(
            booking_id = %booking.booking_id,
            reference = %booking.reference,
            participants = booking.participants,
            total_cents = booking.total_cents,
            "booking created"
        );

        self.deliver(notify::booking_received(user, &booking, &tour))
            .await;
        Ok(booking)
    }

    async fn allocate_reference(&self) -> DeskResult<String> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let candidate = generate_reference(today(), &mut rand::rng());
            if !self.store.reference_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(BookingError::ReferenceExhausted.into())
    }

    pub async fn list_user_bookings(&self, user_id: &str) -> DeskResult<Vec<Booking>> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }

    pub async fn list_bookings(&self, status: Option<BookingStatus>) -> DeskResult<Vec<Booking>> {
        let bookings = self.store.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|booking| status.is_none_or(|status| booking.status == status))
            .collect())
    }

    /// Loads a booking the actor may see: their own, or any for admins.
    pub async fn booking_for(&self, actor: &User, booking_id: &str) -> DeskResult<Booking> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(DeskError::NotFound("booking"))?;
        if booking.user_id != actor.user_id && !actor.is_admin() {
            return Err(DeskError::Forbidden(
                "You can only access your own bookings.".to_string(),
            ));
        }
        Ok(booking)
    }

    pub async fn booking_detail(&self, actor: &User, booking_id: &str) -> DeskResult<BookingDetail> {
        let booking = self.booking_for(actor, booking_id).await?;
        let tour = self.store.get_tour(&booking.tour_id).await?;
        let payments = self
            .store
            .list_payments_for_booking(&booking.booking_id)
            .await?;
        let outstanding_cents = match booking.status {
            BookingStatus::Cancelled => 0,
            _ => outstanding_amount(&booking, &payments),
        };
        Ok(BookingDetail {
            booking,
            tour,
            payments,
            outstanding_cents,
        })
    }

    #[instrument(skip(self, actor, form), fields(user_id = %actor.user_id))]
    pub async fn update_booking(
        &self,
        actor: &User,
        booking_id: &str,
        form: BookingUpdateForm,
    ) -> DeskResult<Booking> {
        let mut booking = self.booking_for(actor, booking_id).await?;
        if booking.user_id != actor.user_id {
            return Err(DeskError::Forbidden(
                "Only the traveler who made a booking can modify it.".to_string(),
            ));
        }
        let today = today();
        form.validate(today)?;
        ensure_modifiable(&booking, today)?;

        let tour = self
            .store
            .get_tour(&booking.tour_id)
            .await?
            .ok_or(DeskError::NotFound("tour"))?;
        let existing = self.store.list_bookings_for_tour(&tour.tour_id).await?;
        check_availability(
            &tour,
            &existing,
            form.participants,
            form.travel_date,
            today,
            Some(&booking.booking_id),
        )?;
        let total_cents = quote_total(tour.price_cents, form.participants)?;
        if booking.payment_state == PaymentState::Paid && total_cents != booking.total_cents {
            return Err(DeskError::Conflict(
                "Paid bookings cannot change their total. Cancel and book again instead."
                    .to_string(),
            ));
        }

        let contact = form.contact();
        booking.participants = form.participants;
        booking.travel_date = form.travel_date;
        booking.unit_price_cents = tour.price_cents;
        booking.total_cents = total_cents;
        booking.contact_phone = contact.contact_phone;
        booking.emergency_contact = contact.emergency_contact;
        booking.special_requests = contact.special_requests;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;
        info!(booking_id = %booking.booking_id, total_cents, "booking modified");
        Ok(booking)
    }

    /// Travelers cancel their own bookings with a week of notice; admins may
    /// cancel any booking at any time. Paid bookings are marked refunded.
    #[instrument(skip(self, actor, form), fields(user_id = %actor.user_id))]
    pub async fn cancel_booking(
        &self,
        actor: &User,
        booking_id: &str,
        form: CancelForm,
    ) -> DeskResult<Booking> {
        form.validate()?;
        let mut booking = self.booking_for(actor, booking_id).await?;
        ensure_cancellable(&booking, today(), actor.is_admin())?;
        transition(&mut booking, BookingStatus::Cancelled)?;

        let now = Utc::now();
        booking.cancellation_reason = form.cleaned_reason();
        booking.cancelled_at = Some(now);
        booking.updated_at = now;
        if booking.payment_state == PaymentState::Paid {
            booking.payment_state = PaymentState::Refunded;
            for mut payment in self
                .store
                .list_payments_for_booking(&booking.booking_id)
                .await?
                .into_iter()
                .filter(|payment| payment.status == PaymentStatus::Completed)
            {
                payment.status = PaymentStatus::Refunded;
                self.store.update_payment(&payment).await?;
            }
        }
        self.store.update_booking(&booking).await?;
        self.metrics.inc_booking_cancelled();
        info!(
            booking_id = %booking.booking_id,
            by_admin = actor.is_admin(),
            "booking cancelled"
        );

        self.notify_owner(&booking, notify::booking_cancelled).await;
        Ok(booking)
    }

    /// Admin action: confirmed bookings whose tour has ended become completed.
    pub async fn complete_booking(&self, booking_id: &str) -> DeskResult<Booking> {
        let mut booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(DeskError::NotFound("booking"))?;
        let tour = self
            .store
            .get_tour(&booking.tour_id)
            .await?
            .ok_or(DeskError::NotFound("tour"))?;
        if booking.status == BookingStatus::Confirmed
            && !completion_due(&booking, tour.duration_days, today())
        {
            return Err(BookingError::TourNotFinished.into());
        }
        transition(&mut booking, BookingStatus::Completed)?;
        booking.updated_at = Utc::now();
        self.store.update_booking(&booking).await?;
        self.metrics.add_bookings_completed(1);
        info!(booking_id = %booking.booking_id, "booking completed");
        Ok(booking)
    }

    /// Batch pass over confirmed bookings; returns how many were completed.
    #[instrument(skip(self))]
    pub async fn complete_due_bookings(&self) -> DeskResult<usize> {
        let today = today();
        let tours = self.store.list_tours().await?;
        let mut completed = 0;
        for mut booking in self.store.list_bookings().await? {
            let Some(tour) = tours.iter().find(|tour| tour.tour_id == booking.tour_id) else {
                continue;
            };
            if !completion_due(&booking, tour.duration_days, today) {
                continue;
            }
            transition(&mut booking, BookingStatus::Completed)?;
            booking.updated_at = Utc::now();
            self.store.update_booking(&booking).await?;
            completed += 1;
        }
        self.metrics.add_bookings_completed(completed);
        info!(completed, "due bookings completed");
        Ok(completed)
    }

    /// Admin status change routed through the lifecycle rules.
    pub async fn set_booking_status(
        &self,
        actor: &User,
        booking_id: &str,
        status: BookingStatus,
        reason: Option<String>,
    ) -> DeskResult<Booking> {
        match status {
            BookingStatus::Cancelled => {
                self.cancel_booking(actor, booking_id, CancelForm { reason })
                    .await
            }
            BookingStatus::Completed => self.complete_booking(booking_id).await,
            BookingStatus::Confirmed => Err(DeskError::BadRequest(
                "Bookings are confirmed by a successful payment.".to_string(),
            )),
            BookingStatus::Pending => {
                let booking = self.booking_for(actor, booking_id).await?;
                Err(BookingError::InvalidTransition {
                    from: booking.status.as_str(),
                    to: BookingStatus::Pending.as_str(),
                }
                .into())
            }
        }
    }

    /// The booking and amount still owed, for a traveler about to pay.
    pub async fn payable_booking(&self, actor: &User, booking_id: &str) -> DeskResult<(Booking, i64)> {
        let booking = self.booking_for(actor, booking_id).await?;
        ensure_payable(&booking)?;
        let payments = self
            .store
            .list_payments_for_booking(&booking.booking_id)
            .await?;
        let outstanding = outstanding_amount(&booking, &payments);
        Ok((booking, outstanding))
    }

    /// Records a successful charge and confirms the booking. A booking that
    /// is already confirmed or paid is never charged again, and a charge
    /// that is short or in another currency is kept as a failed payment.
    #[instrument(skip(self, receipt), fields(transaction_id = %receipt.transaction_id))]
    pub async fn confirm_payment(
        &self,
        booking_id: &str,
        receipt: PaymentReceipt,
    ) -> DeskResult<Booking> {
        let mut booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(DeskError::NotFound("booking"))?;
        ensure_payable(&booking)?;
        if self
            .store
            .find_payment_by_transaction(&receipt.transaction_id)
            .await?
            .is_some()
        {
            return Err(DeskError::Conflict(
                "This payment has already been recorded.".to_string(),
            ));
        }
        let payments = self
            .store
            .list_payments_for_booking(&booking.booking_id)
            .await?;
        let outstanding = outstanding_amount(&booking, &payments);
        if let Err(err) = ensure_payment_settles(
            &booking,
            outstanding,
            receipt.amount_cents,
            &receipt.currency,
        ) {
            warn!(
                booking_id = %booking.booking_id,
                outstanding_cents = outstanding,
                amount_cents = receipt.amount_cents,
                currency = %receipt.currency,
                "payment does not settle booking"
            );
            self.record_failed_payment(&booking.booking_id, receipt)
                .await?;
            return Err(err.into());
        }

        let now = Utc::now();
        let payment = Payment {
            payment_id: new_id(),
            booking_id: booking.booking_id.clone(),
            amount_cents: receipt.amount_cents,
            currency: receipt.currency,
            method: receipt.method,
            transaction_id: receipt.transaction_id,
            status: PaymentStatus::Completed,
            created_at: now,
            processed_at: Some(now),
        };
        transition(&mut booking, BookingStatus::Confirmed)?;
        booking.payment_state = PaymentState::Paid;
        booking.updated_at = now;
        self.store.insert_payment(&payment).await?;
        self.store.update_booking(&booking).await?;
        self.metrics.inc_payment_confirmed();
        info!(
            booking_id = %booking.booking_id,
            amount_cents = payment.amount_cents,
            "payment confirmed"
        );

        self.notify_owner(&booking, notify::booking_confirmed).await;
        Ok(booking)
    }

    /// Development stand-in for the card gateway.
    pub async fn simulate_payment(&self, actor: &User, booking_id: &str) -> DeskResult<Booking> {
        if !self.settings.payment_simulation {
            return Err(DeskError::Forbidden(
                "Payment simulation is disabled.".to_string(),
            ));
        }
        let (booking, outstanding) = self.payable_booking(actor, booking_id).await?;
        let receipt = PaymentReceipt {
            amount_cents: outstanding,
            currency: booking.currency.clone(),
            method: PaymentMethod::Simulated,
            transaction_id: format!("SIM-{}", new_id()),
        };
        self.confirm_payment(&booking.booking_id, receipt).await
    }

    /// Keeps a trace of a declined charge; the booking stays pending.
    pub async fn record_failed_payment(
        &self,
        booking_id: &str,
        receipt: PaymentReceipt,
    ) -> DeskResult<Payment> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(DeskError::NotFound("booking"))?;
        let payment = Payment {
            payment_id: new_id(),
            booking_id: booking.booking_id,
            amount_cents: receipt.amount_cents,
            currency: receipt.currency,
            method: receipt.method,
            transaction_id: receipt.transaction_id,
            status: PaymentStatus::Failed,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.store.insert_payment(&payment).await?;
        warn!(booking_id = %payment.booking_id, "payment failed");
        Ok(payment)
    }

    async fn notify_owner(&self, booking: &Booking, build: fn(&User, &Booking, &Tour) -> notify::Email) {
        let owner = self.store.get_user(&booking.user_id).await;
        let tour = self.store.get_tour(&booking.tour_id).await;
        match (owner, tour) {
            (Ok(Some(owner)), Ok(Some(tour))) => self.deliver(build(&owner, booking, &tour)).await,
            _ => warn!(booking_id = %booking.booking_id, "booking notification skipped"),
        }
    }
}

fn ensure_payable(booking: &Booking) -> Result<(), BookingError> {
    if booking.payment_state != PaymentState::Unpaid || booking.status == BookingStatus::Confirmed {
        return Err(BookingError::AlreadyPaid);
    }
    if booking.status != BookingStatus::Pending {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str(),
            to: BookingStatus::Confirmed.as_str(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testkit;
    use chrono::{Duration, NaiveDate};
    use wayfare_storage::{BookingRepository, PaymentRepository, Store};

    pub(crate) async fn seed_booking(
        desk: &TravelDesk<Store>,
        user: &User,
        tour: &Tour,
        status: BookingStatus,
        travel_date: NaiveDate,
    ) -> Booking {
        let now = Utc::now();
        let booking = Booking {
            booking_id: new_id(),
            reference: generate_reference(travel_date, &mut rand::rng()),
            user_id: user.user_id.clone(),
            tour_id: tour.tour_id.clone(),
            participants: 2,
            unit_price_cents: tour.price_cents,
            total_cents: tour.price_cents * 2,
            currency: tour.currency.clone(),
            travel_date,
            status,
            payment_state: if status == BookingStatus::Pending {
                PaymentState::Unpaid
            } else {
                PaymentState::Paid
            },
            contact_phone: None,
            emergency_contact: None,
            special_requests: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };
        desk.store().insert_booking(&booking).await.expect("seed");
        booking
    }

    async fn status_of(desk: &TravelDesk<Store>, booking_id: &str) -> BookingStatus {
        desk.store()
            .get_booking(booking_id)
            .await
            .expect("query")
            .expect("exists")
            .status
    }

    fn form(tour: &Tour, participants: u32, days_ahead: i64) -> BookingForm {
        BookingForm {
            tour_id: tour.tour_id.clone(),
            participants,
            travel_date: today() + Duration::days(days_ahead),
            contact_phone: None,
            emergency_contact: None,
            special_requests: Some("Vegetarian meals".to_string()),
            terms_accepted: true,
        }
    }

    #[tokio::test]
    async fn booking_prices_and_references() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;

        let first = desk
            .create_booking(&user, form(&tour, 3, 30))
            .await
            .expect("booking");
        assert_eq!(first.total_cents, 3 * tour.price_cents);
        assert_eq!(first.status, BookingStatus::Pending);
        assert_eq!(first.payment_state, PaymentState::Unpaid);
        assert!(wayfare_core::booking::is_reference(&first.reference));

        let second = desk
            .create_booking(&user, form(&tour, 1, 30))
            .await
            .expect("booking");
        assert_ne!(first.reference, second.reference);

        let sent = desk.mailer().sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.contains(&first.reference));
    }

    #[tokio::test]
    async fn capacity_is_shared_per_date() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 5).await;

        desk.create_booking(&user, form(&tour, 4, 20))
            .await
            .expect("first");
        let err = desk
            .create_booking(&user, form(&tour, 2, 20))
            .await
            .expect_err("over capacity");
        assert!(matches!(
            err,
            DeskError::Booking(BookingError::InsufficientCapacity { remaining: 1 })
        ));

        desk.create_booking(&user, form(&tour, 2, 21))
            .await
            .expect("other date has room");

        let err = desk
            .create_booking(&user, form(&tour, 6, 22))
            .await
            .expect_err("larger than tour");
        assert!(matches!(err, DeskError::Booking(BookingError::ParticipantsOutOfRange { .. })));
    }

    #[tokio::test]
    async fn payment_confirms_once() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;
        let booking = desk
            .create_booking(&user, form(&tour, 2, 30))
            .await
            .expect("booking");

        let confirmed = desk
            .simulate_payment(&user, &booking.booking_id)
            .await
            .expect("payment");
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_state, PaymentState::Paid);

        let err = desk
            .simulate_payment(&user, &booking.booking_id)
            .await
            .expect_err("second charge");
        assert!(matches!(err, DeskError::Booking(BookingError::AlreadyPaid)));

        let payments = desk
            .store()
            .list_payments_for_booking(&booking.booking_id)
            .await
            .expect("payments");
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount_cents, booking.total_cents);
    }

    #[tokio::test]
    async fn short_payment_is_recorded_as_failed() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;
        let booking = desk
            .create_booking(&user, form(&tour, 2, 30))
            .await
            .expect("booking");
        assert_eq!(booking.total_cents, 50_000);

        let receipt = |amount_cents, currency: &str, transaction_id: &str| PaymentReceipt {
            amount_cents,
            currency: currency.to_string(),
            method: PaymentMethod::Card,
            transaction_id: transaction_id.to_string(),
        };
        let err = desk
            .confirm_payment(&booking.booking_id, receipt(1, "USD", "pi_short"))
            .await
            .expect_err("one cent does not settle");
        assert!(matches!(
            err,
            DeskError::Booking(BookingError::PaymentMismatch { .. })
        ));
        let err = desk
            .confirm_payment(&booking.booking_id, receipt(50_000, "EUR", "pi_euro"))
            .await
            .expect_err("wrong currency");
        assert!(matches!(
            err,
            DeskError::Booking(BookingError::PaymentMismatch { .. })
        ));

        assert_eq!(status_of(&desk, &booking.booking_id).await, BookingStatus::Pending);
        let payments = desk
            .store()
            .list_payments_for_booking(&booking.booking_id)
            .await
            .expect("payments");
        assert_eq!(payments.len(), 2);
        assert!(payments
            .iter()
            .all(|payment| payment.status == PaymentStatus::Failed));

        let confirmed = desk
            .confirm_payment(&booking.booking_id, receipt(50_000, "usd", "pi_full"))
            .await
            .expect("full amount settles");
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_state, PaymentState::Paid);
    }

    #[tokio::test]
    async fn cancellation_leaves_other_bookings_alone() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let other = testkit::traveler(&desk, "sagepine").await;
        let tour = testkit::tour(&desk, 12).await;
        let mine = desk
            .create_booking(&user, form(&tour, 2, 30))
            .await
            .expect("mine");
        let theirs = desk
            .create_booking(&other, form(&tour, 3, 30))
            .await
            .expect("theirs");

        let err = desk
            .cancel_booking(&other, &mine.booking_id, CancelForm::default())
            .await
            .expect_err("foreign booking");
        assert!(matches!(err, DeskError::Forbidden(_)));

        let cancelled = desk
            .cancel_booking(
                &user,
                &mine.booking_id,
                CancelForm {
                    reason: Some("Change of plans".to_string()),
                },
            )
            .await
            .expect("cancel");
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let reloaded = desk
            .store()
            .get_booking(&theirs.booking_id)
            .await
            .expect("query")
            .expect("exists");
        assert_eq!(reloaded.total_cents, theirs.total_cents);
        assert_eq!(reloaded.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn late_cancellation_is_admin_only_and_refunds() {
        let desk = testkit::desk();
        let admin = testkit::admin(&desk).await;
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;
        let booking = desk
            .create_booking(&user, form(&tour, 2, 3))
            .await
            .expect("booking");
        desk.simulate_payment(&user, &booking.booking_id)
            .await
            .expect("paid");

        let err = desk
            .cancel_booking(&user, &booking.booking_id, CancelForm::default())
            .await
            .expect_err("too late");
        assert!(matches!(
            err,
            DeskError::Booking(BookingError::CancellationWindowClosed)
        ));

        let cancelled = desk
            .cancel_booking(&admin, &booking.booking_id, CancelForm::default())
            .await
            .expect("admin cancel");
        assert_eq!(cancelled.payment_state, PaymentState::Refunded);
        let payments = desk
            .store()
            .list_payments_for_booking(&booking.booking_id)
            .await
            .expect("payments");
        assert!(payments
            .iter()
            .all(|payment| payment.status == PaymentStatus::Refunded));
    }

    #[tokio::test]
    async fn modification_rechecks_capacity_and_reprices() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 6).await;
        let booking = desk
            .create_booking(&user, form(&tour, 4, 30))
            .await
            .expect("booking");

        let update = |participants| BookingUpdateForm {
            participants,
            travel_date: booking.travel_date,
            contact_phone: None,
            emergency_contact: None,
            special_requests: None,
        };
        let updated = desk
            .update_booking(&user, &booking.booking_id, update(6))
            .await
            .expect("own seats are excluded");
        assert_eq!(updated.total_cents, 6 * tour.price_cents);

        let err = desk
            .update_booking(&user, &booking.booking_id, update(7))
            .await
            .expect_err("too many");
        assert!(matches!(err, DeskError::Booking(_)));
    }

    #[tokio::test]
    async fn batch_completes_only_finished_tours() {
        let desk = testkit::desk();
        let user = testkit::traveler(&desk, "rowanh").await;
        let tour = testkit::tour(&desk, 12).await;
        let finished =
            seed_booking(&desk, &user, &tour, BookingStatus::Confirmed, today() - Duration::days(10)).await;
        let running =
            seed_booking(&desk, &user, &tour, BookingStatus::Confirmed, today() - Duration::days(1)).await;
        let pending =
            seed_booking(&desk, &user, &tour, BookingStatus::Pending, today() - Duration::days(10)).await;

        assert_eq!(desk.complete_due_bookings().await.expect("batch"), 1);
        assert_eq!(status_of(&desk, &finished.booking_id).await, BookingStatus::Completed);
        assert_eq!(status_of(&desk, &running.booking_id).await, BookingStatus::Confirmed);
        assert_eq!(status_of(&desk, &pending.booking_id).await, BookingStatus::Pending);

        let err = desk
            .complete_booking(&running.booking_id)
            .await
            .expect_err("tour still running");
        assert!(matches!(err, DeskError::Booking(BookingError::TourNotFinished)));
    }
}
