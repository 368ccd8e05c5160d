use chrono::NaiveDate;
use rand::Rng;

use crate::forms::MAX_PARTICIPANTS_PER_BOOKING;
use crate::models::{format_money, Booking, BookingStatus, Tour};

pub const CANCELLATION_NOTICE_DAYS: i64 = 7;
pub const MODIFICATION_NOTICE_DAYS: i64 = 2;
pub const REFERENCE_ATTEMPTS: usize = 16;

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const REFERENCE_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("this tour is not currently available for booking")]
    TourInactive,
    #[error("travel date must be in the future")]
    DateNotInFuture,
    #[error("tour is only available from {from} to {to}")]
    OutsideWindow { from: NaiveDate, to: NaiveDate },
    #[error("participants must be between 1 and {max}")]
    ParticipantsOutOfRange { max: u32 },
    #[error("only {remaining} spots available for this date")]
    InsufficientCapacity { remaining: u32 },
    #[error("booking total overflowed")]
    TotalOverflow,
    #[error("cannot move a {from} booking to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    #[error("bookings can only be cancelled at least 7 days before travel")]
    CancellationWindowClosed,
    #[error("bookings can only be modified at least 2 days before travel")]
    ModificationWindowClosed,
    #[error("tour has not finished yet")]
    TourNotFinished,
    #[error("booking is already paid")]
    AlreadyPaid,
    #[error("a payment of {received} does not settle the {expected} owed")]
    PaymentMismatch { expected: String, received: String },
    #[error("could not allocate a unique booking reference")]
    ReferenceExhausted,
}

/// Participants holding seats on `tour_id` for `date`, skipping `exclude`.
pub fn booked_participants(
    bookings: &[Booking],
    tour_id: &str,
    date: NaiveDate,
    exclude: Option<&str>,
) -> u32 {
    bookings
        .iter()
        .filter(|booking| booking.tour_id == tour_id && booking.travel_date == date)
        .filter(|booking| booking.status.holds_capacity())
        .filter(|booking| exclude != Some(booking.booking_id.as_str()))
        .map(|booking| booking.participants)
        .sum()
}

pub fn remaining_capacity(
    tour: &Tour,
    bookings: &[Booking],
    date: NaiveDate,
    exclude: Option<&str>,
) -> u32 {
    tour.max_participants
        .saturating_sub(booked_participants(bookings, &tour.tour_id, date, exclude))
}

/// Runs every rule a new or modified reservation has to satisfy and returns
/// the seats still free before this request.
pub fn check_availability(
    tour: &Tour,
    bookings: &[Booking],
    participants: u32,
    travel_date: NaiveDate,
    today: NaiveDate,
    exclude: Option<&str>,
) -> Result<u32, BookingError> {
    if !tour.is_active {
        return Err(BookingError::TourInactive);
    }
    if travel_date <= today {
        return Err(BookingError::DateNotInFuture);
    }
    if !tour.offered_on(travel_date) {
        return Err(BookingError::OutsideWindow {
            from: tour.available_from,
            to: tour.available_to,
        });
    }
    let max = MAX_PARTICIPANTS_PER_BOOKING.min(tour.max_participants);
    if participants == 0 || participants > max {
        return Err(BookingError::ParticipantsOutOfRange { max });
    }
    let remaining = remaining_capacity(tour, bookings, travel_date, exclude);
    if participants > remaining {
        return Err(BookingError::InsufficientCapacity { remaining });
    }
    Ok(remaining)
}

pub fn quote_total(unit_price_cents: i64, participants: u32) -> Result<i64, BookingError> {
    unit_price_cents
        .checked_mul(i64::from(participants))
        .ok_or(BookingError::TotalOverflow)
}

pub fn generate_reference<R: Rng + ?Sized>(date: NaiveDate, rng: &mut R) -> String {
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.random_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("BK-{}-{suffix}", date.format("%Y%m%d"))
}

pub fn is_reference(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some("BK"), Some(date), Some(suffix), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    date.len() == 8
        && date.chars().all(|ch| ch.is_ascii_digit())
        && suffix.len() == REFERENCE_SUFFIX_LEN
        && suffix.bytes().all(|byte| REFERENCE_ALPHABET.contains(&byte))
}

pub fn transition(booking: &mut Booking, next: BookingStatus) -> Result<(), BookingError> {
    if !booking.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str(),
            to: next.as_str(),
        });
    }
    booking.status = next;
    Ok(())
}

/// Travelers need a week of notice; admins may cancel at any time.
pub fn ensure_cancellable(
    booking: &Booking,
    today: NaiveDate,
    by_admin: bool,
) -> Result<(), BookingError> {
    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str(),
            to: BookingStatus::Cancelled.as_str(),
        });
    }
    if !by_admin && booking.days_until_travel(today) < CANCELLATION_NOTICE_DAYS {
        return Err(BookingError::CancellationWindowClosed);
    }
    Ok(())
}

pub fn ensure_modifiable(booking: &Booking, today: NaiveDate) -> Result<(), BookingError> {
    if !booking.status.holds_capacity() {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str(),
            to: booking.status.as_str(),
        });
    }
    if booking.days_until_travel(today) < MODIFICATION_NOTICE_DAYS {
        return Err(BookingError::ModificationWindowClosed);
    }
    Ok(())
}

/// A charge settles a booking only in the booking's currency and for at
/// least the amount still owed.
pub fn ensure_payment_settles(
    booking: &Booking,
    outstanding_cents: i64,
    amount_cents: i64,
    currency: &str,
) -> Result<(), BookingError> {
    if amount_cents < outstanding_cents || !currency.eq_ignore_ascii_case(&booking.currency) {
        return Err(BookingError::PaymentMismatch {
            expected: format_money(outstanding_cents, &booking.currency),
            received: format_money(amount_cents, &currency.to_uppercase()),
        });
    }
    Ok(())
}

pub fn completion_due(booking: &Booking, duration_days: u32, today: NaiveDate) -> bool {
    booking.status == BookingStatus::Confirmed && booking.tour_end(duration_days) <= today
}
