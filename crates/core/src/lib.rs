pub mod booking;
pub mod forms;
pub mod models;
pub mod reporting;
pub mod responder;
pub mod reviews;
pub mod search;

pub use booking::BookingError;
pub use forms::{FieldError, ValidationErrors, MAX_PARTICIPANTS_PER_BOOKING};
pub use models::*;
pub use responder::{AutoResponder, InquiryAnalysis, ResponderDecision};
pub use reviews::{RatingSummary, ReviewRefusal};
pub use search::{Page, TourQuery, TourSearchParams};
