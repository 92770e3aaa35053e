use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Booking, NewTrip, Review, Trip};
use crate::error::Error;

#[async_trait]
pub trait TripAPI {
    async fn create_trip(&self, user: User, params: NewTrip) -> Result<Trip, Error>;

    async fn find_trip(&self, user: User, id: Uuid) -> Result<Trip, Error>;

    /// Cancels a scheduled trip together with all of its active bookings.
    async fn cancel_trip(&self, user: User, id: Uuid) -> Result<Trip, Error>;
}

#[async_trait]
pub trait BookingAPI {
    /// Takes one seat on a scheduled trip and opens a pending booking for it.
    async fn create_booking(
        &self,
        user: User,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<Booking, Error>;

    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;

    async fn find_pending_bookings(&self, user: User, trip_id: Uuid)
        -> Result<Vec<Booking>, Error>;

    async fn confirm_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;

    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error>;
}

#[async_trait]
pub trait ReviewAPI {
    /// Records the caller's review of a completed trip and refreshes the
    /// trip's average rating.
    async fn create_review(
        &self,
        user: User,
        trip_id: Uuid,
        text: String,
        rating: i16,
    ) -> Result<Review, Error>;
}

pub trait API: TripAPI + BookingAPI + ReviewAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
