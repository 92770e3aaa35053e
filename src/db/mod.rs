//! Storage seam for the engine.
//!
//! Everything that mutates a trip row from more than one actor goes through a
//! single conditional statement or a [`StoreTx`]. Neither the engine nor the
//! worker holds an in-process lock around store calls, so several processes
//! can share one database.

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entities::{Booking, BookingStatus, Car, Member, Review, Trip};
use crate::error::Error;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Starts a unit of work. Dropping the returned transaction without
    /// calling [`StoreTx::commit`] rolls it back.
    async fn begin(&self) -> Result<Self::Tx, Error>;

    async fn find_trip(&self, id: Uuid) -> Result<Option<Trip>, Error>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error>;

    /// Moves every trip whose time window has elapsed in one set-based
    /// statement. Scheduled trips that already ended go straight to completed.
    /// Returns the number of trips that changed status.
    async fn advance_statuses_due_by(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn find_member(&mut self, id: Uuid) -> Result<Option<Member>, Error>;

    async fn find_car(&mut self, id: Uuid) -> Result<Option<Car>, Error>;

    async fn insert_trip(&mut self, trip: &Trip) -> Result<(), Error>;

    async fn find_trip(&mut self, id: Uuid) -> Result<Option<Trip>, Error>;

    /// Reads the trip and holds its row lock until the transaction ends.
    async fn fetch_trip_for_update(&mut self, id: Uuid) -> Result<Option<Trip>, Error>;

    /// Takes one seat if the trip is still scheduled and has one left.
    async fn decrement_seat_if_available(&mut self, trip_id: Uuid) -> Result<bool, Error>;

    /// Returns one seat unless the trip is already at full capacity.
    async fn increment_seat(&mut self, trip_id: Uuid) -> Result<bool, Error>;

    async fn update_average_rating(&mut self, trip_id: Uuid, value: f64) -> Result<(), Error>;

    /// Cancels a scheduled trip and resets its seat inventory.
    async fn cancel_trip_if_scheduled(&mut self, trip_id: Uuid) -> Result<bool, Error>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error>;

    async fn fetch_booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, Error>;

    async fn update_booking_status(&mut self, booking: &Booking) -> Result<(), Error>;

    async fn find_bookings_by_trip(
        &mut self,
        trip_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, Error>;

    async fn has_confirmed_booking(
        &mut self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<bool, Error>;

    /// Cancels every pending or confirmed booking on the trip.
    async fn cancel_active_bookings(&mut self, trip_id: Uuid) -> Result<u64, Error>;

    /// Returns `false` when the author already reviewed the trip.
    async fn insert_review(&mut self, review: &Review) -> Result<bool, Error>;

    async fn review_exists(&mut self, trip_id: Uuid, author_id: Uuid) -> Result<bool, Error>;

    async fn average_rating_by_trip(&mut self, trip_id: Uuid) -> Result<Option<f64>, Error>;

    async fn commit(self) -> Result<(), Error>;
}
