use super::helpers::{fetch_booking_for_update, fetch_trip_for_update, find_member};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::BookingAPI,
    auth::User,
    db::{Store, StoreTx},
    entities::{Booking, BookingStatus},
    error::{
        forbidden_error, invalid_input_error, no_available_seats_error, not_found_error,
        unexpected_error, Error,
    },
};

impl<S: Store> Engine<S> {
    /// Bookings are locked after their trip, everywhere, so the trip id is
    /// read ahead of the transaction. It never changes once written.
    async fn trip_id_of_booking(&self, id: Uuid) -> Result<Uuid, Error> {
        let booking = self
            .store
            .find_booking(id)
            .await?
            .ok_or_else(not_found_error)?;

        Ok(booking.trip_id)
    }
}

#[async_trait]
impl<S: Store> BookingAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_booking(
        &self,
        user: User,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<Booking, Error> {
        if user.id != passenger_id && !user.is_system() {
            return Err(forbidden_error());
        }

        let mut tx = self.store.begin().await?;

        find_member(&mut tx, passenger_id).await?;

        let trip = tx
            .find_trip(trip_id)
            .await?
            .ok_or_else(not_found_error)?;

        if trip.driver_id == passenger_id {
            tracing::info!("driver {} tried to book own trip {}", passenger_id, trip_id);
            return Err(invalid_input_error());
        }

        if !tx.decrement_seat_if_available(trip_id).await? {
            // re-read inside the transaction to tell the failures apart
            let trip = tx
                .find_trip(trip_id)
                .await?
                .ok_or_else(not_found_error)?;

            trip.ensure_bookable()?;

            tracing::info!("no seats left on trip {}", trip_id);
            return Err(no_available_seats_error());
        }

        let booking = Booking::new(trip_id, passenger_id);

        tx.insert_booking(&booking).await?;
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, trip_id = %trip_id, "booking created");

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let booking = self
            .store
            .find_booking(id)
            .await?
            .ok_or_else(not_found_error)?;

        let trip = self
            .store
            .find_trip(booking.trip_id)
            .await?
            .ok_or_else(not_found_error)?;

        self.authorize_booking(&user, "read", &booking, &trip)?;

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn find_pending_bookings(
        &self,
        user: User,
        trip_id: Uuid,
    ) -> Result<Vec<Booking>, Error> {
        let mut tx = self.store.begin().await?;

        let trip = tx
            .find_trip(trip_id)
            .await?
            .ok_or_else(not_found_error)?;

        self.authorize(user, "manage", trip)?;

        let bookings = tx
            .find_bookings_by_trip(trip_id, Some(BookingStatus::Pending))
            .await?;

        tx.commit().await?;

        Ok(bookings)
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let trip_id = self.trip_id_of_booking(id).await?;

        let mut tx = self.store.begin().await?;

        let trip = fetch_trip_for_update(&mut tx, trip_id).await?;
        let mut booking = fetch_booking_for_update(&mut tx, id).await?;

        self.authorize(user, "manage", trip.clone())?;

        trip.ensure_bookable()?;
        booking.confirm()?;

        tx.update_booking_status(&booking).await?;
        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, "booking confirmed");

        Ok(booking)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_booking(&self, user: User, id: Uuid) -> Result<Booking, Error> {
        let trip_id = self.trip_id_of_booking(id).await?;

        let mut tx = self.store.begin().await?;

        let trip = fetch_trip_for_update(&mut tx, trip_id).await?;
        let mut booking = fetch_booking_for_update(&mut tx, id).await?;

        self.authorize_booking(&user, "cancel", &booking, &trip)?;

        trip.ensure_bookable()?;
        booking.cancel()?;

        tx.update_booking_status(&booking).await?;

        if !tx.increment_seat(trip.id).await? {
            tracing::error!(
                "trip {} is already at full capacity while cancelling booking {}",
                trip.id,
                booking.id
            );
            return Err(unexpected_error());
        }

        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, "booking cancelled");

        Ok(booking)
    }
}
