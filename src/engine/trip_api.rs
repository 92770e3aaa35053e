use super::helpers::{fetch_trip_for_update, find_member};
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::TripAPI,
    auth::User,
    db::{Store, StoreTx},
    entities::{NewTrip, Trip, TripStatus},
    error::{
        forbidden_error, invalid_input_error, not_found_error, trip_not_bookable_error, Error,
    },
};

#[async_trait]
impl<S: Store> TripAPI for Engine<S> {
    #[tracing::instrument(skip(self))]
    async fn create_trip(&self, user: User, params: NewTrip) -> Result<Trip, Error> {
        let mut tx = self.store.begin().await?;

        let driver = find_member(&mut tx, user.id).await?;
        let car = tx
            .find_car(params.car_id)
            .await?
            .ok_or_else(not_found_error)?;

        if !car.is_owned_by(driver.id) {
            tracing::info!("car {} does not belong to {}", car.id, driver.id);
            return Err(forbidden_error());
        }

        if params.seats > car.seats {
            return Err(invalid_input_error());
        }

        let trip = Trip::new(driver.id, params)?;

        tx.insert_trip(&trip).await?;
        tx.commit().await?;

        tracing::info!(trip_id = %trip.id, "trip created");

        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn find_trip(&self, user: User, id: Uuid) -> Result<Trip, Error> {
        let trip = self
            .store
            .find_trip(id)
            .await?
            .ok_or_else(not_found_error)?;

        self.authorize(user, "read", trip.clone())?;

        Ok(trip)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_trip(&self, user: User, id: Uuid) -> Result<Trip, Error> {
        let mut tx = self.store.begin().await?;

        let mut trip = fetch_trip_for_update(&mut tx, id).await?;

        self.authorize(user, "manage", trip.clone())?;

        // the worker may have moved the trip on since it was read
        if !tx.cancel_trip_if_scheduled(trip.id).await? {
            tracing::info!("trip {} is {}, not cancelling", trip.id, trip.status.name());
            return Err(trip_not_bookable_error());
        }

        let cancelled = tx.cancel_active_bookings(trip.id).await?;
        tx.commit().await?;

        tracing::info!(trip_id = %trip.id, bookings = cancelled, "trip cancelled");

        trip.status = TripStatus::Cancelled;
        trip.available_seats = trip.total_seats;

        Ok(trip)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::api::TripAPI;
    use crate::db::Store;
    use crate::engine::testing::Fixture;
    use crate::entities::{BookingStatus, Car, TripStatus};
    use crate::error::Kind;

    #[tokio::test]
    async fn driver_creates_trip_with_own_car() {
        let f = Fixture::new().await;

        let trip = f.scheduled_trip(3).await;

        assert_eq!(trip.driver_id, f.driver.id);
        assert_eq!(trip.status, TripStatus::Scheduled);
        assert_eq!(trip.available_seats, 3);
        assert_eq!(f.trip(trip.id).await.total_seats, 3);
    }

    #[tokio::test]
    async fn trip_needs_an_owned_car_with_enough_seats() {
        let f = Fixture::new().await;
        let start = Utc::now() + Duration::hours(2);

        let err = f
            .engine
            .create_trip(f.driver.clone(), f.new_trip(start, 5))
            .await
            .unwrap_err();
        assert!(err.is(Kind::InvalidInput));

        let stranger = f.passenger().await;
        let err = f
            .engine
            .create_trip(stranger.clone(), f.new_trip(start, 2))
            .await
            .unwrap_err();
        assert!(err.is(Kind::Forbidden));

        let mut params = f.new_trip(start, 2);
        params.car_id = Car::new(f.driver.id, "Kia".into(), "Rio".into(), 4).id;
        let err = f
            .engine
            .create_trip(f.driver.clone(), params)
            .await
            .unwrap_err();
        assert!(err.is(Kind::NotFound));
    }

    #[tokio::test]
    async fn trip_window_must_stay_within_bounds() {
        let f = Fixture::new().await;

        let mut params = f.new_trip(Utc::now() + Duration::hours(1), 2);
        params.duration_min = i32::MAX;
        let err = f
            .engine
            .create_trip(f.driver.clone(), params)
            .await
            .unwrap_err();
        assert!(err.is(Kind::InvalidInput));

        let params = f.new_trip(Utc::now() + Duration::days(100 * 365), 2);
        let err = f
            .engine
            .create_trip(f.driver.clone(), params)
            .await
            .unwrap_err();
        assert!(err.is(Kind::InvalidInput));
    }

    #[tokio::test]
    async fn unknown_member_cannot_create_trip() {
        let f = Fixture::new().await;
        let ghost = crate::auth::User::new(uuid::Uuid::new_v4());

        let err = f
            .engine
            .create_trip(ghost, f.new_trip(Utc::now(), 2))
            .await
            .unwrap_err();

        assert!(err.is(Kind::NotFound));
    }

    #[tokio::test]
    async fn anyone_can_read_a_trip() {
        let f = Fixture::new().await;
        let trip = f.scheduled_trip(2).await;
        let passenger = f.passenger().await;

        let found = f.engine.find_trip(passenger, trip.id).await.unwrap();
        assert_eq!(found.id, trip.id);

        let err = f
            .engine
            .find_trip(f.driver.clone(), uuid::Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.is(Kind::NotFound));
    }

    #[tokio::test]
    async fn cancelling_a_trip_releases_every_booking() {
        let f = Fixture::new().await;
        let trip = f.scheduled_trip(3).await;

        let first = f.passenger().await;
        let second = f.passenger().await;
        let pending = f.book(&trip, &first).await;
        let confirmed = f.book_confirmed(&trip, &second).await;

        let err = f
            .engine
            .cancel_trip(first.clone(), trip.id)
            .await
            .unwrap_err();
        assert!(err.is(Kind::Forbidden));

        let cancelled = f
            .engine
            .cancel_trip(f.driver.clone(), trip.id)
            .await
            .unwrap();
        assert_eq!(cancelled.status, TripStatus::Cancelled);
        assert_eq!(cancelled.available_seats, 3);

        for id in [pending.id, confirmed.id] {
            let booking = f.store.find_booking(id).await.unwrap().unwrap();
            assert_eq!(booking.status, BookingStatus::Cancelled);
        }

        let stored = f.trip(trip.id).await;
        assert_eq!(stored.status, TripStatus::Cancelled);
        assert_eq!(stored.available_seats, stored.total_seats);

        // the lifecycle never resurrects a cancelled trip
        f.complete_trips().await;
        assert_eq!(f.trip(trip.id).await.status, TripStatus::Cancelled);

        let err = f
            .engine
            .cancel_trip(f.driver.clone(), trip.id)
            .await
            .unwrap_err();
        assert!(err.is(Kind::TripNotBookable));
    }

    #[tokio::test]
    async fn trip_that_departed_cannot_be_cancelled() {
        let f = Fixture::new().await;
        let trip = f.scheduled_trip(2).await;

        f.store
            .advance_statuses_due_by(trip.start_time)
            .await
            .unwrap();
        assert_eq!(f.trip(trip.id).await.status, TripStatus::InProgress);

        let err = f
            .engine
            .cancel_trip(f.driver.clone(), trip.id)
            .await
            .unwrap_err();
        assert!(err.is(Kind::TripNotBookable));
    }
}
