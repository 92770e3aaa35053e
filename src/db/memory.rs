use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::entities::{Booking, BookingStatus, Car, Member, Review, Trip, TripStatus};
use crate::error::{storage_unavailable_error, unexpected_error, Error};

#[derive(Clone, Debug, Default)]
struct Tables {
    members: HashMap<Uuid, Member>,
    cars: HashMap<Uuid, Car>,
    trips: HashMap<Uuid, Trip>,
    bookings: HashMap<Uuid, Booking>,
    reviews: HashMap<Uuid, Review>,
}

/// In-process store with serializable transactions: a transaction owns the
/// table lock and works on a staged copy that replaces the tables on commit.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
    failing: Faults,
}

/// Transaction operations, by name, that fail once reached.
type Faults = Arc<RwLock<HashSet<&'static str>>>;

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    failing: Faults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as if the database went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the named transaction operation fail with `StorageUnavailable`
    /// after the operations before it have already written to the staged copy.
    pub fn fail_on(&self, operation: &'static str) -> Result<(), Error> {
        self.failing
            .write()
            .map_err(|_| unexpected_error())?
            .insert(operation);
        Ok(())
    }

    pub fn clear_faults(&self) -> Result<(), Error> {
        self.failing.write().map_err(|_| unexpected_error())?.clear();
        Ok(())
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(storage_unavailable_error());
        }

        Ok(())
    }

    pub async fn insert_member(&self, member: &Member) -> Result<(), Error> {
        self.check_available()?;
        self.tables.lock().await.members.insert(member.id, member.clone());
        Ok(())
    }

    pub async fn insert_car(&self, car: &Car) -> Result<(), Error> {
        self.check_available()?;
        self.tables.lock().await.cars.insert(car.id, car.clone());
        Ok(())
    }

    /// Writes a trip row as is, bypassing every check.
    pub async fn put_trip(&self, trip: Trip) -> Result<(), Error> {
        self.check_available()?;
        self.tables.lock().await.trips.insert(trip.id, trip);
        Ok(())
    }

    pub async fn reviews_for_trip(&self, trip_id: Uuid) -> Vec<Review> {
        let tables = self.tables.lock().await;

        tables
            .reviews
            .values()
            .filter(|r| r.trip_id == trip_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, Error> {
        self.check_available()?;

        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(MemoryTx {
            guard,
            staged,
            failing: self.failing.clone(),
        })
    }

    async fn find_trip(&self, id: Uuid) -> Result<Option<Trip>, Error> {
        self.check_available()?;
        Ok(self.tables.lock().await.trips.get(&id).cloned())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, Error> {
        self.check_available()?;
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn advance_statuses_due_by(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        self.check_available()?;

        let mut tables = self.tables.lock().await;
        let mut advanced = 0;

        for trip in tables.trips.values_mut() {
            let due = trip.status.due_at(trip.start_time, trip.duration_min, now);

            if due != trip.status {
                trip.status = due;
                advanced += 1;
            }
        }

        Ok(advanced)
    }
}

impl MemoryTx {
    fn check_fault(&self, operation: &'static str) -> Result<(), Error> {
        if self
            .failing
            .read()
            .map_err(|_| unexpected_error())?
            .contains(operation)
        {
            tracing::warn!("injected failure in {}", operation);
            return Err(storage_unavailable_error());
        }

        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_member(&mut self, id: Uuid) -> Result<Option<Member>, Error> {
        Ok(self.staged.members.get(&id).cloned())
    }

    async fn find_car(&mut self, id: Uuid) -> Result<Option<Car>, Error> {
        Ok(self.staged.cars.get(&id).cloned())
    }

    async fn insert_trip(&mut self, trip: &Trip) -> Result<(), Error> {
        self.check_fault("insert_trip")?;

        self.staged.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn find_trip(&mut self, id: Uuid) -> Result<Option<Trip>, Error> {
        Ok(self.staged.trips.get(&id).cloned())
    }

    async fn fetch_trip_for_update(&mut self, id: Uuid) -> Result<Option<Trip>, Error> {
        // the transaction already holds the whole table lock
        self.find_trip(id).await
    }

    async fn decrement_seat_if_available(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        self.check_fault("decrement_seat_if_available")?;

        match self.staged.trips.get_mut(&trip_id) {
            Some(trip) if trip.status == TripStatus::Scheduled && trip.available_seats > 0 => {
                trip.available_seats -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_seat(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        self.check_fault("increment_seat")?;

        match self.staged.trips.get_mut(&trip_id) {
            Some(trip) if trip.available_seats < trip.total_seats => {
                trip.available_seats += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_average_rating(&mut self, trip_id: Uuid, value: f64) -> Result<(), Error> {
        self.check_fault("update_average_rating")?;

        if let Some(trip) = self.staged.trips.get_mut(&trip_id) {
            trip.avg_rating = value;
        }

        Ok(())
    }

    async fn cancel_trip_if_scheduled(&mut self, trip_id: Uuid) -> Result<bool, Error> {
        self.check_fault("cancel_trip_if_scheduled")?;

        match self.staged.trips.get_mut(&trip_id) {
            Some(trip) if trip.status == TripStatus::Scheduled => {
                trip.status = TripStatus::Cancelled;
                trip.available_seats = trip.total_seats;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), Error> {
        self.check_fault("insert_booking")?;

        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn fetch_booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, Error> {
        Ok(self.staged.bookings.get(&id).cloned())
    }

    async fn update_booking_status(&mut self, booking: &Booking) -> Result<(), Error> {
        self.check_fault("update_booking_status")?;

        if let Some(stored) = self.staged.bookings.get_mut(&booking.id) {
            stored.status = booking.status;
        }

        Ok(())
    }

    async fn find_bookings_by_trip(
        &mut self,
        trip_id: Uuid,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>, Error> {
        let mut bookings: Vec<Booking> = self
            .staged
            .bookings
            .values()
            .filter(|b| b.trip_id == trip_id)
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();

        bookings.sort_by_key(|b| b.created_at);

        Ok(bookings)
    }

    async fn has_confirmed_booking(
        &mut self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> Result<bool, Error> {
        Ok(self.staged.bookings.values().any(|b| {
            b.trip_id == trip_id
                && b.passenger_id == passenger_id
                && b.status == BookingStatus::Confirmed
        }))
    }

    async fn cancel_active_bookings(&mut self, trip_id: Uuid) -> Result<u64, Error> {
        self.check_fault("cancel_active_bookings")?;

        let mut cancelled = 0;

        for booking in self.staged.bookings.values_mut() {
            if booking.trip_id == trip_id && booking.status.holds_seat() {
                booking.status = BookingStatus::Cancelled;
                cancelled += 1;
            }
        }

        Ok(cancelled)
    }

    async fn insert_review(&mut self, review: &Review) -> Result<bool, Error> {
        self.check_fault("insert_review")?;

        if self.review_exists(review.trip_id, review.author_id).await? {
            return Ok(false);
        }

        self.staged.reviews.insert(review.id, review.clone());
        Ok(true)
    }

    async fn review_exists(&mut self, trip_id: Uuid, author_id: Uuid) -> Result<bool, Error> {
        Ok(self
            .staged
            .reviews
            .values()
            .any(|r| r.trip_id == trip_id && r.author_id == author_id))
    }

    async fn average_rating_by_trip(&mut self, trip_id: Uuid) -> Result<Option<f64>, Error> {
        self.check_fault("average_rating_by_trip")?;

        let ratings: Vec<i16> = self
            .staged
            .reviews
            .values()
            .filter(|r| r.trip_id == trip_id)
            .map(|r| r.rating)
            .collect();

        Ok(crate::entities::mean_rating(&ratings))
    }

    async fn commit(mut self) -> Result<(), Error> {
        self.check_fault("commit")?;

        *self.guard = self.staged;
        Ok(())
    }
}
