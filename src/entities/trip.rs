use chrono::{DateTime, Duration, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, trip_not_bookable_error, Error};

/// A trip lasts at most a week.
pub const MAX_DURATION_MIN: i32 = 7 * 24 * 60;

/// Trips can be published at most this many days ahead.
pub const MAX_DAYS_AHEAD: i64 = 366;

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Trip {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub car_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub duration_min: i32,
    pub total_seats: i32,
    pub available_seats: i32,
    pub price: i64,
    pub status: Status,
    pub avg_rating: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(invalid_input_error()),
        }
    }

    /// Status the trip should be in at `now`, given its time window. Only the
    /// scheduled and in-progress states move; a trip whose whole window has
    /// elapsed goes straight to completed. A window that ends past the
    /// representable range never completes.
    pub fn due_at(
        &self,
        start_time: DateTime<Utc>,
        duration_min: i32,
        now: DateTime<Utc>,
    ) -> Self {
        let ends_at = start_time.checked_add_signed(Duration::minutes(duration_min.into()));
        let ended = ends_at.map_or(false, |ends_at| ends_at <= now);

        match self {
            Self::Scheduled | Self::InProgress if ended => Self::Completed,
            Self::Scheduled if start_time <= now => Self::InProgress,
            status => *status,
        }
    }
}

/// Input for a new trip. The driver is the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTrip {
    pub car_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub start_time: DateTime<Utc>,
    pub duration_min: i32,
    pub seats: i32,
    pub price: i64,
}

impl Trip {
    pub fn new(driver_id: Uuid, params: NewTrip) -> Result<Self, Error> {
        if params.origin.trim().is_empty()
            || params.destination.trim().is_empty()
            || !(0..=MAX_DURATION_MIN).contains(&params.duration_min)
            || params.start_time > Utc::now() + Duration::days(MAX_DAYS_AHEAD)
            || params.seats < 1
            || params.price < 0
        {
            return Err(invalid_input_error());
        }

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            car_id: params.car_id,
            origin: params.origin,
            destination: params.destination,
            start_time: params.start_time,
            duration_min: params.duration_min,
            total_seats: params.seats,
            available_seats: params.seats,
            price: params.price,
            status: Status::Scheduled,
            avg_rating: 0.0,
        })
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == Status::Scheduled
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Bookings can only be opened, confirmed or released before departure.
    pub fn ensure_bookable(&self) -> Result<(), Error> {
        if !self.is_scheduled() {
            return Err(trip_not_bookable_error());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_trip(start_time: DateTime<Utc>, duration_min: i32) -> NewTrip {
        NewTrip {
            car_id: Uuid::new_v4(),
            origin: "Grozny".into(),
            destination: "Makhachkala".into(),
            start_time,
            duration_min,
            seats: 3,
            price: 1500,
        }
    }

    #[test]
    fn new_trip_starts_scheduled_with_all_seats_free() {
        let trip = Trip::new(Uuid::new_v4(), new_trip(Utc::now(), 120)).unwrap();

        assert_eq!(trip.status, Status::Scheduled);
        assert_eq!(trip.available_seats, trip.total_seats);
        assert_eq!(trip.avg_rating, 0.0);
    }

    #[test]
    fn new_trip_rejects_invalid_input() {
        let mut params = new_trip(Utc::now(), 60);
        params.seats = 0;
        assert!(Trip::new(Uuid::new_v4(), params).is_err());

        let mut params = new_trip(Utc::now(), 60);
        params.origin = "  ".into();
        assert!(Trip::new(Uuid::new_v4(), params).is_err());

        assert!(Trip::new(Uuid::new_v4(), new_trip(Utc::now(), -1)).is_err());
    }

    #[test]
    fn new_trip_bounds_its_time_window() {
        let now = Utc::now();

        assert!(Trip::new(Uuid::new_v4(), new_trip(now, MAX_DURATION_MIN)).is_ok());
        assert!(Trip::new(Uuid::new_v4(), new_trip(now, MAX_DURATION_MIN + 1)).is_err());
        assert!(Trip::new(Uuid::new_v4(), new_trip(now, i32::MAX)).is_err());

        let far = now + Duration::days(MAX_DAYS_AHEAD + 1);
        assert!(Trip::new(Uuid::new_v4(), new_trip(far, 60)).is_err());
    }

    #[test]
    fn window_past_the_calendar_is_never_due() {
        let start_time = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);

        assert_eq!(
            Status::Scheduled.due_at(start_time, i32::MAX, Utc::now()),
            Status::Scheduled
        );
        assert_eq!(
            Status::InProgress.due_at(start_time, i32::MAX, DateTime::<Utc>::MAX_UTC),
            Status::InProgress
        );
    }

    #[test]
    fn status_names_round_trip() {
        for status in [
            Status::Scheduled,
            Status::InProgress,
            Status::Completed,
            Status::Cancelled,
        ] {
            assert_eq!(Status::from_name(status.name()).unwrap(), status);
        }

        assert!(Status::from_name("SCHEDULED").is_err());
    }

    #[test]
    fn due_status_follows_the_time_window() {
        let now = Utc::now();

        let future = now + Duration::minutes(5);
        assert_eq!(
            Status::Scheduled.due_at(future, 30, now),
            Status::Scheduled
        );

        let started = now - Duration::minutes(5);
        assert_eq!(
            Status::Scheduled.due_at(started, 30, now),
            Status::InProgress
        );
        assert_eq!(
            Status::InProgress.due_at(started, 30, now),
            Status::InProgress
        );

        let finished = now - Duration::minutes(45);
        assert_eq!(
            Status::InProgress.due_at(finished, 30, now),
            Status::Completed
        );
    }

    #[test]
    fn elapsed_window_skips_in_progress() {
        let now = Utc::now();
        let start_time = now - Duration::seconds(1);

        assert_eq!(
            Status::Scheduled.due_at(start_time, 0, now),
            Status::Completed
        );
    }

    #[test]
    fn terminal_states_never_move() {
        let long_ago = Utc::now() - Duration::days(1);

        assert_eq!(
            Status::Completed.due_at(long_ago, 10, Utc::now()),
            Status::Completed
        );
        assert_eq!(
            Status::Cancelled.due_at(long_ago, 10, Utc::now()),
            Status::Cancelled
        );
    }

    #[test]
    fn only_scheduled_trips_are_bookable() {
        let mut trip = Trip::new(Uuid::new_v4(), new_trip(Utc::now(), 60)).unwrap();
        assert!(trip.ensure_bookable().is_ok());

        trip.status = Status::InProgress;
        assert!(trip.ensure_bookable().is_err());
    }
}
