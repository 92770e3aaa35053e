mod booking_api;
mod helpers;
mod review_api;
mod trip_api;

use std::sync::Arc;

use oso::Oso;

use crate::{
    api::API,
    auth::{authorizor, User},
    db::Store,
    entities::{Booking, Trip},
    error::{forbidden_error, Error, Kind},
};

pub struct Engine<S: Store> {
    store: Arc<S>,
    authorizor: Oso,
}

impl<S: Store> Engine<S> {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub fn new(store: Arc<S>) -> Result<Self, Error> {
        Ok(Self {
            store,
            authorizor: authorizor::new()?,
        })
    }
}

impl<S: Store> Engine<S> {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(forbidden_error())
    }

    /// A booking is reachable by its passenger and by whoever manages the trip.
    fn authorize_booking(
        &self,
        user: &User,
        action: &str,
        booking: &Booking,
        trip: &Trip,
    ) -> Result<(), Error> {
        match self.authorize(user.clone(), action.to_string(), booking.clone()) {
            Err(err) if err.is(Kind::Forbidden) => {
                self.authorize(user.clone(), "manage", trip.clone())
            }
            result => result,
        }
    }
}

impl<S: Store> API for Engine<S> {}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use oso::{Oso, PolarClass};
    use uuid::Uuid;

    use super::Engine;
    use crate::auth::User;
    use crate::db::MemoryStore;
    use crate::entities::{Booking, NewTrip, Trip};
    use crate::error::Kind;

    fn engine_with_policy(policy: &str) -> Engine<MemoryStore> {
        let mut authorizor = Oso::new();
        authorizor.register_class(User::get_polar_class()).unwrap();
        authorizor.register_class(Trip::get_polar_class()).unwrap();
        authorizor.register_class(Booking::get_polar_class()).unwrap();
        authorizor.load_str(policy).unwrap();

        Engine {
            store: Arc::new(MemoryStore::new()),
            authorizor,
        }
    }

    fn trip_and_booking() -> (Trip, Booking) {
        let trip = Trip::new(
            Uuid::new_v4(),
            NewTrip {
                car_id: Uuid::new_v4(),
                origin: "Urus-Martan".into(),
                destination: "Achkhoy-Martan".into(),
                start_time: Utc::now(),
                duration_min: 20,
                seats: 2,
                price: 150,
            },
        )
        .unwrap();
        let booking = Booking::new(trip.id, Uuid::new_v4());

        (trip, booking)
    }

    #[test]
    fn denied_booking_action_falls_back_to_trip_management() {
        let engine = engine_with_policy(r#"allow(_user: User, "manage", _trip: Trip);"#);
        let (trip, booking) = trip_and_booking();
        let user = User::new(Uuid::new_v4());

        assert!(engine
            .authorize_booking(&user, "cancel", &booking, &trip)
            .is_ok());
    }

    #[test]
    fn policy_failure_is_not_a_denial() {
        let engine = engine_with_policy(
            r#"
            allow(user: User, "cancel", booking: Booking) if
                user.id = booking.no_such_attribute;

            allow(_user: User, "manage", _trip: Trip);
            "#,
        );
        let (trip, booking) = trip_and_booking();
        let user = User::new(Uuid::new_v4());

        let err = engine
            .authorize_booking(&user, "cancel", &booking, &trip)
            .unwrap_err();
        assert!(err.is(Kind::Unexpected));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use super::Engine;
    use crate::api::{BookingAPI, TripAPI};
    use crate::auth::User;
    use crate::db::{MemoryStore, Store};
    use crate::entities::{Booking, Car, Member, NewTrip, Trip};

    pub struct Fixture {
        pub engine: Arc<Engine<MemoryStore>>,
        pub store: MemoryStore,
        pub driver: User,
        pub car: Car,
    }

    impl Fixture {
        pub async fn new() -> Self {
            let store = MemoryStore::new();
            let engine = Arc::new(Engine::new(Arc::new(store.clone())).unwrap());

            let member = Member::new("Aslan".into(), "+7 928 000 00 01".into());
            let car = Car::new(member.id, "Lada".into(), "Vesta".into(), 4);
            store.insert_member(&member).await.unwrap();
            store.insert_car(&car).await.unwrap();

            Self {
                engine,
                store,
                driver: User::new(member.id),
                car,
            }
        }

        pub async fn passenger(&self) -> User {
            let member = Member::new("Madina".into(), "+7 928 000 00 02".into());
            self.store.insert_member(&member).await.unwrap();

            User::new(member.id)
        }

        pub fn new_trip(&self, start_time: DateTime<Utc>, seats: i32) -> NewTrip {
            NewTrip {
                car_id: self.car.id,
                origin: "Grozny".into(),
                destination: "Nalchik".into(),
                start_time,
                duration_min: 90,
                seats,
                price: 800,
            }
        }

        /// A trip leaving in an hour.
        pub async fn scheduled_trip(&self, seats: i32) -> Trip {
            let params = self.new_trip(Utc::now() + Duration::hours(1), seats);

            self.engine
                .create_trip(self.driver.clone(), params)
                .await
                .unwrap()
        }

        pub async fn book(&self, trip: &Trip, passenger: &User) -> Booking {
            self.engine
                .create_booking(passenger.clone(), trip.id, passenger.id)
                .await
                .unwrap()
        }

        pub async fn book_confirmed(&self, trip: &Trip, passenger: &User) -> Booking {
            let booking = self.book(trip, passenger).await;

            self.engine
                .confirm_booking(self.driver.clone(), booking.id)
                .await
                .unwrap()
        }

        /// Runs the lifecycle past the end of every trip created so far.
        pub async fn complete_trips(&self) {
            self.store
                .advance_statuses_due_by(Utc::now() + Duration::days(1))
                .await
                .unwrap();
        }

        pub async fn trip(&self, id: uuid::Uuid) -> Trip {
            self.store.find_trip(id).await.unwrap().unwrap()
        }
    }
}
