use oso::{Oso, PolarClass};

use crate::auth::User;
use crate::entities::{Booking, Trip};
use crate::error::Error;

pub fn new() -> Result<Oso, Error> {
    let mut o = Oso::new();

    o.register_class(User::get_polar_class())?;
    o.register_class(Trip::get_polar_class())?;
    o.register_class(Booking::get_polar_class())?;

    o.load_str(include_str!("rules.polar"))?;

    Ok(o)
}

#[cfg(test)]
fn trip_for(driver_id: uuid::Uuid) -> Trip {
    use crate::entities::NewTrip;
    use chrono::Utc;
    use uuid::Uuid;

    Trip::new(
        driver_id,
        NewTrip {
            car_id: Uuid::new_v4(),
            origin: "Argun".into(),
            destination: "Shali".into(),
            start_time: Utc::now(),
            duration_min: 30,
            seats: 3,
            price: 200,
        },
    )
    .unwrap()
}

#[test]
fn system_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let system = User::new_system_user();
    let trip = trip_for(Uuid::new_v4());
    let booking = Booking::new(trip.id, Uuid::new_v4());

    let result = authorizor.is_allowed(system.clone(), "manage", trip.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(system.clone(), "cancel", booking.clone());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn trip_driver_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let driver = User::new(Uuid::new_v4());
    let stranger = User::new(Uuid::new_v4());
    let trip = trip_for(driver.id);

    let result = authorizor.is_allowed(driver.clone(), "manage", trip.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(stranger.clone(), "manage", trip.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "read", trip.clone());
    assert_eq!(result.unwrap(), true);
}

#[test]
fn booking_passenger_role_test() {
    use uuid::Uuid;

    let authorizor = new().unwrap();

    let passenger = User::new(Uuid::new_v4());
    let stranger = User::new(Uuid::new_v4());
    let booking = Booking::new(Uuid::new_v4(), passenger.id);

    let result = authorizor.is_allowed(passenger.clone(), "read", booking.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "cancel", booking.clone());
    assert_eq!(result.unwrap(), true);

    let result = authorizor.is_allowed(passenger.clone(), "confirm", booking.clone());
    assert_eq!(result.unwrap(), false);

    let result = authorizor.is_allowed(stranger.clone(), "cancel", booking.clone());
    assert_eq!(result.unwrap(), false);
}
