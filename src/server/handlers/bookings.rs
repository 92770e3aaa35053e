use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{BookingAPI, DynAPI};
use crate::auth::User;
use crate::entities::Booking;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    trip_id: Uuid,
    /// Defaults to the caller.
    passenger_id: Option<Uuid>,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CreateParams>,
) -> Result<Json<Booking>, Error> {
    let passenger_id = params.passenger_id.unwrap_or(user.id);
    let booking = api
        .create_booking(user, params.trip_id, passenger_id)
        .await?;

    Ok(booking.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.find_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn find_pending(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, Error> {
    let bookings = api.find_pending_bookings(user, trip_id).await?;

    Ok(bookings.into())
}

pub async fn confirm(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.confirm_booking(user, id).await?;

    Ok(booking.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = api.cancel_booking(user, id).await?;

    Ok(booking.into())
}
