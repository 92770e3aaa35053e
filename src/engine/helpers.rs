use uuid::Uuid;

use crate::{
    db::StoreTx,
    entities::{Booking, Member, Trip},
    error::{not_found_error, Error},
};

#[tracing::instrument(skip(tx))]
pub async fn fetch_trip_for_update<T: StoreTx>(tx: &mut T, id: Uuid) -> Result<Trip, Error> {
    tx.fetch_trip_for_update(id)
        .await?
        .ok_or_else(not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_booking_for_update<T: StoreTx>(
    tx: &mut T,
    id: Uuid,
) -> Result<Booking, Error> {
    tx.fetch_booking_for_update(id)
        .await?
        .ok_or_else(not_found_error)
}

#[tracing::instrument(skip(tx))]
pub async fn find_member<T: StoreTx>(tx: &mut T, id: Uuid) -> Result<Member, Error> {
    tx.find_member(id).await?.ok_or_else(not_found_error)
}
