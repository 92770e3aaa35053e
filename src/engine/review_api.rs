use super::helpers::fetch_trip_for_update;
use super::Engine;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::ReviewAPI,
    auth::User,
    db::{Store, StoreTx},
    entities::Review,
    error::{
        review_already_present_error, trip_not_completed_error, unexpected_error,
        user_not_passenger_error, Error,
    },
};

#[async_trait]
impl<S: Store> ReviewAPI for Engine<S> {
    /// Admission checks, the insert and the rating recompute all run under the
    /// trip row lock, so concurrent reviews of one trip are applied one at a
    /// time and each average sees every committed rating.
    #[tracing::instrument(skip(self, text))]
    async fn create_review(
        &self,
        user: User,
        trip_id: Uuid,
        text: String,
        rating: i16,
    ) -> Result<Review, Error> {
        let review = Review::new(user.id, trip_id, text, rating)?;

        let mut tx = self.store.begin().await?;

        let trip = fetch_trip_for_update(&mut tx, trip_id).await?;

        if !trip.is_completed() {
            tracing::info!("trip {} is {}, not accepting reviews", trip.id, trip.status.name());
            return Err(trip_not_completed_error());
        }

        if !tx.has_confirmed_booking(trip.id, user.id).await? {
            tracing::info!("{} was not a passenger on trip {}", user.id, trip.id);
            return Err(user_not_passenger_error());
        }

        if tx.review_exists(trip.id, user.id).await? {
            return Err(review_already_present_error());
        }

        if !tx.insert_review(&review).await? {
            return Err(review_already_present_error());
        }

        let avg_rating = tx
            .average_rating_by_trip(trip.id)
            .await?
            .ok_or_else(unexpected_error)?;

        tx.update_average_rating(trip.id, avg_rating).await?;
        tx.commit().await?;

        tracing::info!(review_id = %review.id, trip_id = %trip.id, avg_rating, "review recorded");

        Ok(review)
    }
}
