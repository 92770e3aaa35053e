use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, ReviewAPI};
use crate::auth::User;
use crate::entities::Review;
use crate::error::Error;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    text: String,
    rating: i16,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(trip_id): Path<Uuid>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Review>, Error> {
    let review = api
        .create_review(user, trip_id, params.text, params.rating)
        .await?;

    Ok(review.into())
}
