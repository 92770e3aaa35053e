use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub author_id: Uuid,
    pub trip_id: Uuid,
    pub text: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(author_id: Uuid, trip_id: Uuid, text: String, rating: i16) -> Result<Self, Error> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) || text.trim().is_empty() {
            return Err(invalid_input_error());
        }

        Ok(Self {
            id: Uuid::new_v4(),
            author_id,
            trip_id,
            text,
            rating,
            created_at: Utc::now(),
        })
    }
}

/// Arithmetic mean of a set of ratings, or `None` when there are none.
pub fn mean_rating(ratings: &[i16]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }

    let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
    Some(sum as f64 / ratings.len() as f64)
}

#[test]
fn review_rating_bounds() {
    let (author, trip) = (Uuid::new_v4(), Uuid::new_v4());

    assert!(Review::new(author, trip, "fine".into(), 0).is_err());
    assert!(Review::new(author, trip, "fine".into(), 6).is_err());
    assert!(Review::new(author, trip, "".into(), 3).is_err());

    let review = Review::new(author, trip, "smooth ride".into(), 5).unwrap();
    assert_eq!(review.rating, 5);
}

#[test]
fn mean_rating_matches_running_average() {
    assert_eq!(mean_rating(&[]), None);

    let ratings = [5, 4, 4, 1, 3];
    let mut running = 0.0;
    for (i, &r) in ratings.iter().enumerate() {
        running += (f64::from(r) - running) / (i + 1) as f64;
    }

    let mean = mean_rating(&ratings).unwrap();
    assert!((mean - running).abs() < 1e-9);
    assert!((mean - 3.4).abs() < 1e-9);
}
