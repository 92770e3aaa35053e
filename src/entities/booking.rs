use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, invalid_transition_error, Error};

#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Booking {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub trip_id: Uuid,
    #[polar(attribute)]
    pub passenger_id: Uuid,
    pub status: Status,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Confirmed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(invalid_input_error()),
        }
    }

    /// Pending and confirmed bookings hold a seat.
    pub fn holds_seat(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl Booking {
    pub fn new(trip_id: Uuid, passenger_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            status: Status::Pending,
            created_at: Utc::now(),
        }
    }

    #[tracing::instrument]
    pub fn confirm(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Confirmed;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// A cancelled booking releases its seat; the caller returns it to the
    /// trip inventory in the same transaction.
    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending | Status::Confirmed => {
                self.status = Status::Cancelled;
                Ok(())
            }
            Status::Cancelled => Err(invalid_transition_error()),
        }
    }
}
