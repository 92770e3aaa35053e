use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::{self, Debug};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Unexpected,
    Configuration,
    StorageUnavailable,
    InvalidInput,
    InvalidTransition,
    Unauthorized,
    Forbidden,
    NotFound,
    TripNotBookable,
    NoAvailableSeats,
    TripNotCompleted,
    UserNotPassenger,
    ReviewAlreadyPresent,
}

impl Kind {
    /// Codes below 100 are internal failures, the rest are caused by the caller.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unexpected => 1,
            Self::Configuration => 2,
            Self::StorageUnavailable => 3,
            Self::InvalidInput => 100,
            Self::InvalidTransition => 101,
            Self::Unauthorized => 102,
            Self::NotFound => 103,
            Self::TripNotBookable => 104,
            Self::NoAvailableSeats => 105,
            Self::TripNotCompleted => 106,
            Self::UserNotPassenger => 107,
            Self::ReviewAlreadyPresent => 108,
            Self::Forbidden => 109,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unexpected | Self::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden | Self::UserNotPassenger => StatusCode::FORBIDDEN,
            Self::TripNotCompleted | Self::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TripNotBookable | Self::NoAvailableSeats | Self::ReviewAlreadyPresent => {
                StatusCode::CONFLICT
            }
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: Kind,
    pub message: String,
}

impl Error {
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn is(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    pub fn is_internal(&self) -> bool {
        self.code() < 100
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code())
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<oso::OsoError> for Error {
    fn from(err: oso::OsoError) -> Self {
        tracing::error!("authorization engine failure: {}", err);
        unexpected_error()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let error_message = if self.is_internal() {
            tracing::error!("internal error: {}", self);
            "Internal Server Error"
        } else {
            self.message.as_str()
        };

        let body = Json(json!({
            "code": self.code(),
            "error": error_message,
        }));

        (self.kind.status(), body).into_response()
    }
}

fn error(kind: Kind, message: impl Into<String>) -> Error {
    Error {
        kind,
        message: message.into(),
    }
}

pub fn invalid_input_error() -> Error {
    error(Kind::InvalidInput, "invalid input")
}

pub fn invalid_transition_error() -> Error {
    error(Kind::InvalidTransition, "invalid status transition")
}

pub fn unauthorized_error() -> Error {
    error(Kind::Unauthorized, "unauthorized")
}

/// The caller is known but the policy does not allow the action.
pub fn forbidden_error() -> Error {
    error(Kind::Forbidden, "forbidden")
}

pub fn not_found_error() -> Error {
    error(Kind::NotFound, "resource not found")
}

pub fn trip_not_bookable_error() -> Error {
    error(Kind::TripNotBookable, "trip is not open for bookings")
}

pub fn no_available_seats_error() -> Error {
    error(Kind::NoAvailableSeats, "no available seats")
}

pub fn trip_not_completed_error() -> Error {
    error(Kind::TripNotCompleted, "trip not completed")
}

pub fn user_not_passenger_error() -> Error {
    error(Kind::UserNotPassenger, "user is not a passenger in this trip")
}

pub fn review_already_present_error() -> Error {
    error(
        Kind::ReviewAlreadyPresent,
        "review already exists for this user and trip",
    )
}

pub fn config_error(message: impl Into<String>) -> Error {
    error(Kind::Configuration, message)
}

pub fn env_var_error(err: env::VarError) -> Error {
    config_error(format!("environment variable error: {}", err))
}

pub fn database_error<T: Debug>(err: T) -> Error {
    error(Kind::StorageUnavailable, format!("database error: {:?}", err))
}

pub fn storage_unavailable_error() -> Error {
    error(Kind::StorageUnavailable, "storage unavailable")
}

pub fn unexpected_error() -> Error {
    error(Kind::Unexpected, "unexpected error")
}
