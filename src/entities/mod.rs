mod booking;
mod car;
mod member;
mod review;
mod trip;

pub use booking::{Booking, Status as BookingStatus};
pub use car::Car;
pub use member::Member;
pub use review::{mean_rating, Review, MAX_RATING, MIN_RATING};
pub use trip::{NewTrip, Status as TripStatus, Trip};
