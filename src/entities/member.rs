use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user. Members are managed outside of this crate; trips and
/// bookings only check that they exist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
}

impl Member {
    pub fn new(name: String, phone: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            phone,
        }
    }
}
