use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub brand: String,
    pub model: String,
    pub seats: i32,
}

impl Car {
    pub fn new(owner_id: Uuid, brand: String, model: String, seats: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            brand,
            model,
            seats,
        }
    }

    pub fn is_owned_by(&self, member_id: Uuid) -> bool {
        self.owner_id == member_id
    }
}
