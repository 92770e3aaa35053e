use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SYSTEM_ROLE: &str = "system";

/// The actor behind a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub roles: Vec<String>,
}

impl User {
    pub fn new(id: Uuid) -> Self {
        Self { id, roles: vec![] }
    }

    pub fn new_system_user() -> Self {
        Self {
            id: Uuid::new_v4(),
            roles: vec![SYSTEM_ROLE.into()],
        }
    }

    pub fn with_roles(id: Uuid, roles: Vec<String>) -> Self {
        Self { id, roles }
    }

    pub fn is_system(&self) -> bool {
        self.has_role(SYSTEM_ROLE.into())
    }

    fn has_role(&self, role: String) -> bool {
        self.roles.iter().any(|x| x == &role)
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id)
            .add_attribute_getter("roles", |recv: &User| recv.roles.clone())
            .add_method("has_role", User::has_role)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}
