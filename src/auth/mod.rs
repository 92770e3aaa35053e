pub mod authorizor;
mod user;

pub use user::{User, SYSTEM_ROLE};
