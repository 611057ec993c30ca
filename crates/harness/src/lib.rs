pub mod admin;
pub mod store;

pub use admin::TestAdmin;
pub use store::{FlakyStore, SharedStore};
