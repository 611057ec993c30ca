pub mod error;
pub mod notify;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StoreError;
pub use notify::{ChangeNotifier, Subscription};
pub use sqlite::SqliteEditStore;
pub use traits::*;
