pub mod edits;
pub mod error;
pub mod field_ref;
pub mod ids;

pub use edits::{AssetEdits, EditTree, QuestionEdit};
pub use error::CoreError;
pub use field_ref::{FieldRef, QuestionPart, KEY_SEPARATOR};
pub use ids::{AssetId, HistoryId};
