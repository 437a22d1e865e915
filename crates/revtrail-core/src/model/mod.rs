pub mod entity;
pub mod revision;
pub mod value;

pub use entity::{Operation, Tracked};
pub use revision::{ChangeDocument, Revision, RevisionChange};
pub use value::{FieldValue, Snapshot};
