pub mod classifier;
pub mod detect;
pub mod extract;
pub mod field;
pub mod fill;
pub mod naming;
pub mod registry;
pub mod tracker;

pub use classifier::classify;
pub use detect::{detect_forms, DetectedForm, PAGE_FIELDS_FORM_ID};
pub use field::{FieldDescriptor, FieldKind, FieldValue};
pub use registry::{
    ElementAnchor, FormFillResult, FormOrigin, FormRecord, FormRegistry, RegistryState, SyncReport,
};
pub use tracker::{ChangeFeed, ChangeQueue, DomChange};
