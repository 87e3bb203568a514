pub mod document;
pub mod inspect;
pub mod selector;

pub use document::{collapse_whitespace, Document, NodeId};
pub use selector::SelectorList;
