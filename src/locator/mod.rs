pub mod candidate;
pub mod resolver;

pub use candidate::{CandidateSummary, MatchCandidate, MatchReason};
pub use resolver::{is_selector_like, ElementResolver, Purpose, Resolution, ResolveRequest};
