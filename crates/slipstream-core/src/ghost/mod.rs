mod compare;
mod document;
mod store;

pub use compare::{interpolate, merge_best_splits};
pub use document::{BestSplit, GhostDocument, SplitDefinition};
pub use store::GhostStore;
