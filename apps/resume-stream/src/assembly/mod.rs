// Incremental document assembly.
// decoder → merger → completion, called once per stream event by the session.
// All three are pure functions of their inputs.

pub mod completion;
pub mod decoder;
pub mod merger;

pub use completion::{completion_report, score};
pub use decoder::{decode, RawSnapshot};
pub use merger::merge;
