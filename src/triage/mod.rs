pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod query;

pub use error::TriageError;
pub use model::{Batch, Category, DraftOutcome, EnrichedEmail, RawMessage, Urgency};
pub use pipeline::{Pacing, Pipeline};
pub use query::{SearchSettings, TimeRange};
