//! Knowledge store: topic files parsed into ordered records.

pub mod parse;
pub mod store;
pub mod types;

pub use parse::parse_topic;
pub use store::{KnowledgeStore, SkippedTopic, TopicLoad};
pub use types::{CodeBlock, Record, Tag};
