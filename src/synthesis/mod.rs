pub mod agent;
pub mod tables;

pub use agent::{synthesize, SynthesisResult};
pub use tables::{StandardComparator, TableExtractor};
