pub mod classifier;
pub mod document_processor;
pub mod extractor;

pub use classifier::DomainClassifier;
pub use document_processor::DocumentProcessor;
