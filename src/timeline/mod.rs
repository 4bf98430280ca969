pub mod extractor;
pub mod source;
pub mod time;

pub use extractor::PostExtractor;
pub use source::StatKind;
