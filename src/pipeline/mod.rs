pub mod encode_pipeline;
pub mod slot;

pub use encode_pipeline::{EncodePipeline, SubmitOutcome};
