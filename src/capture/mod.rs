pub mod adapter;
pub mod converter;

pub use adapter::{CaptureAdapter, SyntheticCaptureAdapter};
pub use converter::{ColorConverter, PassthroughConverter};
