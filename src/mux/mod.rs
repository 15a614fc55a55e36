pub mod mp4_muxer;
pub mod muxer;

pub use mp4_muxer::Mp4Muxer;
pub use muxer::{AudioConfig, Muxer, VideoConfig};
