pub mod encoder;
pub mod mixer;
pub mod source;

pub use encoder::AudioEncoder;
pub use mixer::AudioMixer;
pub use source::{AudioSource, SyntheticAudioSource, SyntheticWaveform};
