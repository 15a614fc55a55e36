/// One hundred-nanosecond tick: `10_000_000` HNS = 1 second. All timestamps
/// and durations in the core are expressed in this unit.
pub const HNS_PER_SECOND: i64 = 10_000_000;

/// Maximum size of a codec sequence header, in bytes (spec §3/§8).
pub const MAX_SEQ_HEADER_SIZE: usize = 256;

/// An encoded video unit. Owned by the `VideoSampleStore` after insertion.
#[derive(Debug, Clone)]
pub struct EncodedVideoUnit {
    pub data: Vec<u8>,
    pub pts_hns: i64,
    pub duration_hns: i64,
    pub is_key: bool,
}

impl EncodedVideoUnit {
    pub fn end_hns(&self) -> i64 {
        self.pts_hns + self.duration_hns
    }
}

/// An encoded audio unit. Owned by the `AudioSampleStore` after insertion.
#[derive(Debug, Clone)]
pub struct EncodedAudioUnit {
    pub data: Vec<u8>,
    pub pts_hns: i64,
    pub duration_hns: i64,
}

impl EncodedAudioUnit {
    pub fn end_hns(&self) -> i64 {
        self.pts_hns + self.duration_hns
    }
}

/// The codec's stream parameter set (SPS/PPS/VPS equivalent). Produced once
/// by the video encoder after initialization; immutable after first write.
pub type SequenceHeader = Vec<u8>;

/// Pixel format tag for CPU-side stand-ins of the GPU textures the spec
/// describes (see SPEC_FULL.md §3 on the cross-device bridge substitution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes/pixel, capture-source native format ("format A" in the spec).
    Bgra8,
    /// Bi-planar luma/chroma, the encoder's preferred format ("format B").
    Nv12,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8 => 4,
            PixelFormat::Nv12 => 1, // luma plane stride; chroma handled separately
        }
    }
}

/// A captured surface: owned bytes in `PixelFormat::Bgra8`, released back to
/// the capture source after being submitted to the converter.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// A frame in the encoder's preferred pixel format. Transient: consumed in
/// the same tick it was produced.
#[derive(Debug, Clone)]
pub struct ConvertedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}
