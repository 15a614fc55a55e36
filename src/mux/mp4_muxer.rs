//! MP4 container writer. Grounded on the `with_video_encoder`/`with_audio_encoder`
//! doc examples in the teacher's `lib.rs` (add_stream/set_parameters/write_header
//! shape), generalized from "stream the live encoder" to "write a fixed batch
//! of already-encoded units" since this crate saves a replay buffer snapshot
//! rather than a continuous recording.

use std::path::Path;

use ffmpeg_next::{self as ffmpeg, Rational};

use crate::mux::muxer::{AudioConfig, Muxer, VideoConfig};
use crate::types::error::{ReplayError, Result};
use crate::types::units::{EncodedAudioUnit, EncodedVideoUnit, HNS_PER_SECOND};

pub struct Mp4Muxer;

impl Mp4Muxer {
    pub fn new() -> Self {
        Self
    }

    fn write_impl(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
        audio: Option<(&AudioConfig, &[EncodedAudioUnit])>,
    ) -> Result<()> {
        if video_units.is_empty() {
            return Err(ReplayError::Mux("no video units to mux".into()));
        }

        let tmp_path = path.with_extension("tmp-mp4");
        let result = self.write_to(&tmp_path, video, video_units, audio);
        match result {
            Ok(()) => {
                std::fs::rename(&tmp_path, path)?;
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(e)
            }
        }
    }

    fn write_to(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
        audio: Option<(&AudioConfig, &[EncodedAudioUnit])>,
    ) -> Result<()> {
        let mut output = ffmpeg::format::output(&path)?;

        let video_codec = ffmpeg::codec::encoder::find_by_name("libx265")
            .ok_or(ffmpeg::Error::EncoderNotFound)?;
        let mut video_stream = output
            .add_stream(video_codec)
            .map_err(|e| ReplayError::Mux(format!("failed to add video stream: {e}")))?;
        video_stream.set_time_base(Rational::new(1, HNS_PER_SECOND as i32));
        {
            let params = &mut video_stream.parameters();
            unsafe {
                let ptr = params.as_mut_ptr();
                (*ptr).codec_id = ffmpeg::codec::Id::HEVC.into();
                (*ptr).codec_type = ffmpeg::media::Type::Video.into();
                (*ptr).width = video.width as i32;
                (*ptr).height = video.height as i32;
                if !video.sequence_header.is_empty() {
                    (*ptr).extradata =
                        ffmpeg::sys::av_malloc(video.sequence_header.len()) as *mut u8;
                    std::ptr::copy_nonoverlapping(
                        video.sequence_header.as_ptr(),
                        (*ptr).extradata,
                        video.sequence_header.len(),
                    );
                    (*ptr).extradata_size = video.sequence_header.len() as i32;
                }
            }
        }
        let video_stream_index = video_stream.index();

        let audio_stream_index = if let Some((audio_cfg, units)) = audio {
            if units.is_empty() {
                None
            } else {
                let audio_codec = ffmpeg::codec::encoder::find(ffmpeg::codec::Id::OPUS)
                    .ok_or(ffmpeg::Error::EncoderNotFound)?;
                let mut audio_stream = output
                    .add_stream(audio_codec)
                    .map_err(|e| ReplayError::Mux(format!("failed to add audio stream: {e}")))?;
                audio_stream.set_time_base(Rational::new(1, HNS_PER_SECOND as i32));
                {
                    let params = &mut audio_stream.parameters();
                    unsafe {
                        let ptr = params.as_mut_ptr();
                        (*ptr).codec_id = ffmpeg::codec::Id::OPUS.into();
                        (*ptr).codec_type = ffmpeg::media::Type::Audio.into();
                        (*ptr).sample_rate = audio_cfg.sample_rate as i32;
                        (*ptr).ch_layout.nb_channels = audio_cfg.channels as i32;
                    }
                }
                Some(audio_stream.index())
            }
        } else {
            None
        };

        output
            .write_header()
            .map_err(|e| ReplayError::Mux(format!("write_header failed: {e}")))?;

        let base_pts = video_units[0].pts_hns;
        let mut packets: Vec<(i64, bool, usize, Vec<u8>)> = Vec::new();
        for unit in video_units {
            packets.push((
                unit.pts_hns - base_pts,
                unit.is_key,
                video_stream_index,
                unit.data.clone(),
            ));
        }
        if let (Some(idx), Some((_, units))) = (audio_stream_index, audio) {
            for unit in units {
                packets.push((unit.pts_hns - base_pts, false, idx, unit.data.clone()));
            }
        }
        packets.sort_by_key(|(pts, ..)| *pts);

        for (pts, is_key, stream_index, data) in packets {
            let mut packet = ffmpeg::codec::packet::Packet::copy(&data);
            packet.set_stream(stream_index);
            packet.set_pts(Some(pts));
            packet.set_dts(Some(pts));
            if is_key {
                packet.set_flags(ffmpeg::codec::packet::Flags::KEY);
            }
            packet
                .write_interleaved(&mut output)
                .map_err(|e| ReplayError::Mux(format!("packet write failed: {e}")))?;
        }

        output
            .write_trailer()
            .map_err(|e| ReplayError::Mux(format!("write_trailer failed: {e}")))?;

        Ok(())
    }
}

impl Default for Mp4Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for Mp4Muxer {
    fn write_file(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
    ) -> Result<()> {
        self.write_impl(path, video, video_units, None)
    }

    fn write_file_with_audio(
        &self,
        path: &Path,
        video: &VideoConfig,
        video_units: &[EncodedVideoUnit],
        audio: &AudioConfig,
        audio_units: &[EncodedAudioUnit],
    ) -> Result<()> {
        self.write_impl(path, video, video_units, Some((audio, audio_units)))
    }
}
