//! The cross-device, double-buffered, asynchronous hardware-encode stage
//! (spec.md §4.1 / SPEC_FULL.md §3).
//!
//! `submit` never blocks on the encode itself -- it only blocks, briefly and
//! with a hard ceiling, on the per-slot keyed mutex. The actual encode work
//! (what a real async hardware encoder would do off to the side) happens on
//! a dedicated output-worker thread that retrieves slots in the same order
//! they were submitted.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use ffmpeg_next::{self as ffmpeg, Rational};

use crate::pipeline::slot::{Slot, SlotJob, ENCODER_KEY, PRODUCER_KEY};
use crate::types::config::QualityPreset;
use crate::types::error::{ReplayError, Result};
use crate::types::units::{ConvertedFrame, EncodedVideoUnit, SequenceHeader, MAX_SEQ_HEADER_SIZE};

/// Number of in-flight slots. The minimum per the spec is "1 + reorder frames
/// + headroom"; since B-frames are disabled there is no reordering, so 8
/// gives ample headroom against a momentarily slow encoder without reserving
/// excessive shared-buffer memory.
pub const NUM_SLOTS: usize = 8;
/// Ceiling on a single keyed-mutex acquire. A dead device must never wedge
/// the coordinator past this.
pub const MUTEX_ACQUIRE_TIMEOUT_MS: u64 = 50;
/// How long the output worker waits on a slot's job signal before re-checking
/// the stop flag.
pub const EVENT_WAIT_TIMEOUT_MS: u64 = 100;
/// GOP length in seconds; `GOP = fps * GOP_LENGTH_SECONDS`.
pub const GOP_LENGTH_SECONDS: u32 = 2;

const HNS_PER_SECOND: i64 = crate::types::units::HNS_PER_SECOND;

/// Outcome of a `submit` call.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ok,
    Busy,
    DeviceLost,
}

struct SubmitCursor {
    submit_index: usize,
    frame_number: u64,
}

pub struct EncodePipeline {
    slots: Vec<Arc<Slot>>,
    cursor: Mutex<SubmitCursor>,
    pending: Arc<AtomicUsize>,
    device_lost: Arc<AtomicBool>,
    fps: u32,
    frame_duration_hns: i64,
    sequence_header: SequenceHeader,
    stop_flag: Arc<AtomicBool>,
    output_thread: Option<JoinHandle<()>>,
    /// Test/fault-injection hook: force a DEVICE_LOST outcome on the Nth submit
    /// (1-indexed), matching scenario 3 in spec.md §8 ("inject a DEVICE_REMOVED
    /// on the 500th submit").
    fail_on_submit: Arc<AtomicU64>,
}

impl EncodePipeline {
    /// `unit_ready` is invoked on the output-worker thread; it must be short,
    /// thread-safe, and reentrant with the video sample store (it is expected
    /// to be `VideoSampleStore::add`).
    pub fn init<F>(
        width: u32,
        height: u32,
        fps: u32,
        quality: QualityPreset,
        unit_ready: F,
    ) -> Result<Self>
    where
        F: Fn(EncodedVideoUnit) + Send + 'static,
    {
        if fps == 0 {
            return Err(ReplayError::Init("fps must be nonzero".into()));
        }

        let mut encoder = create_encoder(width, height, fps, quality)?;
        let sequence_header = extract_sequence_header(&encoder);
        if sequence_header.is_empty() || sequence_header.len() > MAX_SEQ_HEADER_SIZE {
            log::warn!(
                "codec sequence header is {} bytes (expected 1..={MAX_SEQ_HEADER_SIZE})",
                sequence_header.len()
            );
        }

        let plane_bytes = (width as usize) * (height as usize) * 3 / 2;
        let slots: Vec<Arc<Slot>> = (0..NUM_SLOTS)
            .map(|_| Arc::new(Slot::new(plane_bytes)))
            .collect();

        let pending = Arc::new(AtomicUsize::new(0));
        let device_lost = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let fail_on_submit = Arc::new(AtomicU64::new(0));

        let worker_slots = slots.clone();
        let worker_pending = Arc::clone(&pending);
        let worker_device_lost = Arc::clone(&device_lost);
        let worker_stop = Arc::clone(&stop_flag);
        let worker_width = width;
        let worker_height = height;

        let output_thread = std::thread::Builder::new()
            .name("encode-output".into())
            .spawn(move || {
                output_worker_loop(
                    worker_slots,
                    &mut encoder,
                    worker_width,
                    worker_height,
                    worker_pending,
                    worker_device_lost,
                    worker_stop,
                    unit_ready,
                );
            })
            .map_err(|e| ReplayError::Init(format!("failed to spawn output worker: {e}")))?;

        Ok(Self {
            slots,
            cursor: Mutex::new(SubmitCursor {
                submit_index: 0,
                frame_number: 0,
            }),
            pending,
            device_lost,
            fps,
            frame_duration_hns: HNS_PER_SECOND / fps as i64,
            sequence_header,
            stop_flag,
            output_thread: Some(output_thread),
            fail_on_submit,
        })
    }

    /// Codec parameter-set bytes, available immediately after `init`.
    pub fn sequence_header(&self) -> &SequenceHeader {
        &self.sequence_header
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Acquire)
    }

    /// Test-only fault injection: force the Nth submit (1-indexed) to behave
    /// as a DEVICE_REMOVED failure.
    pub fn inject_device_loss_at(&self, submit_number: u64) {
        self.fail_on_submit.store(submit_number, Ordering::Release);
    }

    /// Non-blocking. See spec.md §4.1 for the full ordering/locking narrative.
    ///
    /// `submit_index`/`frame_number` are only committed once the slot has
    /// actually been armed with a job; any BUSY return along the way leaves
    /// the cursor untouched so the next call retries the same slot instead of
    /// permanently skipping it (a skipped slot would starve the output worker,
    /// which retrieves slots strictly in submission order).
    pub fn submit(&self, frame: &ConvertedFrame, timestamp_hns: i64) -> Result<SubmitOutcome> {
        if self.device_lost.load(Ordering::Acquire) {
            return Ok(SubmitOutcome::DeviceLost);
        }

        let (idx, frame_number) = {
            let cursor = self.cursor.lock().unwrap();
            if self.pending.load(Ordering::Acquire) >= NUM_SLOTS {
                return Ok(SubmitOutcome::Busy);
            }
            (cursor.submit_index, cursor.frame_number + 1)
        };

        let fail_at = self.fail_on_submit.load(Ordering::Acquire);
        if fail_at != 0 && frame_number == fail_at {
            self.device_lost.store(true, Ordering::Release);
            log::error!("encode pipeline: injected device loss at submit {fail_at}");
            return Ok(SubmitOutcome::DeviceLost);
        }

        let slot = &self.slots[idx];
        let gop_length_frames = self.fps as u64 * GOP_LENGTH_SECONDS as u64;
        let force_idr = (frame_number - 1) % gop_length_frames == 0;

        match slot
            .mutex
            .acquire(PRODUCER_KEY, Duration::from_millis(MUTEX_ACQUIRE_TIMEOUT_MS))
        {
            Ok(()) => {}
            Err(_) => return Ok(SubmitOutcome::Busy),
        }

        {
            let mut buf = slot.buffer.lock().unwrap();
            let n = buf.len().min(frame.data.len());
            buf[..n].copy_from_slice(&frame.data[..n]);
        }
        slot.mutex.release(ENCODER_KEY);

        match slot
            .mutex
            .acquire(ENCODER_KEY, Duration::from_millis(MUTEX_ACQUIRE_TIMEOUT_MS))
        {
            Ok(()) => {}
            Err(_) => {
                // The buffer was written but no job was armed; hand the slot
                // back to the producer side so a future submit can retry it
                // instead of leaving it wedged waiting on the encoder key.
                slot.mutex.release(PRODUCER_KEY);
                return Ok(SubmitOutcome::Busy);
            }
        }

        *slot.job.lock().unwrap() = Some(SlotJob {
            pts_hns: timestamp_hns,
            duration_hns: self.frame_duration_hns,
            force_idr,
        });
        self.pending.fetch_add(1, Ordering::AcqRel);
        slot.job_ready.notify_all();

        {
            let mut cursor = self.cursor.lock().unwrap();
            cursor.submit_index = (idx + 1) % NUM_SLOTS;
            cursor.frame_number = frame_number;
        }

        Ok(SubmitOutcome::Ok)
    }

    pub fn destroy(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        for slot in &self.slots {
            slot.job_ready.notify_all();
        }
        if let Some(handle) = self.output_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EncodePipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[allow(clippy::too_many_arguments)]
fn output_worker_loop<F>(
    slots: Vec<Arc<Slot>>,
    encoder: &mut ffmpeg::encoder::Video,
    width: u32,
    height: u32,
    pending: Arc<AtomicUsize>,
    device_lost: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    unit_ready: F,
) where
    F: Fn(EncodedVideoUnit),
{
    let mut retrieve_index = 0usize;
    let mut drop_log_count = 0u64;

    while !stop_flag.load(Ordering::Acquire) {
        let slot = &slots[retrieve_index];

        let job = {
            let guard = slot.job.lock().unwrap();
            let (mut guard, _timeout) = slot
                .job_ready
                .wait_timeout_while(
                    guard,
                    Duration::from_millis(EVENT_WAIT_TIMEOUT_MS),
                    |j| j.is_none() && !stop_flag.load(Ordering::Acquire),
                )
                .unwrap();
            guard.take()
        };

        if stop_flag.load(Ordering::Acquire) {
            break;
        }
        let Some(job) = job else {
            continue;
        };

        let encode_result = encode_slot(encoder, slot, width, height, &job);
        match encode_result {
            Ok(units) => {
                for unit in units {
                    unit_ready(unit);
                }
            }
            Err(e) if e.is_device_lost() => {
                device_lost.store(true, Ordering::Release);
                slot.mutex.release(PRODUCER_KEY);
                log::error!("encode output worker: device lost: {e}");
                break;
            }
            Err(e) => {
                drop_log_count += 1;
                if drop_log_count % 100 == 1 {
                    log::warn!("dropped encode output for a frame: {e} (x{drop_log_count})");
                }
            }
        }

        slot.mutex.release(PRODUCER_KEY);
        pending.fetch_sub(1, Ordering::AcqRel);
        retrieve_index = (retrieve_index + 1) % slots.len();
    }
}

fn encode_slot(
    encoder: &mut ffmpeg::encoder::Video,
    slot: &Slot,
    width: u32,
    height: u32,
    job: &SlotJob,
) -> Result<Vec<EncodedVideoUnit>> {
    let mut frame = ffmpeg::util::frame::Video::new(ffmpeg::format::Pixel::NV12, width, height);
    {
        let buf = slot.buffer.lock().unwrap();
        let luma_len = (width * height) as usize;
        let chroma_len = buf.len().saturating_sub(luma_len);
        frame.data_mut(0)[..luma_len.min(frame.data(0).len())]
            .copy_from_slice(&buf[..luma_len.min(buf.len())]);
        if chroma_len > 0 {
            let chroma_dst_len = frame.data(1).len();
            let n = chroma_len.min(chroma_dst_len);
            frame.data_mut(1)[..n].copy_from_slice(&buf[luma_len..luma_len + n]);
        }
    }
    frame.set_pts(Some(job.pts_hns));
    if job.force_idr {
        frame.set_kind(ffmpeg::picture::Type::I);
    }

    encoder.send_frame(&frame)?;

    let mut units = Vec::with_capacity(1);
    let mut packet = ffmpeg::codec::packet::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        if let Some(data) = packet.data() {
            units.push(EncodedVideoUnit {
                data: data.to_vec(),
                pts_hns: packet.pts().unwrap_or(job.pts_hns),
                duration_hns: job.duration_hns,
                is_key: packet.is_key(),
            });
        }
        packet = ffmpeg::codec::packet::Packet::empty();
    }
    Ok(units)
}

fn create_encoder(
    width: u32,
    height: u32,
    fps: u32,
    quality: QualityPreset,
) -> Result<ffmpeg::encoder::Video> {
    let codec = ffmpeg::codec::encoder::find_by_name("libx265")
        .ok_or(ffmpeg::Error::EncoderNotFound)?;

    let mut encoder_ctx = ffmpeg::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()?;

    encoder_ctx.set_width(width);
    encoder_ctx.set_height(height);
    encoder_ctx.set_format(ffmpeg::format::Pixel::NV12);
    encoder_ctx.set_time_base(Rational::new(1, HNS_PER_SECOND as i32));
    encoder_ctx.set_gop(fps * GOP_LENGTH_SECONDS);

    unsafe {
        // No bidirectional prediction: disables reordering so retrieval order
        // equals submission order.
        (*encoder_ctx.as_mut_ptr()).max_b_frames = 0;
    }

    let opts = encoder_params(&quality);
    let encoder = encoder_ctx.open_with(opts)?;
    Ok(encoder)
}

fn encoder_params(quality: &QualityPreset) -> ffmpeg::Dictionary {
    let mut opts = ffmpeg::Dictionary::new();
    let qp = quality.qp();
    let intra_qp = quality.intra_qp();
    opts.set(
        "x265-params",
        &format!("qp={qp}:qpmin={intra_qp}:qpmax={qp}:scenecut=0:rc-lookahead=0:bframes=0"),
    );
    opts
}

fn extract_sequence_header(encoder: &ffmpeg::encoder::Video) -> SequenceHeader {
    unsafe {
        let ptr = encoder.as_ptr();
        let size = (*ptr).extradata_size as usize;
        if size == 0 || (*ptr).extradata.is_null() {
            Vec::new()
        } else {
            std::slice::from_raw_parts((*ptr).extradata, size).to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_matches_fps() {
        // 10_000_000 HNS / 60 fps ~ 166_666 HNS per frame
        assert_eq!(HNS_PER_SECOND / 60, 166_666);
    }
}
