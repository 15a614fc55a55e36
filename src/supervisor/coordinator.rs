//! Coordinator: owns the capture -> convert -> submit -> store loop and the
//! save/stop lifecycle (spec §4.3). Grounded on the teacher's `Capture<V>`
//! (one struct holding the controls handle plus worker join handles, `Drop`
//! joining them) generalized from "pipewire source + hw encoder" to
//! "capture adapter + cross-device encode pipeline + sample stores".

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, RecvTimeoutError};

use crate::audio::{AudioEncoder, AudioMixer};
use crate::capture::{CaptureAdapter, ColorConverter};
use crate::mux::{AudioConfig, Muxer, VideoConfig};
use crate::pipeline::{EncodePipeline, SubmitOutcome};
use crate::stores::video_store::MIN_CAPACITY;
use crate::stores::{AudioSampleStore, VideoSampleStore};
use crate::supervisor::events::{SaveRequest, SupervisorEvents};
use crate::supervisor::state::{SupervisorControls, SupervisorState};
use crate::types::config::{QualityPreset, ReplayConfig};
use crate::types::error::{ReplayError, Result};
use crate::types::units::HNS_PER_SECOND;

const MIN_FRAMES_FOR_SAVE: usize = 2;
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const SAVE_TIMEOUT: Duration = Duration::from_secs(30);
const ACCESS_LOST_RETRY_LIMIT: u32 = 5;
/// Consecutive BUSY submits, in seconds of frames at the configured fps,
/// before the coordinator gives up and transitions to `Stalled` (spec §4.3).
const BUSY_STALL_SECONDS: u32 = 5;

/// Pure RAM estimate, spec.md §9: `bitrate_mbps` scales the quality preset's
/// base rate by resolution and frame-rate factors, clamps to `[10, 150]`
/// Mbps, then converts to megabytes over the retention window.
pub fn estimate_ram_mb(
    quality: QualityPreset,
    width: u32,
    height: u32,
    fps: u32,
    retention_seconds: u32,
) -> f64 {
    let megapixels = (width as f64 * height as f64) / 1_000_000.0;
    let resolution_factor = (megapixels / 3.7).clamp(0.5, 2.5);
    let fps_factor = (fps as f64 / 60.0).clamp(0.5, 4.0);
    let bitrate_mbps =
        (quality.base_bitrate_mbps() * resolution_factor * fps_factor).clamp(10.0, 150.0);
    bitrate_mbps * retention_seconds as f64 / 8.0
}

struct SaveContext {
    muxer: Arc<dyn Muxer + Send + Sync>,
    video_config: VideoConfig,
    video_store: Arc<Mutex<VideoSampleStore>>,
    audio_store: Arc<Mutex<AudioSampleStore>>,
}

impl SaveContext {
    fn perform(&self, path: &std::path::Path) -> Result<PathBuf> {
        let video_units = self.video_store.lock().unwrap().snapshot_for_muxing();
        let audio_units = self.audio_store.lock().unwrap().snapshot_for_muxing();

        if audio_units.is_empty() {
            self.muxer
                .write_file(path, &self.video_config, &video_units)?;
        } else {
            let audio_config = AudioConfig {
                sample_rate: crate::audio::encoder::SAMPLE_RATE,
                channels: crate::audio::encoder::CHANNELS,
            };
            self.muxer.write_file_with_audio(
                path,
                &self.video_config,
                &video_units,
                &audio_config,
                &audio_units,
            )?;
        }
        Ok(path.to_path_buf())
    }
}

pub struct Supervisor {
    controls: Arc<SupervisorControls>,
    events: Arc<SupervisorEvents>,
    video_store: Arc<Mutex<VideoSampleStore>>,
    audio_store: Arc<Mutex<AudioSampleStore>>,
    muxer: Arc<dyn Muxer + Send + Sync>,
    video_config: Mutex<Option<VideoConfig>>,
    coordinator_thread: Mutex<Option<JoinHandle<()>>>,
    audio_thread: Mutex<Option<JoinHandle<()>>>,
    stopped_signal: Mutex<Option<crossbeam::channel::Receiver<()>>>,
}

impl Supervisor {
    pub fn new(muxer: Arc<dyn Muxer + Send + Sync>) -> Self {
        Self {
            controls: Arc::new(SupervisorControls::new()),
            events: Arc::new(SupervisorEvents::new()),
            video_store: Arc::new(Mutex::new(VideoSampleStore::new(0, Vec::new(), MIN_CAPACITY))),
            audio_store: Arc::new(Mutex::new(AudioSampleStore::new(0))),
            muxer,
            video_config: Mutex::new(None),
            coordinator_thread: Mutex::new(None),
            audio_thread: Mutex::new(None),
            stopped_signal: Mutex::new(None),
        }
    }

    pub fn controls(&self) -> Arc<SupervisorControls> {
        Arc::clone(&self.controls)
    }

    pub fn state(&self) -> SupervisorState {
        self.controls.state()
    }

    /// Starts capture with a capture adapter / converter already supplied by
    /// the caller (host integration owns device selection per spec §7).
    pub fn start(
        &self,
        config: ReplayConfig,
        mut adapter: Box<dyn CaptureAdapter>,
        mut converter: Box<dyn ColorConverter>,
    ) -> Result<()> {
        let startable = matches!(
            self.state(),
            SupervisorState::Uninitialized | SupervisorState::Error
        );
        if !startable {
            return Err(ReplayError::Validation("already started".into()));
        }

        let config = config.clamped();
        config.validate()?;

        self.controls.set_state(SupervisorState::Starting);
        self.events.ready.clear();
        self.events.stop.clear();

        let width = adapter.width();
        let height = adapter.height();
        let fps = config.replay_fps;
        let retention_hns = config.replay_duration_seconds as i64 * HNS_PER_SECOND;

        let video_store_for_callback = Arc::clone(&self.video_store);
        let pipeline = EncodePipeline::init(width, height, fps, config.quality, move |unit| {
            video_store_for_callback.lock().unwrap().add(unit);
        })?;
        let sequence_header = pipeline.sequence_header().clone();
        let capacity_hint = fps as usize * config.replay_duration_seconds as usize;
        *self.video_store.lock().unwrap() =
            VideoSampleStore::new(retention_hns, sequence_header.clone(), capacity_hint);
        *self.audio_store.lock().unwrap() = AudioSampleStore::new(retention_hns);

        let video_config = VideoConfig {
            width,
            height,
            fps,
            sequence_header,
        };
        *self.video_config.lock().unwrap() = Some(video_config.clone());

        let save_ctx = Arc::new(SaveContext {
            muxer: Arc::clone(&self.muxer),
            video_config,
            video_store: Arc::clone(&self.video_store),
            audio_store: Arc::clone(&self.audio_store),
        });

        let pipeline = Arc::new(pipeline);
        let controls = Arc::clone(&self.controls);
        let events = Arc::clone(&self.events);
        let (stopped_tx, stopped_rx) = bounded(1);
        *self.stopped_signal.lock().unwrap() = Some(stopped_rx);

        let frame_interval = Duration::from_nanos(1_000_000_000 / fps as u64);

        let handle = std::thread::Builder::new()
            .name("replay-coordinator".into())
            .spawn(move || {
                coordinator_loop(
                    adapter.as_mut(),
                    converter.as_mut(),
                    &pipeline,
                    &controls,
                    &events,
                    &save_ctx,
                    frame_interval,
                    fps,
                );
                let _ = stopped_tx.send(());
            })
            .map_err(|e| ReplayError::Init(format!("failed to spawn coordinator: {e}")))?;
        *self.coordinator_thread.lock().unwrap() = Some(handle);

        if config.audio_enabled {
            let audio_store = Arc::clone(&self.audio_store);
            let audio_events = Arc::clone(&self.events);
            let handle = std::thread::Builder::new()
                .name("replay-audio".into())
                .spawn(move || audio_loop(audio_store, audio_events))
                .map_err(|e| ReplayError::Init(format!("failed to spawn audio worker: {e}")))?;
            *self.audio_thread.lock().unwrap() = Some(handle);
        }

        self.controls.set_state(SupervisorState::Capturing);
        self.events.ready.set();
        Ok(())
    }

    /// Stops capture. Joins the coordinator with a hard bound; on overrun the
    /// handle is dropped (the thread is left to exit on its own, detached)
    /// rather than blocking forever, per Design Notes §9.
    pub fn stop(&self) -> Result<()> {
        if !matches!(
            self.state(),
            SupervisorState::Capturing | SupervisorState::Stalled
        ) {
            return Err(ReplayError::Validation("not capturing".into()));
        }
        self.controls.set_state(SupervisorState::Stopping);
        self.events.stop.set();

        if let Some(rx) = self.stopped_signal.lock().unwrap().take() {
            match rx.recv_timeout(STOP_JOIN_TIMEOUT) {
                Ok(()) => {
                    if let Some(handle) = self.coordinator_thread.lock().unwrap().take() {
                        let _ = handle.join();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::error!(
                        "coordinator thread did not stop within {STOP_JOIN_TIMEOUT:?}; leaking it rather than blocking"
                    );
                    self.coordinator_thread.lock().unwrap().take();
                }
                Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        if let Some(handle) = self.audio_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.controls.set_state(SupervisorState::Uninitialized);
        Ok(())
    }

    /// Synchronous save request/response wrapper (spec §4.3): rejects
    /// immediately if not capturing or the buffer is too short, otherwise
    /// sends a request to the coordinator thread (which owns the muxer write
    /// so it never races a concurrent `submit`/store mutation) and blocks up
    /// to `SAVE_TIMEOUT` for the reply.
    pub fn save(&self, path: PathBuf) -> Result<PathBuf> {
        if self.state() != SupervisorState::Capturing {
            return Err(ReplayError::SaveRejected("not capturing".into()));
        }
        if self.video_store.lock().unwrap().len() < MIN_FRAMES_FOR_SAVE {
            return Err(ReplayError::SaveRejected("not enough buffered video".into()));
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.events
            .save_sender()
            .send(SaveRequest {
                path: path.clone(),
                reply: reply_tx,
            })
            .map_err(|_| ReplayError::SaveFailed("coordinator not running".into()))?;

        match reply_rx.recv_timeout(SAVE_TIMEOUT) {
            Ok(result) => result,
            Err(_) => Err(ReplayError::SaveFailed("save timed out".into())),
        }
    }

    pub fn status(&self) -> String {
        let video_stats = self.video_store.lock().unwrap().stats();
        let audio_stats = self.audio_store.lock().unwrap().stats();
        format!(
            "state={:?} video_units={} video_duration_s={:.1} audio_units={} memory_bytes={}",
            self.state(),
            video_stats.unit_count,
            video_stats.duration_hns as f64 / HNS_PER_SECOND as f64,
            audio_stats.unit_count,
            video_stats.memory_bytes + audio_stats.memory_bytes,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn coordinator_loop(
    adapter: &mut dyn CaptureAdapter,
    converter: &mut dyn ColorConverter,
    pipeline: &EncodePipeline,
    controls: &SupervisorControls,
    events: &SupervisorEvents,
    save_ctx: &SaveContext,
    frame_interval: Duration,
    fps: u32,
) {
    let start = Instant::now();
    let mut access_lost_retries = 0u32;
    let mut busy_log_count = 0u64;
    let mut consecutive_busy = 0u32;
    let stall_threshold = fps * BUSY_STALL_SECONDS;

    while !events.stop.is_set() {
        let tick_start = Instant::now();

        match adapter.next_frame() {
            Ok(frame) => {
                access_lost_retries = 0;
                match converter.convert(&frame) {
                    Ok(converted) => {
                        let timestamp_hns = (start.elapsed().as_nanos() / 100) as i64;
                        match pipeline.submit(&converted, timestamp_hns) {
                            Ok(SubmitOutcome::Ok) => {
                                consecutive_busy = 0;
                            }
                            Ok(SubmitOutcome::Busy) => {
                                busy_log_count += 1;
                                consecutive_busy += 1;
                                if busy_log_count % 100 == 1 {
                                    log::warn!(
                                        "encode pipeline saturated, dropping a frame (x{busy_log_count})"
                                    );
                                }
                                if consecutive_busy >= stall_threshold {
                                    log::error!(
                                        "encode pipeline busy for {consecutive_busy} consecutive submits; stalled"
                                    );
                                    controls.set_state(SupervisorState::Stalled);
                                    return;
                                }
                            }
                            Ok(SubmitOutcome::DeviceLost) => {
                                consecutive_busy = 0;
                                log::error!("encode device lost; stopping capture");
                                controls.set_state(SupervisorState::Stalled);
                                return;
                            }
                            Err(e) => log::warn!("submit failed: {e}"),
                        }
                    }
                    Err(e) => log::warn!("color conversion failed: {e}"),
                }
            }
            Err(ReplayError::AccessLost(msg)) => {
                access_lost_retries += 1;
                log::warn!("capture access lost: {msg} (attempt {access_lost_retries})");
                if access_lost_retries > ACCESS_LOST_RETRY_LIMIT {
                    log::error!(
                        "capture access permanently lost after {ACCESS_LOST_RETRY_LIMIT} retries"
                    );
                    controls.set_state(SupervisorState::Error);
                    return;
                }
                controls.set_state(SupervisorState::Stalled);
                if adapter.reinit_duplication().is_ok() {
                    controls.set_state(SupervisorState::Capturing);
                } else {
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
            Err(e) => {
                log::warn!("capture error: {e}");
            }
        }

        if let Ok(request) = events.save_receiver().try_recv() {
            let result = save_ctx.perform(&request.path);
            if let Err(ref e) = result {
                log::error!("save to {:?} failed: {e}", request.path);
            }
            let _ = request.reply.send(result);
        }

        controls.set_pending_units(pipeline.pending() as u64);

        let elapsed = tick_start.elapsed();
        if elapsed < frame_interval {
            std::thread::sleep(frame_interval - elapsed);
        }
    }
}

fn audio_loop(audio_store: Arc<Mutex<AudioSampleStore>>, events: Arc<SupervisorEvents>) {
    let mut mixer = AudioMixer::new();
    let mut encoder = match AudioEncoder::new() {
        Ok(e) => e,
        Err(e) => {
            log::error!("failed to start audio encoder: {e}");
            return;
        }
    };

    while !events.stop.is_set() {
        for (chunk, start_hns) in mixer.tick() {
            match encoder.process(&chunk, start_hns) {
                Ok(units) => {
                    let mut store = audio_store.lock().unwrap();
                    for unit in units {
                        store.add(unit);
                    }
                }
                Err(e) => log::warn!("audio encode failed: {e}"),
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    if let Ok(units) = encoder.flush() {
        let mut store = audio_store.lock().unwrap();
        for unit in units {
            store.add(unit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::QualityPreset;

    #[test]
    fn ram_estimate_clamps_to_ceiling() {
        let high_end = estimate_ram_mb(QualityPreset::Lossless, 7680, 4320, 240, 1200);
        assert!((high_end - 150.0 * 1200.0 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn ram_estimate_clamps_to_floor() {
        let low_end = estimate_ram_mb(QualityPreset::Low, 320, 240, 15, 30);
        assert!((low_end - 10.0 * 30.0 / 8.0).abs() < 1e-6);
    }
}
