// src/decoder/mod.rs

pub mod dsp;
pub mod output;
pub mod resample;

use anyhow::{Context, anyhow};
use ringbuf::traits::Producer as RbProducer;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::units::Time;
use symphonia::default::{get_codecs, get_probe};

use crate::player::PlayerShared;
use output::SeekFade;
use resample::ResampleStage;

/// Commands the decode thread accepts while running.
pub enum DecoderCmd {
    Seek(Duration),
}

/// Decode thread for one engine binding: probes the source, reports
/// readiness, then keeps the ring buffer fed at the device rate.
pub struct Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    path: PathBuf,
    producer: P,
    shared: Arc<PlayerShared>,
    cmd_rx: Receiver<DecoderCmd>,
    fade: SeekFade,
}

impl<P> Decoder<P>
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    fn run(mut self) -> Result<(), anyhow::Error> {
        let file = File::open(&self.path).with_context(|| format!("opening {:?}", self.path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let probed = get_probe().format(
            &Default::default(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default audio track"))?;
        let track_id = track.id;
        let source_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("missing sample rate"))?;
        let total = Duration::from_secs_f64(
            track.codec_params.n_frames.unwrap_or(0) as f64 / source_rate as f64,
        );
        let mut codec = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        // The binding counts as ready once a finite duration is known.
        self.shared.set_ready(total);

        let out_ch = self.shared.output_channels;
        let mut stage = ResampleStage::new(source_rate, self.shared.output_sample_rate, out_ch)?;
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            loop {
                match self.cmd_rx.try_recv() {
                    Ok(DecoderCmd::Seek(target)) => {
                        self.apply_seek(&mut format, track_id, total, &mut stage, &mut sample_buf, target)
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Ok(()),
                }
            }
            if !self.shared.alive.load(Ordering::Relaxed) {
                return Ok(());
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(_) => {
                    // End of stream: flush the resampler tail, mark the
                    // source exhausted, then wait — the user may seek back
                    // after the track finishes.
                    let tail = stage.finish();
                    if !output::push_faded(&mut self.producer, &tail, &mut self.fade, &self.shared.alive) {
                        return Ok(());
                    }
                    self.shared.decode_done.store(true, Ordering::Relaxed);
                    match self.wait_for_seek() {
                        Some(target) => {
                            self.apply_seek(&mut format, track_id, total, &mut stage, &mut sample_buf, target);
                            continue;
                        }
                        None => return Ok(()),
                    }
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match codec.decode(&packet) {
                Ok(decoded) => {
                    let decoded_ch = decoded.spec().channels.count();
                    if sample_buf.is_none() {
                        sample_buf = Some(SampleBuffer::<f32>::new(
                            decoded.capacity() as u64,
                            *decoded.spec(),
                        ));
                    }
                    let Some(buf) = sample_buf.as_mut() else { continue };
                    buf.copy_interleaved_ref(decoded);

                    let remixed: Vec<f32>;
                    let samples: &[f32] = if decoded_ch == out_ch {
                        buf.samples()
                    } else {
                        remixed = dsp::remix_channels(buf.samples(), decoded_ch, out_ch);
                        &remixed
                    };

                    let block = stage.push(samples);
                    if !output::push_faded(&mut self.producer, &block, &mut self.fade, &self.shared.alive) {
                        return Ok(());
                    }
                }
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => {
                    // Fatal decode error: let the transport see the track end.
                    self.shared.decode_done.store(true, Ordering::Relaxed);
                    return Err(e.into());
                }
            }

            if !self.shared.playing.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    fn apply_seek(
        &mut self,
        format: &mut Box<dyn FormatReader>,
        track_id: u32,
        total: Duration,
        stage: &mut ResampleStage,
        sample_buf: &mut Option<SampleBuffer<f32>>,
        target: Duration,
    ) {
        // A synchronized seek can land past the end of a shorter source;
        // clamp so the demuxer does not reject it.
        let target = if total > Duration::ZERO { target.min(total) } else { target };
        let time = Time::new(target.as_secs(), target.subsec_nanos() as f64 / 1_000_000_000.0);
        match format.seek(SeekMode::Accurate, SeekTo::Time { time, track_id: Some(track_id) }) {
            Ok(_) => {
                *sample_buf = None;
                stage.reset();
                self.shared.decode_done.store(false, Ordering::Relaxed);
                self.fade.start(
                    dsp::fade_samples(self.shared.output_sample_rate, 10) * self.shared.output_channels,
                );
            }
            Err(e) => log::warn!("seek to {target:?} failed for {:?}: {e}", self.path),
        }
    }

    /// Parked at end of stream: returns the next seek target, or None when
    /// the binding goes away.
    fn wait_for_seek(&self) -> Option<Duration> {
        loop {
            match self.cmd_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(DecoderCmd::Seek(target)) => return Some(target),
                Err(RecvTimeoutError::Timeout) => {
                    if !self.shared.alive.load(Ordering::Relaxed) {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Spawn the decode thread for one binding. Readiness, duration and
/// end-of-stream travel back through `shared`; seeks go through the
/// returned channel.
pub fn spawn_decoder<P>(
    path: PathBuf,
    producer: P,
    shared: Arc<PlayerShared>,
) -> (JoinHandle<()>, Sender<DecoderCmd>)
where
    P: RbProducer<Item = f32> + Send + 'static,
{
    let (tx, rx) = channel();
    let decoder = Decoder {
        path,
        producer,
        shared,
        cmd_rx: rx,
        fade: SeekFade::default(),
    };
    let handle = thread::spawn(move || {
        if let Err(e) = decoder.run() {
            log::error!("decode thread error: {e:#}");
        }
    });
    (handle, tx)
}
