//! Speaker output for synthesized replies

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

/// Sample rate for playback (Translate TTS emits 24kHz mono MP3)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays audio on the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports 24kHz
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        };

        // Prefer mono, fall back to stereo
        let supported_config = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels = config.channels,
            "speaker opened"
        );

        Ok(Self { device, config })
    }

    /// Decode MP3 bytes and play them, blocking until playback ends
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        self.play_mp3_until(mp3_data, &|| false)
    }

    /// Like [`play_mp3`](Self::play_mp3), but stops early once `interrupted` returns true
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3_until(&self, mp3_data: &[u8], interrupted: &dyn Fn() -> bool) -> Result<()> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples(samples, interrupted)
    }

    /// Play mono f32 samples, blocking until playback ends or is interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    pub fn play_samples(&self, samples: Vec<f32>, interrupted: &dyn Fn() -> bool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            });
                            frame.fill(sample);
                            if pos < samples.len() {
                                position.store(pos + 1, Ordering::Relaxed);
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        while !finished.load(Ordering::Relaxed) && start.elapsed() < timeout {
            if interrupted() {
                tracing::debug!("playback interrupted");
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");

        Ok(())
    }
}

/// Plays replies on a dedicated audio thread
///
/// [`speak`](Self::speak) returns immediately. A newer reply, or
/// [`interrupt`](Self::interrupt), cuts off whatever is playing or queued.
pub struct Speaker {
    queue: mpsc::UnboundedSender<(u64, Vec<u8>)>,
    generation: Arc<AtomicU64>,
}

impl Speaker {
    /// Open the default output device on a new audio thread
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|| {
            let playback = AudioPlayback::new()?;
            Ok(move |audio: &[u8], interrupted: &dyn Fn() -> bool| {
                playback.play_mp3_until(audio, interrupted)
            })
        })
        .await
    }

    /// Start the audio thread with a custom player
    ///
    /// `open` runs on the audio thread, so the player it returns never has
    /// to be `Send`.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot start or `open` fails
    pub async fn spawn_with<F, P>(open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<P> + Send + 'static,
        P: FnMut(&[u8], &dyn Fn() -> bool) -> Result<()> + 'static,
    {
        let (queue, mut pending) = mpsc::unbounded_channel::<(u64, Vec<u8>)>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let generation = Arc::new(AtomicU64::new(0));
        let current = Arc::clone(&generation);

        std::thread::Builder::new()
            .name("jarvis-speaker".to_string())
            .spawn(move || {
                let mut play = match open() {
                    Ok(play) => {
                        let _ = ready_tx.send(Ok(()));
                        play
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Some((id, audio)) = pending.blocking_recv() {
                    let interrupted = || current.load(Ordering::SeqCst) != id;
                    if interrupted() {
                        continue;
                    }
                    if let Err(e) = play(&audio, &interrupted) {
                        tracing::warn!(error = %e, "playback failed");
                    }
                }
                tracing::debug!("speaker thread finished");
            })?;

        ready_rx
            .await
            .map_err(|_| Error::Audio("speaker thread exited".to_string()))??;

        Ok(Self { queue, generation })
    }

    /// Queue a reply, cutting off anything older
    pub fn speak(&self, audio: Vec<u8>) {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.queue.send((id, audio)).is_err() {
            tracing::warn!("speaker thread is gone, reply not played");
        }
    }

    /// Stop whatever is playing or queued
    pub fn interrupt(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns [`Error::Audio`] on a corrupt stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) if frame.channels == 2 => {
                samples.extend(frame.data.chunks(2).map(|pair| {
                    let left = f32::from(pair[0]) / 32768.0;
                    let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                    f32::midpoint(left, right)
                }));
            }
            Ok(frame) => {
                samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mp3_decodes_to_nothing() {
        assert!(decode_mp3(&[]).unwrap().is_empty());
    }

    type PlayLog = Arc<std::sync::Mutex<Vec<(Vec<u8>, bool)>>>;

    /// Speaker whose player "plays" until interrupted (or 5s) and logs
    /// each clip with whether it was cut off
    async fn logging_speaker() -> (Speaker, PlayLog) {
        let log: PlayLog = Arc::default();
        let played = Arc::clone(&log);
        let speaker = Speaker::spawn_with(move || {
            Ok(move |audio: &[u8], interrupted: &dyn Fn() -> bool| {
                let start = Instant::now();
                while !interrupted() && start.elapsed() < Duration::from_secs(5) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                played.lock().unwrap().push((audio.to_vec(), interrupted()));
                Ok(())
            })
        })
        .await
        .unwrap();
        (speaker, log)
    }

    async fn wait_for(log: &PlayLog, clip: &[u8]) {
        for _ in 0..400 {
            if log.lock().unwrap().iter().any(|(audio, _)| audio == clip) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("clip {clip:?} never finished");
    }

    #[tokio::test]
    async fn speak_returns_before_playback_ends() {
        let (speaker, log) = logging_speaker().await;

        let begun = Instant::now();
        speaker.speak(b"reply".to_vec());
        assert!(begun.elapsed() < Duration::from_secs(1));
        assert!(log.lock().unwrap().is_empty());

        speaker.interrupt();
        wait_for(&log, b"reply").await;
        assert_eq!(log.lock().unwrap()[0], (b"reply".to_vec(), true));
    }

    #[tokio::test]
    async fn newer_reply_cuts_off_older() {
        let (speaker, log) = logging_speaker().await;

        speaker.speak(b"old".to_vec());
        speaker.speak(b"new".to_vec());
        tokio::time::sleep(Duration::from_millis(50)).await;
        speaker.interrupt();
        wait_for(&log, b"new").await;

        let log = log.lock().unwrap();
        // the old clip is either skipped or cut off, never played through
        assert!(log.iter().filter(|(a, _)| a == b"old").all(|(_, cut)| *cut));
        assert_eq!(log.last().map(|(a, _)| a.as_slice()), Some(&b"new"[..]));
    }

    #[tokio::test]
    async fn failed_open_is_reported() {
        let result = Speaker::spawn_with(|| {
            Err::<fn(&[u8], &dyn Fn() -> bool) -> Result<()>, _>(Error::Audio(
                "no output device available".to_string(),
            ))
        })
        .await;
        assert!(matches!(result, Err(Error::Audio(_))));
    }
}
