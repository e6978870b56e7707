//! Take lifecycle: start, pump, stop, poll

use flume::{Receiver, Sender};
use rtrb::Consumer;
use tempfile::TempDir;

use super::artifact::{Artifact, ArtifactFormat};
use super::format::encode;
use super::transcode::{spawn_transcode, TranscodeOutcome};
use super::{ContainerFormat, RecorderError};
use crate::config::RecordingConfig;
use crate::notify::Notifier;
use crate::types::Sample;

pub const NO_AUDIO_CAPTURED: &str = "No audio captured";

/// Recorder tap size: four seconds of 48 kHz stereo
pub const RECORDER_TAP_CAPACITY: usize = 48_000 * 2 * 4;

/// What the recorder tells the UI
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Started(ContainerFormat),
    /// The compressed artifact is ready for download
    CompressedReady { size: u64 },
    /// The WAV conversion finished
    WavReady { size: u64 },
    WavFailed(String),
    /// The take was discarded without artifacts
    Aborted,
}

pub struct Recorder {
    preference: Vec<ContainerFormat>,
    sample_rate: u32,
    channels: u16,
    dir: TempDir,
    tap: Option<Consumer<Sample>>,
    format: Option<ContainerFormat>,
    capture: Vec<Sample>,
    /// Bumped on every start and abort; older transcodes are stale
    generation: u64,
    compressed: Option<Artifact>,
    wav: Option<Artifact>,
    transcode_tx: Sender<TranscodeOutcome>,
    transcode_rx: Receiver<TranscodeOutcome>,
    transcoding: bool,
    events: Sender<RecorderEvent>,
    notifier: Notifier,
}

impl Recorder {
    pub fn new(
        config: &RecordingConfig,
        sample_rate: u32,
        channels: u16,
        notifier: Notifier,
    ) -> Result<(Self, Receiver<RecorderEvent>), RecorderError> {
        let dir = tempfile::Builder::new().prefix("promptdj-").tempdir()?;
        log::debug!("Recorder: artifacts in {:?}", dir.path());
        let (transcode_tx, transcode_rx) = flume::unbounded();
        let (events, events_rx) = flume::unbounded();

        let recorder = Self {
            preference: config.format_preference.clone(),
            sample_rate,
            channels,
            dir,
            tap: None,
            format: None,
            capture: Vec::new(),
            generation: 0,
            compressed: None,
            wav: None,
            transcode_tx,
            transcode_rx,
            transcoding: false,
            events,
            notifier,
        };
        Ok((recorder, events_rx))
    }

    pub fn is_recording(&self) -> bool {
        self.format.is_some()
    }

    /// A WAV conversion is in flight
    pub fn is_transcoding(&self) -> bool {
        self.transcoding
    }

    /// Format of the running take
    pub fn format(&self) -> Option<ContainerFormat> {
        self.format
    }

    /// Samples captured so far (interleaved)
    pub fn captured_samples(&self) -> usize {
        self.capture.len()
    }

    pub fn compressed(&self) -> Option<&Artifact> {
        self.compressed.as_ref()
    }

    pub fn wav(&self) -> Option<&Artifact> {
        self.wav.as_ref()
    }

    /// Begin a take reading from `tap`
    ///
    /// Releases the previous take's artifacts and invalidates any conversion
    /// still running for it.
    pub fn start(&mut self, tap: Consumer<Sample>) -> Result<ContainerFormat, RecorderError> {
        if self.is_recording() {
            return Err(RecorderError::AlreadyRecording);
        }
        let format =
            ContainerFormat::negotiate(&self.preference).ok_or(RecorderError::NoSupportedFormat)?;

        self.release_artifacts();
        self.generation += 1;
        self.transcoding = false;
        self.capture.clear();
        self.tap = Some(tap);
        self.format = Some(format);

        log::info!(
            "Recorder: take {} started ({:?})",
            self.generation,
            format
        );
        self.publish(RecorderEvent::Started(format));
        Ok(format)
    }

    /// Move everything waiting in the tap into the capture buffer
    pub fn pump(&mut self) {
        if let Some(tap) = self.tap.as_mut() {
            let available = tap.slots();
            if let Ok(chunk) = tap.read_chunk(available) {
                self.capture.extend(chunk);
            }
        }
    }

    /// Finish the take
    ///
    /// Publishes the compressed artifact immediately and starts the WAV
    /// conversion. An empty take produces a notice and no artifacts.
    pub fn stop(&mut self) -> Result<(), RecorderError> {
        let format = self.format.ok_or(RecorderError::NotRecording)?;
        self.pump();
        self.tap = None;
        self.format = None;
        let samples = std::mem::take(&mut self.capture);

        if samples.is_empty() {
            log::info!("Recorder: take {} captured nothing", self.generation);
            self.notifier.info(NO_AUDIO_CAPTURED);
            return Ok(());
        }

        let encoded = encode(format, &samples, self.sample_rate, self.channels)?;
        let stem = format!("take-{}", self.generation);
        let path = self.dir.path().join(format!("{}.{}", stem, format.extension()));
        let artifact = Artifact::write(path, ArtifactFormat::Compressed(format), &encoded)?;
        let size = artifact.size();
        self.compressed = Some(artifact);
        log::info!(
            "Recorder: take {} encoded, {} samples → {} bytes",
            self.generation,
            samples.len(),
            size
        );
        self.publish(RecorderEvent::CompressedReady { size });

        let dest = self.dir.path().join(format!("{}.wav", stem));
        spawn_transcode(
            self.generation,
            encoded,
            format,
            dest,
            self.transcode_tx.clone(),
        )?;
        self.transcoding = true;
        Ok(())
    }

    /// Pick up finished conversions
    pub fn poll(&mut self) {
        while let Ok(outcome) = self.transcode_rx.try_recv() {
            if outcome.generation != self.generation {
                log::debug!(
                    "Recorder: ignoring stale transcode for take {}",
                    outcome.generation
                );
                continue;
            }
            self.transcoding = false;
            match outcome.result {
                Ok(artifact) => {
                    let size = artifact.size();
                    self.wav = Some(artifact);
                    self.publish(RecorderEvent::WavReady { size });
                }
                Err(e) => {
                    self.notifier.error(format!("WAV conversion failed: {}", e));
                    self.publish(RecorderEvent::WavFailed(e.to_string()));
                }
            }
        }
    }

    /// Discard the take being captured without producing artifacts
    ///
    /// A take that was already stopped keeps its artifacts and its pending
    /// WAV conversion.
    pub fn abort(&mut self) {
        if !self.is_recording() {
            return;
        }
        log::info!("Recorder: take {} aborted", self.generation);
        self.tap = None;
        self.format = None;
        self.capture.clear();
        self.publish(RecorderEvent::Aborted);
    }

    /// Delete the current artifacts
    pub fn release_artifacts(&mut self) {
        self.compressed = None;
        self.wav = None;
    }

    fn publish(&self, event: RecorderEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Recorder: event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notice;
    use std::time::{Duration, Instant};

    fn recorder(preference: Vec<ContainerFormat>) -> (Recorder, Receiver<RecorderEvent>, Receiver<Notice>) {
        let (notifier, notices) = Notifier::channel(Duration::from_millis(4000));
        let config = RecordingConfig {
            format_preference: preference,
        };
        let (recorder, events) = Recorder::new(&config, 48000, 2, notifier).unwrap();
        (recorder, events, notices)
    }

    fn feed(tap: &mut rtrb::Producer<f32>, frames: usize) {
        for i in 0..frames {
            let s = (i as f32 * 0.05).sin() * 0.3;
            tap.push(s).unwrap();
            tap.push(s).unwrap();
        }
    }

    fn wait_for_wav(recorder: &mut Recorder) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while recorder.is_transcoding() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            recorder.poll();
        }
    }

    #[test]
    fn test_take_produces_both_artifacts() {
        let (mut recorder, events, _) = recorder(vec![ContainerFormat::Flac]);
        let (mut tx, rx) = rtrb::RingBuffer::new(RECORDER_TAP_CAPACITY);

        assert_eq!(recorder.start(rx).unwrap(), ContainerFormat::Flac);
        feed(&mut tx, 2400);
        recorder.pump();
        feed(&mut tx, 2400);
        recorder.stop().unwrap();

        let compressed = recorder.compressed().unwrap();
        assert!(compressed.path().exists());
        assert_eq!(compressed.format(), ArtifactFormat::Compressed(ContainerFormat::Flac));

        wait_for_wav(&mut recorder);
        let wav = recorder.wav().unwrap();
        let reader = hound::WavReader::open(wav.path()).unwrap();
        assert_eq!(reader.len(), 4800 * 2);

        let events: Vec<_> = events.drain().collect();
        assert_eq!(events[0], RecorderEvent::Started(ContainerFormat::Flac));
        assert!(matches!(events[1], RecorderEvent::CompressedReady { .. }));
        assert!(matches!(events[2], RecorderEvent::WavReady { .. }));
    }

    #[test]
    fn test_empty_take_notifies() {
        let (mut recorder, _, notices) = recorder(vec![ContainerFormat::Flac]);
        let (_tx, rx) = rtrb::RingBuffer::<f32>::new(16);

        recorder.start(rx).unwrap();
        recorder.stop().unwrap();

        assert!(recorder.compressed().is_none());
        assert!(!recorder.is_transcoding());
        assert_eq!(notices.try_recv().unwrap().message, NO_AUDIO_CAPTURED);
    }

    #[test]
    fn test_no_supported_format() {
        let (mut recorder, _, _) = recorder(vec![]);
        let (_tx, rx) = rtrb::RingBuffer::<f32>::new(16);
        assert!(matches!(
            recorder.start(rx),
            Err(RecorderError::NoSupportedFormat)
        ));
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_restart_releases_previous_take() {
        let (mut recorder, _, _) = recorder(vec![ContainerFormat::Flac]);
        let (mut tx, rx) = rtrb::RingBuffer::new(RECORDER_TAP_CAPACITY);
        recorder.start(rx).unwrap();
        feed(&mut tx, 1000);
        recorder.stop().unwrap();
        wait_for_wav(&mut recorder);
        let old_compressed = recorder.compressed().unwrap().path().to_path_buf();
        let old_wav = recorder.wav().unwrap().path().to_path_buf();

        let (_tx, rx) = rtrb::RingBuffer::<f32>::new(16);
        recorder.start(rx).unwrap();

        assert!(!old_compressed.exists());
        assert!(!old_wav.exists());
        assert!(recorder.compressed().is_none());
    }

    #[test]
    fn test_stale_transcode_is_ignored() {
        let (mut recorder, events, _) = recorder(vec![ContainerFormat::Flac]);
        let (mut tx, rx) = rtrb::RingBuffer::new(RECORDER_TAP_CAPACITY);
        recorder.start(rx).unwrap();
        feed(&mut tx, 1000);
        recorder.stop().unwrap();

        // a new take begins before the conversion lands
        let (_tx2, rx2) = rtrb::RingBuffer::<f32>::new(16);
        recorder.start(rx2).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        recorder.poll();

        assert!(recorder.wav().is_none());
        assert!(!events.drain().any(|e| matches!(e, RecorderEvent::WavReady { .. })));
    }

    #[test]
    fn test_abort_discards_capture() {
        let (mut recorder, events, _) = recorder(vec![ContainerFormat::Flac]);
        let (mut tx, rx) = rtrb::RingBuffer::new(RECORDER_TAP_CAPACITY);
        recorder.start(rx).unwrap();
        feed(&mut tx, 1000);
        recorder.pump();

        recorder.abort();

        assert!(!recorder.is_recording());
        assert_eq!(recorder.captured_samples(), 0);
        assert!(recorder.compressed().is_none());
        assert!(events.drain().any(|e| e == RecorderEvent::Aborted));
        assert!(matches!(recorder.stop(), Err(RecorderError::NotRecording)));
    }

    #[test]
    fn test_abort_after_stop_keeps_conversion() {
        let (mut recorder, events, _) = recorder(vec![ContainerFormat::Flac]);
        let (mut tx, rx) = rtrb::RingBuffer::new(RECORDER_TAP_CAPACITY);
        recorder.start(rx).unwrap();
        feed(&mut tx, 2400);
        recorder.stop().unwrap();
        assert!(recorder.is_transcoding());

        // a later error stop finds nothing being captured
        recorder.abort();
        wait_for_wav(&mut recorder);

        assert!(recorder.compressed().is_some());
        assert!(recorder.wav().is_some());
        let events: Vec<_> = events.drain().collect();
        assert!(!events.contains(&RecorderEvent::Aborted));
        assert!(events.iter().any(|e| matches!(e, RecorderEvent::WavReady { .. })));
    }
}
