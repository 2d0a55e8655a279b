//! Microphone to VAD wiring
//!
//! The bridge attaches one fan-out sink to an open [`AudioSource`]: every frame
//! goes to the VAD worker and to the chunk recorder. Nothing is ever played
//! back.

use std::sync::{Arc, Mutex};

use super::capture::{AudioSource, FrameSink, StreamFormat};
use super::recorder::ChunkRecorder;
use super::vad::{VadConfig, VadInput, VadListener, VadWorker};
use crate::Result;

/// Who owns the audio source
pub enum SourceHandle {
    /// Opened for this bridge; closed on teardown
    Local(Box<dyn AudioSource>),
    /// Owned by the caller; only detached on teardown
    Caller(Arc<Mutex<Box<dyn AudioSource>>>),
}

impl SourceHandle {
    fn with<R>(&mut self, f: impl FnOnce(&mut dyn AudioSource) -> R) -> Option<R> {
        match self {
            Self::Local(source) => Some(f(source.as_mut())),
            Self::Caller(shared) => shared.lock().ok().map(|mut s| f(s.as_mut())),
        }
    }

    fn format(&self) -> Option<StreamFormat> {
        match self {
            Self::Local(source) => Some(source.format()),
            Self::Caller(shared) => shared.lock().ok().map(|source| source.format()),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            Self::Local(source) => source.is_active(),
            Self::Caller(shared) => shared.lock().is_ok_and(|source| source.is_active()),
        }
    }

    fn detach(&mut self) {
        match self {
            Self::Local(source) => source.detach(),
            Self::Caller(shared) => {
                if let Ok(mut source) = shared.lock() {
                    source.detach();
                }
            }
        }
    }
}

/// Live capture graph: source, VAD worker, recorder
pub struct AudioBridge {
    source: Option<SourceHandle>,
    vad: Option<VadWorker>,
    recorder: ChunkRecorder,
    format: StreamFormat,
}

impl std::fmt::Debug for AudioBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBridge")
            .field("format", &self.format)
            .field("vad", &self.vad.is_some())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl AudioBridge {
    /// Wire `source` to the recorder and, when `vad` is given, a VAD worker
    ///
    /// A VAD worker that fails to start is logged and left out; the bridge
    /// then runs without speech events.
    #[must_use]
    pub fn start(
        mut source: SourceHandle,
        vad: Option<(VadConfig, Box<dyn VadListener>)>,
        recorder: ChunkRecorder,
    ) -> Self {
        let format = source.format().unwrap_or(StreamFormat {
            sample_rate: super::SAMPLE_RATE,
            channels: 1,
        });

        let vad = vad.and_then(|(config, listener)| {
            VadWorker::spawn(config, format.sample_rate, listener)
                .inspect_err(|e| tracing::warn!(error = %e, "vad unavailable, using manual chunks"))
                .ok()
        });

        let frames = vad.as_ref().map(VadWorker::frames);
        let sink_recorder = recorder.clone();
        let sink: FrameSink = Box::new(move |frame: &[f32]| {
            sink_recorder.push(frame);
            if let Some(tx) = &frames {
                let _ = tx.send(VadInput::Frame(frame.to_vec()));
            }
        });
        source.with(|s| s.attach(sink));

        tracing::debug!(
            sample_rate = format.sample_rate,
            vad = vad.is_some(),
            "audio bridge started"
        );

        Self {
            source: Some(source),
            vad,
            recorder,
            format,
        }
    }

    /// Whether VAD events will arrive
    #[must_use]
    pub const fn has_vad(&self) -> bool {
        self.vad.is_some()
    }

    /// Stream format
    #[must_use]
    pub const fn format(&self) -> StreamFormat {
        self.format
    }

    /// Recorder fed by this bridge
    #[must_use]
    pub const fn recorder(&self) -> &ChunkRecorder {
        &self.recorder
    }

    /// Whether the source still produces audio
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.source.as_ref().is_some_and(SourceHandle::is_active)
    }

    /// Retune the VAD worker
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or the worker has exited
    pub fn configure_vad(&self, config: VadConfig) -> Result<()> {
        match &self.vad {
            Some(worker) => worker.configure(config),
            None => config.validate(),
        }
    }

    /// Release the graph; repeated calls are no-ops
    pub fn teardown(&mut self) {
        if let Some(mut worker) = self.vad.take() {
            worker.shutdown();
        }

        match self.source.take() {
            Some(SourceHandle::Local(mut source)) => {
                source.detach();
                source.close();
                tracing::debug!("audio bridge closed source");
            }
            Some(mut caller @ SourceHandle::Caller(_)) => {
                caller.detach();
                tracing::debug!("audio bridge detached from caller source");
            }
            None => {}
        }
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        sink: Option<FrameSink>,
        closed: Arc<AtomicBool>,
        detaches: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn feed(&mut self, frame: &[f32]) {
            if let Some(sink) = self.sink.as_mut() {
                sink(frame);
            }
        }
    }

    impl AudioSource for FakeSource {
        fn format(&self) -> StreamFormat {
            StreamFormat {
                sample_rate: 16000,
                channels: 1,
            }
        }

        fn attach(&mut self, sink: FrameSink) {
            self.sink = Some(sink);
        }

        fn detach(&mut self) {
            self.sink = None;
            self.detaches.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_local_source_closed_once() {
        let fake = FakeSource::default();
        let closed = Arc::clone(&fake.closed);
        let detaches = Arc::clone(&fake.detaches);

        let mut bridge = AudioBridge::start(
            SourceHandle::Local(Box::new(fake)),
            None,
            ChunkRecorder::new(),
        );
        assert!(bridge.is_active());
        assert!(!bridge.has_vad());

        bridge.teardown();
        bridge.teardown();
        drop(bridge);

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(detaches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_caller_source_left_open() {
        let fake = FakeSource::default();
        let closed = Arc::clone(&fake.closed);
        let shared: Arc<Mutex<Box<dyn AudioSource>>> = Arc::new(Mutex::new(Box::new(fake)));

        let bridge = AudioBridge::start(
            SourceHandle::Caller(Arc::clone(&shared)),
            None,
            ChunkRecorder::new(),
        );
        drop(bridge);

        assert!(!closed.load(Ordering::SeqCst));
        assert!(shared.lock().unwrap().is_active());
    }

    #[test]
    fn test_caller_source_format_and_detach() {
        let fake = FakeSource::default();
        let detaches = Arc::clone(&fake.detaches);
        let shared: Arc<Mutex<Box<dyn AudioSource>>> = Arc::new(Mutex::new(Box::new(fake)));

        let mut bridge = AudioBridge::start(
            SourceHandle::Caller(Arc::clone(&shared)),
            None,
            ChunkRecorder::new(),
        );
        assert_eq!(bridge.format().sample_rate, 16000);
        assert!(bridge.is_active());

        bridge.teardown();
        assert!(!bridge.is_active());
        assert_eq!(detaches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frames_reach_recorder() {
        let recorder = ChunkRecorder::new();
        let shared = Arc::new(Mutex::new(FakeSource::default()));

        // Drive the sink through a caller-owned source
        let source: Arc<Mutex<Box<dyn AudioSource>>> =
            Arc::new(Mutex::new(Box::new(SharedSource(Arc::clone(&shared)))));
        let _bridge = AudioBridge::start(SourceHandle::Caller(source), None, recorder.clone());

        recorder.start();
        shared.lock().unwrap().feed(&[0.25; 160]);
        assert_eq!(recorder.stop().len(), 160);
    }

    struct SharedSource(Arc<Mutex<FakeSource>>);

    impl AudioSource for SharedSource {
        fn format(&self) -> StreamFormat {
            self.0.lock().unwrap().format()
        }

        fn attach(&mut self, sink: FrameSink) {
            self.0.lock().unwrap().attach(sink);
        }

        fn detach(&mut self) {
            self.0.lock().unwrap().detach();
        }

        fn close(&mut self) {
            self.0.lock().unwrap().close();
        }

        fn is_active(&self) -> bool {
            self.0.lock().unwrap().is_active()
        }
    }
}
