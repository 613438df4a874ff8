//! Push-to-talk capture controller.
//!
//! Drives a [`Recorder`] through the [`StateMachine`]: press starts a
//! recording, release stops it once the minimum length is reached and hands
//! the audio to an [`AudioUploader`]. Only one recording is live at a time.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use convtax_core::config::CaptureConfig;
use convtax_core::types::Platform;

use crate::error::ClientError;
use crate::state::{CaptureState, StateMachine};

/// A finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAudio {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. "amr" or "wav".
    pub extension: String,
}

/// Platform microphone access.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Ask the user for recording permission. Returns whether it was granted.
    async fn request_permission(&self) -> Result<bool, ClientError>;

    /// Prepare and start a new recording.
    async fn start(&self) -> Result<Box<dyn Recording>, ClientError>;
}

/// A running recording.
#[async_trait]
pub trait Recording: Send {
    /// Length recorded so far, as reported by the recorder.
    async fn duration(&mut self) -> Result<Duration, ClientError>;

    /// Stop recording and release the device.
    async fn stop(&mut self) -> Result<RecordedAudio, ClientError>;

    /// Detach the status-update callback.
    fn unsubscribe(&mut self);
}

/// Sends a recording to the server and returns the reply text.
#[async_trait]
pub trait AudioUploader: Send + Sync {
    async fn upload_audio(
        &self,
        user_id: &str,
        platform: Platform,
        audio: &RecordedAudio,
    ) -> Result<String, ClientError>;
}

/// Owns the capture state and the single live recording.
pub struct CaptureController<R, U> {
    recorder: R,
    uploader: U,
    user_id: String,
    platform: Platform,
    machine: StateMachine,
    recording: Mutex<Option<Box<dyn Recording>>>,
    min_recording: Duration,
    release_retry: Duration,
}

impl<R: Recorder, U: AudioUploader> CaptureController<R, U> {
    pub fn new(
        recorder: R,
        uploader: U,
        user_id: impl Into<String>,
        platform: Platform,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            recorder,
            uploader,
            user_id: user_id.into(),
            platform,
            machine: StateMachine::new(),
            recording: Mutex::new(None),
            min_recording: Duration::from_millis(config.min_recording_ms),
            release_retry: Duration::from_millis(config.release_retry_ms.max(1)),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.machine.current()
    }

    /// Request recording permission once, when the button is mounted.
    pub async fn mount(&self) -> Result<bool, ClientError> {
        if self.machine.current() != CaptureState::Uninitialized {
            return Ok(true);
        }
        let granted = self.recorder.request_permission().await?;
        if granted {
            self.machine.transition(CaptureState::Waiting)?;
            info!("Recording permission granted");
        } else {
            warn!("Recording permission denied");
        }
        Ok(granted)
    }

    /// Button pressed: start a new recording.
    pub async fn press(&self) -> Result<(), ClientError> {
        match self.machine.current() {
            CaptureState::Uninitialized => return Err(ClientError::PermissionDenied),
            state if !state.accepts_press() => {
                return Err(ClientError::InvalidState(format!("press while {}", state)))
            }
            _ => {}
        }
        self.machine.transition(CaptureState::Starting)?;

        let recording = match self.recorder.start().await {
            Ok(recording) => recording,
            Err(e) => {
                self.machine.recover();
                return Err(e);
            }
        };
        *self.slot()? = Some(recording);
        self.machine.transition(CaptureState::Recording)?;
        debug!("Recording started");
        Ok(())
    }

    /// Button released: stop, upload and return the server reply.
    ///
    /// A release that arrives while the recorder is still starting is retried
    /// until the recording is active. Recordings shorter than the minimum
    /// length keep running until it is reached.
    pub async fn release(&self) -> Result<String, ClientError> {
        loop {
            match self.machine.current() {
                CaptureState::Starting => tokio::time::sleep(self.release_retry).await,
                CaptureState::Recording => break,
                other => {
                    return Err(ClientError::InvalidState(format!("release while {}", other)))
                }
            }
        }
        self.machine.transition(CaptureState::Processing)?;

        match self.finish().await {
            Ok(text) => {
                self.machine.transition(CaptureState::Waiting)?;
                info!(reply_len = text.len(), "Recording processed");
                Ok(text)
            }
            Err(e) => {
                warn!(error = %e, "Recording failed");
                self.teardown();
                self.machine.recover();
                Err(e)
            }
        }
    }

    async fn finish(&self) -> Result<String, ClientError> {
        let mut recording = self
            .slot()?
            .take()
            .ok_or_else(|| ClientError::InvalidState("no live recording".to_string()))?;

        let stopped = async {
            let recorded = recording.duration().await?;
            if recorded < self.min_recording {
                let remaining = self.min_recording - recorded;
                debug!(remaining_ms = remaining.as_millis() as u64, "Holding short recording");
                tokio::time::sleep(remaining).await;
            }
            recording.stop().await
        }
        .await;
        recording.unsubscribe();
        drop(recording);

        let audio = stopped?;
        self.uploader
            .upload_audio(&self.user_id, self.platform, &audio)
            .await
    }

    fn teardown(&self) {
        if let Ok(mut slot) = self.recording.lock() {
            if let Some(mut recording) = slot.take() {
                recording.unsubscribe();
            }
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Box<dyn Recording>>>, ClientError> {
        self.recording
            .lock()
            .map_err(|e| ClientError::Recorder(format!("recording slot poisoned: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Probe {
        started: AtomicUsize,
        stopped: AtomicUsize,
        unsubscribed: AtomicUsize,
        stopped_after: Mutex<Option<Duration>>,
    }

    struct FakeRecorder {
        grant: bool,
        start_delay: Duration,
        fail_stop: bool,
        probe: Arc<Probe>,
    }

    struct FakeRecording {
        started_at: Instant,
        fail_stop: bool,
        probe: Arc<Probe>,
    }

    #[async_trait]
    impl Recorder for FakeRecorder {
        async fn request_permission(&self) -> Result<bool, ClientError> {
            Ok(self.grant)
        }

        async fn start(&self) -> Result<Box<dyn Recording>, ClientError> {
            tokio::time::sleep(self.start_delay).await;
            self.probe.started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeRecording {
                started_at: Instant::now(),
                fail_stop: self.fail_stop,
                probe: self.probe.clone(),
            }))
        }
    }

    #[async_trait]
    impl Recording for FakeRecording {
        async fn duration(&mut self) -> Result<Duration, ClientError> {
            Ok(self.started_at.elapsed())
        }

        async fn stop(&mut self) -> Result<RecordedAudio, ClientError> {
            *self.probe.stopped_after.lock().unwrap() = Some(self.started_at.elapsed());
            self.probe.stopped.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(ClientError::Recorder("device lost".to_string()));
            }
            Ok(RecordedAudio {
                bytes: vec![1, 2, 3],
                extension: "amr".to_string(),
            })
        }

        fn unsubscribe(&mut self) {
            self.probe.unsubscribed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        fail: AtomicBool,
        uploads: Mutex<Vec<(String, Platform, RecordedAudio)>>,
    }

    #[async_trait]
    impl AudioUploader for Arc<FakeUploader> {
        async fn upload_audio(
            &self,
            user_id: &str,
            platform: Platform,
            audio: &RecordedAudio,
        ) -> Result<String, ClientError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ClientError::Http("connection refused".to_string()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((user_id.to_string(), platform, audio.clone()));
            Ok("Verstanden.".to_string())
        }
    }

    fn controller(
        grant: bool,
        start_delay: Duration,
        fail_stop: bool,
    ) -> (
        CaptureController<FakeRecorder, Arc<FakeUploader>>,
        Arc<Probe>,
        Arc<FakeUploader>,
    ) {
        let probe = Arc::new(Probe::default());
        let uploader = Arc::new(FakeUploader::default());
        let recorder = FakeRecorder {
            grant,
            start_delay,
            fail_stop,
            probe: probe.clone(),
        };
        let controller = CaptureController::new(
            recorder,
            uploader.clone(),
            "u1",
            Platform::Android,
            &CaptureConfig::default(),
        );
        (controller, probe, uploader)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_without_permission_offers_no_recording() {
        let (controller, probe, _) = controller(false, Duration::ZERO, false);
        assert!(!controller.mount().await.unwrap());
        assert_eq!(controller.state(), CaptureState::Uninitialized);

        let err = controller.press().await.unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied));
        assert_eq!(probe.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_returns_to_waiting() {
        let (controller, probe, uploader) = controller(true, Duration::ZERO, false);
        assert!(controller.mount().await.unwrap());
        assert_eq!(controller.state(), CaptureState::Waiting);

        controller.press().await.unwrap();
        assert_eq!(controller.state(), CaptureState::Recording);

        tokio::time::sleep(Duration::from_millis(800)).await;
        let reply = controller.release().await.unwrap();

        assert_eq!(reply, "Verstanden.");
        assert_eq!(controller.state(), CaptureState::Waiting);
        assert_eq!(probe.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(probe.unsubscribed.load(Ordering::SeqCst), 1);

        let uploads = uploader.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "u1");
        assert_eq!(uploads[0].1, Platform::Android);
        assert_eq!(uploads[0].2.extension, "amr");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_recording_is_held_to_minimum() {
        let (controller, probe, _) = controller(true, Duration::ZERO, false);
        controller.mount().await.unwrap();

        controller.press().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.release().await.unwrap();

        let stopped_after = probe.stopped_after.lock().unwrap().unwrap();
        assert!(stopped_after >= Duration::from_millis(500));
        assert!(stopped_after < Duration::from_millis(520));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_during_start_is_retried() {
        let (controller, probe, _) = controller(true, Duration::from_millis(150), false);
        controller.mount().await.unwrap();

        let (pressed, released) = tokio::join!(controller.press(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(controller.state(), CaptureState::Starting);
            controller.release().await
        });

        pressed.unwrap();
        assert_eq!(released.unwrap(), "Verstanden.");
        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
        assert_eq!(probe.stopped.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), CaptureState::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_press_while_recording_is_rejected() {
        let (controller, probe, _) = controller(true, Duration::ZERO, false);
        controller.mount().await.unwrap();
        controller.press().await.unwrap();

        let err = controller.press().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
        assert_eq!(probe.started.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), CaptureState::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_without_press_is_rejected() {
        let (controller, _, _) = controller(true, Duration::ZERO, false);
        controller.mount().await.unwrap();
        let err = controller.release().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
        assert_eq!(controller.state(), CaptureState::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_tears_down_and_recovers() {
        let (controller, probe, uploader) = controller(true, Duration::ZERO, true);
        controller.mount().await.unwrap();
        controller.press().await.unwrap();

        let err = controller.release().await.unwrap_err();
        assert!(matches!(err, ClientError::Recorder(_)));
        assert_eq!(controller.state(), CaptureState::Waiting);
        assert_eq!(probe.unsubscribed.load(Ordering::SeqCst), 1);
        assert!(uploader.uploads.lock().unwrap().is_empty());

        // A new recording can start right away.
        controller.press().await.unwrap();
        assert_eq!(probe.started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_failure_recovers() {
        let (controller, probe, uploader) = controller(true, Duration::ZERO, false);
        uploader.fail.store(true, Ordering::SeqCst);
        controller.mount().await.unwrap();
        controller.press().await.unwrap();

        let err = controller.release().await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert_eq!(controller.state(), CaptureState::Waiting);
        assert_eq!(probe.unsubscribed.load(Ordering::SeqCst), 1);
    }
}
