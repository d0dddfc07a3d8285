use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc::{channel, Receiver, Sender},
    Arc, Mutex,
};

use super::{
    controller::{PreviewHost, ScreenBounds, SharedPreview},
    error::CaptureError,
    permission::{AccessCallback, PermissionGate, PermissionState},
    preview::Rect,
    session::{CaptureBackend, FrameSender, VideoDevice},
};
use crate::executor::{Task, UiDispatcher};

#[derive(Clone, Default)]
pub struct BackendProbe {
    device_queries: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl BackendProbe {
    pub fn device_queries(&self) -> usize {
        self.device_queries.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct FakeBackend {
    pub device: Option<VideoDevice>,
    pub accepts_input: bool,
    pub start_error: Option<CaptureError>,
    probe: BackendProbe,
}

impl FakeBackend {
    pub fn new() -> (Self, BackendProbe) {
        let probe = BackendProbe::default();
        let backend = Self {
            device: Some(VideoDevice {
                id: "fake-0".to_string(),
                label: "Fake camera".to_string(),
            }),
            accepts_input: true,
            start_error: None,
            probe: probe.clone(),
        };
        (backend, probe)
    }
}

impl CaptureBackend for FakeBackend {
    fn default_video_device(&mut self) -> Option<VideoDevice> {
        self.probe.device_queries.fetch_add(1, Ordering::SeqCst);
        self.device.clone()
    }

    fn can_add_input(&self, _device: &VideoDevice) -> bool {
        self.accepts_input
    }

    fn add_input(&mut self, _device: &VideoDevice) -> Result<(), CaptureError> {
        Ok(())
    }

    fn start_running(&mut self, _frames: FrameSender) -> Result<(), CaptureError> {
        if let Some(err) = self.start_error.clone() {
            return Err(err);
        }
        self.probe.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_running(&mut self) {
        self.probe.stopped.store(true, Ordering::SeqCst);
    }
}

/// Gate with a fixed status whose prompts are handed to the test to answer.
pub struct ScriptedGate {
    state: PermissionState,
    prompts: Mutex<Sender<AccessCallback>>,
}

impl ScriptedGate {
    pub fn new(state: PermissionState) -> (Self, Receiver<AccessCallback>) {
        let (sender, receiver) = channel();
        let gate = Self {
            state,
            prompts: Mutex::new(sender),
        };
        (gate, receiver)
    }
}

impl PermissionGate for ScriptedGate {
    fn authorization_status(&self) -> PermissionState {
        self.state
    }

    fn request_access(&self, on_result: AccessCallback) {
        let _ = self.prompts.lock().unwrap().send(on_result);
    }
}

pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn dispatch(&self, task: Task) {
        task();
    }
}

pub struct FixedBounds(pub Mutex<Rect>);

impl ScreenBounds for FixedBounds {
    fn bounds(&self) -> Rect {
        *self.0.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingHost {
    pub attached: Mutex<Vec<SharedPreview>>,
    pub unavailable: Mutex<Vec<CaptureError>>,
}

impl PreviewHost for RecordingHost {
    fn attach_preview(&self, preview: SharedPreview) {
        self.attached.lock().unwrap().push(preview);
    }

    fn capture_unavailable(&self, reason: &CaptureError) {
        self.unavailable.lock().unwrap().push(reason.clone());
    }
}
