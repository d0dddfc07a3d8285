use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use super::{
    error::CaptureError,
    orientation::DeviceOrientation,
    permission::{self, PermissionGate},
    preview::{PreviewSurface, Rect},
    session::{CaptureBackend, CaptureSession, FrameSender},
};
use crate::executor::{ExecutionContext, Executors};

pub type SharedPreview = Arc<Mutex<PreviewSurface>>;

/// Current size of the visible screen.
pub trait ScreenBounds: Send + Sync {
    fn bounds(&self) -> Rect;
}

/// The view that hosts the preview. Called on the UI context only.
pub trait PreviewHost: Send + Sync {
    fn attach_preview(&self, preview: SharedPreview);
    fn capture_unavailable(&self, reason: &CaptureError);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unchecked,
    CheckingPermission,
    PermissionGranted,
    PermissionDenied,
    ConfiguringSession,
    Running,
    /// Setup gave up; nothing is attached.
    Unavailable(CaptureError),
}

/// Gates the camera behind the permission check, then configures and runs a
/// single capture session feeding one preview surface.
pub struct CaptureSessionController {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<SessionState>,
    session: Mutex<CaptureSession>,
    preview: Mutex<Option<SharedPreview>>,
    frames: Mutex<FrameSender>,
    gate: Arc<dyn PermissionGate>,
    screen: Arc<dyn ScreenBounds>,
    host: Arc<dyn PreviewHost>,
    executors: Executors,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaptureSessionController {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        gate: Arc<dyn PermissionGate>,
        screen: Arc<dyn ScreenBounds>,
        host: Arc<dyn PreviewHost>,
        executors: Executors,
        frames: FrameSender,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::Unchecked),
                session: Mutex::new(CaptureSession::new(backend)),
                preview: Mutex::new(None),
                frames: Mutex::new(frames),
                gate,
                screen,
                host,
                executors,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.state).clone()
    }

    /// Snapshot of the preview surface, once the session is configured.
    pub fn preview(&self) -> Option<PreviewSurface> {
        let preview = lock(&self.inner.preview).clone()?;
        let surface = lock(&preview).clone();
        Some(surface)
    }

    /// Starts the permission check and, if granted, session setup. Both run on
    /// the background queue. Only the first call has an effect.
    pub fn activate(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Unchecked {
                debug!("capture controller already activated ({:?})", *state);
                return;
            }
            *state = SessionState::CheckingPermission;
        }
        let inner = self.inner.clone();
        self.inner
            .executors
            .run_on(ExecutionContext::Background, move || inner.start());
    }

    /// Resizes the preview to the screen and rotates it for `orientation`.
    /// Ignored unless the session is running.
    pub fn handle_rotation(&self, orientation: DeviceOrientation) {
        if *lock(&self.inner.state) != SessionState::Running {
            debug!("rotation to {orientation:?} ignored, session not running");
            return;
        }
        let Some(preview) = lock(&self.inner.preview).clone() else {
            return;
        };
        let bounds = self.inner.screen.bounds();
        lock(&preview).apply_orientation(bounds, orientation);
    }
}

impl Inner {
    fn set_state(&self, state: SessionState) {
        let mut current = lock(&self.state);
        debug!("capture session {:?} -> {state:?}", *current);
        *current = state;
    }

    fn start(&self) {
        if !permission::resolve_access(self.gate.as_ref()) {
            info!("camera permission denied");
            self.set_state(SessionState::PermissionDenied);
            self.report_unavailable(CaptureError::PermissionDenied);
            return;
        }
        self.set_state(SessionState::PermissionGranted);
        self.configure();
    }

    fn configure(&self) {
        self.set_state(SessionState::ConfiguringSession);
        let mut session = lock(&self.session);
        if let Err(err) = session.bind_default_input() {
            return self.abort(err);
        }

        let preview = Arc::new(Mutex::new(PreviewSurface::new(self.screen.bounds())));
        let frames = lock(&self.frames).clone();
        if let Err(err) = session.start_running(frames) {
            return self.abort(err);
        }
        *lock(&self.preview) = Some(preview.clone());
        self.set_state(SessionState::Running);

        let host = self.host.clone();
        self.executors
            .run_on(ExecutionContext::Ui, move || host.attach_preview(preview));
    }

    fn abort(&self, err: CaptureError) {
        warn!("capture setup aborted: {err}");
        self.set_state(SessionState::Unavailable(err.clone()));
        self.report_unavailable(err);
    }

    fn report_unavailable(&self, err: CaptureError) {
        let host = self.host.clone();
        self.executors
            .run_on(ExecutionContext::Ui, move || host.capture_unavailable(&err));
    }
}
