//! Fresh install through to a rotating camera preview.

use std::sync::{mpsc::channel, Arc, Mutex};

use cromatico::{
    camera::{
        CaptureBackend, CaptureError, CaptureSessionController, DeviceOrientation, FrameSender,
        PermissionGate, PermissionState, PreviewHost, Rect, ScreenBounds, SessionState,
        SharedPreview, VideoDevice, VideoRotation,
    },
    camera::permission::AccessCallback,
    executor::{Executors, SerialQueue, Task, UiDispatcher},
    router::{LaunchRouter, Screen, DID_LAUNCH_BEFORE},
    settings::{FileSettingsStore, SettingsStore},
};
use tempfile::tempdir;

struct OneCamera;

impl CaptureBackend for OneCamera {
    fn default_video_device(&mut self) -> Option<VideoDevice> {
        Some(VideoDevice {
            id: "0".to_string(),
            label: "back camera".to_string(),
        })
    }

    fn can_add_input(&self, _device: &VideoDevice) -> bool {
        true
    }

    fn add_input(&mut self, _device: &VideoDevice) -> Result<(), CaptureError> {
        Ok(())
    }

    fn start_running(&mut self, _frames: FrameSender) -> Result<(), CaptureError> {
        Ok(())
    }

    fn stop_running(&mut self) {}
}

/// Not yet asked; the user taps "allow".
struct AllowOnPrompt;

impl PermissionGate for AllowOnPrompt {
    fn authorization_status(&self) -> PermissionState {
        PermissionState::NotDetermined
    }

    fn request_access(&self, on_result: AccessCallback) {
        std::thread::spawn(move || on_result(true));
    }
}

struct Screen390x844;

impl ScreenBounds for Screen390x844 {
    fn bounds(&self) -> Rect {
        Rect::from_size(390., 844.)
    }
}

#[derive(Default)]
struct Host(Mutex<Option<SharedPreview>>);

impl PreviewHost for Host {
    fn attach_preview(&self, preview: SharedPreview) {
        *self.0.lock().unwrap() = Some(preview);
    }

    fn capture_unavailable(&self, reason: &CaptureError) {
        panic!("capture unexpectedly unavailable: {reason}");
    }
}

struct Inline;

impl UiDispatcher for Inline {
    fn dispatch(&self, task: Task) {
        task();
    }
}

#[test]
fn first_launch_then_camera_with_rotation() {
    let dir = tempdir().unwrap();
    let settings = dir.path().join("settings.json");

    let store = FileSettingsStore::open(&settings).unwrap();
    let router = LaunchRouter::initialize(&store);
    assert_eq!(router.current_screen(), Screen::Onboarding);
    assert!(store.get_bool(DID_LAUNCH_BEFORE));
    drop(store);

    // Relaunch.
    let store = FileSettingsStore::open(&settings).unwrap();
    let router = LaunchRouter::initialize(&store);
    assert_eq!(router.current_screen(), Screen::Camera);

    let executors = Executors::new(Arc::new(Inline), SerialQueue::new("sessionQueue").unwrap());
    let host = Arc::new(Host::default());
    let (frames, _receiver) = channel();
    let controller = CaptureSessionController::new(
        Box::new(OneCamera),
        Arc::new(AllowOnPrompt),
        Arc::new(Screen390x844),
        host.clone(),
        executors.clone(),
        frames,
    );
    controller.activate();
    executors.background().wait_idle();

    assert_eq!(controller.state(), SessionState::Running);
    let preview = controller.preview().unwrap();
    assert_eq!(preview.rotation(), VideoRotation::Portrait);
    assert_eq!(preview.frame(), Rect::from_size(390., 844.));
    assert!(host.0.lock().unwrap().is_some());

    controller.handle_rotation(DeviceOrientation::LandscapeLeft);
    assert_eq!(controller.preview().unwrap().rotation(), VideoRotation::LandscapeRight);

    controller.handle_rotation(DeviceOrientation::Portrait);
    assert_eq!(controller.preview().unwrap().rotation(), VideoRotation::Portrait);
}

#[test]
fn onboarding_can_route_to_camera_and_back() {
    let dir = tempdir().unwrap();
    let store = FileSettingsStore::open(dir.path().join("settings.json")).unwrap();
    let mut router = LaunchRouter::initialize(&store);

    router.navigate(Screen::Camera);
    assert_eq!(router.current_screen(), Screen::Camera);
    router.navigate(Screen::Onboarding);
    assert_eq!(router.current_screen(), Screen::Onboarding);

    // Navigation is not persisted; the flag alone decides the next launch.
    let relaunched = LaunchRouter::initialize(&FileSettingsStore::open(store.path()).unwrap());
    assert_eq!(relaunched.current_screen(), Screen::Camera);
}
