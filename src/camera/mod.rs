#[cfg(target_os = "android")]
use std::time::Duration;
use std::sync::Arc;

use crate::config::AppConfig;

#[cfg(target_os = "android")]
mod android;
#[cfg(target_os = "android")]
mod camera2;
#[cfg(target_os = "windows")]
mod pcam;
#[cfg(test)]
pub(crate) mod testing;

pub mod controller;
pub mod error;
pub mod orientation;
pub mod permission;
pub mod preview;
pub mod session;

#[cfg(target_os = "android")]
pub use android::files_dir;
pub use controller::{CaptureSessionController, PreviewHost, ScreenBounds, SessionState, SharedPreview};
pub use error::CaptureError;
pub use orientation::{DeviceOrientation, OrientationSource, VideoRotation};
pub use permission::{PermissionGate, PermissionState};
pub use preview::{PreviewSurface, Rect};
pub use session::{CaptureBackend, FrameOutlet, FrameSender, VideoDevice};

/// Backend for platforms without a supported camera API: it never finds a device.
pub struct NoCameraBackend;

impl CaptureBackend for NoCameraBackend {
    fn default_video_device(&mut self) -> Option<VideoDevice> {
        None
    }

    fn can_add_input(&self, _device: &VideoDevice) -> bool {
        false
    }

    fn add_input(&mut self, device: &VideoDevice) -> Result<(), CaptureError> {
        Err(CaptureError::InputRejected(device.id.clone()))
    }

    fn start_running(&mut self, _frames: FrameSender) -> Result<(), CaptureError> {
        Err(CaptureError::NoInput)
    }

    fn stop_running(&mut self) {}
}

pub fn default_backend(config: &AppConfig) -> Box<dyn CaptureBackend> {
    #[cfg(target_os = "android")]
    return Box::new(camera2::AndroidCamera::new(config.preview_width, config.preview_height));
    #[cfg(target_os = "windows")]
    return Box::new(pcam::Camera::new(config.camera_index));
    #[cfg(not(any(target_os = "android", target_os = "windows")))]
    {
        log::warn!("no camera backend for this platform (camera {})", config.camera_index);
        Box::new(NoCameraBackend)
    }
}

pub fn default_permission_gate(
    #[cfg(target_os = "android")] app: &slint::android::AndroidApp,
    config: &AppConfig,
) -> Arc<dyn PermissionGate> {
    #[cfg(target_os = "android")]
    return Arc::new(android::AndroidPermissionGate::new(
        app.clone(),
        Duration::from_millis(config.permission_poll_ms),
        Duration::from_millis(config.permission_prompt_grace_ms),
        Duration::from_secs(config.permission_timeout_secs),
    ));
    #[cfg(not(target_os = "android"))]
    {
        let _ = config;
        Arc::new(permission::Unrestricted)
    }
}

pub fn default_orientation_source(
    #[cfg(target_os = "android")] app: &slint::android::AndroidApp,
) -> Box<dyn OrientationSource> {
    #[cfg(target_os = "android")]
    return Box::new(android::DisplayOrientation::new(app.clone()));
    #[cfg(not(target_os = "android"))]
    {
        Box::new(orientation::FixedOrientation(DeviceOrientation::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn no_camera_backend_has_no_device() {
        let mut backend = NoCameraBackend;
        assert_eq!(backend.default_video_device(), None);
        let (frames, _receiver) = channel();
        assert_eq!(backend.start_running(frames), Err(CaptureError::NoInput));
    }
}
