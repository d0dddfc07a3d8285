use std::sync::mpsc::Sender;

use log::{info, warn};
use slint::{Rgba8Pixel, SharedPixelBuffer};

use super::error::CaptureError;

pub type FrameSender = Sender<SharedPixelBuffer<Rgba8Pixel>>;

/// Backend end of the frame channel. Closes for good the first time the
/// receiver is gone so a backend can stop producing.
#[derive(Debug, Default)]
pub struct FrameOutlet {
    sender: Option<FrameSender>,
}

impl FrameOutlet {
    pub fn open(&mut self, sender: FrameSender) {
        self.sender = Some(sender);
    }

    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Returns false once the outlet is closed.
    pub fn deliver(&mut self, frame: SharedPixelBuffer<Rgba8Pixel>) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };
        if sender.send(frame).is_err() {
            info!("frame receiver gone, closing outlet");
            self.sender = None;
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDevice {
    pub id: String,
    pub label: String,
}

/// Platform capture pipeline.
pub trait CaptureBackend: Send {
    fn default_video_device(&mut self) -> Option<VideoDevice>;
    fn can_add_input(&self, device: &VideoDevice) -> bool;
    fn add_input(&mut self, device: &VideoDevice) -> Result<(), CaptureError>;
    /// Starts streaming RGBA frames into `frames`.
    fn start_running(&mut self, frames: FrameSender) -> Result<(), CaptureError>;
    fn stop_running(&mut self);
}

/// Binds at most one video input to a backend and runs it.
pub struct CaptureSession {
    backend: Box<dyn CaptureBackend>,
    input: Option<VideoDevice>,
    running: bool,
}

impl CaptureSession {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            input: None,
            running: false,
        }
    }

    pub fn input(&self) -> Option<&VideoDevice> {
        self.input.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn bind_default_input(&mut self) -> Result<VideoDevice, CaptureError> {
        if let Some(device) = &self.input {
            return Err(CaptureError::InputRejected(device.id.clone()));
        }
        let device = self
            .backend
            .default_video_device()
            .ok_or(CaptureError::DeviceUnavailable)?;
        if !self.backend.can_add_input(&device) {
            return Err(CaptureError::InputRejected(device.id));
        }
        self.backend.add_input(&device)?;
        info!("bound video input {} ({})", device.id, device.label);
        self.input = Some(device.clone());
        Ok(device)
    }

    pub fn start_running(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        if self.input.is_none() {
            return Err(CaptureError::NoInput);
        }
        if self.running {
            return Ok(());
        }
        self.backend.start_running(frames)?;
        self.running = true;
        info!("capture session running");
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.running {
            warn!("stopping capture session");
            self.backend.stop_running();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::FakeBackend;
    use std::sync::mpsc::channel;

    #[test]
    fn binds_and_runs_default_device() {
        let (backend, probe) = FakeBackend::new();
        let mut session = CaptureSession::new(Box::new(backend));
        let (frames, _receiver) = channel();

        let device = session.bind_default_input().unwrap();
        assert_eq!(session.input(), Some(&device));
        session.start_running(frames).unwrap();
        assert!(session.is_running());
        assert!(probe.started());

        drop(session);
        assert!(probe.stopped());
    }

    #[test]
    fn no_device_is_unavailable() {
        let (mut backend, _) = FakeBackend::new();
        backend.device = None;
        let mut session = CaptureSession::new(Box::new(backend));
        assert_eq!(session.bind_default_input(), Err(CaptureError::DeviceUnavailable));
        assert!(session.input().is_none());
    }

    #[test]
    fn rejected_input_is_not_bound() {
        let (mut backend, _) = FakeBackend::new();
        backend.accepts_input = false;
        let mut session = CaptureSession::new(Box::new(backend));
        assert_eq!(
            session.bind_default_input(),
            Err(CaptureError::InputRejected("fake-0".to_string()))
        );
        assert!(session.input().is_none());
    }

    #[test]
    fn second_input_is_rejected() {
        let (backend, _) = FakeBackend::new();
        let mut session = CaptureSession::new(Box::new(backend));
        session.bind_default_input().unwrap();
        assert!(matches!(
            session.bind_default_input(),
            Err(CaptureError::InputRejected(_))
        ));
    }

    fn frame() -> SharedPixelBuffer<Rgba8Pixel> {
        SharedPixelBuffer::clone_from_slice(&[0u8; 4], 1, 1)
    }

    #[test]
    fn outlet_closes_once_the_receiver_is_gone() {
        let (sender, receiver) = channel();
        let mut outlet = FrameOutlet::default();
        assert!(!outlet.deliver(frame()));

        outlet.open(sender);
        assert!(outlet.deliver(frame()));
        assert_eq!(receiver.try_iter().count(), 1);

        drop(receiver);
        assert!(!outlet.deliver(frame()));
        assert!(!outlet.is_open());
        assert!(!outlet.deliver(frame()));
    }

    #[test]
    fn cannot_start_without_input() {
        let (backend, probe) = FakeBackend::new();
        let mut session = CaptureSession::new(Box::new(backend));
        let (frames, _receiver) = channel();
        assert_eq!(session.start_running(frames), Err(CaptureError::NoInput));
        assert!(!session.is_running());
        assert!(!probe.started());
    }
}
