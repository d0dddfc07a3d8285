use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use anyhow::{anyhow, Result};
use kamera::Camera as KCamera;
use log::{info, warn};
use slint::SharedPixelBuffer;

use super::{
    error::CaptureError,
    session::{CaptureBackend, FrameOutlet, FrameSender, VideoDevice},
};

/// Webcam capture on a dedicated thread through `kamera`.
pub struct Camera {
    index: usize,
    bound: Option<usize>,
    opened: Option<Arc<AtomicBool>>,
    camera_task: Option<JoinHandle<Result<()>>>,
}

impl Camera {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            bound: None,
            opened: None,
            camera_task: None,
        }
    }

    fn stop_preview(&mut self) {
        if let Some(opened) = self.opened.take() {
            opened.store(false, Ordering::SeqCst);
            info!("stop preview..");
            if let Some(handle) = self.camera_task.take() {
                let res = handle.join();
                info!("stop preview: {:?}", res);
            }
        }
    }
}

impl CaptureBackend for Camera {
    fn default_video_device(&mut self) -> Option<VideoDevice> {
        // Opening is the only way kamera tells whether the index exists.
        KCamera::new_device(self.index)?;
        Some(VideoDevice {
            id: self.index.to_string(),
            label: format!("webcam {}", self.index),
        })
    }

    fn can_add_input(&self, _device: &VideoDevice) -> bool {
        self.bound.is_none()
    }

    fn add_input(&mut self, device: &VideoDevice) -> Result<(), CaptureError> {
        let index = device
            .id
            .parse()
            .map_err(|_| CaptureError::InputRejected(device.id.clone()))?;
        self.bound = Some(index);
        Ok(())
    }

    fn start_running(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        let index = self.bound.ok_or(CaptureError::NoInput)?;
        self.stop_preview();
        let opened = Arc::new(AtomicBool::new(true));
        self.opened = Some(opened.clone());
        let mut outlet = FrameOutlet::default();
        outlet.open(frames);
        let task = std::thread::Builder::new()
            .name("kamera".to_string())
            .spawn(move || {
                let camera = KCamera::new_device(index).ok_or_else(|| anyhow!("camera id not exist"))?;
                camera.start();
                let mut rgba_buffer = vec![];
                while opened.load(Ordering::SeqCst) {
                    let frame = match camera.wait_for_frame() {
                        Some(f) => f,
                        None => {
                            warn!("no frame from camera {index}");
                            std::thread::sleep(Duration::from_millis(10));
                            continue;
                        }
                    };

                    let (width, height) = frame.size_u32();
                    if rgba_buffer.len() as u32 != width * height * 4 {
                        rgba_buffer = vec![0; (width * height * 4) as usize];
                    }
                    let frame_data = frame.data();
                    for (idx, bgra) in frame_data.data_u8().chunks(4).enumerate() {
                        rgba_buffer[idx * 4] = bgra[2];
                        rgba_buffer[idx * 4 + 1] = bgra[1];
                        rgba_buffer[idx * 4 + 2] = bgra[0];
                        rgba_buffer[idx * 4 + 3] = bgra[3];
                    }

                    let buf = SharedPixelBuffer::clone_from_slice(&rgba_buffer, width, height);
                    if !outlet.deliver(buf) {
                        break;
                    }
                }
                camera.stop();
                Ok(())
            })
            .map_err(|err| CaptureError::Backend(err.to_string()))?;
        self.camera_task = Some(task);
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_preview();
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
