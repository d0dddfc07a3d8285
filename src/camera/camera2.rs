use core::slice;
use std::{
    ffi::{c_int, c_void, CStr, CString},
    mem::zeroed,
    ptr::null_mut,
    time::Instant,
};

use anyhow::{anyhow, Result};
use image::{
    imageops::{rotate180, rotate270, rotate90},
    RgbaImage,
};
use log::{error, info, warn};
use ndk_sys::{
    acamera_metadata_tag, camera_status_t, media_status_t, ACameraCaptureSession,
    ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stateCallbacks, ACameraCaptureSession_stopRepeating, ACameraDevice,
    ACameraDevice_StateCallbacks, ACameraDevice_close, ACameraDevice_createCaptureRequest,
    ACameraDevice_createCaptureSession, ACameraDevice_getId, ACameraDevice_request_template,
    ACameraManager, ACameraManager_create, ACameraManager_delete,
    ACameraManager_deleteCameraIdList, ACameraManager_getCameraCharacteristics,
    ACameraManager_getCameraIdList, ACameraManager_openCamera, ACameraMetadata,
    ACameraMetadata_const_entry, ACameraMetadata_free, ACameraMetadata_getConstEntry,
    ACameraOutputTarget, ACameraOutputTarget_create, ACameraOutputTarget_free, ACaptureRequest,
    ACaptureRequest_addTarget, ACaptureRequest_free, ACaptureSessionOutput,
    ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, AImage, AImageReader,
    AImageReader_ImageListener, AImageReader_acquireLatestImage, AImageReader_delete,
    AImageReader_getWindow, AImageReader_new, AImageReader_setImageListener, AImage_delete,
    AImage_getHeight, AImage_getPlaneData, AImage_getPlanePixelStride, AImage_getPlaneRowStride,
    AImage_getWidth, ANativeWindow, AIMAGE_FORMATS,
};
use slint::SharedPixelBuffer;

use super::{
    error::CaptureError,
    session::{CaptureBackend, FrameOutlet, FrameSender, VideoDevice},
};

#[link(name = "camera2ndk")]
extern "C" {}

#[link(name = "mediandk")]
extern "C" {}

const LENS_FACING_BACK: u8 = 1;

/// camera2 NDK capture pipeline: device -> AImageReader (YUV_420_888) -> RGBA frames.
pub struct AndroidCamera {
    preview_width: u32,
    preview_height: u32,
    camera_id: Option<CString>,
    sensor_orientation: i32,
    camera_device: *mut ACameraDevice,
    capture_request: *mut ACaptureRequest,
    camera_output_target: *mut ACameraOutputTarget,
    session_output: *mut ACaptureSessionOutput,
    capture_session_output_container: *mut ACaptureSessionOutputContainer,
    capture_session: *mut ACameraCaptureSession,
    image_reader: *mut AImageReader,
    image_listener: AImageReader_ImageListener,
    capture_session_state_callbacks: ACameraCaptureSession_stateCallbacks,
    device_state_callbacks: ACameraDevice_StateCallbacks,
    frames: FrameOutlet,
    timer: Instant,
    frame_count: i32,
}

// The raw handles are only touched from the capture queue and from the image
// reader callback, which starts after `start_running` returns.
unsafe impl Send for AndroidCamera {}

struct CameraManager(*mut ACameraManager);

impl CameraManager {
    fn new() -> Self {
        Self(unsafe { ACameraManager_create() })
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        unsafe { ACameraManager_delete(self.0) }
    }
}

impl AndroidCamera {
    pub fn new(preview_width: u32, preview_height: u32) -> Self {
        Self {
            preview_width,
            preview_height,
            camera_id: None,
            sensor_orientation: 0,
            camera_device: null_mut(),
            capture_request: null_mut(),
            camera_output_target: null_mut(),
            session_output: null_mut(),
            capture_session_output_container: null_mut(),
            capture_session: null_mut(),
            image_reader: null_mut(),
            image_listener: AImageReader_ImageListener {
                context: null_mut(),
                onImageAvailable: None,
            },
            capture_session_state_callbacks: unsafe { zeroed() },
            device_state_callbacks: unsafe { zeroed() },
            frames: FrameOutlet::default(),
            timer: Instant::now(),
            frame_count: 0,
        }
    }

    /// Camera ids with their lens facing and sensor orientation.
    fn list_cameras(manager: &CameraManager) -> Result<Vec<(String, u8, i32)>> {
        unsafe {
            let mut camera_id_list_raw = null_mut();
            let camera_status = ACameraManager_getCameraIdList(manager.0, &mut camera_id_list_raw);
            if camera_status != camera_status_t::ACAMERA_OK || camera_id_list_raw.is_null() {
                return Err(anyhow!(
                    "Failed to get camera id list (reason: {:?})",
                    camera_status
                ));
            }
            let camera_id_list = &*camera_id_list_raw;
            let camera_ids = if camera_id_list.numCameras < 1 {
                &[][..]
            } else {
                slice::from_raw_parts(camera_id_list.cameraIds, camera_id_list.numCameras as usize)
            };

            let mut cameras = vec![];
            for id in camera_ids {
                let mut camera_metadata = null_mut();
                let camera_status =
                    ACameraManager_getCameraCharacteristics(manager.0, *id, &mut camera_metadata);
                if camera_status != camera_status_t::ACAMERA_OK {
                    warn!("no characteristics for camera {:?}", get_cstr(*id));
                    continue;
                }
                let (lens_facing, sensor_orientation) = Self::lens_and_orientation(camera_metadata);
                ACameraMetadata_free(camera_metadata);
                cameras.push((
                    get_cstr(*id).unwrap_or_default().to_string(),
                    lens_facing,
                    sensor_orientation,
                ));
            }
            ACameraManager_deleteCameraIdList(camera_id_list_raw);
            Ok(cameras)
        }
    }

    fn lens_and_orientation(camera_metadata: *mut ACameraMetadata) -> (u8, i32) {
        unsafe {
            let mut lens_facing: ACameraMetadata_const_entry = zeroed();
            let mut sensor_orientation: ACameraMetadata_const_entry = zeroed();

            ACameraMetadata_getConstEntry(
                camera_metadata,
                acamera_metadata_tag::ACAMERA_LENS_FACING.0,
                &mut lens_facing,
            );
            ACameraMetadata_getConstEntry(
                camera_metadata,
                acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
                &mut sensor_orientation,
            );

            let lens_facing = if lens_facing.count > 0 {
                *lens_facing.data.u8_
            } else {
                LENS_FACING_BACK
            };
            let sensor_orientation = if sensor_orientation.count > 0 {
                *sensor_orientation.data.i32_
            } else {
                0
            };
            (lens_facing, sensor_orientation)
        }
    }

    fn open(&mut self, camera_id: &str) -> Result<()> {
        let manager = CameraManager::new();
        let sensor_orientation = Self::list_cameras(&manager)?
            .into_iter()
            .find(|(id, _, _)| id == camera_id)
            .map(|(_, _, orientation)| orientation)
            .ok_or_else(|| anyhow!("Camera Id not found."))?;
        let camera_id = CString::new(camera_id)?;

        unsafe extern "C" fn on_disconnected(_data: *mut c_void, device: *mut ACameraDevice) {
            info!("Camera(id: {:?}) is disconnected.", get_cstr(ACameraDevice_getId(device)));
        }

        unsafe extern "C" fn on_error(_data: *mut c_void, device: *mut ACameraDevice, error: c_int) {
            error!("Error(code: {}) on Camera(id: {:?}).", error, get_cstr(ACameraDevice_getId(device)));
        }

        self.device_state_callbacks.onDisconnected = Some(on_disconnected);
        self.device_state_callbacks.onError = Some(on_error);

        let camera_status = unsafe {
            ACameraManager_openCamera(
                manager.0,
                camera_id.as_ptr(),
                &mut self.device_state_callbacks,
                &mut self.camera_device,
            )
        };
        if camera_status != camera_status_t::ACAMERA_OK {
            return Err(anyhow!("Failed to open camera device (reason: {:?})", camera_status));
        }
        info!("camera {:?} open, sensor_orientation: {sensor_orientation}", camera_id);
        self.sensor_orientation = sensor_orientation;
        self.camera_id = Some(camera_id);
        Ok(())
    }

    fn start_preview(&mut self) -> Result<()> {
        self.create_image_reader()?;
        unsafe {
            let camera_status = ACameraDevice_createCaptureRequest(
                self.camera_device,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut self.capture_request,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create preview capture request (id: {:?})",
                    self.camera_id
                ));
            }

            let mut native_window: *mut ANativeWindow = null_mut();
            let res = AImageReader_getWindow(self.image_reader, &mut native_window);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("AImageReader_getWindow error res={:?}.", res));
            }

            ACameraOutputTarget_create(native_window, &mut self.camera_output_target);
            ACaptureRequest_addTarget(self.capture_request, self.camera_output_target);
            ACaptureSessionOutput_create(native_window, &mut self.session_output);

            let camera_status =
                ACaptureSessionOutputContainer_create(&mut self.capture_session_output_container);
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session output container (reason: {:?})",
                    camera_status
                ));
            }
            ACaptureSessionOutputContainer_add(
                self.capture_session_output_container,
                self.session_output,
            );

            unsafe extern "C" fn on_ready(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                info!("Session is ready. {:?}", session);
            }

            unsafe extern "C" fn on_active(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                info!("Session is activated. {:?}", session);
            }

            unsafe extern "C" fn on_closed(_context: *mut c_void, session: *mut ACameraCaptureSession) {
                info!("Session is closed. {:?}", session);
            }

            self.capture_session_state_callbacks.onReady = Some(on_ready);
            self.capture_session_state_callbacks.onActive = Some(on_active);
            self.capture_session_state_callbacks.onClosed = Some(on_closed);

            let camera_status = ACameraDevice_createCaptureSession(
                self.camera_device,
                self.capture_session_output_container,
                &self.capture_session_state_callbacks,
                &mut self.capture_session,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session (reason: {:?})",
                    camera_status
                ));
            }

            let camera_status = ACameraCaptureSession_setRepeatingRequest(
                self.capture_session,
                null_mut(),
                1,
                &mut self.capture_request,
                null_mut(),
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to set repeating request (reason: {:?})",
                    camera_status
                ));
            }
        }
        Ok(())
    }

    fn create_image_reader(&mut self) -> Result<()> {
        unsafe {
            let res = AImageReader_new(
                self.preview_width as i32,
                self.preview_height as i32,
                AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888.0 as i32,
                2,
                &mut self.image_reader,
            );
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("create Image Reader error res={:?}.", res));
            }

            unsafe extern "C" fn on_image_available(context: *mut c_void, _reader: *mut AImageReader) {
                let camera = &mut *(context as *mut AndroidCamera);
                if let Err(err) = camera.on_image_available() {
                    warn!("preview frame dropped: {err}");
                }
            }

            self.image_listener.context = (self as *mut AndroidCamera) as *mut c_void;
            self.image_listener.onImageAvailable = Some(on_image_available);

            let res = AImageReader_setImageListener(self.image_reader, &mut self.image_listener);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("set Image Listener error res={:?}.", res));
            }
        }
        Ok(())
    }

    fn on_image_available(&mut self) -> Result<()> {
        if !self.frames.is_open() {
            return Ok(());
        }
        let mut image: *mut AImage = null_mut();
        let media_status = unsafe { AImageReader_acquireLatestImage(self.image_reader, &mut image) };
        if media_status != media_status_t::AMEDIA_OK {
            return Err(anyhow!("acquireLatestImage error: {:?}", media_status));
        }
        let rgba = unsafe { read_yuv_image(image) };
        unsafe { AImage_delete(image) };
        let rgba = upright(rgba?, self.sensor_orientation);
        let buffer = SharedPixelBuffer::clone_from_slice(rgba.as_raw(), rgba.width(), rgba.height());
        if !self.frames.deliver(buffer) {
            // Nobody is displaying frames any more.
            if !self.capture_session.is_null() {
                unsafe { ACameraCaptureSession_stopRepeating(self.capture_session) };
            }
            return Ok(());
        }

        self.frame_count += 1;
        if self.timer.elapsed().as_millis() > 1000 {
            info!("preview FPS:{}", self.frame_count);
            self.timer = Instant::now();
            self.frame_count = 0;
        }
        Ok(())
    }

    fn close(&mut self) {
        unsafe {
            if !self.capture_session.is_null() {
                ACameraCaptureSession_stopRepeating(self.capture_session);
                ACameraCaptureSession_close(self.capture_session);
                self.capture_session = null_mut();
            }
            if !self.capture_request.is_null() {
                ACaptureRequest_free(self.capture_request);
                self.capture_request = null_mut();
            }
            if !self.camera_output_target.is_null() {
                ACameraOutputTarget_free(self.camera_output_target);
                self.camera_output_target = null_mut();
            }
            if !self.camera_device.is_null() {
                if ACameraDevice_close(self.camera_device) != camera_status_t::ACAMERA_OK {
                    error!("Failed to close CameraDevice.");
                }
                self.camera_device = null_mut();
            }
            if !self.session_output.is_null() {
                ACaptureSessionOutput_free(self.session_output);
                self.session_output = null_mut();
            }
            if !self.capture_session_output_container.is_null() {
                ACaptureSessionOutputContainer_free(self.capture_session_output_container);
                self.capture_session_output_container = null_mut();
            }
            if !self.image_reader.is_null() {
                AImageReader_delete(self.image_reader);
                self.image_reader = null_mut();
            }
        }
        self.frames.close();
        info!("Close Camera");
    }
}

impl CaptureBackend for AndroidCamera {
    fn default_video_device(&mut self) -> Option<VideoDevice> {
        let cameras = match Self::list_cameras(&CameraManager::new()) {
            Ok(cameras) => cameras,
            Err(err) => {
                error!("{err:?}");
                return None;
            }
        };
        info!("cameras: {:?}", cameras);
        let (id, lens_facing, _) = cameras
            .iter()
            .find(|(_, lens_facing, _)| *lens_facing == LENS_FACING_BACK)
            .or_else(|| cameras.first())?
            .clone();
        let label = if lens_facing == LENS_FACING_BACK {
            "back camera"
        } else {
            "front camera"
        };
        Some(VideoDevice {
            id,
            label: label.to_string(),
        })
    }

    fn can_add_input(&self, _device: &VideoDevice) -> bool {
        self.camera_device.is_null()
    }

    fn add_input(&mut self, device: &VideoDevice) -> Result<(), CaptureError> {
        self.open(&device.id).map_err(|err| {
            error!("{err:?}");
            CaptureError::InputRejected(device.id.clone())
        })
    }

    fn start_running(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        self.frames.open(frames);
        self.start_preview().map_err(|err| {
            self.close();
            CaptureError::Backend(err.to_string())
        })
    }

    fn stop_running(&mut self) {
        self.close();
    }
}

impl Drop for AndroidCamera {
    fn drop(&mut self) {
        self.close();
    }
}

/// Copies a YUV_420_888 image into RGBA, honouring row and pixel strides.
unsafe fn read_yuv_image(image: *mut AImage) -> Result<RgbaImage> {
    let (mut width, mut height) = (0, 0);
    AImage_getWidth(image, &mut width);
    AImage_getHeight(image, &mut height);

    let mut planes: [(*mut u8, i32, i32, i32); 3] = [(null_mut(), 0, 0, 0); 3];
    for (index, (data, len, row_stride, pixel_stride)) in planes.iter_mut().enumerate() {
        let res = AImage_getPlaneData(image, index as i32, data, len);
        if res != media_status_t::AMEDIA_OK {
            return Err(anyhow!("AImage_getPlaneData({index}) error res={:?}.", res));
        }
        AImage_getPlaneRowStride(image, index as i32, row_stride);
        AImage_getPlanePixelStride(image, index as i32, pixel_stride);
    }
    let plane = |index: usize| {
        let (data, len, row_stride, pixel_stride) = planes[index];
        (
            slice::from_raw_parts(data as *const u8, len as usize),
            row_stride as usize,
            pixel_stride as usize,
        )
    };
    Ok(yuv420_to_rgba(width as u32, height as u32, plane(0), plane(1), plane(2)))
}

type Plane<'a> = (&'a [u8], usize, usize);

/// YUV 4:2:0 to RGBA with the BT.601 integer coefficients.
fn yuv420_to_rgba(width: u32, height: u32, y: Plane, u: Plane, v: Plane) -> RgbaImage {
    let sample = |(data, row_stride, pixel_stride): Plane, col: u32, row: u32| -> i32 {
        data.get(row as usize * row_stride + col as usize * pixel_stride)
            .copied()
            .unwrap_or(128) as i32
    };
    RgbaImage::from_fn(width, height, |col, row| {
        let luma = (sample(y, col, row) - 16).max(0);
        let cb = sample(u, col / 2, row / 2) - 128;
        let cr = sample(v, col / 2, row / 2) - 128;

        let y1192 = 1192 * luma;
        let r = (y1192 + 1634 * cr).clamp(0, 262143) >> 10;
        let g = (y1192 - 833 * cr - 400 * cb).clamp(0, 262143) >> 10;
        let b = (y1192 + 2066 * cb).clamp(0, 262143) >> 10;
        image::Rgba([r as u8, g as u8, b as u8, 255])
    })
}

/// Turns sensor-oriented frames upright for a portrait display.
fn upright(image: RgbaImage, sensor_orientation: i32) -> RgbaImage {
    match sensor_orientation.rem_euclid(360) {
        90 => rotate90(&image),
        180 => rotate180(&image),
        270 => rotate270(&image),
        _ => image,
    }
}

unsafe fn get_cstr<'a>(s: *const ::std::os::raw::c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}
