use image::{
    imageops::{rotate180, rotate270, rotate90},
    RgbaImage,
};
use log::{debug, warn};
use slint::{Rgba8Pixel, SharedPixelBuffer};

use super::orientation::{rotation_for, DeviceOrientation, VideoRotation};

/// Logical-pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            x: 0.,
            y: 0.,
            width,
            height,
        }
    }
}

/// How frames are scaled into the preview frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoGravity {
    /// Fill the frame, cropping the overflow. Matches the window's
    /// `image-fit: cover`.
    #[default]
    ResizeAspectFill,
}

/// Sink that displays the frames of a running capture session.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSurface {
    frame: Rect,
    rotation: VideoRotation,
    gravity: VideoGravity,
}

impl PreviewSurface {
    pub fn new(bounds: Rect) -> Self {
        Self {
            frame: bounds,
            rotation: VideoRotation::Portrait,
            gravity: VideoGravity::ResizeAspectFill,
        }
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn rotation(&self) -> VideoRotation {
        self.rotation
    }

    pub fn gravity(&self) -> VideoGravity {
        self.gravity
    }

    /// Resizes to `bounds` and rotates to match `orientation`. Orientations
    /// without a rotation keep the current one.
    pub fn apply_orientation(&mut self, bounds: Rect, orientation: DeviceOrientation) {
        self.frame = bounds;
        match rotation_for(orientation) {
            Some(rotation) => {
                if rotation != self.rotation {
                    debug!("preview rotation {:?} -> {rotation:?}", self.rotation);
                }
                self.rotation = rotation;
            }
            None => debug!("orientation {orientation:?} keeps rotation {:?}", self.rotation),
        }
    }

    /// Rotates a frame clockwise by the preview rotation's angle.
    pub fn render(&self, frame: SharedPixelBuffer<Rgba8Pixel>) -> SharedPixelBuffer<Rgba8Pixel> {
        let degrees = self.rotation.degrees();
        if degrees == 0 {
            return frame;
        }
        let (width, height) = (frame.width(), frame.height());
        let image = match RgbaImage::from_raw(width, height, frame.as_bytes().to_vec()) {
            Some(image) => image,
            None => {
                warn!("frame buffer does not match {width}x{height}");
                return frame;
            }
        };
        let rotated = match degrees {
            90 => rotate90(&image),
            180 => rotate180(&image),
            _ => rotate270(&image),
        };
        SharedPixelBuffer::clone_from_slice(rotated.as_raw(), rotated.width(), rotated.height())
    }
}
