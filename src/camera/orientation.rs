/// Physical orientation of the device, as reported by the platform.
///
/// Left/right follow the home-button convention: `LandscapeLeft` means the
/// device was turned counter-clockwise and the bottom edge is on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOrientation {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
    Unknown,
}

impl DeviceOrientation {
    /// Maps an Android `Surface.ROTATION_*` value (0..=3) to an orientation.
    pub fn from_display_rotation(rotation: i32) -> Self {
        match rotation {
            0 => DeviceOrientation::Portrait,
            1 => DeviceOrientation::LandscapeLeft,
            2 => DeviceOrientation::PortraitUpsideDown,
            3 => DeviceOrientation::LandscapeRight,
            _ => DeviceOrientation::Unknown,
        }
    }
}

/// Rotation of the preview connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoRotation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl VideoRotation {
    /// Clockwise angle applied to upright portrait frames before they are
    /// displayed. `LandscapeRight` (home button on the right) turns them a
    /// quarter counter-clockwise so the scene stays upright on screen.
    pub fn degrees(self) -> u32 {
        match self {
            VideoRotation::Portrait => 0,
            VideoRotation::LandscapeLeft => 90,
            VideoRotation::PortraitUpsideDown => 180,
            VideoRotation::LandscapeRight => 270,
        }
    }
}

/// Preview rotation for a device orientation. Face up/down and unknown
/// readings have no rotation and leave the preview as it was.
pub fn rotation_for(orientation: DeviceOrientation) -> Option<VideoRotation> {
    match orientation {
        DeviceOrientation::PortraitUpsideDown => Some(VideoRotation::PortraitUpsideDown),
        DeviceOrientation::LandscapeLeft => Some(VideoRotation::LandscapeRight),
        DeviceOrientation::LandscapeRight => Some(VideoRotation::LandscapeLeft),
        DeviceOrientation::Portrait => Some(VideoRotation::Portrait),
        DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => None,
    }
}

pub trait OrientationSource {
    fn current(&self) -> DeviceOrientation;
}

/// For platforms without an orientation sensor.
pub struct FixedOrientation(pub DeviceOrientation);

impl OrientationSource for FixedOrientation {
    fn current(&self) -> DeviceOrientation {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_orientations_map_exactly() {
        assert_eq!(rotation_for(DeviceOrientation::Portrait), Some(VideoRotation::Portrait));
        assert_eq!(
            rotation_for(DeviceOrientation::PortraitUpsideDown),
            Some(VideoRotation::PortraitUpsideDown)
        );
        assert_eq!(
            rotation_for(DeviceOrientation::LandscapeLeft),
            Some(VideoRotation::LandscapeRight)
        );
        assert_eq!(
            rotation_for(DeviceOrientation::LandscapeRight),
            Some(VideoRotation::LandscapeLeft)
        );
    }

    #[test]
    fn flat_and_unknown_have_no_rotation() {
        for orientation in [
            DeviceOrientation::FaceUp,
            DeviceOrientation::FaceDown,
            DeviceOrientation::Unknown,
        ] {
            assert_eq!(rotation_for(orientation), None);
        }
    }

    #[test]
    fn display_rotation_values() {
        assert_eq!(DeviceOrientation::from_display_rotation(0), DeviceOrientation::Portrait);
        assert_eq!(DeviceOrientation::from_display_rotation(1), DeviceOrientation::LandscapeLeft);
        assert_eq!(
            DeviceOrientation::from_display_rotation(2),
            DeviceOrientation::PortraitUpsideDown
        );
        assert_eq!(DeviceOrientation::from_display_rotation(3), DeviceOrientation::LandscapeRight);
        assert_eq!(DeviceOrientation::from_display_rotation(7), DeviceOrientation::Unknown);
    }

    #[test]
    fn landscape_rotations_are_quarter_turns() {
        assert_eq!(VideoRotation::default().degrees(), 0);
        assert_eq!(VideoRotation::LandscapeLeft.degrees(), 90);
        assert_eq!(VideoRotation::PortraitUpsideDown.degrees(), 180);
        assert_eq!(VideoRotation::LandscapeRight.degrees(), 270);
    }
}
