//! Frame source seam: the [`Camera`] trait and the [`CameraFrame`] it yields.

use dockbot_types::DockError;

/// One captured image.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Monotonic frame counter assigned by the driver.
    pub sequence: u64,
    /// Pixel bytes in the driver's native layout.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// `true` when the driver handed back a frame without pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }
}

/// Anything that can hand the docking loop a frame.
///
/// The docking loop pulls exactly one frame per iteration, so `capture`
/// should return within one frame period.
pub trait Camera: Send {
    /// Device name used in logs and errors, e.g. `"front_rgb"`.
    fn id(&self) -> &str;

    /// Grab the next frame.
    ///
    /// # Errors
    ///
    /// [`DockError::HardwareFault`] when no frame could be read.  The control
    /// loop treats this as a frame with no markers in it.
    fn capture(&mut self) -> Result<CameraFrame, DockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
        next: u64,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<CameraFrame, DockError> {
            self.next += 1;
            Ok(CameraFrame {
                width: 2,
                height: 2,
                sequence: self.next,
                data: vec![0u8; 4 * 3],
            })
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "front_rgb".to_string(),
            next: 0,
        };
        assert_eq!(cam.id(), "front_rgb");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.width, 2);
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.data.len(), 12);
        assert!(!frame.is_empty());
        assert_eq!(cam.capture().unwrap().sequence, 2);
    }

    #[test]
    fn zero_sized_frame_is_empty() {
        let frame = CameraFrame {
            width: 0,
            height: 0,
            sequence: 0,
            data: Vec::new(),
        };
        assert!(frame.is_empty());
    }
}
