//! Camera intrinsics loaded from a TOML file.
//!
//! ```toml
//! camera_matrix = [[615.0, 0.0, 320.0], [0.0, 615.0, 240.0], [0.0, 0.0, 1.0]]
//! distortion = [0.1, -0.25, 0.0, 0.0, 0.1]
//! ```
//!
//! The file is read once before a docking task starts.  Anything missing or
//! malformed is a [`DockError::Calibration`] setup error.

use std::fs;
use std::path::Path;

use dockbot_types::DockError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Distortion vector lengths accepted by the common pinhole models.
const DISTORTION_LENGTHS: [usize; 5] = [4, 5, 8, 12, 14];

/// Pinhole intrinsics plus lens distortion coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// Row-major 3×3 intrinsic matrix `K`.
    pub camera_matrix: [[f64; 3]; 3],
    /// Distortion coefficients `(k1, k2, p1, p2[, k3, ...])`.
    pub distortion: Vec<f64>,
}

impl CameraCalibration {
    /// Read and validate a calibration file.
    ///
    /// # Errors
    ///
    /// Returns [`DockError::Calibration`] when the file is missing, is not
    /// valid TOML, or fails [`validate`][Self::validate].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DockError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            DockError::Calibration(format!("cannot read {}: {e}", path.display()))
        })?;
        let calibration = Self::from_toml_str(&raw)
            .map_err(|e| DockError::Calibration(format!("{}: {e}", path.display())))?;
        debug!(
            path = %path.display(),
            fx = calibration.fx(),
            fy = calibration.fy(),
            "camera calibration loaded"
        );
        Ok(calibration)
    }

    /// Parse and validate calibration data from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, DockError> {
        let calibration: Self = toml::from_str(raw)
            .map_err(|e| DockError::Calibration(format!("parse error: {e}")))?;
        calibration.validate()?;
        Ok(calibration)
    }

    /// Check the matrix is a plausible pinhole `K` and the distortion vector
    /// has a known length.
    pub fn validate(&self) -> Result<(), DockError> {
        if self
            .camera_matrix
            .iter()
            .flatten()
            .chain(self.distortion.iter())
            .any(|v| !v.is_finite())
        {
            return Err(DockError::Calibration(
                "calibration contains non-finite values".to_string(),
            ));
        }
        if self.fx() <= 0.0 || self.fy() <= 0.0 {
            return Err(DockError::Calibration(format!(
                "focal lengths must be positive (fx={}, fy={})",
                self.fx(),
                self.fy()
            )));
        }
        if self.camera_matrix[2] != [0.0, 0.0, 1.0] {
            return Err(DockError::Calibration(format!(
                "last row of camera_matrix must be [0, 0, 1], got {:?}",
                self.camera_matrix[2]
            )));
        }
        if !DISTORTION_LENGTHS.contains(&self.distortion.len()) {
            return Err(DockError::Calibration(format!(
                "distortion must have 4, 5, 8, 12 or 14 coefficients, got {}",
                self.distortion.len()
            )));
        }
        Ok(())
    }

    pub fn fx(&self) -> f64 {
        self.camera_matrix[0][0]
    }

    pub fn fy(&self) -> f64 {
        self.camera_matrix[1][1]
    }

    pub fn cx(&self) -> f64 {
        self.camera_matrix[0][2]
    }

    pub fn cy(&self) -> f64 {
        self.camera_matrix[1][2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
camera_matrix = [[615.0, 0.0, 320.0], [0.0, 612.5, 240.0], [0.0, 0.0, 1.0]]
distortion = [0.1, -0.25, 0.0, 0.0, 0.1]
"#;

    #[test]
    fn parses_valid_calibration() {
        let cal = CameraCalibration::from_toml_str(VALID).unwrap();
        assert_eq!(cal.fx(), 615.0);
        assert_eq!(cal.fy(), 612.5);
        assert_eq!(cal.cx(), 320.0);
        assert_eq!(cal.cy(), 240.0);
        assert_eq!(cal.distortion.len(), 5);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tmp file");
        file.write_all(VALID.as_bytes()).unwrap();
        let cal = CameraCalibration::load(file.path()).unwrap();
        assert_eq!(cal.fx(), 615.0);
    }

    #[test]
    fn missing_file_is_calibration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = CameraCalibration::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, DockError::Calibration(_)));
        assert!(err.is_setup_error());
    }

    #[test]
    fn missing_distortion_key_is_rejected() {
        let raw = "camera_matrix = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]\n";
        assert!(matches!(
            CameraCalibration::from_toml_str(raw),
            Err(DockError::Calibration(_))
        ));
    }

    #[test]
    fn wrong_matrix_shape_is_rejected() {
        let raw = "camera_matrix = [[1.0, 0.0], [0.0, 1.0]]\ndistortion = [0.0, 0.0, 0.0, 0.0]\n";
        assert!(CameraCalibration::from_toml_str(raw).is_err());
    }

    #[test]
    fn non_positive_focal_length_is_rejected() {
        let raw = "camera_matrix = [[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]]\ndistortion = [0.0, 0.0, 0.0, 0.0]\n";
        let err = CameraCalibration::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("focal"));
    }

    #[test]
    fn bad_last_row_is_rejected() {
        let raw = "camera_matrix = [[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 1.0]]\ndistortion = [0.0, 0.0, 0.0, 0.0]\n";
        assert!(CameraCalibration::from_toml_str(raw).is_err());
    }

    #[test]
    fn odd_distortion_length_is_rejected() {
        let raw = "camera_matrix = [[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]]\ndistortion = [0.0, 0.0, 0.0]\n";
        let err = CameraCalibration::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("distortion"));
    }
}
