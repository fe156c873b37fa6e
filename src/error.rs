use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::ArState;

/// キャリブレーション値の検証エラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{field} must be a multiple of {step}, got {value}")]
    OffStep {
        field: &'static str,
        value: f32,
        step: f32,
    },
}

/// 永続ストレージのエラー
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode calibration record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// カメラ取得のエラー
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// 静止画キャプチャのエラー
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture unavailable: {0}")]
    Unavailable(&'static str),
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to load shoe sprite {path}: {source}")]
    Sprite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// セッション操作のエラー。いずれもセッション内で回復可能
#[derive(Debug, Error)]
pub enum ArError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid calibration: {0}")]
    Validation(#[from] ValidationError),
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("share is not supported on this platform")]
    ShareUnsupported,
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: ArState },
    #[error("session stopped before the camera became ready")]
    Cancelled,
    #[error("camera acquisition already in progress")]
    AcquisitionPending,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<CameraError> for ArError {
    /// 取得失敗はすべて権限拒否として扱う（UI側で非ARにフォールバック）
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied(msg) => ArError::PermissionDenied(msg),
            CameraError::Unavailable(msg) => ArError::PermissionDenied(msg),
        }
    }
}

impl From<CaptureError> for ArError {
    fn from(err: CaptureError) -> Self {
        ArError::CaptureUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_maps_to_permission_denied() {
        let err: ArError = CameraError::Unavailable("no device".into()).into();
        assert!(matches!(err, ArError::PermissionDenied(ref m) if m == "no device"));
    }

    #[test]
    fn test_validation_message() {
        let err = ValidationError::OutOfRange {
            field: "footLength",
            value: 40.0,
            min: 20.0,
            max: 35.0,
        };
        assert_eq!(err.to_string(), "footLength out of range: 40 (expected 20..=35)");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ArError::InvalidTransition {
            action: "capture",
            state: ArState::Idle,
        };
        assert_eq!(err.to_string(), "cannot capture while idle");
    }
}
