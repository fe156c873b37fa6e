use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};

use super::overlay::{composite, OverlayState};
use crate::camera::VideoFrame;
use crate::config::CaptureConfig;
use crate::error::{ArError, CaptureError};

/// PNGエンコード済みの静止画
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// 共有の結果。失敗は例外ではなく値で返す
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    /// ユーザーが共有シートを閉じた
    Dismissed,
    Unsupported,
}

impl ShareOutcome {
    pub fn into_result(self) -> Result<(), ArError> {
        match self {
            ShareOutcome::Shared | ShareOutcome::Dismissed => Ok(()),
            ShareOutcome::Unsupported => Err(ArError::ShareUnsupported),
        }
    }
}

/// ホストのネイティブ共有機能
pub trait ShareTarget: Send + Sync {
    fn share(&self, _image: &CapturedImage, _title: &str, _text: &str) -> ShareOutcome {
        ShareOutcome::Unsupported
    }
}

/// 共有機能の無いプラットフォーム
#[derive(Debug, Default)]
pub struct NoShareTarget;

impl ShareTarget for NoShareTarget {}

/// `ar-tryon[-enhanced]-<unix-epoch-ms>.png`
pub fn capture_filename(enhanced: bool, at: DateTime<Utc>) -> String {
    let tag = if enhanced { "-enhanced" } else { "" };
    format!("ar-tryon{}-{}.png", tag, at.timestamp_millis())
}

pub struct CaptureService {
    output_dir: PathBuf,
    enhanced: bool,
    share_target: Box<dyn ShareTarget>,
}

impl CaptureService {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            enhanced: config.enhanced,
            share_target: Box::new(NoShareTarget),
        }
    }

    pub fn with_share_target(mut self, target: Box<dyn ShareTarget>) -> Self {
        self.share_target = target;
        self
    }

    /// 現在フレーム + 靴を PNG にする
    pub fn capture(&self, frame: Option<&VideoFrame>, overlay: &OverlayState) -> Result<CapturedImage, CaptureError> {
        let frame = frame.ok_or(CaptureError::Unavailable("no video frame yet"))?;
        if !frame.is_valid() {
            return Err(CaptureError::Unavailable("video frame has zero dimensions"));
        }

        let composed = composite(&frame.image, overlay);
        let (width, height) = composed.dimensions();
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(composed).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(CapturedImage { png, width, height })
    }

    pub fn filename(&self) -> String {
        capture_filename(self.enhanced, Utc::now())
    }

    /// 出力ディレクトリへ保存
    pub fn download(&self, image: &CapturedImage, filename: &str) -> Result<PathBuf, CaptureError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| CaptureError::Write {
            path: self.output_dir.clone(),
            source,
        })?;
        let path = self.output_dir.join(filename);
        fs::write(&path, &image.png).map_err(|source| CaptureError::Write {
            path: path.clone(),
            source,
        })?;
        info!("Saved capture {} ({}x{})", path.display(), image.width, image.height);
        Ok(path)
    }

    pub fn share(&self, image: &CapturedImage, title: &str, text: &str) -> ShareOutcome {
        let outcome = self.share_target.share(image, title, text);
        if outcome == ShareOutcome::Unsupported {
            warn!("Share is not supported here; use download instead");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ShoeSprite;
    use crate::tracker::ShoeTransform;
    use image::RgbImage;
    use std::path::Path;
    use std::sync::Arc;

    fn overlay() -> OverlayState {
        OverlayState::new(
            vec![ShoeTransform::new(35.0, 60.0, 1.0, -5.0)],
            Arc::new(ShoeSprite::silhouette()),
            0.18,
        )
    }

    fn service(dir: &Path) -> CaptureService {
        CaptureService::new(&CaptureConfig {
            output_dir: dir.to_string_lossy().into_owned(),
            enhanced: true,
        })
    }

    #[test]
    fn test_filename_pattern() {
        let at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(capture_filename(true, at), "ar-tryon-enhanced-1700000000123.png");
        assert_eq!(capture_filename(false, at), "ar-tryon-1700000000123.png");
    }

    #[test]
    fn test_capture_at_native_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let frame = VideoFrame::new(1, RgbImage::new(1920, 1080));
        let shot = service(dir.path()).capture(Some(&frame), &overlay()).unwrap();
        assert_eq!((shot.width, shot.height), (1920, 1080));
        assert_eq!(&shot.png[1..4], b"PNG");
        let decoded = image::load_from_memory(&shot.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1920, 1080));
    }

    #[test]
    fn test_capture_without_frame_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        assert!(matches!(svc.capture(None, &overlay()), Err(CaptureError::Unavailable(_))));
        let empty = VideoFrame::new(1, RgbImage::new(0, 0));
        assert!(matches!(svc.capture(Some(&empty), &overlay()), Err(CaptureError::Unavailable(_))));
    }

    #[test]
    fn test_download_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir.path().join("nested"));
        let frame = VideoFrame::new(1, RgbImage::new(8, 8));
        let shot = svc.capture(Some(&frame), &overlay()).unwrap();
        let name = svc.filename();
        assert!(name.starts_with("ar-tryon-enhanced-"));
        let path = svc.download(&shot, &name).unwrap();
        assert_eq!(fs::read(path).unwrap(), shot.png);
    }

    #[test]
    fn test_share_soft_fails() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let shot = CapturedImage { png: vec![], width: 0, height: 0 };
        let outcome = svc.share(&shot, "My shoes", "Look");
        assert_eq!(outcome, ShareOutcome::Unsupported);
        assert!(matches!(outcome.into_result(), Err(ArError::ShareUnsupported)));

        struct Accepting;
        impl ShareTarget for Accepting {
            fn share(&self, _: &CapturedImage, _: &str, _: &str) -> ShareOutcome {
                ShareOutcome::Shared
            }
        }
        let svc = service(dir.path()).with_share_target(Box::new(Accepting));
        assert!(svc.share(&shot, "t", "x").into_result().is_ok());
    }
}
