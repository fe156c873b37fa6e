use crate::calibration::CalibrationData;
use crate::camera::VideoFrame;

use super::foot::FootDetection;

/// 足検出器
///
/// 毎tick1回呼ばれる。足が無ければ空のVecを返す（エラーにはしない）。
/// 返すのは `detected == true` の検出のみ、信頼度は 0.0〜1.0。
pub trait FootDetector: Send {
    fn name(&self) -> &str;

    fn detect(&mut self, frame: &VideoFrame, calibration: Option<&CalibrationData>) -> Vec<FootDetection>;
}

/// 検出器の出力を契約に合わせて整える
///
/// 非アクティブな検出を除き、信頼度を 0.0〜1.0 に収める。
pub fn sanitize_detections(detections: Vec<FootDetection>) -> Vec<FootDetection> {
    detections
        .into_iter()
        .filter(|d| d.detected && d.confidence.is_finite())
        .map(|mut d| {
            d.confidence = d.confidence.clamp(0.0, 1.0);
            d
        })
        .filter(|d| d.is_active())
        .collect()
}
