use crate::calibration::CalibrationData;
use crate::detection::FootDetection;

use super::transform::ShoeTransform;

/// 検出点から靴を描く位置までの上方向オフセット（%）
pub const SHOE_Y_OFFSET: f32 = 5.0;

/// 検出結果 → 靴の配置
///
/// キャリブレーションがあれば「試着サイズ / 実サイズ」で拡大率を補正する。
/// 無ければ検出サイズをそのまま使う。
#[derive(Debug, Clone, Default)]
pub struct PositionMapper {
    calibration: Option<CalibrationData>,
}

impl PositionMapper {
    pub fn new(calibration: Option<CalibrationData>) -> Self {
        Self { calibration }
    }

    pub fn set_calibration(&mut self, calibration: Option<CalibrationData>) {
        self.calibration = calibration;
    }

    pub fn calibration(&self) -> Option<&CalibrationData> {
        self.calibration.as_ref()
    }

    /// 試着サイズ / キャリブレーション時の靴サイズ
    ///
    /// 試着サイズが不正（0以下・非有限）なら1.0
    pub fn size_ratio(&self, requested_shoe_size: f32) -> f32 {
        match self.calibration {
            Some(cal) if requested_shoe_size.is_finite() && requested_shoe_size > 0.0 && cal.shoe_size > 0.0 => {
                requested_shoe_size / cal.shoe_size
            }
            _ => 1.0,
        }
    }

    pub fn map_position(&self, detection: &FootDetection, requested_shoe_size: f32) -> ShoeTransform {
        let scale = detection.size * self.size_ratio(requested_shoe_size);
        ShoeTransform::new(
            detection.position.x,
            detection.position.y - SHOE_Y_OFFSET,
            scale,
            detection.orientation,
        )
        .with_positive_scale()
    }

    /// 足未検出時のプレビュー配置（希望位置、等倍基準）
    pub fn preview(&self, requested_shoe_size: f32) -> ShoeTransform {
        let (x, y) = match self.calibration {
            Some(cal) => (cal.preferred_position.x, cal.preferred_position.y),
            None => (50.0, 65.0),
        };
        ShoeTransform::new(x, y - SHOE_Y_OFFSET, self.size_ratio(requested_shoe_size), 0.0)
            .with_positive_scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::FootSide;
    use crate::geometry::{BoundingBox, Point};
    use crate::tracker::transform::MIN_SCALE;

    fn detection(size: f32) -> FootDetection {
        FootDetection {
            side: FootSide::Left,
            detected: true,
            confidence: 0.9,
            position: Point::new(35.0, 65.0),
            size,
            orientation: -4.0,
            bounding_box: BoundingBox::default(),
        }
    }

    #[test]
    fn test_calibrated_scale_ratio() {
        let mapper = PositionMapper::new(Some(CalibrationData::new(25.0, 10.0, 9.0)));
        let t = mapper.map_position(&detection(1.0), 10.0);
        assert!((t.scale - 10.0 / 9.0).abs() < 1e-5);
        assert!((t.scale - 1.111).abs() < 1e-3);
    }

    #[test]
    fn test_uncalibrated_uses_detection_size() {
        let mapper = PositionMapper::default();
        let t = mapper.map_position(&detection(0.85), 12.0);
        assert_eq!(t.scale, 0.85);
    }

    #[test]
    fn test_position_is_lifted_and_rotation_kept() {
        let mapper = PositionMapper::default();
        let t = mapper.map_position(&detection(1.0), 9.0);
        assert_eq!(t.x, 35.0);
        assert_eq!(t.y, 60.0);
        assert_eq!(t.rotation, -4.0);
    }

    #[test]
    fn test_scale_stays_positive() {
        let mapper = PositionMapper::new(Some(CalibrationData::new(25.0, 10.0, 9.0)));
        for requested in [0.0, -3.0, f32::NAN, f32::INFINITY, 5.0, 15.0] {
            for size in [1e-6, 0.5, 1.0, 2.0] {
                let t = mapper.map_position(&detection(size), requested);
                assert!(t.scale > 0.0, "requested={} size={}", requested, size);
            }
        }
        // size=0 の検出も最小値に収める
        assert_eq!(mapper.map_position(&detection(0.0), 9.0).scale, MIN_SCALE);
    }

    #[test]
    fn test_preview_uses_preferred_position() {
        let cal = CalibrationData::new(25.0, 10.0, 9.0).with_preferred_position(40.0, 70.0);
        let mapper = PositionMapper::new(Some(cal));
        let t = mapper.preview(9.0);
        assert_eq!((t.x, t.y), (40.0, 65.0));
        assert_eq!(t.scale, 1.0);
    }
}
