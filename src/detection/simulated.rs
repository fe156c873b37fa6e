use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::detector::FootDetector;
use super::foot::{FootDetection, FootSide};
use crate::calibration::CalibrationData;
use crate::camera::VideoFrame;
use crate::config::DetectionConfig;
use crate::geometry::{BoundingBox, Point};

/// 左足の基準位置（%）
pub const LEFT_FOOT_ANCHOR: Point = Point { x: 35.0, y: 65.0 };
/// 右足の基準位置（%）
pub const RIGHT_FOOT_ANCHOR: Point = Point { x: 65.0, y: 65.0 };

/// 非キャリブレーション時のサイズ揺らぎ（±20%）
const UNCALIBRATED_SIZE_JITTER: f32 = 0.2;
/// つま先の開き（度）
const TOE_OUT_DEGREES: f32 = 5.0;
/// size=1.0 の足の外接矩形（%）
const FOOT_BOX_WIDTH: f32 = 12.0;
const FOOT_BOX_HEIGHT: f32 = 28.0;

/// 乱数で足検出を合成する検出器
///
/// 毎tick基本信頼度を引き、左閾値を超えれば左足、右閾値も超えれば右足を返す。
/// 実際の画像は見ない（フレームサイズの妥当性のみ確認）。
pub struct SimulatedFootDetector {
    rng: StdRng,
    min_confidence: f32,
    left_threshold: f32,
    right_threshold: f32,
    position_jitter: f32,
    orientation_jitter: f32,
}

impl SimulatedFootDetector {
    pub fn from_config(config: &DetectionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let min_confidence = config.min_confidence.clamp(0.0, 1.0);
        Self {
            rng,
            min_confidence,
            left_threshold: config.left_threshold.clamp(0.0, 1.0),
            right_threshold: config.right_threshold.clamp(0.0, 1.0),
            position_jitter: config.position_jitter.abs(),
            orientation_jitter: config.orientation_jitter.abs(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_config(&DetectionConfig {
            seed: Some(seed),
            ..DetectionConfig::default()
        })
    }

    fn jitter(&mut self, amount: f32) -> f32 {
        if amount == 0.0 {
            return 0.0;
        }
        self.rng.random_range(-amount..=amount)
    }

    fn synthesize(
        &mut self,
        side: FootSide,
        confidence: f32,
        calibration: Option<&CalibrationData>,
    ) -> FootDetection {
        let (anchor, toe_out) = match side {
            FootSide::Left => (LEFT_FOOT_ANCHOR, -TOE_OUT_DEGREES),
            FootSide::Right => (RIGHT_FOOT_ANCHOR, TOE_OUT_DEGREES),
        };
        let position = Point::new(
            (anchor.x + self.jitter(self.position_jitter)).clamp(0.0, 100.0),
            (anchor.y + self.jitter(self.position_jitter)).clamp(0.0, 100.0),
        );
        let size = match calibration {
            Some(cal) => cal.relative_foot_size(),
            None => 1.0 + self.jitter(UNCALIBRATED_SIZE_JITTER),
        };
        let orientation = toe_out + self.jitter(self.orientation_jitter);

        FootDetection {
            side,
            detected: true,
            confidence: confidence.clamp(0.0, 1.0),
            position,
            size,
            orientation,
            bounding_box: BoundingBox::centered(position, FOOT_BOX_WIDTH * size, FOOT_BOX_HEIGHT * size),
        }
    }
}

impl FootDetector for SimulatedFootDetector {
    fn name(&self) -> &str {
        "simulated"
    }

    fn detect(&mut self, frame: &VideoFrame, calibration: Option<&CalibrationData>) -> Vec<FootDetection> {
        if !frame.is_valid() {
            return Vec::new();
        }

        let base = if self.min_confidence >= 1.0 {
            1.0
        } else {
            self.rng.random_range(self.min_confidence..=1.0)
        };
        if base <= self.left_threshold {
            return Vec::new();
        }

        let mut detections = Vec::with_capacity(FootSide::COUNT);
        detections.push(self.synthesize(FootSide::Left, base, calibration));
        if base > self.right_threshold {
            let confidence = base * self.rng.random_range(0.9..=1.0);
            detections.push(self.synthesize(FootSide::Right, confidence, calibration));
        }
        detections
    }
}
