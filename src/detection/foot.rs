use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point};

/// 左右の足
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootSide {
    Left = 0,
    Right = 1,
}

impl FootSide {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

/// 1tick分の足検出結果。永続化しない
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootDetection {
    pub side: FootSide,
    pub detected: bool,
    /// 信頼度 (0.0〜1.0)
    pub confidence: f32,
    /// フレームに対する % 座標
    pub position: Point,
    /// 相対サイズ（1.0 = キャリブレーション基準）
    pub size: f32,
    /// 向き（度）
    pub orientation: f32,
    pub bounding_box: BoundingBox,
}

impl FootDetection {
    /// 描画対象になる検出か（detected かつ 信頼度 > 0）
    pub fn is_active(&self) -> bool {
        self.detected && self.confidence > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(detected: bool, confidence: f32) -> FootDetection {
        FootDetection {
            side: FootSide::Left,
            detected,
            confidence,
            position: Point::new(35.0, 65.0),
            size: 1.0,
            orientation: 0.0,
            bounding_box: BoundingBox::default(),
        }
    }

    #[test]
    fn test_side_index_roundtrip() {
        assert_eq!(FootSide::from_index(FootSide::Left.index()), Some(FootSide::Left));
        assert_eq!(FootSide::from_index(FootSide::Right.index()), Some(FootSide::Right));
        assert_eq!(FootSide::from_index(2), None);
    }

    #[test]
    fn test_is_active() {
        assert!(detection(true, 0.8).is_active());
        assert!(!detection(true, 0.0).is_active());
        assert!(!detection(false, 0.9).is_active());
    }
}
