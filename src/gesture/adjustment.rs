use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::tracker::ShoeTransform;

use super::recognizer::GestureEvent;

pub const MIN_SCALE_MULTIPLIER: f32 = 0.5;
pub const MAX_SCALE_MULTIPLIER: f32 = 2.0;

/// 表示領域（ピクセル）。ドラッグ量を % に直すのに使う
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// ピクセル差分 → フレーム % 差分
    pub fn to_percent(&self, delta: Point) -> Point {
        Point::new(delta.x / self.width * 100.0, delta.y / self.height * 100.0)
    }
}

/// ジェスチャーによる手動補正。ARセッション中のみ保持する
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureAdjustment {
    /// [0.5, 2.0]
    pub scale_multiplier: f32,
    /// フレーム % 単位
    pub offset: Point,
}

impl Default for GestureAdjustment {
    fn default() -> Self {
        Self {
            scale_multiplier: 1.0,
            offset: Point::ORIGIN,
        }
    }
}

impl GestureAdjustment {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// ジェスチャーを反映する。値が変わったら true
    pub fn apply(&mut self, gesture: &GestureEvent, viewport: Viewport, reset_on_tap: bool) -> bool {
        let before = *self;
        match *gesture {
            GestureEvent::Tap { .. } => {
                if reset_on_tap {
                    self.reset();
                }
            }
            GestureEvent::Drag { delta, .. } => {
                if viewport.is_valid() && delta.x.is_finite() && delta.y.is_finite() {
                    let d = viewport.to_percent(delta);
                    self.offset = self.offset + d;
                }
            }
            GestureEvent::Pinch { scale } => {
                if scale.is_finite() && scale > 0.0 {
                    self.scale_multiplier = (self.scale_multiplier * scale)
                        .clamp(MIN_SCALE_MULTIPLIER, MAX_SCALE_MULTIPLIER);
                }
            }
        }
        *self != before
    }

    /// 配置に補正を重ねる
    pub fn compose(&self, transform: ShoeTransform) -> ShoeTransform {
        ShoeTransform::new(
            transform.x + self.offset.x,
            transform.y + self.offset.y,
            transform.scale * self.scale_multiplier,
            transform.rotation,
        )
        .with_positive_scale()
    }
}
