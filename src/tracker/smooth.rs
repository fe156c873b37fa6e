use crate::config::SmoothConfig;

use super::transform::{wrap_degrees, ShoeTransform};

/// EMAベースの靴配置平滑化フィルタ
///
/// 位置・拡大率: 成分ごとのEMA
/// 回転: 最短方向の角度差に対するEMA
pub struct TransformSmoother {
    alpha_position: f32,
    alpha_rotation: f32,
    alpha_scale: f32,
    prev: Option<ShoeTransform>,
}

impl TransformSmoother {
    pub fn new(alpha_position: f32, alpha_rotation: f32, alpha_scale: f32) -> Self {
        Self {
            alpha_position: alpha_position.clamp(0.0, 1.0),
            alpha_rotation: alpha_rotation.clamp(0.0, 1.0),
            alpha_scale: alpha_scale.clamp(0.0, 1.0),
            prev: None,
        }
    }

    pub fn from_config(config: &SmoothConfig) -> Self {
        Self::new(config.position, config.rotation, config.scale)
    }

    pub fn apply(&mut self, transform: ShoeTransform) -> ShoeTransform {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(transform);
                return transform;
            }
        };

        let ap = self.alpha_position;
        let x = ap * transform.x + (1.0 - ap) * prev.x;
        let y = ap * transform.y + (1.0 - ap) * prev.y;

        let a_s = self.alpha_scale;
        let scale = a_s * transform.scale + (1.0 - a_s) * prev.scale;

        // 359° → 1° を 180° 経由で回さない
        let delta = wrap_degrees(transform.rotation - prev.rotation);
        let rotation = prev.rotation + self.alpha_rotation * delta;

        let result = ShoeTransform::new(x, y, scale, rotation).with_positive_scale();
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }

    pub fn is_primed(&self) -> bool {
        self.prev.is_some()
    }
}
