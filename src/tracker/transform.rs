use serde::{Deserialize, Serialize};

/// これ以下の拡大率は作らない
pub const MIN_SCALE: f32 = 0.01;

/// 靴オーバーレイの配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShoeTransform {
    /// フレームに対する % 座標
    pub x: f32,
    pub y: f32,
    /// 拡大率 (> 0)
    pub scale: f32,
    /// 回転（度）
    pub rotation: f32,
}

impl ShoeTransform {
    pub fn new(x: f32, y: f32, scale: f32, rotation: f32) -> Self {
        Self { x, y, scale, rotation }
    }

    /// 中央、等倍、回転なし
    pub fn identity() -> Self {
        Self::new(50.0, 50.0, 1.0, 0.0)
    }

    /// scaleを正の有限値に収める
    pub fn with_positive_scale(mut self) -> Self {
        if !self.scale.is_finite() || self.scale < MIN_SCALE {
            self.scale = MIN_SCALE;
        }
        self
    }
}

/// 角度差を -180〜180 度に正規化
pub fn wrap_degrees(delta: f32) -> f32 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 { 180.0 } else { wrapped }
}
