use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::transform::ShoeTransform;
use crate::config::ViewConfig;

/// 仮想カメラの視点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Default,
    Side,
    Top,
    Walk,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [ViewMode::Default, ViewMode::Side, ViewMode::Top, ViewMode::Walk];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Default => "default",
            ViewMode::Side => "side",
            ViewMode::Top => "top",
            ViewMode::Walk => "walk",
        }
    }

    /// UIの切り替えボタン用
    pub fn next(self) -> Self {
        match self {
            ViewMode::Default => ViewMode::Side,
            ViewMode::Side => ViewMode::Top,
            ViewMode::Top => ViewMode::Walk,
            ViewMode::Walk => ViewMode::Default,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "front" => Ok(ViewMode::Default),
            "side" => Ok(ViewMode::Side),
            "top" => Ok(ViewMode::Top),
            "walk" => Ok(ViewMode::Walk),
            other => Err(format!("unknown view mode: {}", other)),
        }
    }
}

/// 視点ごとの配置補正
///
/// walkは時刻（ミリ秒）の純関数。同じ clock_ms なら同じ結果を返す。
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewModeTransformer {
    config: ViewConfig,
}

impl ViewModeTransformer {
    pub fn new(config: ViewConfig) -> Self {
        Self { config }
    }

    pub fn apply_view(
        &self,
        mode: ViewMode,
        base: ShoeTransform,
        clock_ms: f64,
        foot_index: usize,
    ) -> ShoeTransform {
        let mut t = base;
        match mode {
            ViewMode::Default => {}
            ViewMode::Side => {
                t.rotation += 90.0;
                t.scale *= 0.8;
            }
            ViewMode::Top => {
                t.rotation += 180.0;
                t.scale *= 1.2;
                t.y -= 10.0;
            }
            ViewMode::Walk => {
                // 左右の足は逆位相
                let phase = foot_index as f64 * PI;
                let c = &self.config;
                let bob = (clock_ms * c.walk_omega_y as f64 + phase).sin();
                let sway = (clock_ms * c.walk_omega_rotation as f64 + phase).sin();
                t.y += c.walk_amplitude_y * bob as f32;
                t.rotation += c.walk_amplitude_rotation * sway as f32;
            }
        }
        t.with_positive_scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ShoeTransform {
        ShoeTransform::new(35.0, 60.0, 1.0, 10.0)
    }

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_default_is_identity() {
        let v = ViewModeTransformer::default();
        assert_eq!(v.apply_view(ViewMode::Default, base(), 1234.0, 0), base());
    }

    #[test]
    fn test_side() {
        let t = ViewModeTransformer::default().apply_view(ViewMode::Side, base(), 0.0, 0);
        assert!(approx_eq(t.rotation, 100.0));
        assert!(approx_eq(t.scale, 0.8));
        assert_eq!((t.x, t.y), (35.0, 60.0));
    }

    #[test]
    fn test_top() {
        let t = ViewModeTransformer::default().apply_view(ViewMode::Top, base(), 0.0, 0);
        assert!(approx_eq(t.rotation, 190.0));
        assert!(approx_eq(t.scale, 1.2));
        assert!(approx_eq(t.y, 50.0));
    }

    #[test]
    fn test_walk_at_known_clock() {
        let v = ViewModeTransformer::default();
        // t=0: sin(0)=0 → 変化なし
        let t0 = v.apply_view(ViewMode::Walk, base(), 0.0, 0);
        assert!(approx_eq(t0.y, 60.0));
        assert!(approx_eq(t0.rotation, 10.0));

        // t=50π ms: 0.01*t = π/2 → y +3、0.005*t = π/4 → rotation + 5*sin(π/4)
        let clock = 50.0 * PI;
        let t1 = v.apply_view(ViewMode::Walk, base(), clock, 0);
        assert!(approx_eq(t1.y, 63.0));
        assert!(approx_eq(t1.rotation, 10.0 + 5.0 * std::f32::consts::FRAC_1_SQRT_2));
        assert_eq!(t1.scale, 1.0);
    }

    #[test]
    fn test_walk_is_deterministic() {
        let v = ViewModeTransformer::default();
        for clock in [0.0, 16.7, 1000.0, 1_700_000_000_000.0] {
            let a = v.apply_view(ViewMode::Walk, base(), clock, 1);
            let b = v.apply_view(ViewMode::Walk, base(), clock, 1);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_walk_feet_alternate() {
        let v = ViewModeTransformer::default();
        let clock = 50.0 * PI;
        let left = v.apply_view(ViewMode::Walk, base(), clock, 0);
        let right = v.apply_view(ViewMode::Walk, base(), clock, 1);
        assert!(approx_eq(left.y - 60.0, -(right.y - 60.0)));
    }

    #[test]
    fn test_no_mode_produces_non_positive_scale() {
        let v = ViewModeTransformer::default();
        let tiny = ShoeTransform::new(50.0, 50.0, 0.011, 0.0);
        for mode in ViewMode::ALL {
            for clock in [0.0, 123.0, 9999.0] {
                assert!(v.apply_view(mode, tiny, clock, 0).scale > 0.0);
                assert!(v.apply_view(mode, base(), clock, 1).scale > 0.0);
            }
        }
    }

    #[test]
    fn test_parse_and_cycle() {
        assert_eq!("walk".parse::<ViewMode>().unwrap(), ViewMode::Walk);
        assert_eq!("Front".parse::<ViewMode>().unwrap(), ViewMode::Default);
        assert!("back".parse::<ViewMode>().is_err());
        let mut mode = ViewMode::Default;
        for _ in 0..4 {
            mode = mode.next();
        }
        assert_eq!(mode, ViewMode::Default);
    }
}
