use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub smooth: SmoothConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// カメラ取得設定
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// 要求解像度（実際の解像度はフレームから取得する）
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
    /// "environment"（背面）または "user"（前面）
    #[serde(default = "default_facing")]
    pub facing: String,
    /// 合成カメラで権限拒否を再現する
    #[serde(default)]
    pub deny_permission: bool,
}

fn default_camera_width() -> u32 { 1280 }
fn default_camera_height() -> u32 { 720 }
fn default_camera_fps() -> u32 { 30 }
fn default_facing() -> String { "environment".to_string() }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
            facing: default_facing(),
            deny_permission: false,
        }
    }
}

/// 検出ループ設定
#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// 検出tick周期（ミリ秒）
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// 乱数シード（未指定ならエントロピーから）
    #[serde(default)]
    pub seed: Option<u64>,
    /// 基本信頼度の下限
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// 左足を検出する信頼度閾値
    #[serde(default = "default_left_threshold")]
    pub left_threshold: f32,
    /// 右足を検出する信頼度閾値（左より高い）
    #[serde(default = "default_right_threshold")]
    pub right_threshold: f32,
    /// 位置ジッター（%）
    #[serde(default = "default_position_jitter")]
    pub position_jitter: f32,
    /// 向きジッター（度）
    #[serde(default = "default_orientation_jitter")]
    pub orientation_jitter: f32,
}

fn default_tick_ms() -> u64 { 100 }
fn default_min_confidence() -> f32 { 0.5 }
fn default_left_threshold() -> f32 { 0.6 }
fn default_right_threshold() -> f32 { 0.75 }
fn default_position_jitter() -> f32 { 2.5 }
fn default_orientation_jitter() -> f32 { 7.5 }

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            seed: None,
            min_confidence: default_min_confidence(),
            left_threshold: default_left_threshold(),
            right_threshold: default_right_threshold(),
            position_jitter: default_position_jitter(),
            orientation_jitter: default_orientation_jitter(),
        }
    }
}

/// ジェスチャー認識の閾値（ピクセル）
#[derive(Debug, Deserialize, Clone)]
pub struct GestureConfig {
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold: f32,
    #[serde(default = "default_touch_tap_threshold")]
    pub touch_tap_threshold: f32,
    #[serde(default = "default_mouse_tap_threshold")]
    pub mouse_tap_threshold: f32,
    /// タッチ後に来る互換マウスイベントを無視する時間（ミリ秒）
    #[serde(default = "default_mouse_suppress_ms")]
    pub mouse_suppress_ms: u64,
    /// タップで拡大率・オフセットをリセットする
    #[serde(default = "default_reset_on_tap")]
    pub reset_on_tap: bool,
}

fn default_drag_threshold() -> f32 { 5.0 }
fn default_touch_tap_threshold() -> f32 { 10.0 }
fn default_mouse_tap_threshold() -> f32 { 5.0 }
fn default_mouse_suppress_ms() -> u64 { 500 }
fn default_reset_on_tap() -> bool { true }

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: default_drag_threshold(),
            touch_tap_threshold: default_touch_tap_threshold(),
            mouse_tap_threshold: default_mouse_tap_threshold(),
            mouse_suppress_ms: default_mouse_suppress_ms(),
            reset_on_tap: default_reset_on_tap(),
        }
    }
}

/// walkモードのアニメーション係数
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct ViewConfig {
    /// 上下動の角周波数（rad/ms）
    #[serde(default = "default_walk_omega_y")]
    pub walk_omega_y: f32,
    /// 回転揺れの角周波数（rad/ms）
    #[serde(default = "default_walk_omega_rotation")]
    pub walk_omega_rotation: f32,
    /// 上下動の振幅（%）
    #[serde(default = "default_walk_amplitude_y")]
    pub walk_amplitude_y: f32,
    /// 回転揺れの振幅（度）
    #[serde(default = "default_walk_amplitude_rotation")]
    pub walk_amplitude_rotation: f32,
}

fn default_walk_omega_y() -> f32 { 0.01 }
fn default_walk_omega_rotation() -> f32 { 0.005 }
fn default_walk_amplitude_y() -> f32 { 3.0 }
fn default_walk_amplitude_rotation() -> f32 { 5.0 }

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            walk_omega_y: default_walk_omega_y(),
            walk_omega_rotation: default_walk_omega_rotation(),
            walk_amplitude_y: default_walk_amplitude_y(),
            walk_amplitude_rotation: default_walk_amplitude_rotation(),
        }
    }
}

/// EMA平滑化係数（1.0 = 平滑化なし）
#[derive(Debug, Deserialize, Clone)]
pub struct SmoothConfig {
    #[serde(default = "default_smooth_position")]
    pub position: f32,
    #[serde(default = "default_smooth_rotation")]
    pub rotation: f32,
    #[serde(default = "default_smooth_scale")]
    pub scale: f32,
}

fn default_smooth_position() -> f32 { 0.6 }
fn default_smooth_rotation() -> f32 { 0.5 }
fn default_smooth_scale() -> f32 { 0.5 }

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            position: default_smooth_position(),
            rotation: default_smooth_rotation(),
            scale: default_smooth_scale(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// 保存先ディレクトリ
    #[serde(default = "default_calibration_dir")]
    pub dir: String,
    /// レコードのキー
    #[serde(default = "default_calibration_key")]
    pub key: String,
}

fn default_calibration_dir() -> String { "data".to_string() }
fn default_calibration_key() -> String { crate::calibration::CALIBRATION_KEY.to_string() }

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dir: default_calibration_dir(),
            key: default_calibration_key(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_capture_dir")]
    pub output_dir: String,
    /// ファイル名に "-enhanced" を付ける
    #[serde(default = "default_enhanced")]
    pub enhanced: bool,
}

fn default_capture_dir() -> String { "captures".to_string() }
fn default_enhanced() -> bool { true }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_capture_dir(),
            enhanced: default_enhanced(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// 靴画像（PNG, 透過付き）。未指定なら簡易シルエットを描く
    #[serde(default)]
    pub shoe_image: Option<String>,
    /// scale=1.0 のときの靴幅（フレーム幅に対する比率）
    #[serde(default = "default_base_width_ratio")]
    pub base_width_ratio: f32,
    /// 足未検出時にプレビュー位置へ靴を表示する
    #[serde(default)]
    pub preview_fallback: bool,
}

fn default_base_width_ratio() -> f32 { 0.18 }

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            shoe_image: None,
            base_width_ratio: default_base_width_ratio(),
            preview_fallback: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// 試着する靴サイズ
    #[serde(default = "default_requested_size")]
    pub requested_size: f32,
    /// 表示領域（ドラッグ量のピクセル→%変換に使う）
    #[serde(default = "default_viewport_width")]
    pub viewport_width: f32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f32,
}

fn default_requested_size() -> f32 { 9.0 }
fn default_viewport_width() -> f32 { 390.0 }
fn default_viewport_height() -> f32 { 844.0 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            requested_size: default_requested_size(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }
}
