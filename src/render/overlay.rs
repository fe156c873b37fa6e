use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use log::warn;

use crate::error::CaptureError;
use crate::tracker::ShoeTransform;

/// 簡易シルエットのサイズ（つま先が上）
const SILHOUETTE_WIDTH: u32 = 64;
const SILHOUETTE_HEIGHT: u32 = 160;

const UPPER_COLOR: Rgba<u8> = Rgba([220, 60, 50, 235]);
const SOLE_COLOR: Rgba<u8> = Rgba([245, 245, 240, 255]);
const LACE_COLOR: Rgba<u8> = Rgba([250, 250, 250, 255]);

/// 靴の画像（RGBA）
#[derive(Debug, Clone)]
pub struct ShoeSprite {
    image: RgbaImage,
}

impl ShoeSprite {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| CaptureError::Sprite {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        Ok(Self { image })
    }

    /// 設定された画像を読む。読めなければシルエット
    pub fn load_or_silhouette(path: Option<&str>) -> Self {
        match path {
            Some(p) => Self::load(p).unwrap_or_else(|e| {
                warn!("{}; falling back to silhouette", e);
                Self::silhouette()
            }),
            None => Self::silhouette(),
        }
    }

    /// 楕円のアッパー + 外周のソール + 靴紐
    pub fn silhouette() -> Self {
        let (w, h) = (SILHOUETTE_WIDTH, SILHOUETTE_HEIGHT);
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let (rx, ry) = (cx - 1.0, cy - 1.0);
        let image = RgbaImage::from_fn(w, h, |x, y| {
            let nx = (x as f32 + 0.5 - cx) / rx;
            let ny = (y as f32 + 0.5 - cy) / ry;
            // つま先側を細くする
            let taper = if ny < 0.0 { 1.0 + 0.25 * ny } else { 1.0 };
            let r = (nx / taper).powi(2) + ny.powi(2);
            if r > 1.0 {
                Rgba([0, 0, 0, 0])
            } else if r > 0.8 {
                SOLE_COLOR
            } else if nx.abs() < 0.3 && (-0.3..0.3).contains(&ny) && (y / 6) % 2 == 0 {
                LACE_COLOR
            } else {
                UPPER_COLOR
            }
        });
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// キャプチャ時に重ねる靴の状態
#[derive(Debug, Clone)]
pub struct OverlayState {
    pub transforms: Vec<ShoeTransform>,
    pub sprite: Arc<ShoeSprite>,
    /// scale=1.0 の靴幅（フレーム幅比）
    pub base_width_ratio: f32,
}

impl OverlayState {
    pub fn new(transforms: Vec<ShoeTransform>, sprite: Arc<ShoeSprite>, base_width_ratio: f32) -> Self {
        Self {
            transforms,
            sprite,
            base_width_ratio,
        }
    }
}

/// フレームに靴を合成する（ネイティブ解像度のまま）
pub fn composite(frame: &RgbImage, overlay: &OverlayState) -> RgbImage {
    let mut out = frame.clone();
    for transform in &overlay.transforms {
        draw_sprite(&mut out, &overlay.sprite, transform, overlay.base_width_ratio);
    }
    out
}

/// 逆写像で回転・拡大しながらアルファブレンド
fn draw_sprite(target: &mut RgbImage, sprite: &ShoeSprite, transform: &ShoeTransform, base_width_ratio: f32) {
    let (fw, fh) = (target.width() as f32, target.height() as f32);
    let (sw, sh) = (sprite.width() as f32, sprite.height() as f32);
    if sw == 0.0 || sh == 0.0 {
        return;
    }

    let target_width = base_width_ratio * fw * transform.scale;
    let s = target_width / sw;
    if !s.is_finite() || s <= 0.0 {
        return;
    }

    let cx = transform.x / 100.0 * fw;
    let cy = transform.y / 100.0 * fh;
    if !cx.is_finite() || !cy.is_finite() || !transform.rotation.is_finite() {
        return;
    }
    let theta = transform.rotation.to_radians();
    let (sin, cos) = theta.sin_cos();

    // 回転後の外接範囲
    let reach = 0.5 * (sw * sw + sh * sh).sqrt() * s;
    let x0 = (cx - reach).floor().max(0.0) as i64;
    let x1 = (cx + reach).ceil().min(fw) as i64;
    let y0 = (cy - reach).floor().max(0.0) as i64;
    let y1 = (cy + reach).ceil().min(fh) as i64;

    for py in y0..y1 {
        for px in x0..x1 {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            let u = (cos * dx + sin * dy) / s + sw / 2.0;
            let v = (-sin * dx + cos * dy) / s + sh / 2.0;
            if u < 0.0 || v < 0.0 || u >= sw || v >= sh {
                continue;
            }
            let src = sprite.image.get_pixel(u as u32, v as u32);
            blend(target.get_pixel_mut(px as u32, py as u32), src);
        }
    }
}

fn blend(dst: &mut Rgb<u8>, src: &Rgba<u8>) {
    let a = src[3] as u32;
    if a == 0 {
        return;
    }
    for c in 0..3 {
        let mixed = (src[c] as u32 * a + dst[c] as u32 * (255 - a) + 127) / 255;
        dst[c] = mixed as u8;
    }
}
