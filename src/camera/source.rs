use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use image::RgbImage;

use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::lock;

/// カメラの1フレーム（ネイティブ解像度）
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 到着順の連番
    pub id: u64,
    pub image: Arc<RgbImage>,
}

impl VideoFrame {
    pub fn new(id: u64, image: RgbImage) -> Self {
        Self {
            id,
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 幅・高さが共に非ゼロか
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// 開いているカメラストリーム
///
/// `stop` を呼べるのはセッション（所有者）のみ。検出tickには [`FrameReader`] を渡す。
pub trait FrameSource: Send + Sync {
    /// 最新フレーム。初回フレーム到着前は None
    fn latest_frame(&self) -> Option<VideoFrame>;
    /// トラックを停止してデバイスを解放する。複数回呼んでもよい
    fn stop(&self);
    fn is_live(&self) -> bool;
}

/// 権限付きのカメラ取得
pub trait CameraProvider: Send + Sync {
    fn open(&self, config: &CameraConfig) -> BoxFuture<'static, Result<Arc<dyn FrameSource>, CameraError>>;
}

/// フレーム読み取り専用のハンドル
#[derive(Clone)]
pub struct FrameReader {
    source: Arc<dyn FrameSource>,
}

impl FrameReader {
    pub(crate) fn new(source: Arc<dyn FrameSource>) -> Self {
        Self { source }
    }

    pub fn latest(&self) -> Option<VideoFrame> {
        if !self.source.is_live() {
            return None;
        }
        self.source.latest_frame()
    }
}

/// 外部から push されたフレームを保持するソース
///
/// ホスト側（ブラウザブリッジ等）が実カメラのフレームを流し込むのに使う。
pub struct SharedFrameSource {
    latest: Mutex<Option<VideoFrame>>,
    frame_id: AtomicU64,
    live: AtomicBool,
}

impl SharedFrameSource {
    pub fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            frame_id: AtomicU64::new(0),
            live: AtomicBool::new(true),
        }
    }

    /// 1枚のフレームで初期化
    pub fn with_frame(image: RgbImage) -> Self {
        let source = Self::new();
        source.push(image);
        source
    }

    pub fn push(&self, image: RgbImage) {
        let id = self.frame_id.fetch_add(1, Ordering::AcqRel) + 1;
        *lock(&self.latest) = Some(VideoFrame::new(id, image));
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }
}

impl Default for SharedFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SharedFrameSource {
    fn latest_frame(&self) -> Option<VideoFrame> {
        lock(&self.latest).clone()
    }

    fn stop(&self) {
        self.live.store(false, Ordering::Release);
        lock(&self.latest).take();
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}
