use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use log::{debug, info};

use super::source::{CameraProvider, FrameSource, VideoFrame};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::lock;

/// 別スレッドで合成フレームを生成し、最新フレームを提供するカメラ
///
/// 実カメラが無い環境（デモ・テスト）用。床のグラデーションを毎フレーム少しずらして描く。
pub struct SyntheticCamera {
    latest: Arc<Mutex<Option<VideoFrame>>>,
    frame_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    width: u32,
    height: u32,
}

impl SyntheticCamera {
    pub fn start(width: u32, height: u32, fps: u32) -> Result<Self, CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::Unavailable(format!(
                "invalid resolution {}x{}",
                width, height
            )));
        }
        let latest = Arc::new(Mutex::new(None::<VideoFrame>));
        let latest_ref = Arc::clone(&latest);
        let frame_id = Arc::new(AtomicU64::new(0));
        let frame_id_ref = Arc::clone(&frame_id);
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = Arc::clone(&running);

        let target_interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        let handle = thread::Builder::new()
            .name("synthetic-camera".to_string())
            .spawn(move || {
                while running_ref.load(Ordering::Acquire) {
                    let start = Instant::now();
                    let id = frame_id_ref.load(Ordering::Acquire) + 1;
                    let frame = VideoFrame::new(id, render_floor(width, height, id));
                    {
                        // stop 後は書き込まない
                        let mut slot = lock(&latest_ref);
                        if !running_ref.load(Ordering::Acquire) {
                            break;
                        }
                        *slot = Some(frame);
                    }
                    frame_id_ref.store(id, Ordering::Release);

                    let elapsed = start.elapsed();
                    if elapsed < target_interval {
                        thread::sleep(target_interval - elapsed);
                    }
                }
                debug!("synthetic camera thread exited");
            })
            .map_err(|e| CameraError::Unavailable(e.to_string()))?;

        info!("synthetic camera started ({}x{} @{}fps)", width, height, fps);
        Ok(Self {
            latest,
            frame_id,
            running,
            handle: Mutex::new(Some(handle)),
            width,
            height,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id.load(Ordering::Acquire)
    }
}

impl FrameSource for SyntheticCamera {
    fn latest_frame(&self) -> Option<VideoFrame> {
        lock(&self.latest).clone()
    }

    /// tokioランタイム上ではスレッドの join を blocking プールへ回す
    fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        lock(&self.latest).take();
        if let Some(handle) = lock(&self.handle).take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || {
                        let _ = handle.join();
                    });
                }
                Err(_) => {
                    let _ = handle.join();
                }
            }
        }
        info!("synthetic camera stopped");
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 床のグラデーション。frame_idで縞が流れる
fn render_floor(width: u32, height: u32, frame_id: u64) -> RgbImage {
    let phase = (frame_id % 64) as u32;
    RgbImage::from_fn(width, height, |x, y| {
        let shade = (y * 160 / height.max(1)) as u8;
        let stripe = if (x + y + phase * 4) % 64 < 2 { 24 } else { 0 };
        Rgb([60 + shade / 2, 60 + shade / 2 + stripe, 70 + shade])
    })
}

/// 合成カメラを開くプロバイダ
///
/// `deny_permission` で権限拒否、`delay` で取得待ちを再現できる。
#[derive(Debug, Clone, Default)]
pub struct SyntheticCameraProvider {
    pub deny_permission: bool,
    pub delay: Duration,
}

impl SyntheticCameraProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            deny_permission: config.deny_permission,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl CameraProvider for SyntheticCameraProvider {
    fn open(&self, config: &CameraConfig) -> BoxFuture<'static, Result<Arc<dyn FrameSource>, CameraError>> {
        let deny = self.deny_permission;
        let delay = self.delay;
        let (width, height, fps) = (config.width, config.height, config.fps);
        let facing = config.facing.clone();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if deny {
                return Err(CameraError::PermissionDenied(format!(
                    "access to {} camera was refused",
                    facing
                )));
            }
            let camera = SyntheticCamera::start(width, height, fps)?;
            Ok(Arc::new(camera) as Arc<dyn FrameSource>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_resolution() {
        assert!(SyntheticCamera::start(0, 480, 30).is_err());
    }

    #[test]
    fn test_produces_frames_at_native_resolution() {
        let camera = SyntheticCamera::start(64, 48, 120).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while camera.latest_frame().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let frame = camera.latest_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), camera.resolution());
        assert!(camera.frame_id() >= 1);
        camera.stop();
        assert!(!camera.is_live());
        assert!(camera.latest_frame().is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let camera = SyntheticCamera::start(8, 8, 60).unwrap();
        camera.stop();
        camera.stop();
        assert!(!camera.is_live());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_on_runtime_does_not_wait_for_frame_interval() {
        let camera = SyntheticCamera::start(8, 8, 1).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while camera.latest_frame().is_none() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(camera.latest_frame().is_some());

        let started = Instant::now();
        camera.stop();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(!camera.is_live());
        assert!(camera.latest_frame().is_none());
    }

    #[tokio::test]
    async fn test_provider_denies_permission() {
        let provider = SyntheticCameraProvider {
            deny_permission: true,
            delay: Duration::ZERO,
        };
        let result = provider.open(&CameraConfig::default()).await;
        assert!(matches!(result, Err(CameraError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_provider_opens_camera() {
        let config = CameraConfig {
            width: 32,
            height: 24,
            ..CameraConfig::default()
        };
        let source = SyntheticCameraProvider::new().open(&config).await.unwrap();
        assert!(source.is_live());
        source.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_waits_for_delay() {
        let provider = SyntheticCameraProvider {
            deny_permission: true,
            delay: Duration::ZERO,
        }
        .with_delay(Duration::from_millis(300));
        let started = tokio::time::Instant::now();
        let result = provider.open(&CameraConfig::default()).await;
        assert!(result.is_err());
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
