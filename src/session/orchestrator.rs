use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::state::ArState;
use super::tick::TickHandle;
use crate::calibration::{CalibrationData, CalibrationStore, SHOE_SIZE_RANGE};
use crate::camera::{CameraProvider, FrameReader, FrameSource, SyntheticCameraProvider};
use crate::config::Config;
use crate::detection::{sanitize_detections, FootDetection, FootDetector, FootSide, SimulatedFootDetector};
use crate::error::{ArError, ValidationError};
use crate::gesture::{GestureAdjustment, GestureEvent, MouseInput, PointerHub, TouchInput, Viewport};
use crate::lock;
use crate::render::{CaptureService, CapturedImage, OverlayState, ShareOutcome, ShareTarget, ShoeSprite};
use crate::tracker::{PositionMapper, ShoeTransform, TransformSmoother, ViewMode, ViewModeTransformer};

/// 描画用の最終配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTransform {
    /// プレビュー時は None
    pub side: Option<FootSide>,
    pub transform: ShoeTransform,
    pub confidence: f32,
    /// 足未検出時のプレビュー配置
    pub preview: bool,
}

/// 1tick分の結果。`ArSession::subscribe` で配信する
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickFrame {
    /// セッション開始からの通算tick数
    pub tick: u64,
    pub frame_id: Option<u64>,
    /// セッション開始からのミリ秒
    pub clock_ms: f64,
    pub detections: Vec<FootDetection>,
    pub transforms: Vec<RenderTransform>,
}

#[derive(Debug, Clone, Copy)]
struct MappedFoot {
    side: FootSide,
    confidence: f32,
    transform: ShoeTransform,
}

/// tickとジェスチャーが書き、描画が読む状態
struct Tracking {
    detections: Vec<FootDetection>,
    mapped: Vec<MappedFoot>,
    smoothers: [TransformSmoother; FootSide::COUNT],
    mapper: PositionMapper,
    adjustment: GestureAdjustment,
    view_mode: ViewMode,
    requested_size: f32,
    viewport: Viewport,
    ticks: u64,
}

impl Tracking {
    fn new(config: &Config) -> Self {
        Self {
            detections: Vec::new(),
            mapped: Vec::new(),
            smoothers: std::array::from_fn(|_| TransformSmoother::from_config(&config.smooth)),
            mapper: PositionMapper::default(),
            adjustment: GestureAdjustment::default(),
            view_mode: ViewMode::default(),
            requested_size: config.session.requested_size,
            viewport: Viewport::new(config.session.viewport_width, config.session.viewport_height),
            ticks: 0,
        }
    }

    fn update(&mut self, detections: Vec<FootDetection>) {
        let mut seen = [false; FootSide::COUNT];
        self.mapped.clear();
        for d in &detections {
            let idx = d.side.index();
            if seen[idx] {
                continue;
            }
            seen[idx] = true;
            let base = self.mapper.map_position(d, self.requested_size);
            self.mapped.push(MappedFoot {
                side: d.side,
                confidence: d.confidence,
                transform: self.smoothers[idx].apply(base),
            });
        }
        // 見失った足は次に出たとき平滑化をやり直す
        for (idx, smoother) in self.smoothers.iter_mut().enumerate() {
            if !seen[idx] {
                smoother.reset();
            }
        }
        self.detections = detections;
    }

    fn render(&self, view: &ViewModeTransformer, clock_ms: f64, preview_fallback: bool) -> Vec<RenderTransform> {
        if self.mapped.is_empty() {
            if !preview_fallback {
                return Vec::new();
            }
            let base = self.mapper.preview(self.requested_size);
            let t = view.apply_view(self.view_mode, base, clock_ms, 0);
            return vec![RenderTransform {
                side: None,
                transform: self.adjustment.compose(t),
                confidence: 0.0,
                preview: true,
            }];
        }
        self.mapped
            .iter()
            .map(|m| {
                let t = view.apply_view(self.view_mode, m.transform, clock_ms, m.side.index());
                RenderTransform {
                    side: Some(m.side),
                    transform: self.adjustment.compose(t),
                    confidence: m.confidence,
                    preview: false,
                }
            })
            .collect()
    }

    /// セッション終了時。キャリブレーションと表示設定は残す
    fn clear(&mut self) {
        self.detections.clear();
        self.mapped.clear();
        for s in &mut self.smoothers {
            s.reset();
        }
        self.adjustment.reset();
    }
}

struct Lifecycle {
    state: ArState,
    camera: Option<Arc<dyn FrameSource>>,
    tick: Option<TickHandle>,
    /// 取得待ちのカメラ
    pending: Option<CancellationToken>,
    started_at: Instant,
}

/// tickタスクに渡すもの一式（カメラは読み取り専用）
struct TickContext {
    reader: FrameReader,
    detector: Arc<Mutex<Box<dyn FootDetector>>>,
    tracking: Arc<Mutex<Tracking>>,
    frames: Arc<watch::Sender<TickFrame>>,
    view: ViewModeTransformer,
    preview_fallback: bool,
    started_at: Instant,
}

impl TickContext {
    fn run(&self, token: &CancellationToken) {
        let Some(frame) = self.reader.latest() else {
            debug!("tick: no frame yet");
            return;
        };
        let calibration = lock(&self.tracking).mapper.calibration().copied();
        let detections = {
            let mut detector = lock(&self.detector);
            sanitize_detections(detector.detect(&frame, calibration.as_ref()))
        };
        let clock_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;

        let snapshot = {
            let mut tracking = lock(&self.tracking);
            // stop が先にロックを取っていたら捨てる
            if token.is_cancelled() {
                debug!("tick: discarded after stop");
                return;
            }
            tracking.update(detections);
            tracking.ticks += 1;
            TickFrame {
                tick: tracking.ticks,
                frame_id: Some(frame.id),
                clock_ms,
                detections: tracking.detections.clone(),
                transforms: tracking.render(&self.view, clock_ms, self.preview_fallback),
            }
        };
        debug!(
            "tick {}: {} feet (frame {})",
            snapshot.tick,
            snapshot.detections.len(),
            frame.id
        );
        self.frames.send_replace(snapshot);
    }
}

struct Inner {
    config: Config,
    store: Arc<CalibrationStore>,
    provider: Arc<dyn CameraProvider>,
    detector: Arc<Mutex<Box<dyn FootDetector>>>,
    capture: Arc<CaptureService>,
    sprite: Arc<ShoeSprite>,
    view: ViewModeTransformer,
    lifecycle: Mutex<Lifecycle>,
    tracking: Arc<Mutex<Tracking>>,
    gestures: Mutex<PointerHub>,
    frames: Arc<watch::Sender<TickFrame>>,
}

impl Drop for Inner {
    /// 最後のハンドルが stop されずに捨てられた場合の後始末
    fn drop(&mut self) {
        let lc = self.lifecycle.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pending) = lc.pending.take() {
            pending.cancel();
        }
        // TickHandle の drop がタスクを取り消す
        drop(lc.tick.take());
        if let Some(camera) = lc.camera.take() {
            camera.stop();
        }
        if lc.state != ArState::Idle {
            info!("AR session dropped while {}; released camera", lc.state);
            lc.state = ArState::Idle;
        }
    }
}

/// ARセッション
///
/// ```text
/// Idle --start--> Calibrating (未キャリブレーション)
/// Idle --start--> Active      (カメラ取得後)
/// Calibrating --calibrate/skip--> Active
/// Active --capture--> Capturing --> Active
/// * --stop--> Idle
/// ```
///
/// 全メソッドが `&self`。クローンは同じセッションを指す。
#[derive(Clone)]
pub struct ArSession {
    inner: Arc<Inner>,
}

pub struct ArSessionBuilder {
    config: Config,
    store: Option<Arc<CalibrationStore>>,
    provider: Option<Arc<dyn CameraProvider>>,
    detector: Option<Box<dyn FootDetector>>,
    share_target: Option<Box<dyn ShareTarget>>,
}

impl ArSessionBuilder {
    pub fn store(mut self, store: Arc<CalibrationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn camera(mut self, provider: Arc<dyn CameraProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn detector(mut self, detector: Box<dyn FootDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn share_target(mut self, target: Box<dyn ShareTarget>) -> Self {
        self.share_target = Some(target);
        self
    }

    /// 未指定の部品は設定から作る（ファイル保存、合成カメラ、シミュレーション検出器）
    pub fn build(self) -> ArSession {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(CalibrationStore::open_dir(&config.calibration.dir, &config.calibration.key)));
        let provider = self.provider.unwrap_or_else(|| {
            Arc::new(SyntheticCameraProvider::from_config(&config.camera)) as Arc<dyn CameraProvider>
        });
        let detector = self.detector.unwrap_or_else(|| {
            Box::new(SimulatedFootDetector::from_config(&config.detection)) as Box<dyn FootDetector>
        });
        let mut capture = CaptureService::new(&config.capture);
        if let Some(target) = self.share_target {
            capture = capture.with_share_target(target);
        }
        info!("foot detector: {}", detector.name());

        let (frames, _) = watch::channel(TickFrame::default());
        let inner = Inner {
            store,
            provider,
            detector: Arc::new(Mutex::new(detector)),
            capture: Arc::new(capture),
            sprite: Arc::new(ShoeSprite::load_or_silhouette(config.overlay.shoe_image.as_deref())),
            view: ViewModeTransformer::new(config.view),
            lifecycle: Mutex::new(Lifecycle {
                state: ArState::Idle,
                camera: None,
                tick: None,
                pending: None,
                started_at: Instant::now(),
            }),
            tracking: Arc::new(Mutex::new(Tracking::new(&config))),
            gestures: Mutex::new(PointerHub::new(&config.gesture)),
            frames: Arc::new(frames),
            config,
        };
        ArSession { inner: Arc::new(inner) }
    }
}

impl ArSession {
    pub fn builder(config: Config) -> ArSessionBuilder {
        ArSessionBuilder {
            config,
            store: None,
            provider: None,
            detector: None,
            share_target: None,
        }
    }

    pub fn state(&self) -> ArState {
        lock(&self.inner.lifecycle).state
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn calibration(&self) -> Option<CalibrationData> {
        self.inner.store.get()
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.inner.config.detection.tick_ms.max(1))
    }

    /// 未キャリブレーションなら Calibrating、そうでなければカメラを開いて Active
    pub async fn start(&self) -> Result<ArState, ArError> {
        let token = {
            let mut lc = lock(&self.inner.lifecycle);
            if lc.state != ArState::Idle {
                return Err(ArError::InvalidTransition {
                    action: "start",
                    state: lc.state,
                });
            }
            if lc.pending.is_some() {
                return Err(ArError::AcquisitionPending);
            }
            if !self.inner.store.is_calibrated() {
                lc.state = ArState::Calibrating;
                info!("AR session: idle -> calibrating");
                return Ok(ArState::Calibrating);
            }
            Self::begin_acquisition(&mut lc)
        };
        self.acquire_camera(token).await
    }

    /// キャリブレーションを保存して Active へ。Active 中なら値だけ差し替える
    pub async fn calibrate(&self, data: CalibrationData) -> Result<ArState, ArError> {
        let token = {
            let mut lc = lock(&self.inner.lifecycle);
            match lc.state {
                ArState::Calibrating if lc.pending.is_none() => {}
                ArState::Calibrating => return Err(ArError::AcquisitionPending),
                ArState::Active => {
                    self.inner.store.set(data)?;
                    lock(&self.inner.tracking).mapper.set_calibration(Some(data));
                    return Ok(ArState::Active);
                }
                state => {
                    return Err(ArError::InvalidTransition {
                        action: "calibrate",
                        state,
                    })
                }
            }
            // 範囲外なら Calibrating のまま
            self.inner.store.set(data)?;
            Self::begin_acquisition(&mut lc)
        };
        self.acquire_camera(token).await
    }

    /// キャリブレーション無しで Active へ
    pub async fn skip(&self) -> Result<ArState, ArError> {
        let token = {
            let mut lc = lock(&self.inner.lifecycle);
            if lc.state != ArState::Calibrating {
                return Err(ArError::InvalidTransition {
                    action: "skip calibration",
                    state: lc.state,
                });
            }
            if lc.pending.is_some() {
                return Err(ArError::AcquisitionPending);
            }
            Self::begin_acquisition(&mut lc)
        };
        self.acquire_camera(token).await
    }

    fn begin_acquisition(lc: &mut Lifecycle) -> CancellationToken {
        let token = CancellationToken::new();
        lc.pending = Some(token.clone());
        token
    }

    async fn acquire_camera(&self, token: CancellationToken) -> Result<ArState, ArError> {
        let open = self.inner.provider.open(&self.inner.config.camera);
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            r = open => Some(r),
        };

        let mut lc = lock(&self.inner.lifecycle);
        match result {
            None => {
                info!("camera acquisition cancelled");
                Err(ArError::Cancelled)
            }
            Some(r) if token.is_cancelled() => {
                // stop の後に届いたストリームは即解放
                if let Ok(source) = r {
                    source.stop();
                }
                info!("camera arrived after stop; released");
                Err(ArError::Cancelled)
            }
            Some(Err(e)) => {
                lc.pending = None;
                let from = lc.state;
                lc.state = ArState::Idle;
                warn!("camera acquisition failed ({} -> idle): {}", from, e);
                Err(e.into())
            }
            Some(Ok(source)) => {
                lc.pending = None;
                self.enter_active(&mut lc, source);
                Ok(ArState::Active)
            }
        }
    }

    fn enter_active(&self, lc: &mut Lifecycle, source: Arc<dyn FrameSource>) {
        let calibration = self.inner.store.get();
        {
            let mut tracking = lock(&self.inner.tracking);
            tracking.clear();
            tracking.mapper.set_calibration(calibration);
        }
        let from = lc.state;
        lc.started_at = Instant::now();
        lc.camera = Some(Arc::clone(&source));

        let ctx = TickContext {
            reader: FrameReader::new(source),
            detector: Arc::clone(&self.inner.detector),
            tracking: Arc::clone(&self.inner.tracking),
            frames: Arc::clone(&self.inner.frames),
            view: self.inner.view,
            preview_fallback: self.inner.config.overlay.preview_fallback,
            started_at: lc.started_at,
        };
        lc.tick = Some(TickHandle::spawn(self.tick_period(), move |token| ctx.run(token)));
        lc.state = ArState::Active;
        info!(
            "AR session: {} -> active (tick {}ms, {})",
            from,
            self.tick_period().as_millis(),
            if calibration.is_some() { "calibrated" } else { "uncalibrated" }
        );
    }

    /// 停止。tick とカメラ取得を取り消し、カメラを解放し、検出と補正を消す
    pub async fn stop(&self) {
        let (tick, camera, from, ticks) = {
            let mut lc = lock(&self.inner.lifecycle);
            if let Some(pending) = lc.pending.take() {
                pending.cancel();
            }
            let from = lc.state;
            lc.state = ArState::Idle;
            let tick = lc.tick.take();
            if let Some(t) = &tick {
                t.request_cancel();
            }
            // 取り消し後に tracking を消す。実行中のtickはロック内で取り消しを見て書き込まない
            let ticks = {
                let mut tracking = lock(&self.inner.tracking);
                tracking.clear();
                tracking.ticks
            };
            (tick, lc.camera.take(), from, ticks)
        };
        if let Some(tick) = tick {
            tick.cancel().await;
        }
        if let Some(camera) = camera {
            camera.stop();
        }

        lock(&self.inner.gestures).reset();
        self.inner.frames.send_replace(TickFrame {
            tick: ticks,
            ..TickFrame::default()
        });
        if from != ArState::Idle {
            info!("AR session: {} -> idle", from);
        }
    }

    pub fn view_mode(&self) -> ViewMode {
        lock(&self.inner.tracking).view_mode
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        let mut tracking = lock(&self.inner.tracking);
        if tracking.view_mode != mode {
            info!("view mode: {} -> {}", tracking.view_mode, mode);
            tracking.view_mode = mode;
        }
    }

    pub fn requested_size(&self) -> f32 {
        lock(&self.inner.tracking).requested_size
    }

    /// 試着サイズ。次のtickから反映
    pub fn set_requested_size(&self, size: f32) -> Result<(), ArError> {
        let (min, max) = SHOE_SIZE_RANGE;
        if !size.is_finite() {
            return Err(ValidationError::NotFinite { field: "requestedSize" }.into());
        }
        if !(min..=max).contains(&size) {
            return Err(ValidationError::OutOfRange {
                field: "requestedSize",
                value: size,
                min,
                max,
            }
            .into());
        }
        lock(&self.inner.tracking).requested_size = size;
        Ok(())
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        if !viewport.is_valid() {
            warn!("ignoring invalid viewport {:?}", viewport);
            return;
        }
        lock(&self.inner.tracking).viewport = viewport;
    }

    pub fn adjustment(&self) -> GestureAdjustment {
        lock(&self.inner.tracking).adjustment
    }

    pub fn detections(&self) -> Vec<FootDetection> {
        lock(&self.inner.tracking).detections.clone()
    }

    pub fn on_touch(&self, input: &TouchInput) -> Option<GestureEvent> {
        if !self.state().is_live() {
            return None;
        }
        let gesture = lock(&self.inner.gestures).on_touch(input)?;
        self.apply_gesture(&gesture);
        Some(gesture)
    }

    pub fn on_mouse(&self, input: &MouseInput) -> Option<GestureEvent> {
        if !self.state().is_live() {
            return None;
        }
        let gesture = lock(&self.inner.gestures).on_mouse(input)?;
        self.apply_gesture(&gesture);
        Some(gesture)
    }

    /// 認識済みジェスチャーを補正に反映する。Active 以外では無視
    pub fn apply_gesture(&self, gesture: &GestureEvent) -> bool {
        if !self.state().is_live() {
            return false;
        }
        let reset_on_tap = self.inner.config.gesture.reset_on_tap;
        let mut tracking = lock(&self.inner.tracking);
        let viewport = tracking.viewport;
        let changed = tracking.adjustment.apply(gesture, viewport, reset_on_tap);
        if changed {
            debug!("adjustment: {:?}", tracking.adjustment);
        }
        changed
    }

    /// 現在時刻での描画配置。Active/Capturing 以外は空
    pub fn render_transforms(&self) -> Vec<RenderTransform> {
        let started_at = {
            let lc = lock(&self.inner.lifecycle);
            if !lc.state.is_live() {
                return Vec::new();
            }
            lc.started_at
        };
        let clock_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        lock(&self.inner.tracking).render(&self.inner.view, clock_ms, self.inner.config.overlay.preview_fallback)
    }

    /// 最新のtick結果
    pub fn snapshot(&self) -> TickFrame {
        self.inner.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TickFrame> {
        self.inner.frames.subscribe()
    }

    /// 現在フレーム + 靴を静止画にする。フレームが無ければ状態は変えずにエラー
    pub async fn capture(&self) -> Result<CapturedImage, ArError> {
        let frame = {
            let mut lc = lock(&self.inner.lifecycle);
            if lc.state != ArState::Active {
                return Err(ArError::InvalidTransition {
                    action: "capture",
                    state: lc.state,
                });
            }
            lc.state = ArState::Capturing;
            lc.camera.as_ref().and_then(|c| c.latest_frame())
        };

        let overlay = OverlayState::new(
            self.render_transforms().into_iter().map(|r| r.transform).collect(),
            Arc::clone(&self.inner.sprite),
            self.inner.config.overlay.base_width_ratio,
        );
        let service = Arc::clone(&self.inner.capture);
        let result = tokio::task::spawn_blocking(move || service.capture(frame.as_ref(), &overlay))
            .await
            .map_err(|e| ArError::CaptureUnavailable(format!("capture task failed: {}", e)))
            .and_then(|r| r.map_err(ArError::from));

        {
            let mut lc = lock(&self.inner.lifecycle);
            // 途中で stop されていたら Idle のまま
            if lc.state == ArState::Capturing {
                lc.state = ArState::Active;
            }
        }
        match &result {
            Ok(image) => info!("captured {}x{} ({} bytes)", image.width, image.height, image.png.len()),
            Err(e) => warn!("capture failed: {}", e),
        }
        result
    }

    /// キャプチャして出力ディレクトリへ保存
    pub async fn capture_to_file(&self) -> Result<std::path::PathBuf, ArError> {
        let image = self.capture().await?;
        let filename = self.inner.capture.filename();
        Ok(self.inner.capture.download(&image, &filename)?)
    }

    pub fn share(&self, image: &CapturedImage, title: &str, text: &str) -> ShareOutcome {
        self.inner.capture.share(image, title, text)
    }
}
