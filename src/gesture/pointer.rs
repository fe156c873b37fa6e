use serde::{Deserialize, Serialize};

use crate::config::GestureConfig;
use crate::geometry::Point;

use super::recognizer::{GestureEvent, GestureRecognizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// OS による中断など。ジェスチャーを出さずに打ち切る
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Touch,
    Mouse,
}

/// 入力手段を問わないポインタイベント（座標はピクセル）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub modality: Modality,
    /// 1本目の指（Up で残りが無い場合は離れた位置）
    pub position: Point,
    /// 2本目の指（2本押下時のみ）
    pub secondary: Option<Point>,
    /// イベント後に押されている本数
    pub active_pointers: usize,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// ホストのネイティブタッチイベント
#[derive(Debug, Clone, PartialEq)]
pub struct TouchInput {
    pub phase: TouchPhase,
    /// イベント後も画面に触れている指
    pub touches: Vec<Point>,
    /// このイベントで変化した指
    pub changed: Vec<Point>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MousePhase {
    Down,
    Move,
    Up,
    /// カーソルが領域外へ出た
    Leave,
}

/// ホストのネイティブマウスイベント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseInput {
    pub phase: MousePhase,
    pub position: Point,
    pub timestamp_ms: u64,
}

/// タッチ → PointerEvent
#[derive(Debug, Default)]
pub struct TouchAdapter;

impl TouchAdapter {
    pub fn convert(&self, input: &TouchInput) -> Option<PointerEvent> {
        let phase = match input.phase {
            TouchPhase::Start => PointerPhase::Down,
            TouchPhase::Move => PointerPhase::Move,
            TouchPhase::End => PointerPhase::Up,
            TouchPhase::Cancel => PointerPhase::Cancel,
        };
        let position = match input.touches.first().or_else(|| input.changed.first()) {
            Some(p) => *p,
            // 座標の無い cancel でも打ち切りは伝える
            None if phase == PointerPhase::Cancel => Point::ORIGIN,
            None => return None,
        };
        let secondary = if input.touches.len() == 2 { input.touches.get(1).copied() } else { None };
        Some(PointerEvent {
            phase,
            modality: Modality::Touch,
            position,
            secondary,
            active_pointers: input.touches.len(),
            timestamp_ms: input.timestamp_ms,
        })
    }
}

/// マウス → PointerEvent（ボタン押下中のみ）
#[derive(Debug, Default)]
pub struct MouseAdapter {
    pressed: bool,
}

impl MouseAdapter {
    pub fn convert(&mut self, input: &MouseInput) -> Option<PointerEvent> {
        let (phase, active) = match input.phase {
            MousePhase::Down => {
                self.pressed = true;
                (PointerPhase::Down, 1)
            }
            MousePhase::Move if self.pressed => (PointerPhase::Move, 1),
            MousePhase::Up if self.pressed => {
                self.pressed = false;
                (PointerPhase::Up, 0)
            }
            MousePhase::Leave if self.pressed => {
                self.pressed = false;
                (PointerPhase::Cancel, 0)
            }
            // ホバー
            _ => return None,
        };
        Some(PointerEvent {
            phase,
            modality: Modality::Mouse,
            position: input.position,
            secondary: None,
            active_pointers: active,
            timestamp_ms: input.timestamp_ms,
        })
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// タッチとマウスを同時に受けて1つの認識器へ流す
///
/// タッチ操作中と、最後のタッチから `mouse_suppress_ms` 以内のマウスイベントは捨てる。
/// ブラウザがタッチの後に送る互換マウスイベントで同じ操作が二重に出ないようにする。
pub struct PointerHub {
    touch: TouchAdapter,
    mouse: MouseAdapter,
    recognizer: GestureRecognizer,
    suppress_ms: u64,
    last_touch_ms: Option<u64>,
    touch_active: bool,
}

impl PointerHub {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            touch: TouchAdapter,
            mouse: MouseAdapter::default(),
            recognizer: GestureRecognizer::new(config),
            suppress_ms: config.mouse_suppress_ms,
            last_touch_ms: None,
            touch_active: false,
        }
    }

    pub fn on_touch(&mut self, input: &TouchInput) -> Option<GestureEvent> {
        if self.mouse.is_pressed() {
            // マウス操作中にタッチが来たらマウス側は打ち切る
            self.mouse.release();
            self.recognizer.reset();
        }
        self.last_touch_ms = Some(input.timestamp_ms);
        let event = self.touch.convert(input)?;
        self.touch_active = event.active_pointers > 0;
        self.recognizer.handle(&event)
    }

    pub fn on_mouse(&mut self, input: &MouseInput) -> Option<GestureEvent> {
        if self.mouse_suppressed(input.timestamp_ms) {
            return None;
        }
        let event = self.mouse.convert(input)?;
        self.recognizer.handle(&event)
    }

    fn mouse_suppressed(&self, now_ms: u64) -> bool {
        if self.touch_active {
            return true;
        }
        match self.last_touch_ms {
            Some(last) => now_ms.saturating_sub(last) < self.suppress_ms,
            None => false,
        }
    }

    /// セッション終了時
    pub fn reset(&mut self) {
        self.mouse.release();
        self.recognizer.reset();
        self.touch_active = false;
        self.last_touch_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(phase: TouchPhase, touches: &[(f32, f32)], changed: &[(f32, f32)], t: u64) -> TouchInput {
        TouchInput {
            phase,
            touches: touches.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            changed: changed.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            timestamp_ms: t,
        }
    }

    fn mouse(phase: MousePhase, x: f32, y: f32, t: u64) -> MouseInput {
        MouseInput {
            phase,
            position: Point::new(x, y),
            timestamp_ms: t,
        }
    }

    #[test]
    fn test_touch_end_reports_lifted_position() {
        let adapter = TouchAdapter;
        let e = adapter
            .convert(&touch(TouchPhase::End, &[], &[(12.0, 34.0)], 5))
            .unwrap();
        assert_eq!(e.phase, PointerPhase::Up);
        assert_eq!(e.active_pointers, 0);
        assert_eq!(e.position, Point::new(12.0, 34.0));
    }

    #[test]
    fn test_mouse_hover_is_ignored() {
        let mut adapter = MouseAdapter::default();
        assert!(adapter.convert(&mouse(MousePhase::Move, 1.0, 1.0, 0)).is_none());
        assert!(adapter.convert(&mouse(MousePhase::Up, 1.0, 1.0, 0)).is_none());
        assert!(adapter.convert(&mouse(MousePhase::Down, 1.0, 1.0, 0)).is_some());
        let leave = adapter.convert(&mouse(MousePhase::Leave, 1.0, 1.0, 0)).unwrap();
        assert_eq!(leave.phase, PointerPhase::Cancel);
        assert!(!adapter.is_pressed());
    }

    #[test]
    fn test_touch_cancel_emits_nothing() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        assert!(hub
            .on_touch(&touch(TouchPhase::Start, &[(50.0, 50.0)], &[(50.0, 50.0)], 0))
            .is_none());
        assert!(hub
            .on_touch(&touch(TouchPhase::Cancel, &[], &[(50.0, 50.0)], 40))
            .is_none());

        // 次の操作は通常どおり認識される
        hub.on_touch(&touch(TouchPhase::Start, &[(10.0, 10.0)], &[(10.0, 10.0)], 100));
        let tap = hub.on_touch(&touch(TouchPhase::End, &[], &[(10.0, 10.0)], 150));
        assert_eq!(tap, Some(GestureEvent::Tap { position: Point::new(10.0, 10.0) }));
    }

    #[test]
    fn test_touch_cancel_without_points_still_clears() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        hub.on_touch(&touch(TouchPhase::Start, &[(50.0, 50.0)], &[(50.0, 50.0)], 0));
        assert!(hub.on_touch(&touch(TouchPhase::Cancel, &[], &[], 40)).is_none());
        // タッチは終わっているので抑制時間後のマウスは通る
        hub.on_mouse(&mouse(MousePhase::Down, 5.0, 5.0, 1000));
        let tap = hub.on_mouse(&mouse(MousePhase::Up, 5.0, 5.0, 1010));
        assert_eq!(tap, Some(GestureEvent::Tap { position: Point::new(5.0, 5.0) }));
    }

    #[test]
    fn test_mouse_leave_while_pressed_emits_nothing() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        assert!(hub.on_mouse(&mouse(MousePhase::Down, 5.0, 5.0, 0)).is_none());
        assert!(hub.on_mouse(&mouse(MousePhase::Leave, 5.0, 5.0, 20)).is_none());
        // 戻ってきてボタンを離してもタップにはならない
        assert!(hub.on_mouse(&mouse(MousePhase::Up, 5.0, 5.0, 40)).is_none());
    }

    #[test]
    fn test_touch_tap_with_compat_mouse_emits_once() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        let mut out = Vec::new();
        out.extend(hub.on_touch(&touch(TouchPhase::Start, &[(50.0, 50.0)], &[(50.0, 50.0)], 1000)));
        out.extend(hub.on_touch(&touch(TouchPhase::End, &[], &[(51.0, 50.0)], 1080)));
        // 互換マウスイベント
        out.extend(hub.on_mouse(&mouse(MousePhase::Down, 51.0, 50.0, 1100)));
        out.extend(hub.on_mouse(&mouse(MousePhase::Up, 51.0, 50.0, 1101)));
        assert_eq!(out, vec![GestureEvent::Tap { position: Point::new(51.0, 50.0) }]);
    }

    #[test]
    fn test_mouse_works_after_suppression_window() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        hub.on_touch(&touch(TouchPhase::Start, &[(0.0, 0.0)], &[(0.0, 0.0)], 0));
        hub.on_touch(&touch(TouchPhase::End, &[], &[(0.0, 0.0)], 10));
        assert!(hub.on_mouse(&mouse(MousePhase::Down, 5.0, 5.0, 2000)).is_none());
        let tap = hub.on_mouse(&mouse(MousePhase::Up, 6.0, 5.0, 2050));
        assert_eq!(tap, Some(GestureEvent::Tap { position: Point::new(6.0, 5.0) }));
    }

    #[test]
    fn test_mouse_ignored_while_touch_held() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        hub.on_touch(&touch(TouchPhase::Start, &[(0.0, 0.0)], &[(0.0, 0.0)], 0));
        // タッチ押しっぱなしのまま時間が経過
        assert!(hub.on_mouse(&mouse(MousePhase::Down, 0.0, 0.0, 5000)).is_none());
        assert!(hub.on_mouse(&mouse(MousePhase::Move, 100.0, 0.0, 5001)).is_none());
    }

    #[test]
    fn test_touch_pinch_through_hub() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        hub.on_touch(&touch(TouchPhase::Start, &[(100.0, 100.0)], &[(100.0, 100.0)], 0));
        hub.on_touch(&touch(
            TouchPhase::Start,
            &[(100.0, 100.0), (150.0, 100.0)],
            &[(150.0, 100.0)],
            10,
        ));
        let g = hub.on_touch(&touch(
            TouchPhase::Move,
            &[(100.0, 100.0), (200.0, 100.0)],
            &[(200.0, 100.0)],
            20,
        ));
        assert!(matches!(g, Some(GestureEvent::Pinch { scale }) if (scale - 2.0).abs() < 1e-5));
    }

    #[test]
    fn test_mouse_drag() {
        let mut hub = PointerHub::new(&GestureConfig::default());
        hub.on_mouse(&mouse(MousePhase::Down, 0.0, 0.0, 0));
        let g = hub.on_mouse(&mouse(MousePhase::Move, 0.0, 30.0, 16));
        assert_eq!(
            g,
            Some(GestureEvent::Drag { position: Point::new(0.0, 30.0), delta: Point::new(0.0, 30.0) })
        );
        assert!(hub.on_mouse(&mouse(MousePhase::Up, 0.0, 30.0, 32)).is_none());
    }
}
