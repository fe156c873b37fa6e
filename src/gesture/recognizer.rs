use crate::config::GestureConfig;
use crate::geometry::Point;

use super::pointer::{Modality, PointerEvent, PointerPhase};

/// 入力手段に依存しないジェスチャー
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Tap { position: Point },
    /// delta は直前の発火位置からの増分（ピクセル）
    Drag { position: Point, delta: Point },
    /// 直前の2点間距離に対する比
    Pinch { scale: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tracking {
    Idle,
    Single {
        modality: Modality,
        start: Point,
        /// ドラッグ差分の基準点（発火ごとに更新）
        reference: Point,
        max_displacement: f32,
        dragged: bool,
        /// ピンチから1本指に戻った場合は false
        tap_allowed: bool,
    },
    Pinch {
        prev_distance: f32,
    },
    /// 3本指以上。全指が離れるまで何も出さない
    Ignored,
}

/// ポインタ列 → ジェスチャーの状態機械
pub struct GestureRecognizer {
    drag_threshold: f32,
    touch_tap_threshold: f32,
    mouse_tap_threshold: f32,
    state: Tracking,
}

impl GestureRecognizer {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            drag_threshold: config.drag_threshold.abs(),
            touch_tap_threshold: config.touch_tap_threshold.abs(),
            mouse_tap_threshold: config.mouse_tap_threshold.abs(),
            state: Tracking::Idle,
        }
    }

    fn tap_threshold(&self, modality: Modality) -> f32 {
        match modality {
            Modality::Touch => self.touch_tap_threshold,
            Modality::Mouse => self.mouse_tap_threshold,
        }
    }

    /// シーケンス途中か（指またはボタンが押されている）
    pub fn is_tracking(&self) -> bool {
        self.state != Tracking::Idle
    }

    pub fn reset(&mut self) {
        self.state = Tracking::Idle;
    }

    pub fn handle(&mut self, event: &PointerEvent) -> Option<GestureEvent> {
        if event.phase == PointerPhase::Cancel {
            // 指が残っていれば全部離れるまで無視
            self.state = if event.active_pointers > 0 { Tracking::Ignored } else { Tracking::Idle };
            return None;
        }
        if event.phase == PointerPhase::Up && event.active_pointers == 0 {
            let gesture = self.finish(event);
            self.state = Tracking::Idle;
            return gesture;
        }
        if event.active_pointers > 2 {
            self.state = Tracking::Ignored;
            return None;
        }
        if self.state == Tracking::Ignored {
            return None;
        }

        match event.phase {
            PointerPhase::Down => {
                self.begin(event);
                None
            }
            PointerPhase::Move => self.track(event),
            PointerPhase::Up => {
                // 2本 → 1本: 残った指を新しい基準にする
                if event.active_pointers == 1 {
                    self.state = Tracking::Single {
                        modality: event.modality,
                        start: event.position,
                        reference: event.position,
                        max_displacement: 0.0,
                        dragged: false,
                        tap_allowed: false,
                    };
                }
                None
            }
            PointerPhase::Cancel => None,
        }
    }

    fn begin(&mut self, event: &PointerEvent) {
        match (event.active_pointers, event.secondary) {
            (1, _) => {
                let tap_allowed = self.state == Tracking::Idle;
                self.state = Tracking::Single {
                    modality: event.modality,
                    start: event.position,
                    reference: event.position,
                    max_displacement: 0.0,
                    dragged: false,
                    tap_allowed,
                };
            }
            (2, Some(second)) => {
                self.state = Tracking::Pinch {
                    prev_distance: event.position.distance(&second),
                };
            }
            _ => {}
        }
    }

    fn track(&mut self, event: &PointerEvent) -> Option<GestureEvent> {
        match (self.state, event.active_pointers) {
            (Tracking::Single { .. }, 1) => self.track_single(event),
            (Tracking::Pinch { .. }, 2) => self.track_pinch(event),
            (Tracking::Ignored, _) => None,
            _ => {
                // 本数が変わった直後の move。ここで追跡を組み直す
                self.begin(event);
                None
            }
        }
    }

    fn track_single(&mut self, event: &PointerEvent) -> Option<GestureEvent> {
        let drag_threshold = self.drag_threshold;
        if let Tracking::Single {
            start,
            ref mut reference,
            ref mut max_displacement,
            ref mut dragged,
            ..
        } = self.state
        {
            *max_displacement = max_displacement.max(start.distance(&event.position));
            let delta = reference.delta_to(&event.position);
            if delta.x.abs() > drag_threshold || delta.y.abs() > drag_threshold {
                *reference = event.position;
                *dragged = true;
                return Some(GestureEvent::Drag {
                    position: event.position,
                    delta,
                });
            }
        }
        None
    }

    fn track_pinch(&mut self, event: &PointerEvent) -> Option<GestureEvent> {
        let second = event.secondary?;
        if let Tracking::Pinch { ref mut prev_distance } = self.state {
            let distance = event.position.distance(&second);
            let prev = *prev_distance;
            *prev_distance = distance;
            if prev <= f32::EPSILON || !distance.is_finite() {
                return None;
            }
            return Some(GestureEvent::Pinch { scale: distance / prev });
        }
        None
    }

    fn finish(&self, event: &PointerEvent) -> Option<GestureEvent> {
        match self.state {
            Tracking::Single {
                modality,
                start,
                max_displacement,
                dragged,
                tap_allowed,
                ..
            } => {
                let displacement = max_displacement.max(start.distance(&event.position));
                if tap_allowed && !dragged && displacement < self.tap_threshold(modality) {
                    Some(GestureEvent::Tap { position: event.position })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognizer() -> GestureRecognizer {
        GestureRecognizer::new(&GestureConfig::default())
    }

    fn single(phase: PointerPhase, modality: Modality, x: f32, y: f32, active: usize) -> PointerEvent {
        PointerEvent {
            phase,
            modality,
            position: Point::new(x, y),
            secondary: None,
            active_pointers: active,
            timestamp_ms: 0,
        }
    }

    fn pair(phase: PointerPhase, a: Point, b: Point) -> PointerEvent {
        PointerEvent {
            phase,
            modality: Modality::Touch,
            position: a,
            secondary: Some(b),
            active_pointers: 2,
            timestamp_ms: 0,
        }
    }

    fn run(r: &mut GestureRecognizer, events: &[PointerEvent]) -> Vec<GestureEvent> {
        events.iter().filter_map(|e| r.handle(e)).collect()
    }

    #[test]
    fn test_small_movement_is_one_tap() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Touch, 100.0, 100.0, 1),
                single(PointerPhase::Move, Modality::Touch, 102.0, 102.0, 1),
                single(PointerPhase::Up, Modality::Touch, 103.0, 100.0, 0),
            ],
        );
        assert_eq!(out, vec![GestureEvent::Tap { position: Point::new(103.0, 100.0) }]);
    }

    #[test]
    fn test_mouse_tap_threshold_is_tighter() {
        // 7px: タッチでは tap、マウスでは tap にならない（drag は up 時の移動なので出ない）
        let mut r = recognizer();
        let touch = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Touch, 0.0, 0.0, 1),
                single(PointerPhase::Up, Modality::Touch, 7.0, 0.0, 0),
            ],
        );
        assert_eq!(touch.len(), 1);
        let mouse = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Mouse, 0.0, 0.0, 1),
                single(PointerPhase::Up, Modality::Mouse, 7.0, 0.0, 0),
            ],
        );
        assert!(mouse.is_empty());
    }

    #[test]
    fn test_long_movement_drags_without_tap() {
        let mut r = recognizer();
        let mut events = vec![single(PointerPhase::Down, Modality::Touch, 0.0, 0.0, 1)];
        for step in 1..=10 {
            events.push(single(PointerPhase::Move, Modality::Touch, step as f32 * 5.0, 0.0, 1));
        }
        events.push(single(PointerPhase::Up, Modality::Touch, 50.0, 0.0, 0));
        let out = run(&mut r, &events);
        assert!(!out.is_empty());
        assert!(out.iter().all(|g| matches!(g, GestureEvent::Drag { .. })));
    }

    #[test]
    fn test_drag_deltas_are_incremental() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Mouse, 0.0, 0.0, 1),
                single(PointerPhase::Move, Modality::Mouse, 8.0, 0.0, 1),
                single(PointerPhase::Move, Modality::Mouse, 10.0, 0.0, 1),
                single(PointerPhase::Move, Modality::Mouse, 20.0, 3.0, 1),
            ],
        );
        assert_eq!(
            out,
            vec![
                GestureEvent::Drag { position: Point::new(8.0, 0.0), delta: Point::new(8.0, 0.0) },
                GestureEvent::Drag { position: Point::new(20.0, 3.0), delta: Point::new(12.0, 3.0) },
            ]
        );
    }

    #[test]
    fn test_pinch_distance_doubles() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                pair(PointerPhase::Down, Point::new(100.0, 100.0), Point::new(200.0, 100.0)),
                pair(PointerPhase::Move, Point::new(50.0, 100.0), Point::new(250.0, 100.0)),
            ],
        );
        assert_eq!(out.len(), 1);
        match out[0] {
            GestureEvent::Pinch { scale } => assert!((scale - 2.0).abs() < 1e-5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pinch_updates_previous_distance() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                pair(PointerPhase::Down, Point::new(0.0, 0.0), Point::new(100.0, 0.0)),
                pair(PointerPhase::Move, Point::new(0.0, 0.0), Point::new(150.0, 0.0)),
                pair(PointerPhase::Move, Point::new(0.0, 0.0), Point::new(300.0, 0.0)),
            ],
        );
        let scales: Vec<f32> = out
            .iter()
            .map(|g| match g {
                GestureEvent::Pinch { scale } => *scale,
                _ => 0.0,
            })
            .collect();
        assert!((scales[0] - 1.5).abs() < 1e-5);
        assert!((scales[1] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_second_finger_upgrades_single_to_pinch() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Touch, 0.0, 0.0, 1),
                pair(PointerPhase::Down, Point::new(0.0, 0.0), Point::new(40.0, 0.0)),
                pair(PointerPhase::Move, Point::new(0.0, 0.0), Point::new(20.0, 0.0)),
                // 1本離す → 残った指で tap は出さない
                single(PointerPhase::Up, Modality::Touch, 0.0, 0.0, 1),
                single(PointerPhase::Up, Modality::Touch, 0.0, 0.0, 0),
            ],
        );
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], GestureEvent::Pinch { scale } if (scale - 0.5).abs() < 1e-5));
    }

    #[test]
    fn test_three_pointers_are_ignored_until_release() {
        let mut r = recognizer();
        let mut three = pair(PointerPhase::Down, Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        three.active_pointers = 3;
        let mut three_move = pair(PointerPhase::Move, Point::new(0.0, 0.0), Point::new(300.0, 0.0));
        three_move.active_pointers = 3;
        let out = run(
            &mut r,
            &[
                three,
                three_move,
                pair(PointerPhase::Move, Point::new(0.0, 0.0), Point::new(400.0, 0.0)),
                single(PointerPhase::Move, Modality::Touch, 90.0, 0.0, 1),
                single(PointerPhase::Up, Modality::Touch, 90.0, 0.0, 0),
            ],
        );
        assert!(out.is_empty());
        assert!(!r.is_tracking());
    }

    #[test]
    fn test_release_clears_state() {
        let mut r = recognizer();
        run(
            &mut r,
            &[
                pair(PointerPhase::Down, Point::new(0.0, 0.0), Point::new(100.0, 0.0)),
                single(PointerPhase::Up, Modality::Touch, 0.0, 0.0, 0),
            ],
        );
        assert!(!r.is_tracking());
        let out = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Touch, 5.0, 5.0, 1),
                single(PointerPhase::Up, Modality::Touch, 5.0, 5.0, 0),
            ],
        );
        assert_eq!(out, vec![GestureEvent::Tap { position: Point::new(5.0, 5.0) }]);
    }

    #[test]
    fn test_cancel_clears_without_tap() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                single(PointerPhase::Down, Modality::Touch, 50.0, 50.0, 1),
                single(PointerPhase::Cancel, Modality::Touch, 50.0, 50.0, 0),
            ],
        );
        assert!(out.is_empty());
        assert!(!r.is_tracking());
    }

    #[test]
    fn test_cancel_with_remaining_pointer_ignores_until_release() {
        let mut r = recognizer();
        let out = run(
            &mut r,
            &[
                pair(PointerPhase::Down, Point::new(0.0, 0.0), Point::new(100.0, 0.0)),
                single(PointerPhase::Cancel, Modality::Touch, 0.0, 0.0, 1),
                single(PointerPhase::Move, Modality::Touch, 60.0, 0.0, 1),
                single(PointerPhase::Up, Modality::Touch, 60.0, 0.0, 0),
            ],
        );
        assert!(out.is_empty());
        assert!(!r.is_tracking());
    }
}
