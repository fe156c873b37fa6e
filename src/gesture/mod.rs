pub mod adjustment;
pub mod pointer;
pub mod recognizer;

pub use adjustment::{GestureAdjustment, Viewport, MAX_SCALE_MULTIPLIER, MIN_SCALE_MULTIPLIER};
pub use pointer::{
    Modality, MouseAdapter, MouseInput, MousePhase, PointerEvent, PointerHub, PointerPhase,
    TouchAdapter, TouchInput, TouchPhase,
};
pub use recognizer::{GestureEvent, GestureRecognizer};
