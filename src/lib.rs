pub mod calibration;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod render;
pub mod session;
pub mod tracker;

use std::sync::{Mutex, MutexGuard};

pub use calibration::{CalibrationData, CalibrationStore};
pub use config::Config;
pub use error::ArError;
pub use session::{ArSession, ArState};

/// ロック取得。他スレッドのパニックで汚染されていても中身を使う
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
