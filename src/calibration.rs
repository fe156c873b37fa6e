use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, ValidationError};
use crate::geometry::Point;
use crate::lock;

/// キャリブレーションレコードの固定キー
pub const CALIBRATION_KEY: &str = "ar-calibration";

/// 足長（cm）
pub const FOOT_LENGTH_RANGE: (f32, f32) = (20.0, 35.0);
/// 足幅（cm）
pub const FOOT_WIDTH_RANGE: (f32, f32) = (7.0, 15.0);
/// 靴サイズ（0.5刻み）
pub const SHOE_SIZE_RANGE: (f32, f32) = (5.0, 15.0);
pub const SHOE_SIZE_STEP: f32 = 0.5;
/// 表示位置（%）
pub const POSITION_RANGE: (f32, f32) = (0.0, 100.0);

/// 検出サイズ 1.0 に相当する足長（cm）
pub const BASELINE_FOOT_LENGTH: f32 = 25.0;

// --- データ構造 ---

/// ユーザーの足・靴の計測値
///
/// JSON形式: `{"footLength":25,"footWidth":10,"shoeSize":9,"preferredPosition":{"x":50,"y":65}}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationData {
    pub foot_length: f32,
    pub foot_width: f32,
    pub shoe_size: f32,
    pub preferred_position: Point,
}

impl CalibrationData {
    pub fn new(foot_length: f32, foot_width: f32, shoe_size: f32) -> Self {
        Self {
            foot_length,
            foot_width,
            shoe_size,
            preferred_position: Point::new(50.0, 65.0),
        }
    }

    pub fn with_preferred_position(mut self, x: f32, y: f32) -> Self {
        self.preferred_position = Point::new(x, y);
        self
    }

    /// 全フィールドの範囲チェック
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("footLength", self.foot_length, FOOT_LENGTH_RANGE)?;
        check_range("footWidth", self.foot_width, FOOT_WIDTH_RANGE)?;
        check_range("shoeSize", self.shoe_size, SHOE_SIZE_RANGE)?;
        check_step("shoeSize", self.shoe_size, SHOE_SIZE_STEP)?;
        check_range("preferredPosition.x", self.preferred_position.x, POSITION_RANGE)?;
        check_range("preferredPosition.y", self.preferred_position.y, POSITION_RANGE)?;
        Ok(())
    }

    /// 検出器が使う相対サイズ（足長25cmで1.0）
    pub fn relative_foot_size(&self) -> f32 {
        self.foot_length / BASELINE_FOOT_LENGTH
    }
}

fn check_range(field: &'static str, value: f32, (min, max): (f32, f32)) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

fn check_step(field: &'static str, value: f32, step: f32) -> Result<(), ValidationError> {
    let steps = value / step;
    if (steps - steps.round()).abs() > 1e-3 {
        return Err(ValidationError::OffStep { field, value, step });
    }
    Ok(())
}

// --- 永続化バックエンド ---

/// キー・バリュー型の永続ストレージ
pub trait CalibrationBackend: Send + Sync {
    /// キーが無ければ Ok(None)
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// 書き込みは全体が見えるか全く見えないかのどちらか
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// `<dir>/<key>.json` に保存するバックエンド
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl CalibrationBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        // 一時ファイルに書いてからrenameで置き換える
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Io { path, source })?;
        Ok(())
    }
}

/// テスト・一時利用向けのメモリバックエンド
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存レコード付きで作成
    pub fn with_record(key: &str, value: &str) -> Self {
        let backend = Self::new();
        lock(&backend.records).insert(key.to_string(), value.to_string());
        backend
    }
}

impl CalibrationBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.records).get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.records).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// --- ストア ---

enum Cache {
    Unloaded,
    Loaded(Option<CalibrationData>),
}

/// キャリブレーションの取得・保存
///
/// `get` はメモリキャッシュを優先し、未読込ならバックエンドから読んでキャッシュする。
/// `set` は検証→永続化→キャッシュ更新を1つのロック内で行う。
pub struct CalibrationStore {
    backend: Box<dyn CalibrationBackend>,
    key: String,
    cache: Mutex<Cache>,
}

impl CalibrationStore {
    pub fn new(backend: Box<dyn CalibrationBackend>) -> Self {
        Self::with_key(backend, CALIBRATION_KEY)
    }

    pub fn with_key(backend: Box<dyn CalibrationBackend>, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
            cache: Mutex::new(Cache::Unloaded),
        }
    }

    /// ファイル保存のストア
    pub fn open_dir<P: Into<PathBuf>>(dir: P, key: &str) -> Self {
        Self::with_key(Box::new(FileBackend::new(dir)), key)
    }

    /// メモリのみのストア
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    pub fn get(&self) -> Option<CalibrationData> {
        let mut cache = lock(&self.cache);
        if let Cache::Loaded(data) = *cache {
            return data;
        }

        let raw = match self.backend.read(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                // 読めなければ未保存扱い。次回また読み直す
                warn!("calibration read failed: {}", e);
                return None;
            }
        };

        let data = raw.and_then(|content| match serde_json::from_str::<CalibrationData>(&content) {
            Ok(data) if data.validate().is_ok() => Some(data),
            Ok(data) => {
                warn!("stored calibration out of range, ignoring: {:?}", data);
                None
            }
            Err(e) => {
                warn!("stored calibration is corrupt, ignoring: {}", e);
                None
            }
        });
        debug!("calibration loaded from storage: {:?}", data);
        *cache = Cache::Loaded(data);
        data
    }

    /// 範囲外の値は拒否し、既存のキャリブレーションは変更しない
    pub fn set(&self, data: CalibrationData) -> Result<(), crate::error::ArError> {
        data.validate()?;
        let json = serde_json::to_string(&data).map_err(StorageError::from)?;

        let mut cache = lock(&self.cache);
        self.backend.write(&self.key, &json)?;
        *cache = Cache::Loaded(Some(data));
        info!(
            "calibration saved: foot {:.1}x{:.1}cm, size {}",
            data.foot_length, data.foot_width, data.shoe_size
        );
        Ok(())
    }

    pub fn is_calibrated(&self) -> bool {
        self.get().is_some()
    }
}
