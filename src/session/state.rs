use std::fmt;

use serde::Serialize;

/// ARセッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArState {
    #[default]
    Idle,
    /// キャリブレーション入力待ち
    Calibrating,
    /// 検出tick実行中
    Active,
    /// 静止画を生成中（完了で Active に戻る）
    Capturing,
}

impl ArState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArState::Idle => "idle",
            ArState::Calibrating => "calibrating",
            ArState::Active => "active",
            ArState::Capturing => "capturing",
        }
    }

    /// カメラが開いていて靴を描画できる状態
    pub fn is_live(&self) -> bool {
        matches!(self, ArState::Active | ArState::Capturing)
    }
}

impl fmt::Display for ArState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
