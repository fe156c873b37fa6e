use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// 一定周期で走る検出tickのタスク
///
/// `cancel` はトークンを切ってからタスクの終了を待つ。戻った時点で以降のtickは無い。
/// 実行中のtickは結果を書き込む前に `token.is_cancelled()` を確認すること。
/// ハンドルを drop しても取り消される（終了は待たない）。
pub struct TickHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TickHandle {
    /// 最初のtickは1周期後
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(&CancellationToken) + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => on_tick(&child),
                }
            }
            debug!("detection tick stopped");
        });
        Self {
            token,
            task: Some(task),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 取り消しだけ行い、終了は待たない
    pub fn request_cancel(&self) {
        self.token.cancel();
    }

    pub async fn cancel(mut self) {
        self.request_cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            if e.is_panic() {
                log::error!("detection tick panicked: {}", e);
            }
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
