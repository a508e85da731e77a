//! ドライバ内部で起きた出来事の通知．
//!
//! ドライバは[`SensorObserver`]を受け取り，接続やストリーミングの状態変化をそこへ通知する．
//! 既定の[`TracingObserver`]は`tracing`でログを出力する．

use crate::{SensorError, Wrench};
use std::io;
use std::net::SocketAddr;

/// ドライバが通知する出来事．
#[derive(Debug)]
pub enum SensorEvent<'a> {
    /// 接続の試行に失敗した．
    ConnectAttemptFailed {
        attempt: u32,
        max_attempts: u32,
        error: &'a io::Error,
    },
    /// 接続が確立された．
    Connected { addr: SocketAddr, attempt: u32 },
    /// 規定回数の試行がすべて失敗した．
    ConnectionFailed { addr: SocketAddr, attempts: u32 },
    Disconnected,
    StreamStarted,
    StreamStopped,
    /// 受信スレッドがエラーで停止した．
    StreamFailed { error: &'a SensorError },
    /// 受信スレッドの終了を待ちきれなかった．
    ReaderDetached,
    /// 受信スレッドがパニックで終了していた．
    ReaderPanicked,
    /// ゼロ点を更新した．
    Tared { samples: usize, bias: Wrench },
    Zeroed,
    /// センサ側のゼロ点合わせを要求した．
    SoftwareBiasRequested,
}

/// ドライバからの通知を受け取る．
///
/// 受信スレッドからも呼ばれるので，実装はすぐに戻らなければならない．
pub trait SensorObserver: Send + Sync {
    fn on_event(&self, event: &SensorEvent<'_>);
}

/// `tracing`で通知内容をログ出力する．
#[derive(Debug, Clone)]
pub struct TracingObserver {
    name: String,
}

impl TracingObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SensorObserver for TracingObserver {
    fn on_event(&self, event: &SensorEvent<'_>) {
        let sensor = self.name.as_str();
        match event {
            SensorEvent::ConnectAttemptFailed {
                attempt,
                max_attempts,
                error,
            } => {
                if error.kind() == io::ErrorKind::TimedOut {
                    tracing::warn!(
                        sensor,
                        attempt,
                        max_attempts,
                        "socket connection timeout, retrying"
                    );
                } else {
                    tracing::warn!(
                        sensor,
                        attempt,
                        max_attempts,
                        %error,
                        "socket connection failed, retrying"
                    );
                }
            }
            SensorEvent::Connected { addr, attempt } => {
                tracing::info!(sensor, %addr, attempt, "socket is connected");
            }
            SensorEvent::ConnectionFailed { addr, attempts } => {
                tracing::error!(sensor, %addr, attempts, "socket connection failed");
            }
            SensorEvent::Disconnected => tracing::info!(sensor, "disconnected"),
            SensorEvent::StreamStarted => tracing::info!(sensor, "start streaming"),
            SensorEvent::StreamStopped => tracing::info!(sensor, "stop streaming"),
            SensorEvent::StreamFailed { error } => {
                tracing::error!(sensor, %error, "stream reader stopped");
            }
            SensorEvent::ReaderDetached => {
                tracing::warn!(sensor, "stream reader did not exit in time, detaching");
            }
            SensorEvent::ReaderPanicked => tracing::error!(sensor, "stream reader panicked"),
            SensorEvent::Tared { samples, bias } => {
                tracing::debug!(sensor, samples, bias = ?bias.to_array(), "tare done");
            }
            SensorEvent::Zeroed => tracing::debug!(sensor, "bias cleared"),
            SensorEvent::SoftwareBiasRequested => {
                tracing::debug!(sensor, "software bias requested");
            }
        }
    }
}

/// 何もしない．
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SensorObserver for NullObserver {
    fn on_event(&self, _event: &SensorEvent<'_>) {}
}
