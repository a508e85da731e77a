//! センサとの接続の管理．

use crate::observer::{SensorEvent, SensorObserver};
use crate::protocol::{Command, Response};
use crate::transport::Transport;
use crate::{SensorConfig, SensorError};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 受信バッファのバイト数．
/// 想定より大きいデータグラムもサイズ不一致として検出できるよう，レスポンスフレームより大きくとる．
const RECV_BUFFER_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// 通信路と接続状態を持ち，コマンドの送信とレスポンスの受信を行う．
/// 呼び出し側のスレッドと受信スレッドで共有される．
pub(crate) struct Connection {
    transport: Arc<dyn Transport>,
    addr: SocketAddr,
    connect_attempts: u32,
    io_timeout: Option<Duration>,
    retry_delay: Duration,
    connected_wait: Duration,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    received: AtomicU64,
    observer: Arc<dyn SensorObserver>,
}

impl Connection {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &SensorConfig,
        observer: Arc<dyn SensorObserver>,
    ) -> Connection {
        Connection {
            transport,
            addr: config.socket_addr(),
            connect_attempts: config.connect_attempts.max(1),
            io_timeout: config.io_timeout,
            retry_delay: config.retry_delay,
            connected_wait: config.connected_wait,
            state: Mutex::new(ConnectionState::Disconnected),
            state_changed: Condvar::new(),
            received: AtomicU64::new(0),
            observer,
        }
    }

    /// センサとの接続を確立する．
    /// 失敗するたびに`retry_delay`だけ待って再試行し，規定回数すべて失敗した場合はエラーを返す．
    pub fn connect(&self) -> Result<(), SensorError> {
        self.set_state(ConnectionState::Connecting);

        let mut last_error = None;
        for attempt in 1..=self.connect_attempts {
            match self.try_connect() {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    self.observer.on_event(&SensorEvent::Connected {
                        addr: self.addr,
                        attempt,
                    });
                    return Ok(());
                }
                Err(error) => {
                    self.observer.on_event(&SensorEvent::ConnectAttemptFailed {
                        attempt,
                        max_attempts: self.connect_attempts,
                        error: &error,
                    });
                    last_error = Some(error);
                }
            }
            std::thread::sleep(self.retry_delay);
        }

        self.set_state(ConnectionState::Disconnected);
        self.observer.on_event(&SensorEvent::ConnectionFailed {
            addr: self.addr,
            attempts: self.connect_attempts,
        });
        Err(SensorError::Connection {
            addr: self.addr,
            attempts: self.connect_attempts,
            source: last_error
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "no connection attempt")),
        })
    }

    fn try_connect(&self) -> io::Result<()> {
        self.transport.set_io_timeout(self.io_timeout)?;
        self.transport.connect(self.addr)
    }

    pub fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.observer.on_event(&SensorEvent::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout
    }

    /// 受信の待ち時間を一時的に変える．
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<(), SensorError> {
        self.transport.set_io_timeout(timeout)?;
        Ok(())
    }

    /// 受信の待ち時間を設定値に戻す．
    pub fn restore_recv_timeout(&self) -> Result<(), SensorError> {
        self.set_recv_timeout(self.io_timeout)
    }

    /// これまでに受信・復号したフレームの数．
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn send_command(&self, command: Command) -> Result<(), SensorError> {
        self.wait_connected()?;

        let frame = command.encode();
        let written = self.transport.send(&frame)?;
        // 送信できたデータサイズで成否判定
        match written {
            c if c == frame.len() => Ok(()),
            c => Err(SensorError::Write {
                expected: frame.len(),
                actual: c,
            }),
        }
    }

    pub fn recv_response(&self) -> Result<Response, SensorError> {
        self.wait_connected()?;

        let mut buf = [0; RECV_BUFFER_BYTES];
        let len = self.transport.recv(&mut buf)?;
        let response = Response::decode(&buf[..len])?;
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(response)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
        self.state_changed.notify_all();
    }

    /// 接続が確立されるまで最大`connected_wait`だけ待つ．
    fn wait_connected(&self) -> Result<(), SensorError> {
        let mut state = self.state.lock();
        if *state != ConnectionState::Connected {
            self.state_changed.wait_while_for(
                &mut state,
                |state| *state != ConnectionState::Connected,
                self.connected_wait,
            );
        }

        match *state {
            ConnectionState::Connected => Ok(()),
            _ => Err(SensorError::NotConnected {
                waited: self.connected_wait,
            }),
        }
    }
}
