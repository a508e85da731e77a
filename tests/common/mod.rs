//! センサの動作を模擬する通信路．

#![allow(dead_code)]

use ati_force_torque_sensor::protocol::{Command, CommandCode, Response, ResponseHeader};
use ati_force_torque_sensor::{SensorConfig, SensorEvent, SensorObserver, Transport};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type CountSource = Box<dyn FnMut(u32) -> [i32; 6] + Send>;

struct MockState {
    source: CountSource,
    sequence: u32,
    continuous: bool,
    /// 連続送信でのフレーム間隔．
    period: Duration,
    next_due: Instant,
    muted: bool,
    queue: VecDeque<Vec<u8>>,
    commands: Vec<Command>,
    failing_connects: u32,
    connect_calls: u32,
    connected_to: Option<SocketAddr>,
    recv_timeout: Option<Duration>,
}

impl MockState {
    fn next_frame(&mut self) -> Vec<u8> {
        self.sequence += 1;
        let counts = (self.source)(self.sequence);
        Response {
            header: ResponseHeader {
                rdt_sequence: self.sequence,
                ft_sequence: self.sequence,
                status: 0,
            },
            counts,
        }
        .encode()
        .to_vec()
    }
}

/// RDTコマンドに応じてフレームを返す模擬センサ．
///
/// - `StartStreaming(n > 0)`: `n`個のフレームを用意する
/// - `StartStreaming(0)`: `StopStreaming`まで`period`ごとにフレームを生成し続ける
/// - `StopStreaming`: 生成をやめる
///
/// 用意したフレームがなければ，受信はタイムアウトまで待ってから`TimedOut`を返す．
/// `mute`の後はどのコマンドにも応答しない．
pub struct MockTransport {
    state: Mutex<MockState>,
    arrived: Condvar,
    receivers: AtomicUsize,
}

impl MockTransport {
    /// `sequence`(1始まり)からカウント値を作る関数を与える．
    pub fn from_fn(source: impl FnMut(u32) -> [i32; 6] + Send + 'static) -> Arc<MockTransport> {
        Arc::new(MockTransport {
            state: Mutex::new(MockState {
                source: Box::new(source),
                sequence: 0,
                continuous: false,
                period: Duration::from_millis(1),
                next_due: Instant::now(),
                muted: false,
                queue: VecDeque::new(),
                commands: Vec::new(),
                failing_connects: 0,
                connect_calls: 0,
                connected_to: None,
                recv_timeout: None,
            }),
            arrived: Condvar::new(),
            receivers: AtomicUsize::new(0),
        })
    }

    pub fn constant(counts: [i32; 6]) -> Arc<MockTransport> {
        Self::from_fn(move |_| counts)
    }

    /// Fxが通し番号[N]となるフレームを返す．
    pub fn counting() -> Arc<MockTransport> {
        Self::from_fn(|sequence| [sequence as i32 * 1_000_000, 0, 0, 0, 0, 0])
    }

    /// 最初の`n`回の接続を失敗させる．
    pub fn fail_connects(self: Arc<Self>, n: u32) -> Arc<Self> {
        self.state.lock().failing_connects = n;
        self
    }

    /// 連続送信でのフレーム間隔を変える．
    pub fn with_period(self: Arc<Self>, period: Duration) -> Arc<Self> {
        self.state.lock().period = period;
        self
    }

    /// いま`recv`の中にいるスレッドの数．
    pub fn receivers(&self) -> usize {
        self.receivers.load(Ordering::Acquire)
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    pub fn connected_to(&self) -> Option<SocketAddr> {
        self.state.lock().connected_to
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.lock().commands.clone()
    }

    pub fn last_command(&self) -> Option<Command> {
        self.state.lock().commands.last().copied()
    }

    /// 任意のデータグラムを受信キューの末尾に積む．
    pub fn push_raw(&self, datagram: &[u8]) {
        self.state.lock().queue.push_back(datagram.to_vec());
        self.arrived.notify_all();
    }

    /// 以降のコマンドに応答せず，送信もやめる．
    pub fn mute(&self) {
        let mut state = self.state.lock();
        state.muted = true;
        state.continuous = false;
        state.queue.clear();
    }
}

impl Transport for MockTransport {
    fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock connect timeout"));
        }
        state.connected_to = Some(addr);
        Ok(())
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.state.lock().recv_timeout = timeout;
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let command = Command::decode(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        let mut state = self.state.lock();
        state.commands.push(command);
        if state.muted {
            return Ok(buf.len());
        }
        match command.code {
            CommandCode::StartStreaming if command.sample_count == 0 => {
                state.continuous = true;
                state.next_due = Instant::now() + state.period;
            }
            CommandCode::StartStreaming => {
                state.continuous = false;
                for _ in 0..command.sample_count {
                    let frame = state.next_frame();
                    state.queue.push_back(frame);
                }
            }
            CommandCode::StopStreaming => state.continuous = false,
            CommandCode::SetSoftwareBias => {}
        }
        drop(state);
        self.arrived.notify_all();
        Ok(buf.len())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.receivers.fetch_add(1, Ordering::AcqRel);
        let received = self.recv_frame(buf);
        self.receivers.fetch_sub(1, Ordering::AcqRel);
        received
    }
}

impl MockTransport {
    /// フレームが届くまで，最大で受信の待ち時間だけブロックする．
    fn recv_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.state.lock().recv_timeout.unwrap_or(Duration::from_secs(5));
        let deadline = Instant::now() + timeout;

        let mut state = self.state.lock();
        loop {
            if let Some(frame) = state.queue.pop_front() {
                buf[..frame.len()].copy_from_slice(&frame);
                return Ok(frame.len());
            }

            let now = Instant::now();
            if state.continuous && now >= state.next_due {
                state.next_due = now + state.period;
                let frame = state.next_frame();
                buf[..frame.len()].copy_from_slice(&frame);
                return Ok(frame.len());
            }
            if now >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "mock recv timeout"));
            }

            let wake = if state.continuous {
                state.next_due.min(deadline)
            } else {
                deadline
            };
            self.arrived.wait_until(&mut state, wake);
        }
    }
}

/// 受け取った通知の名前を記録する．
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == name).count()
    }
}

impl SensorObserver for RecordingObserver {
    fn on_event(&self, event: &SensorEvent<'_>) {
        let name = match event {
            SensorEvent::ConnectAttemptFailed { .. } => "ConnectAttemptFailed",
            SensorEvent::Connected { .. } => "Connected",
            SensorEvent::ConnectionFailed { .. } => "ConnectionFailed",
            SensorEvent::Disconnected => "Disconnected",
            SensorEvent::StreamStarted => "StreamStarted",
            SensorEvent::StreamStopped => "StreamStopped",
            SensorEvent::StreamFailed { .. } => "StreamFailed",
            SensorEvent::ReaderDetached => "ReaderDetached",
            SensorEvent::ReaderPanicked => "ReaderPanicked",
            SensorEvent::Tared { .. } => "Tared",
            SensorEvent::Zeroed => "Zeroed",
            SensorEvent::SoftwareBiasRequested => "SoftwareBiasRequested",
        };
        self.events.lock().push(name.to_string());
    }
}

/// 待ち時間を短くした試験用の設定．
pub fn test_config() -> SensorConfig {
    SensorConfig::new(Ipv4Addr::LOCALHOST)
        .with_retry(5, Duration::from_millis(2))
        .with_io_timeout(Some(Duration::from_millis(50)))
        .with_connected_wait(Duration::from_millis(20))
        .with_name("mock")
}

/// `condition`が成り立つまで最大`timeout`だけ待つ．
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
