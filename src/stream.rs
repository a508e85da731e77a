//! ストリーミング取得．
//!
//! センサに無期限の送信を要求し，バックグラウンドの受信スレッドで最新の測定値を更新し続ける．

use crate::connection::Connection;
use crate::observer::{SensorEvent, SensorObserver};
use crate::protocol::{Command, INFINITE_SAMPLES};
use crate::{ExponentialFilter, SensorError, Wrench};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// 受信スレッドが実行フラグを確認する間隔の上限．
/// ストリーミング中はこの値を受信の待ち時間とする．
const READER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 受信スレッドの終了を待つ時間．
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
}

pub(crate) struct Stream {
    /// 現在の受信スレッドの実行フラグ．開始するたびに作り直す．
    running: Arc<AtomicBool>,
    /// 最新の測定値(平滑化済み，ゼロ点補正前)．書き込むのは受信スレッドだけ．
    latest: Arc<Mutex<Option<Wrench>>>,
    error_tx: Sender<SensorError>,
    error_rx: Receiver<SensorError>,
    reader: Option<JoinHandle<()>>,
}

impl Stream {
    pub fn new() -> Stream {
        let (error_tx, error_rx) = crossbeam_channel::unbounded();
        Stream {
            running: Arc::new(AtomicBool::new(false)),
            latest: Arc::new(Mutex::new(None)),
            error_tx,
            error_rx,
            reader: None,
        }
    }

    pub fn state(&self) -> StreamState {
        if self.is_streaming() {
            StreamState::Streaming
        } else {
            StreamState::Idle
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// ストリーミングを開始する．
    /// `seed`は開始直前に同期的に取得した測定値で，受信スレッドが最初のフレームを受け取るまでの値になる．
    /// `seed`は平滑化しない．平滑化は受信スレッドが最初に受け取ったフレームから始まる．
    pub fn start(
        &mut self,
        connection: Arc<Connection>,
        seed: Wrench,
        smoothing: Option<f64>,
        observer: Arc<dyn SensorObserver>,
        name: &str,
    ) -> Result<(), SensorError> {
        if self.is_streaming() {
            return Ok(());
        }
        self.reap_reader(&connection, observer.as_ref())?;

        let filter = smoothing.map(ExponentialFilter::new).transpose()?;
        *self.latest.lock() = Some(seed);

        // 実行フラグを確認できるよう，受信の待ち時間を短くする
        let poll = connection
            .io_timeout()
            .map_or(READER_POLL_INTERVAL, |timeout| timeout.min(READER_POLL_INTERVAL));
        connection.set_recv_timeout(Some(poll))?;
        if let Err(err) = connection.send_command(Command::start_streaming(INFINITE_SAMPLES)) {
            let _ = connection.restore_recv_timeout();
            return Err(err);
        }

        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        let reader_connection = connection.clone();
        let latest = self.latest.clone();
        let errors = self.error_tx.clone();
        let reader_observer = observer.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{}-rdt-reader", name))
            .spawn(move || {
                reader_loop(reader_connection, running, latest, filter, errors, reader_observer)
            });

        match spawned {
            Ok(handle) => {
                self.reader = Some(handle);
                observer.on_event(&SensorEvent::StreamStarted);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                let _ = connection.send_command(Command::stop_streaming());
                let _ = connection.restore_recv_timeout();
                Err(SensorError::Io(err))
            }
        }
    }

    /// センサに送信停止を要求し，受信スレッドの終了を待つ．
    ///
    /// 受信スレッドは受信の待ち時間ごとに実行フラグを確認するので，
    /// 戻るまでに最大でその時間だけかかる．
    /// 停止指示の後に受信したフレームは公開されない．
    pub fn stop(
        &mut self,
        connection: &Connection,
        observer: &dyn SensorObserver,
    ) -> Result<(), SensorError> {
        if !self.is_streaming() {
            return self.reap_reader(connection, observer);
        }

        let sent = connection.send_command(Command::stop_streaming());
        // 送信に失敗しても受信スレッドは止める
        self.running.store(false, Ordering::Release);
        observer.on_event(&SensorEvent::StreamStopped);

        let reaped = self.reap_reader(connection, observer);
        sent.and(reaped)
    }

    /// 停止した受信スレッドを回収し，受信の待ち時間を設定値に戻す．
    /// ストリーミング中は何もしない．
    ///
    /// 受信スレッドがエラーで自ら停止した場合も，次のコマンドを送る前にこれを呼ぶこと．
    pub fn reap_reader(
        &mut self,
        connection: &Connection,
        observer: &dyn SensorObserver,
    ) -> Result<(), SensorError> {
        if self.is_streaming() {
            return Ok(());
        }
        let handle = match self.reader.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        match handle.join_timeout(READER_JOIN_TIMEOUT) {
            Ok(()) => {}
            Err(JoinError::Panicked) => observer.on_event(&SensorEvent::ReaderPanicked),
            Err(JoinError::TimedOut) => observer.on_event(&SensorEvent::ReaderDetached),
        }
        connection.restore_recv_timeout()
    }

    /// ストリーミング中であれば最新の測定値を返す．
    pub fn snapshot(&self) -> Option<Wrench> {
        if !self.is_streaming() {
            return None;
        }
        *self.latest.lock()
    }

    /// ストリーミングの状態にかかわらず，最後に公開された測定値を返す．
    pub fn latest(&self) -> Option<Wrench> {
        *self.latest.lock()
    }

    /// 受信スレッドが報告したエラーを取り出す．
    pub fn take_error(&self) -> Option<SensorError> {
        self.error_rx.try_recv().ok()
    }
}

fn reader_loop(
    connection: Arc<Connection>,
    running: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<Wrench>>>,
    mut filter: Option<ExponentialFilter>,
    errors: Sender<SensorError>,
    observer: Arc<dyn SensorObserver>,
) {
    let silence_limit = connection.io_timeout();
    let mut last_frame_time = Instant::now();

    while running.load(Ordering::Acquire) {
        let response = match connection.recv_response() {
            Ok(response) => response,
            Err(error) => {
                // 停止指示の後のタイムアウトは正常な終了
                if !running.load(Ordering::Acquire) {
                    break;
                }
                // 待ち時間の切れ目ごとに実行フラグを確認し，
                // 設定した待ち時間を超えて何も届かなければエラーとする
                let silent_too_long =
                    silence_limit.is_some_and(|limit| last_frame_time.elapsed() >= limit);
                if is_timeout(&error) && !silent_too_long {
                    continue;
                }

                observer.on_event(&SensorEvent::StreamFailed { error: &error });
                // 状態がIdleになった時点でエラーを取り出せるよう，先に送る
                let _ = errors.send(error);
                running.store(false, Ordering::Release);
                break;
            }
        };
        last_frame_time = Instant::now();

        if !running.load(Ordering::Acquire) {
            break;
        }

        let wrench = match filter.as_mut() {
            Some(filter) => filter.update(response.wrench()),
            None => response.wrench(),
        };
        *latest.lock() = Some(wrench);
    }
}

fn is_timeout(error: &SensorError) -> bool {
    match error {
        SensorError::Io(err) => matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ),
        _ => false,
    }
}

enum JoinError {
    Panicked,
    TimedOut,
}

/// スレッドの終了を時間制限付きで待つ．
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), JoinError>;
}

impl JoinTimeout for JoinHandle<()> {
    fn join_timeout(self, timeout: Duration) -> Result<(), JoinError> {
        if self.is_finished() {
            return self.join().map_err(|_| JoinError::Panicked);
        }

        // joinを別スレッドに任せ，その完了をチャネルで待つ
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = done_tx.send(self.join().is_ok());
        });
        match done_rx.recv_timeout(timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(JoinError::Panicked),
            Err(_) => Err(JoinError::TimedOut),
        }
    }
}
