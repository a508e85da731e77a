use crate::connection::{Connection, ConnectionState};
use crate::observer::{SensorEvent, SensorObserver, TracingObserver};
use crate::protocol::Command;
use crate::stream::{Stream, StreamState};
use crate::transport::{Transport, UdpTransport};
use crate::{SensorConfig, SensorError, Wrench};
use std::sync::Arc;

/// ゼロ点合わせで平均をとるサンプル数の既定値．
pub const DEFAULT_TARE_SAMPLES: usize = 10;

/// RDTプロトコルで通信するATI製6軸力覚センサ．
///
/// # Example
///
/// ```no_run
/// use ati_force_torque_sensor::{Sensor, SensorConfig};
///
/// let mut sensor = Sensor::open(SensorConfig::new([192, 168, 1, 1]))?;
/// sensor.tare(10)?;
/// sensor.start_stream()?;
/// println!("{:?}", sensor.data()?.to_array());
/// sensor.stop_stream()?;
/// # Ok::<(), ati_force_torque_sensor::SensorError>(())
/// ```
pub struct Sensor {
    config: SensorConfig,
    connection: Arc<Connection>,
    stream: Stream,
    /// センサ出力値から減ずる補正値．
    /// センサは力がはたらいていない場合も0ではない出力を出す．
    /// そのため，センサからの生の出力からこのオフセット値を減じて補正してやる必要がある．
    offset: Wrench,
    observer: Arc<dyn SensorObserver>,
}

impl Sensor {
    /// センサとの通信を確立する．
    /// ログは`tracing`へ出力される．
    ///
    /// # Returns
    /// センサとの通信が確立できた場合，センサのインスタンス`sensor`を`Ok(sensor)`として返す．
    /// 通信に失敗した場合，その内容を表すエラー`e`を`Err(e)`として返す．
    pub fn open(config: SensorConfig) -> Result<Sensor, SensorError> {
        let observer = Arc::new(TracingObserver::new(config.name.clone()));
        Self::with_observer(config, observer)
    }

    /// 通知先を指定してセンサとの通信を確立する．
    pub fn with_observer(
        config: SensorConfig,
        observer: Arc<dyn SensorObserver>,
    ) -> Result<Sensor, SensorError> {
        let transport = Arc::new(UdpTransport::unspecified_for(config.ip)?);
        Self::with_transport(config, transport, observer)
    }

    /// 任意の通信路を使ってセンサとの通信を確立する．
    pub fn with_transport(
        config: SensorConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SensorObserver>,
    ) -> Result<Sensor, SensorError> {
        config.validate()?;

        let connection = Arc::new(Connection::new(transport, &config, observer.clone()));
        connection.connect()?;

        Ok(Sensor {
            config,
            connection,
            stream: Stream::new(),
            offset: Wrench::zeroed(),
            observer,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// 接続をやり直す．
    pub fn connect(&mut self) -> Result<(), SensorError> {
        self.ensure_idle()?;
        self.connection.connect()
    }

    /// 接続を切る．ストリーミング中であれば先に停止する．
    pub fn disconnect(&mut self) -> Result<(), SensorError> {
        let stopped = self.stop_stream();
        self.connection.disconnect();
        stopped
    }

    pub fn connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// これまでに受信したサンプルの数．
    pub fn samples_received(&self) -> u64 {
        self.connection.received()
    }

    /// `n`個のサンプルを受信して，受信順に返す．`n`が0の場合は1個とみなす．
    /// ゼロ点補正や平滑化は行わない．
    ///
    /// 途中で失敗した場合，それまでに受信したサンプルは捨てられる．
    pub fn get_samples(&mut self, n: usize) -> Result<Vec<Wrench>, SensorError> {
        self.ensure_idle()?;
        self.read_batch(n)
    }

    /// 現在の測定値からゼロ点補正値を引いた値を返す．
    ///
    /// ストリーミング中であれば受信スレッドが更新している最新の値を，
    /// そうでなければセンサから1サンプルを受信して使う．
    pub fn data(&mut self) -> Result<Wrench, SensorError> {
        if let Some(error) = self.stream.take_error() {
            return Err(SensorError::StreamReader(Box::new(error)));
        }

        let raw = match self.stream.snapshot() {
            Some(wrench) => wrench,
            None => {
                self.ensure_idle()?;
                self.read_one()?
            }
        };
        Ok(raw - self.offset)
    }

    /// 受信スレッドが最後に公開した測定値(ゼロ点補正前)．
    /// 一度もストリーミングしていなければ`None`．
    pub fn latest_raw(&self) -> Option<Wrench> {
        self.stream.latest()
    }

    /// `n`個のサンプルを受信し，その平均をゼロ点とすることでキャリブレーションを行う．
    /// 力がはたらいていない状態で呼び出すこと．
    pub fn tare(&mut self, n: usize) -> Result<(), SensorError> {
        let samples = self.get_samples(n)?;

        // 生データの平均をとり，補正後の値が0となるようにオフセットを定める．
        if let Some(mean) = Wrench::mean(&samples) {
            self.offset = mean;
            self.observer.on_event(&SensorEvent::Tared {
                samples: samples.len(),
                bias: mean,
            });
        }
        Ok(())
    }

    /// `tare`で定めたゼロ点を取り消し，センサの生の出力を返すようにする．
    pub fn zero(&mut self) {
        self.offset = Wrench::zeroed();
        self.observer.on_event(&SensorEvent::Zeroed);
    }

    /// 現在のゼロ点補正値．
    pub fn bias(&self) -> Wrench {
        self.offset
    }

    /// センサ内部のオフセットでゼロ点を合わせるよう要求する．
    /// このドライバが持つゼロ点補正値は変わらない．
    pub fn set_software_bias(&mut self) -> Result<(), SensorError> {
        self.connection.send_command(Command::set_software_bias())?;
        self.observer.on_event(&SensorEvent::SoftwareBiasRequested);
        Ok(())
    }

    /// ストリーミングを開始する．すでにストリーミング中なら何もしない．
    pub fn start_stream(&mut self) -> Result<(), SensorError> {
        if self.stream.is_streaming() {
            return Ok(());
        }
        self.ensure_idle()?;
        // 以前の受信スレッドが残したエラーは今回のストリーミングとは無関係
        while self.stream.take_error().is_some() {}

        let seed = self.read_one()?;
        self.stream.start(
            self.connection.clone(),
            seed,
            self.config.smoothing,
            self.observer.clone(),
            &self.config.name,
        )
    }

    /// ストリーミングを停止し，受信スレッドの終了を待つ．
    pub fn stop_stream(&mut self) -> Result<(), SensorError> {
        self.stream.stop(&self.connection, self.observer.as_ref())
    }

    pub fn stream_state(&self) -> StreamState {
        self.stream.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_streaming()
    }

    /// 受信スレッドが報告したエラーを取り出す．
    pub fn take_stream_error(&mut self) -> Option<SensorError> {
        self.stream.take_error()
    }

    /// ストリーミング中でなければ，停止した受信スレッドを回収してから`Ok`を返す．
    fn ensure_idle(&mut self) -> Result<(), SensorError> {
        if self.stream.is_streaming() {
            return Err(SensorError::Streaming);
        }
        self.stream.reap_reader(&self.connection, self.observer.as_ref())
    }

    fn read_one(&self) -> Result<Wrench, SensorError> {
        self.connection.send_command(Command::start_streaming(1))?;
        self.connection.recv_response().map(|r| r.wrench())
    }

    fn read_batch(&self, n: usize) -> Result<Vec<Wrench>, SensorError> {
        let n = n.clamp(1, u32::MAX as usize);
        self.connection
            .send_command(Command::start_streaming(n as u32))?;

        (0..n)
            .map(|_| self.connection.recv_response().map(|r| r.wrench()))
            .collect()
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        let _ = self.stop_stream();
    }
}
