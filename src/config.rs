//! センサとの通信設定．

use crate::SensorError;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// センサの工場出荷時のIPアドレス．
pub const DEFAULT_SENSOR_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
/// RDTプロトコルのUDPポート．
pub const RDT_PORT: u16 = 49152;

/// センサとの通信設定．
///
/// # Example
///
/// ```
/// use ati_force_torque_sensor::SensorConfig;
/// use std::time::Duration;
///
/// let config = SensorConfig::new([192, 168, 1, 10])
///     .with_smoothing(0.2)
///     .with_retry(3, Duration::from_millis(500));
/// assert_eq!(config.socket_addr().to_string(), "192.168.1.10:49152");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// センサのIPアドレス．
    pub ip: IpAddr,
    /// センサのUDPポート．
    pub port: u16,
    /// 接続を試みる最大回数．
    pub connect_attempts: u32,
    /// ソケットの送受信タイムアウト．
    /// ストリーミング中は，この時間だけ何も届かなければ受信スレッドがエラーで停止する．
    /// `None`の場合，受信はデータが届くまでブロックし続ける．
    pub io_timeout: Option<Duration>,
    /// 接続に失敗してから次に試行するまでの待ち時間．
    pub retry_delay: Duration,
    /// 送受信の前に接続の確立を待つ時間．
    pub connected_wait: Duration,
    /// ストリーミングで受信した値に適用する指数移動平均の係数．
    /// `None`の場合は平滑化しない．
    pub smoothing: Option<f64>,
    /// ログに表示するセンサ名．受信スレッドの名前にも使う．
    pub name: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_SENSOR_IP,
            port: RDT_PORT,
            connect_attempts: 5,
            io_timeout: Some(Duration::from_secs(10)),
            retry_delay: Duration::from_secs(1),
            connected_wait: Duration::from_secs(1),
            smoothing: None,
            name: "ATI".to_string(),
        }
    }
}

impl SensorConfig {
    pub fn new(ip: impl Into<IpAddr>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    pub fn with_connected_wait(mut self, wait: Duration) -> Self {
        self.connected_wait = wait;
        self
    }

    pub fn with_smoothing(mut self, alpha: f64) -> Self {
        self.smoothing = Some(alpha);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// 設定値が使用可能か検査する．
    pub fn validate(&self) -> Result<(), SensorError> {
        if let Some(alpha) = self.smoothing {
            crate::filter::check_alpha(alpha)?;
        }
        Ok(())
    }
}
