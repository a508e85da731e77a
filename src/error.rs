//! 力覚センサとの通信で発生するエラー．

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// RDTフレームの符号化・復号で発生したエラーを表す．
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// フレームのバイト数が期待されるサイズと一致しない．
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// コマンドフレームのヘッダが`0x1234`ではない．
    #[error("Invalid RDT header: 0x{0:04X}")]
    InvalidHeader(u16),

    /// 未知のコマンドコード．
    #[error("Unknown RDT command: 0x{0:04X}")]
    UnknownCommand(u16),
}

/// 力覚センサとの通信で発生したエラーを表す．
#[derive(Error, Debug)]
pub enum SensorError {
    /// 規定回数の接続試行がすべて失敗した．
    /// このインスタンスはもう使えないので，作り直す必要がある．
    #[error("Failed to connect to the sensor at {addr} after {attempts} attempts: {source}")]
    Connection {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// 接続待ちの時間内にセンサとの接続が確立されなかった．
    #[error("The sensor is not connected (waited {waited:?})")]
    NotConnected { waited: Duration },

    /// 受信データをRDTフレームとして解釈できない．
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// ソケットI/Oで発生したエラー．
    #[error("Sensor I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// センサに送信したデータサイズが期待されるサイズと一致しない．
    #[error("The driver should write {expected} bytes to the sensor, but actually {actual} bytes written")]
    Write { expected: usize, actual: usize },

    /// ストリーミング中はバッチ取得を行えない．
    #[error("The operation is not allowed while streaming")]
    Streaming,

    /// ストリーミングの受信スレッドがエラーで停止した．
    #[error("Stream reader stopped: {0}")]
    StreamReader(#[source] Box<SensorError>),

    /// 平滑化係数が(0, 1]の範囲外．
    #[error("Smoothing factor must be in (0, 1], got {0}")]
    InvalidSmoothingFactor(f64),

    /// 測定値ログの書き込みに失敗した．
    #[error("Failed to write the wrench log: {0}")]
    Log(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_sensor_error_display() {
        let err = SensorError::Connection {
            addr: "192.168.1.1:49152".parse().unwrap(),
            attempts: 5,
            source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("192.168.1.1:49152"), "{}", msg);
        assert!(msg.contains("5 attempts"), "{}", msg);
        assert!(err.source().is_some());

        let err = SensorError::NotConnected {
            waited: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "The sensor is not connected (waited 1s)");

        let err = SensorError::Write {
            expected: 8,
            actual: 3,
        };
        assert!(err.to_string().contains("8 bytes"));

        let err = SensorError::InvalidSmoothingFactor(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: SensorError = ProtocolError::InvalidLength {
            expected: 36,
            actual: 12,
        }
        .into();
        match err {
            SensorError::Protocol(ProtocolError::InvalidLength { expected, actual }) => {
                assert_eq!(expected, 36);
                assert_eq!(actual, 12);
            }
            other => panic!("Expected Protocol variant, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_reader_keeps_cause() {
        let cause = SensorError::Io(io::Error::new(io::ErrorKind::TimedOut, "recv timed out"));
        let err = SensorError::StreamReader(Box::new(cause));
        assert!(err.to_string().contains("recv timed out"));
        assert!(err.source().is_some());
    }
}
