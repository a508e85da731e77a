//! RDTプロトコルのフレームの符号化・復号．
//!
//! すべてのフィールドはビッグエンディアン．
//!
//! コマンドフレーム (PC -> センサ, 8バイト):
//! ```text
//! +--------+---------+--------------+
//! | header | command | sample count |
//! |  u16   |   u16   |     u32      |
//! +--------+---------+--------------+
//! ```
//!
//! レスポンスフレーム (センサ -> PC, 36バイト):
//! ```text
//! +--------------+-------------+--------+----+----+----+----+----+----+
//! | rdt sequence | ft sequence | status | Fx | Fy | Fz | Tx | Ty | Tz |
//! |     u32      |     u32     |  u32   |           i32 x 6           |
//! +--------------+-------------+--------+----+----+----+----+----+----+
//! ```

use crate::{NewtonMeter, ProtocolError, Wrench, MILLIMETERS_PER_METER};
use dimensioned::si::{Newton, Unitless};
use dimensioned::typenum::Quot;
use pair_macro::Triplet;

/// コマンドフレームの先頭に置く固定値．
pub const RDT_HEADER: u16 = 0x1234;
/// コマンドフレームのバイト数．
pub const COMMAND_BYTES: usize = 8;
/// レスポンスフレームのバイト数．
pub const RESPONSE_BYTES: usize = 36;
/// `StartStreaming`と組み合わせると，停止命令まで送信し続ける．
pub const INFINITE_SAMPLES: u32 = 0;
/// 1Nあたりのカウント値．
pub const COUNTS_PER_FORCE: f64 = 1_000_000.0;
/// 1N·mmあたりのカウント値．
pub const COUNTS_PER_TORQUE: f64 = 1_000.0;

/// 軸数．
const AXIS_COUNT: usize = 6;
/// レスポンスフレームのうち，カウント値より前にあるu32フィールドのバイト数．
const RESPONSE_HEADER_BYTES: usize = 12;

/// センサが解釈するコマンド．
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandCode {
    StopStreaming = 0x0000,
    StartStreaming = 0x0002,
    /// センサ内部のオフセットでゼロ点を合わせる．
    SetSoftwareBias = 0x0042,
}

impl CommandCode {
    pub const ALL: [CommandCode; 3] = [
        CommandCode::StopStreaming,
        CommandCode::StartStreaming,
        CommandCode::SetSoftwareBias,
    ];
}

impl TryFrom<u16> for CommandCode {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(CommandCode::StopStreaming),
            0x0002 => Ok(CommandCode::StartStreaming),
            0x0042 => Ok(CommandCode::SetSoftwareBias),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

/// センサへ送るコマンドフレーム．
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code: CommandCode,
    pub sample_count: u32,
}

impl Command {
    pub const fn new(code: CommandCode, sample_count: u32) -> Command {
        Command { code, sample_count }
    }

    /// `sample_count`個のサンプルを送信するよう要求する．
    /// `INFINITE_SAMPLES`を渡すと停止命令まで送信し続ける．
    pub const fn start_streaming(sample_count: u32) -> Command {
        Command::new(CommandCode::StartStreaming, sample_count)
    }

    pub const fn stop_streaming() -> Command {
        Command::new(CommandCode::StopStreaming, 0)
    }

    pub const fn set_software_bias() -> Command {
        Command::new(CommandCode::SetSoftwareBias, 0)
    }

    pub fn encode(&self) -> [u8; COMMAND_BYTES] {
        let mut frame = [0; COMMAND_BYTES];
        frame[0..2].copy_from_slice(&RDT_HEADER.to_be_bytes());
        frame[2..4].copy_from_slice(&(self.code as u16).to_be_bytes());
        frame[4..8].copy_from_slice(&self.sample_count.to_be_bytes());
        frame
    }

    /// コマンドフレームを解釈する．
    /// センサ側の動作を模擬する場合や，送信内容を検証する場合に用いる．
    pub fn decode(frame: &[u8]) -> Result<Command, ProtocolError> {
        if frame.len() != COMMAND_BYTES {
            return Err(ProtocolError::InvalidLength {
                expected: COMMAND_BYTES,
                actual: frame.len(),
            });
        }

        let header = u16::from_be_bytes([frame[0], frame[1]]);
        if header != RDT_HEADER {
            return Err(ProtocolError::InvalidHeader(header));
        }
        let code = CommandCode::try_from(u16::from_be_bytes([frame[2], frame[3]]))?;
        let sample_count = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);

        Ok(Command { code, sample_count })
    }
}

/// レスポンスフレームのうち，測定値以外のフィールド．
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseHeader {
    /// RDTレコードの通し番号．
    pub rdt_sequence: u32,
    /// センサ内部の測定値の通し番号．
    pub ft_sequence: u32,
    /// センサのステータスワード．
    pub status: u32,
}

/// センサから受信した1サンプル．
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub header: ResponseHeader,
    /// `(Fx, Fy, Fz, Tx, Ty, Tz)`の生のカウント値．
    pub counts: [i32; AXIS_COUNT],
}

impl Response {
    pub fn decode(frame: &[u8]) -> Result<Response, ProtocolError> {
        if frame.len() != RESPONSE_BYTES {
            return Err(ProtocolError::InvalidLength {
                expected: RESPONSE_BYTES,
                actual: frame.len(),
            });
        }

        let word = |offset: usize| {
            [
                frame[offset],
                frame[offset + 1],
                frame[offset + 2],
                frame[offset + 3],
            ]
        };

        let header = ResponseHeader {
            rdt_sequence: u32::from_be_bytes(word(0)),
            ft_sequence: u32::from_be_bytes(word(4)),
            status: u32::from_be_bytes(word(8)),
        };
        let mut counts = [0; AXIS_COUNT];
        for (i, count) in counts.iter_mut().enumerate() {
            *count = i32::from_be_bytes(word(RESPONSE_HEADER_BYTES + i * 4));
        }

        Ok(Response { header, counts })
    }

    /// センサが送信するのと同じ形式のフレームを作る．
    pub fn encode(&self) -> [u8; RESPONSE_BYTES] {
        let mut frame = [0; RESPONSE_BYTES];
        frame[0..4].copy_from_slice(&self.header.rdt_sequence.to_be_bytes());
        frame[4..8].copy_from_slice(&self.header.ft_sequence.to_be_bytes());
        frame[8..12].copy_from_slice(&self.header.status.to_be_bytes());
        for (i, count) in self.counts.iter().enumerate() {
            let start = RESPONSE_HEADER_BYTES + i * 4;
            frame[start..start + 4].copy_from_slice(&count.to_be_bytes());
        }
        frame
    }

    /// カウント値を物理量に変換して返す．
    pub fn wrench(&self) -> Wrench {
        counts_to_wrench(self.counts)
    }
}

/// センサから受信したフレームをレンチに変換して返す．
pub fn decode_wrench(frame: &[u8]) -> Result<Wrench, ProtocolError> {
    Response::decode(frame).map(|response| response.wrench())
}

/// `(Fx, Fy, Fz, Tx, Ty, Tz)`のカウント値からレンチへ変換する．
pub fn counts_to_wrench(counts: [i32; AXIS_COUNT]) -> Wrench {
    let force = {
        let digital = Triplet::new(counts[0], counts[1], counts[2]).map(|i| i as f64);
        let sensitivity = force_sensitivity();
        digital.map_entrywise(sensitivity, |d, s| d / s)
    };
    let torque = {
        let digital = Triplet::new(counts[3], counts[4], counts[5]).map(|i| i as f64);
        let sensitivity = torque_sensitivity();
        digital.map_entrywise(sensitivity, |d, s| d / s)
    };
    Wrench::new(force, torque)
}

/// `counts_to_wrench`の逆変換．小数点以下は丸める．
pub fn wrench_to_counts(wrench: &Wrench) -> [i32; AXIS_COUNT] {
    let values = wrench.to_array();
    let mut counts = [0; AXIS_COUNT];
    for (i, count) in counts.iter_mut().enumerate() {
        let scale = if i < 3 {
            COUNTS_PER_FORCE
        } else {
            COUNTS_PER_TORQUE
        };
        *count = (values[i] * scale).round() as i32;
    }
    counts
}

type PerNewton<T> = Quot<Unitless<T>, Newton<T>>;
type PerNewtonMeter<T> = Quot<Unitless<T>, NewtonMeter<T>>;

/// 力の各軸について，1Nあたりカウント値がいくつ変化するか．
fn force_sensitivity() -> Triplet<PerNewton<f64>> {
    Triplet::from_cloned(COUNTS_PER_FORCE).map(PerNewton::<f64>::new)
}

/// トルクの各軸について，1N·mあたりカウント値がいくつ変化するか．
fn torque_sensitivity() -> Triplet<PerNewtonMeter<f64>> {
    Triplet::from_cloned(COUNTS_PER_TORQUE * MILLIMETERS_PER_METER)
        .map(PerNewtonMeter::<f64>::new)
}
