//! ATI製6軸力覚センサとRDT (Raw Data Transfer) プロトコルで通信するためのライブラリ．
//!
//! センサとはUDPで通信する．
//! 指定した数だけサンプルを受信するバッチ取得と，
//! バックグラウンドスレッドで受信し続けるストリーミング取得の2通りの方法で測定値を得られる．

mod config;
mod connection;
mod error;
pub mod filter;
pub mod logger;
pub mod observer;
pub mod protocol;
mod sensor;
mod stream;
pub mod transport;

pub use dimensioned::si::{Meter, Newton};
use dimensioned::typenum::Prod;
pub use pair_macro::Triplet;
use std::ops::{Add, Mul, Sub};

pub use config::{SensorConfig, DEFAULT_SENSOR_IP, RDT_PORT};
pub use connection::ConnectionState;
pub use error::{ProtocolError, SensorError};
pub use filter::ExponentialFilter;
pub use logger::WrenchLog;
pub use observer::{NullObserver, SensorEvent, SensorObserver, TracingObserver};
pub use sensor::{Sensor, DEFAULT_TARE_SAMPLES};
pub use stream::StreamState;
pub use transport::{Transport, UdpTransport};

pub type NewtonMeter<T> = Prod<Newton<T>, Meter<T>>;

/// 1mあたりのmm．
/// センサはトルクをN·mm単位で扱う．
pub(crate) const MILLIMETERS_PER_METER: f64 = 1000.0;

/// レンチ(力とトルクのペア)を表す．
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wrench {
    /// 力．
    pub force: Triplet<Newton<f64>>,
    /// トルク．
    pub torque: Triplet<NewtonMeter<f64>>,
}

impl Wrench {
    pub const fn new(force: Triplet<Newton<f64>>, torque: Triplet<NewtonMeter<f64>>) -> Wrench {
        Wrench { force, torque }
    }

    /// 力とトルクが0である`Wrench`を返す．
    pub fn zeroed() -> Wrench {
        let force = Triplet::from_cloned(0.0).map(Newton::new);
        let torque = Triplet::from_cloned(0.0).map(NewtonMeter::<f64>::new);
        Wrench { force, torque }
    }

    /// `(Fx, Fy, Fz, Tx, Ty, Tz)`の順に並んだ数値から`Wrench`を作る．
    /// 力の単位はN，トルクの単位はN·mm．
    pub fn from_array(values: [f64; 6]) -> Wrench {
        let force = Triplet::new(values[0], values[1], values[2]).map(Newton::new);
        let torque = Triplet::new(values[3], values[4], values[5])
            .map(|t| NewtonMeter::<f64>::new(t / MILLIMETERS_PER_METER));
        Wrench { force, torque }
    }

    /// `(Fx, Fy, Fz, Tx, Ty, Tz)`の順に数値を返す．
    /// 力の単位はN，トルクの単位はN·mm．
    pub fn to_array(&self) -> [f64; 6] {
        let torque = self
            .torque
            .map(|t| t.value_unsafe * MILLIMETERS_PER_METER);
        [
            self.force.x.value_unsafe,
            self.force.y.value_unsafe,
            self.force.z.value_unsafe,
            torque.x,
            torque.y,
            torque.z,
        ]
    }

    /// 各成分の算術平均を返す．
    /// `wrenches`が空の場合は`None`．
    pub fn mean(wrenches: &[Wrench]) -> Option<Wrench> {
        if wrenches.is_empty() {
            return None;
        }

        let sum = wrenches
            .iter()
            .fold(Wrench::zeroed(), |acc, &cur| acc + cur);
        let force = sum.force.map(|e| e / wrenches.len() as f64);
        let torque = sum.torque.map(|e| e / wrenches.len() as f64);

        Some(Wrench::new(force, torque))
    }
}

impl Add for Wrench {
    type Output = Wrench;

    fn add(self, rhs: Self) -> Self::Output {
        let force = self.force + rhs.force;
        let torque = self.torque + rhs.torque;
        Wrench { force, torque }
    }
}

impl Sub for Wrench {
    type Output = Wrench;

    fn sub(self, rhs: Self) -> Self::Output {
        let force = self.force - rhs.force;
        let torque = self.torque - rhs.torque;
        Wrench { force, torque }
    }
}

impl Mul<f64> for Wrench {
    type Output = Wrench;

    fn mul(self, rhs: f64) -> Self::Output {
        let force = self.force.map(|f| f * rhs);
        let torque = self.torque.map(|t| t * rhs);
        Wrench { force, torque }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zeroed_is_all_zero() {
        assert_eq!(Wrench::zeroed().to_array(), [0.0; 6]);
    }

    #[test]
    fn test_array_conversion_keeps_newton_millimeter() {
        let values = [1.0, -2.0, 3.5, 250.0, -0.5, 12.0];
        let wrench = Wrench::from_array(values);

        // 内部ではN·mで保持する
        assert_relative_eq!(wrench.torque.x.value_unsafe, 0.25);
        for (actual, expected) in wrench.to_array().iter().zip(values.iter()) {
            assert_relative_eq!(*actual, *expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_arithmetic() {
        let a = Wrench::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Wrench::from_array([0.5, 0.5, 0.5, 1.0, 1.0, 1.0]);

        let sum = (a + b).to_array();
        let diff = (a - b).to_array();
        let scaled = (a * 2.0).to_array();

        let expected_sum = [1.5, 2.5, 3.5, 5.0, 6.0, 7.0];
        let expected_diff = [0.5, 1.5, 2.5, 3.0, 4.0, 5.0];
        let expected_scaled = [2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        for i in 0..6 {
            assert_relative_eq!(sum[i], expected_sum[i], epsilon = 1e-9);
            assert_relative_eq!(diff[i], expected_diff[i], epsilon = 1e-9);
            assert_relative_eq!(scaled[i], expected_scaled[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_mean() {
        assert_eq!(Wrench::mean(&[]), None);

        let samples = [
            Wrench::from_array([1.0, 0.0, -1.0, 10.0, 0.0, 0.0]),
            Wrench::from_array([3.0, 0.0, -3.0, 30.0, 0.0, 6.0]),
        ];
        let mean = Wrench::mean(&samples).unwrap().to_array();
        let expected = [2.0, 0.0, -2.0, 20.0, 0.0, 3.0];
        for i in 0..6 {
            assert_relative_eq!(mean[i], expected[i], epsilon = 1e-9);
        }
    }
}
