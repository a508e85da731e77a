//! ストリーミングで受信した測定値の平滑化．

use crate::{SensorError, Wrench};

/// 指数移動平均フィルタ．
///
/// `state' = (1 - alpha) * state + alpha * sample`
///
/// 最初の`update`では入力値をそのまま状態とする．
/// `alpha = 1`の場合は平滑化せず，常に最新の入力値を返す．
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialFilter {
    alpha: f64,
    state: Option<Wrench>,
}

impl ExponentialFilter {
    /// `alpha`が(0, 1]の範囲外の場合はエラー．
    pub fn new(alpha: f64) -> Result<ExponentialFilter, SensorError> {
        check_alpha(alpha)?;
        Ok(ExponentialFilter { alpha, state: None })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// 新しい入力値で状態を更新し，平滑化後の値を返す．
    pub fn update(&mut self, sample: Wrench) -> Wrench {
        let next = match self.state {
            Some(state) => state * (1.0 - self.alpha) + sample * self.alpha,
            None => sample,
        };
        self.state = Some(next);
        next
    }

    /// 平滑化後の値．まだ一度も`update`していなければ`None`．
    pub fn value(&self) -> Option<Wrench> {
        self.state
    }

    /// 平滑化後の値．
    ///
    /// まだ一度も`update`していない場合はゼロのレンチを返す．
    /// これは初期化前を表す値であり，測定値として扱ってはならない．
    pub fn data(&self) -> Wrench {
        self.state.unwrap_or_else(Wrench::zeroed)
    }

    /// 状態を捨てて，次の`update`で再び初期化されるようにする．
    pub fn reset(&mut self) {
        self.state = None;
    }
}

pub(crate) fn check_alpha(alpha: f64) -> Result<(), SensorError> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(SensorError::InvalidSmoothingFactor(alpha))
    }
}
