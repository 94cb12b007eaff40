use crate::domain::errors::InsufficientDataError;
use crate::domain::types::{BollingerBands, Candle, EmaPair, IndicatorSet, MacdValue};
use rust_decimal::prelude::ToPrimitive;

const SINGLE_TIMEFRAME_MIN_CANDLES: usize = 50;
const MULTI_TIMEFRAME_MIN_CANDLES: usize = 60;

/// Periods tuned for short horizons (scalping), per spec §4.B defaults.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorParams {
    pub rsi_periods: (usize, usize, usize),
    pub ema_pairs: [(usize, usize); 3],
    pub macd_fast: (usize, usize, usize),
    pub macd_slow: (usize, usize, usize),
    pub bb_fast: (usize, f64),
    pub bb_slow: (usize, f64),
    pub atr_periods: (usize, usize),
    pub sma_periods: (usize, usize, usize),
    pub volume_high_ratio: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_periods: (7, 14, 21),
            ema_pairs: [(5, 13), (12, 26), (20, 50)],
            macd_fast: (5, 13, 5),
            macd_slow: (12, 26, 9),
            bb_fast: (10, 1.5),
            bb_slow: (20, 2.0),
            atr_periods: (7, 14),
            sma_periods: (10, 20, 50),
            volume_high_ratio: 1.5,
        }
    }
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close.to_f64().unwrap_or(0.0)).collect()
}

fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high.to_f64().unwrap_or(0.0)).collect()
}

fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low.to_f64().unwrap_or(0.0)).collect()
}

fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.volume.to_f64().unwrap_or(0.0)).collect()
}

/// Simple moving average of the trailing `period` values. Leading samples
/// with insufficient history fall back to the latest close, per spec's
/// "no NaN escapes" invariant.
fn sma(values: &[f64], period: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if values.len() < period {
        return *values.last().unwrap();
    }
    let window = &values[values.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    out.push(values[0]);
    for &v in &values[1..] {
        let prev = *out.last().unwrap();
        out.push(v * k + prev * (1.0 - k));
    }
    out
}

fn ema_last(values: &[f64], period: usize) -> f64 {
    ema_series(values, period).last().copied().unwrap_or_else(|| {
        values.last().copied().unwrap_or(0.0)
    })
}

fn rsi(values: &[f64], period: usize) -> f64 {
    if values.len() <= period {
        return 50.0;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    let start = values.len() - period - 1;
    for w in values[start..].windows(2) {
        let delta = w[1] - w[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    if losses == 0.0 {
        return 100.0;
    }
    let rs = (gains / period as f64) / (losses / period as f64);
    100.0 - (100.0 / (1.0 + rs))
}

fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdValue {
    let fast_ema = ema_series(values, fast);
    let slow_ema = ema_series(values, slow);
    let n = fast_ema.len().min(slow_ema.len());
    if n == 0 {
        return MacdValue::default();
    }
    let macd_line: Vec<f64> = (0..n)
        .map(|i| fast_ema[fast_ema.len() - n + i] - slow_ema[slow_ema.len() - n + i])
        .collect();
    let signal_line = ema_series(&macd_line, signal);
    let line = *macd_line.last().unwrap_or(&0.0);
    let sig = signal_line.last().copied().unwrap_or(0.0);
    MacdValue {
        line,
        signal: sig,
        histogram: line - sig,
    }
}

fn bollinger(values: &[f64], period: usize, std_devs: f64) -> BollingerBands {
    if values.is_empty() {
        return BollingerBands::default();
    }
    let middle = sma(values, period);
    let window = if values.len() < period {
        values
    } else {
        &values[values.len() - period..]
    };
    let variance =
        window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / window.len() as f64;
    let stdev = variance.sqrt();
    BollingerBands {
        upper: middle + std_devs * stdev,
        middle,
        lower: middle - std_devs * stdev,
    }
}

fn atr(candles: &[Candle], period: usize) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let mut trs = Vec::with_capacity(candles.len() - 1);
    for w in candles.windows(2) {
        let high = w[1].high.to_f64().unwrap_or(0.0);
        let low = w[1].low.to_f64().unwrap_or(0.0);
        let prev_close = w[0].close.to_f64().unwrap_or(0.0);
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        trs.push(tr);
    }
    sma(&trs, period)
}

fn compute_with_min(candles: &[Candle], min_candles: usize, params: &IndicatorParams) -> Result<IndicatorSet, InsufficientDataError> {
    if candles.len() < min_candles {
        return Err(InsufficientDataError {
            symbol: candles.first().map(|c| c.symbol.clone()).unwrap_or_default(),
            have: candles.len(),
            need: min_candles,
        });
    }

    let closes = closes(candles);
    let _highs = highs(candles);
    let _lows = lows(candles);
    let volumes = volumes(candles);

    let mk_pair = |(f, s): (usize, usize)| -> EmaPair {
        EmaPair {
            fast: rust_decimal::Decimal::from_f64_retain(ema_last(&closes, f)).unwrap_or_default(),
            slow: rust_decimal::Decimal::from_f64_retain(ema_last(&closes, s)).unwrap_or_default(),
        }
    };

    let volume_current = *volumes.last().unwrap_or(&0.0);
    let volume_avg_20 = sma(&volumes, 20);
    let volume_avg_50 = sma(&volumes, 50);
    let volume_ratio = if volume_avg_20 > 0.0 {
        volume_current / volume_avg_20
    } else {
        1.0
    };

    let set = IndicatorSet {
        rsi_7: rsi(&closes, params.rsi_periods.0),
        rsi_14: rsi(&closes, params.rsi_periods.1),
        rsi_21: rsi(&closes, params.rsi_periods.2),
        ema_5_13: Some(mk_pair(params.ema_pairs[0])),
        ema_12_26: Some(mk_pair(params.ema_pairs[1])),
        ema_20_50: Some(mk_pair(params.ema_pairs[2])),
        macd_5_13_5: macd(&closes, params.macd_fast.0, params.macd_fast.1, params.macd_fast.2),
        macd_12_26_9: macd(&closes, params.macd_slow.0, params.macd_slow.1, params.macd_slow.2),
        bb_10_1_5: bollinger(&closes, params.bb_fast.0, params.bb_fast.1),
        bb_20_2: bollinger(&closes, params.bb_slow.0, params.bb_slow.1),
        atr_7: atr(candles, params.atr_periods.0),
        atr_14: atr(candles, params.atr_periods.1),
        sma_10: sma(&closes, params.sma_periods.0),
        sma_20: sma(&closes, params.sma_periods.1),
        sma_50: sma(&closes, params.sma_periods.2),
        volume_current,
        volume_avg_20,
        volume_avg_50,
        volume_ratio,
        volume_is_high: volume_ratio > params.volume_high_ratio,
        last_close: *closes.last().unwrap_or(&0.0),
    };

    debug_assert!(set.all_finite());
    Ok(set)
}

/// Single-timeframe indicator set; requires >= 50 candles (spec §4.B).
pub fn compute(candles: &[Candle], params: &IndicatorParams) -> Result<IndicatorSet, InsufficientDataError> {
    compute_with_min(candles, SINGLE_TIMEFRAME_MIN_CANDLES, params)
}

/// Multi-timeframe indicator set; requires >= 60 candles (spec §4.B).
pub fn compute_multi_timeframe(
    candles: &[Candle],
    params: &IndicatorParams,
) -> Result<IndicatorSet, InsufficientDataError> {
    compute_with_min(candles, MULTI_TIMEFRAME_MIN_CANDLES, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn candle(i: usize, price: f64) -> Candle {
        Candle {
            symbol: "BTC-PERP".into(),
            open: Decimal::from_f64_retain(price).unwrap(),
            high: Decimal::from_f64_retain(price + 1.0).unwrap(),
            low: Decimal::from_f64_retain(price - 1.0).unwrap(),
            close: Decimal::from_f64_retain(price).unwrap(),
            volume: Decimal::from_f64_retain(1000.0 + i as f64).unwrap(),
            timestamp: i as i64 * 60_000,
        }
    }

    #[test]
    fn insufficient_candles_fails() {
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, 100.0)).collect();
        assert!(compute(&candles, &IndicatorParams::default()).is_err());
    }

    #[test]
    fn sufficient_candles_produce_finite_indicators() {
        let candles: Vec<Candle> = (0..70)
            .map(|i| candle(i, 100.0 + (i as f64 * 0.1).sin() * 5.0))
            .collect();
        let set = compute_multi_timeframe(&candles, &IndicatorParams::default()).unwrap();
        assert!(set.all_finite());
        assert!(set.rsi_14 >= 0.0 && set.rsi_14 <= 100.0);
    }

    #[test]
    fn volume_ratio_flags_high_volume() {
        let mut candles: Vec<Candle> = (0..70).map(|i| candle(i, 100.0)).collect();
        candles.last_mut().unwrap().volume = Decimal::from(100_000);
        let set = compute_multi_timeframe(&candles, &IndicatorParams::default()).unwrap();
        assert!(set.volume_is_high);
    }
}
