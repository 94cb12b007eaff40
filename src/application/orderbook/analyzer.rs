use crate::domain::orderbook::{LowVolumeNode, MarketState, OrderBookAnalysis, Wall};
use crate::domain::types::OrderBookSnapshot;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy)]
pub struct OrderBookParams {
    pub depth: usize,
    pub wall_multiplier: f64,
    pub weak_imbalance_threshold: f64,
    pub strong_imbalance_threshold: f64,
    pub tight_spread_pct: f64,
    pub liquidity_scale: f64,
    pub absorption_epsilon_pct: f64,
    pub absorption_window: usize,
    pub absorption_pressure_threshold: f64,
}

impl Default for OrderBookParams {
    fn default() -> Self {
        Self {
            depth: 20,
            wall_multiplier: 3.0,
            weak_imbalance_threshold: 0.12,
            strong_imbalance_threshold: 0.35,
            tight_spread_pct: 0.05,
            liquidity_scale: 50_000.0,
            absorption_epsilon_pct: 0.03,
            absorption_window: 5,
            absorption_pressure_threshold: 0.65,
        }
    }
}

/// Tracks per-symbol tick history needed for stateful derivations
/// (breakout confirmation, absorption) that a single snapshot can't provide.
struct SymbolHistory {
    last_market_state: Option<MarketState>,
    mid_prices: VecDeque<f64>,
    pressures: VecDeque<f64>,
}

impl SymbolHistory {
    fn new() -> Self {
        Self {
            last_market_state: None,
            mid_prices: VecDeque::with_capacity(16),
            pressures: VecDeque::with_capacity(16),
        }
    }
}

/// Derives the microstructure record from an `OrderBookSnapshot` (spec §3,
/// §4.C). Stateful across ticks per symbol to support breakout and
/// absorption detection, which need more than one snapshot.
pub struct OrderBookAnalyzer {
    params: OrderBookParams,
    history: HashMap<String, SymbolHistory>,
}

impl OrderBookAnalyzer {
    pub fn new(params: OrderBookParams) -> Self {
        Self {
            params,
            history: HashMap::new(),
        }
    }

    pub fn analyze(&mut self, snapshot: &OrderBookSnapshot) -> OrderBookAnalysis {
        let p = &self.params;
        let depth = p.depth;

        let bids: Vec<(f64, f64)> = snapshot
            .bids
            .iter()
            .take(depth)
            .map(|l| (l.price.to_f64().unwrap_or(0.0), l.size.to_f64().unwrap_or(0.0)))
            .collect();
        let asks: Vec<(f64, f64)> = snapshot
            .asks
            .iter()
            .take(depth)
            .map(|l| (l.price.to_f64().unwrap_or(0.0), l.size.to_f64().unwrap_or(0.0)))
            .collect();

        let bid_total: f64 = bids.iter().map(|(_, s)| s).sum();
        let ask_total: f64 = asks.iter().map(|(_, s)| s).sum();
        let total = bid_total + ask_total;

        let imbalance_ratio = if total > 0.0 {
            (bid_total - ask_total) / total
        } else {
            0.0
        };

        let (bid_pressure, ask_pressure) = if total > 0.0 {
            (bid_total / total, ask_total / total)
        } else {
            (0.5, 0.5)
        };

        let mid_price = snapshot
            .mid_price()
            .and_then(|d| d.to_f64())
            .unwrap_or_else(|| {
                let b = bids.first().map(|(p, _)| *p).unwrap_or(0.0);
                let a = asks.first().map(|(p, _)| *p).unwrap_or(0.0);
                (b + a) / 2.0
            });

        let spread_pct = match (snapshot.best_bid(), snapshot.best_ask()) {
            (Some(b), Some(a)) if mid_price > 0.0 => {
                let bid = b.price.to_f64().unwrap_or(0.0);
                let ask = a.price.to_f64().unwrap_or(0.0);
                (ask - bid) / mid_price * 100.0
            }
            _ => 0.0,
        };

        let liquidity_score = (100.0 * (1.0 - (-total / p.liquidity_scale).exp())).clamp(0.0, 100.0);

        let nearest_bid_wall = Self::nearest_wall(&bids, mid_price, p.wall_multiplier);
        let nearest_ask_wall = Self::nearest_wall(&asks, mid_price, p.wall_multiplier);
        let low_volume_node = Self::nearest_vacuum(&bids, &asks, mid_price);

        let hist = self
            .history
            .entry(snapshot.symbol.clone())
            .or_insert_with(SymbolHistory::new);

        let raw_state = if imbalance_ratio.abs() >= p.strong_imbalance_threshold
            && ((imbalance_ratio > 0.0 && bid_pressure > ask_pressure)
                || (imbalance_ratio < 0.0 && ask_pressure > bid_pressure))
        {
            if imbalance_ratio > 0.0 {
                MarketState::ImbalancedUp
            } else {
                MarketState::ImbalancedDown
            }
        } else if imbalance_ratio.abs() < p.weak_imbalance_threshold && spread_pct < p.tight_spread_pct {
            MarketState::Consolidation
        } else {
            MarketState::Balanced
        };

        let breakout_confirmed = matches!(
            (hist.last_market_state, raw_state),
            (Some(MarketState::ImbalancedUp), MarketState::ImbalancedUp)
                | (Some(MarketState::ImbalancedDown), MarketState::ImbalancedDown)
        );

        hist.mid_prices.push_back(mid_price);
        hist.pressures.push_back(bid_pressure.max(ask_pressure));
        if hist.mid_prices.len() > p.absorption_window {
            hist.mid_prices.pop_front();
        }
        if hist.pressures.len() > p.absorption_window {
            hist.pressures.pop_front();
        }

        let absorption_detected = hist.mid_prices.len() == p.absorption_window
            && hist
                .pressures
                .iter()
                .all(|pr| *pr >= p.absorption_pressure_threshold)
            && {
                let first = *hist.mid_prices.front().unwrap();
                let spread_of_move = hist
                    .mid_prices
                    .iter()
                    .map(|m| (m - first).abs() / first.max(f64::EPSILON) * 100.0)
                    .fold(0.0, f64::max);
                spread_of_move < p.absorption_epsilon_pct
            };

        let aggression_score = (bid_pressure - ask_pressure).clamp(-1.0, 1.0);

        hist.last_market_state = Some(raw_state);

        OrderBookAnalysis {
            symbol: snapshot.symbol.clone(),
            imbalance_ratio,
            spread_pct,
            bid_pressure,
            ask_pressure,
            liquidity_score,
            nearest_bid_wall,
            nearest_ask_wall,
            market_state: raw_state,
            aggression_score,
            absorption_detected,
            breakout_confirmed,
            low_volume_node,
        }
    }

    fn nearest_wall(levels: &[(f64, f64)], mid: f64, multiplier: f64) -> Option<Wall> {
        if levels.len() < 3 {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for i in 0..levels.len() {
            let neighbours: Vec<f64> = levels
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, (_, s))| *s)
                .collect();
            if neighbours.is_empty() {
                continue;
            }
            let mean = neighbours.iter().sum::<f64>() / neighbours.len() as f64;
            if mean > 0.0 && levels[i].1 >= mean * multiplier {
                let distance = (levels[i].0 - mid).abs() / mid.max(f64::EPSILON);
                if best.map(|(_, d)| distance < d).unwrap_or(true) {
                    best = Some((i, distance));
                }
            }
        }
        best.map(|(i, distance)| Wall {
            price: Decimal::from_f64_retain(levels[i].0).unwrap_or_default(),
            size: Decimal::from_f64_retain(levels[i].1).unwrap_or_default(),
            distance_pct: distance * 100.0,
        })
    }

    /// A vacuum zone: the single largest gap in resting size relative to the
    /// local average across both sides, reported as a distance from mid.
    fn nearest_vacuum(bids: &[(f64, f64)], asks: &[(f64, f64)], mid: f64) -> Option<LowVolumeNode> {
        let all: Vec<(f64, f64)> = bids.iter().chain(asks.iter()).copied().collect();
        if all.len() < 4 {
            return None;
        }
        let mean = all.iter().map(|(_, s)| s).sum::<f64>() / all.len() as f64;
        if mean <= 0.0 {
            return None;
        }
        all.iter()
            .filter(|(_, s)| *s < mean * 0.25)
            .min_by(|a, b| {
                let da = (a.0 - mid).abs();
                let db = (b.0 - mid).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(price, _)| LowVolumeNode {
                price: Decimal::from_f64_retain(*price).unwrap_or_default(),
                distance_pct: (price - mid).abs() / mid.max(f64::EPSILON) * 100.0,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BookLevel;

    fn snapshot(symbol: &str, bid_sizes: &[f64], ask_sizes: &[f64]) -> OrderBookSnapshot {
        let bids = bid_sizes
            .iter()
            .enumerate()
            .map(|(i, s)| BookLevel {
                price: Decimal::from(100 - i as i64),
                size: Decimal::from_f64_retain(*s).unwrap(),
            })
            .collect();
        let asks = ask_sizes
            .iter()
            .enumerate()
            .map(|(i, s)| BookLevel {
                price: Decimal::from(101 + i as i64),
                size: Decimal::from_f64_retain(*s).unwrap(),
            })
            .collect();
        OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids,
            asks,
            timestamp: 0,
        }
    }

    #[test]
    fn pressures_sum_to_one() {
        let mut analyzer = OrderBookAnalyzer::new(OrderBookParams::default());
        let snap = snapshot("BTC-PERP", &[10.0, 5.0, 3.0], &[4.0, 4.0, 4.0]);
        let analysis = analyzer.analyze(&snap);
        assert!(analysis.pressures_sum_to_one());
    }

    #[test]
    fn strong_bid_imbalance_classified_imbalanced_up() {
        let mut analyzer = OrderBookAnalyzer::new(OrderBookParams::default());
        let snap = snapshot("BTC-PERP", &[100.0, 100.0, 100.0], &[10.0, 10.0, 10.0]);
        let analysis = analyzer.analyze(&snap);
        assert_eq!(analysis.market_state, MarketState::ImbalancedUp);
        assert!(analysis.imbalance_ratio > 0.0);
    }

    #[test]
    fn breakout_confirmed_on_second_consecutive_imbalanced_tick() {
        let mut analyzer = OrderBookAnalyzer::new(OrderBookParams::default());
        let snap = snapshot("BTC-PERP", &[100.0, 100.0, 100.0], &[10.0, 10.0, 10.0]);
        let first = analyzer.analyze(&snap);
        assert!(!first.breakout_confirmed);
        let second = analyzer.analyze(&snap);
        assert!(second.breakout_confirmed);
    }

    #[test]
    fn balanced_book_has_no_wall() {
        let mut analyzer = OrderBookAnalyzer::new(OrderBookParams::default());
        let snap = snapshot("BTC-PERP", &[10.0, 10.0, 10.0], &[10.0, 10.0, 10.0]);
        let analysis = analyzer.analyze(&snap);
        assert!(analysis.nearest_bid_wall.is_none());
        assert!(analysis.nearest_ask_wall.is_none());
    }
}
