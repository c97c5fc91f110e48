//! Trading signal generation from cross-sectional rankings.
//!
//! The top `buy_count` ordinal positions of each cross-section are buys and
//! the bottom `sell_count` are sells; everything in between holds and is not
//! emitted. Batches come out in date order. Within a batch sells precede buys
//! so their proceeds are available to the buy cohort.

use std::fmt;

use chrono::NaiveDate;

use crate::domain::error::FactorError;
use crate::domain::panel::Panel;
use crate::domain::ranker::Ranking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "buy"),
            SignalKind::Sell => write!(f, "sell"),
            SignalKind::Hold => write!(f, "hold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalConfig {
    pub buy_count: usize,
    pub sell_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub row: usize,
    pub date: Option<NaiveDate>,
    pub stock: String,
    pub price: f64,
    pub kind: SignalKind,
    pub rank: f64,
}

/// Signals for one cross-section, sells first.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBatch {
    pub date: Option<NaiveDate>,
    pub signals: Vec<Signal>,
}

impl SignalBatch {
    pub fn buys(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.kind == SignalKind::Buy)
    }

    pub fn sells(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.kind == SignalKind::Sell)
    }
}

/// Classify an ordinal position within a cross-section of `size` rows.
pub fn classify(position: usize, size: usize, config: &SignalConfig) -> SignalKind {
    if position <= config.buy_count {
        SignalKind::Buy
    } else if position > size.saturating_sub(config.sell_count) {
        SignalKind::Sell
    } else {
        SignalKind::Hold
    }
}

/// Reject configurations that would overlap the buy and sell sets.
pub fn validate_config(panel: &Panel, config: &SignalConfig) -> Result<(), FactorError> {
    let wanted = config
        .buy_count
        .checked_add(config.sell_count)
        .ok_or_else(|| {
            FactorError::configuration(format!(
                "buy_count ({}) + sell_count ({}) overflows",
                config.buy_count, config.sell_count
            ))
        })?;
    for section in panel.cross_sections() {
        if wanted > section.len() {
            let at = section
                .date
                .map(|d| format!(" on {d}"))
                .unwrap_or_default();
            return Err(FactorError::configuration(format!(
                "buy_count ({}) + sell_count ({}) exceeds the {} instruments available{at}",
                config.buy_count,
                config.sell_count,
                section.len()
            )));
        }
    }
    Ok(())
}

pub fn generate_signals(
    panel: &Panel,
    ranking: &Ranking,
    config: &SignalConfig,
) -> Result<Vec<SignalBatch>, FactorError> {
    validate_config(panel, config)?;

    let prices = panel.prices();
    let mut batches = Vec::with_capacity(panel.cross_sections().len());

    for section in panel.cross_sections() {
        let size = section.len();
        let mut sells = Vec::new();
        let mut buys = Vec::new();

        for &row in &section.rows {
            let position = ranking.positions[row];
            let kind = classify(position, size, config);
            let signal = Signal {
                row,
                date: section.date,
                stock: panel.stock(row).to_string(),
                price: prices[row],
                kind,
                rank: ranking.ranks[row],
            };
            match kind {
                SignalKind::Buy => buys.push((position, signal)),
                SignalKind::Sell => sells.push((position, signal)),
                SignalKind::Hold => {}
            }
        }

        // sells from the bottom up, buys from the top down
        sells.sort_by(|a, b| b.0.cmp(&a.0));
        buys.sort_by_key(|(position, _)| *position);

        let signals = sells
            .into_iter()
            .chain(buys)
            .map(|(_, signal)| signal)
            .collect();
        batches.push(SignalBatch {
            date: section.date,
            signals,
        });
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ranker::rank_factor;

    fn panel_with(factor_len: usize) -> Panel {
        Panel::builder((0..factor_len).map(|i| format!("S{i}")).collect())
            .column(
                "price",
                (0..factor_len).map(|i| 10.0 + i as f64).collect(),
            )
            .build()
            .unwrap()
    }

    fn config(buy_count: usize, sell_count: usize) -> SignalConfig {
        SignalConfig {
            buy_count,
            sell_count,
        }
    }

    #[test]
    fn classify_boundaries() {
        let c = config(2, 2);
        assert_eq!(classify(1, 6, &c), SignalKind::Buy);
        assert_eq!(classify(2, 6, &c), SignalKind::Buy);
        assert_eq!(classify(3, 6, &c), SignalKind::Hold);
        assert_eq!(classify(4, 6, &c), SignalKind::Hold);
        assert_eq!(classify(5, 6, &c), SignalKind::Sell);
        assert_eq!(classify(6, 6, &c), SignalKind::Sell);
    }

    #[test]
    fn zero_counts_hold_everything() {
        let c = config(0, 0);
        for p in 1..=4 {
            assert_eq!(classify(p, 4, &c), SignalKind::Hold);
        }
    }

    #[test]
    fn batch_orders_sells_before_buys() {
        let panel = panel_with(6);
        let factor = [0.006, 0.0067, 0.009, 0.002, 0.0005, 0.003];
        let ranking = rank_factor(&panel, &factor).unwrap();
        let batches = generate_signals(&panel, &ranking, &config(3, 3)).unwrap();
        assert_eq!(batches.len(), 1);

        let order: Vec<(&str, SignalKind)> = batches[0]
            .signals
            .iter()
            .map(|s| (s.stock.as_str(), s.kind))
            .collect();
        assert_eq!(
            order,
            vec![
                ("S4", SignalKind::Sell),
                ("S3", SignalKind::Sell),
                ("S5", SignalKind::Sell),
                ("S2", SignalKind::Buy),
                ("S1", SignalKind::Buy),
                ("S0", SignalKind::Buy),
            ]
        );
        assert_eq!(batches[0].signals[3].price, 12.0);
    }

    #[test]
    fn exact_set_sizes_with_ties() {
        let panel = panel_with(5);
        let ranking = rank_factor(&panel, &[1.0; 5]).unwrap();
        let batches = generate_signals(&panel, &ranking, &config(2, 2)).unwrap();
        assert_eq!(batches[0].buys().count(), 2);
        assert_eq!(batches[0].sells().count(), 2);
    }

    #[test]
    fn undefined_values_can_be_sold() {
        let panel = panel_with(4);
        let ranking = rank_factor(&panel, &[f64::NAN, 2.0, 3.0, 1.0]).unwrap();
        let batches = generate_signals(&panel, &ranking, &config(1, 1)).unwrap();
        let sells: Vec<&str> = batches[0].sells().map(|s| s.stock.as_str()).collect();
        assert_eq!(sells, vec!["S0"]);
    }

    #[test]
    fn oversized_config_rejected() {
        let panel = panel_with(4);
        let ranking = rank_factor(&panel, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = generate_signals(&panel, &ranking, &config(3, 2)).unwrap_err();
        assert!(matches!(err, FactorError::Configuration { .. }));
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn overflowing_counts_rejected() {
        let panel = panel_with(4);
        let ranking = rank_factor(&panel, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let err = generate_signals(&panel, &ranking, &config(usize::MAX, 1)).unwrap_err();
        assert!(matches!(err, FactorError::Configuration { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn classify_with_huge_sell_count() {
        let c = config(0, usize::MAX);
        assert_eq!(classify(1, 4, &c), SignalKind::Sell);
        assert_eq!(classify(4, 4, &c), SignalKind::Sell);
    }

    #[test]
    fn full_partition_allowed() {
        let panel = panel_with(4);
        let ranking = rank_factor(&panel, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let batches = generate_signals(&panel, &ranking, &config(2, 2)).unwrap();
        assert_eq!(batches[0].signals.len(), 4);
    }
}
