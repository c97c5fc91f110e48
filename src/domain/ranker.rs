//! Cross-sectional factor ranking.
//!
//! Within each cross-section the highest factor value ranks first. Ties share
//! the average of the positions they occupy, and undefined values always rank
//! after every defined value, sharing the average of the trailing positions.
//! Alongside the fractional rank each row gets a distinct ordinal position
//! (1..N, ties broken by panel row order) used for the signal cutoffs.

use crate::domain::error::FactorError;
use crate::domain::operators::compare_desc_nan_last;
use crate::domain::panel::Panel;

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    /// Average rank per panel row.
    pub ranks: Vec<f64>,
    /// Distinct ordinal position per panel row, within its cross-section.
    pub positions: Vec<usize>,
}

pub fn rank_factor(panel: &Panel, factor: &[f64]) -> Result<Ranking, FactorError> {
    if factor.len() != panel.len() {
        return Err(FactorError::configuration(format!(
            "factor has {} values, panel has {} rows",
            factor.len(),
            panel.len()
        )));
    }

    let mut ranks = vec![f64::NAN; panel.len()];
    let mut positions = vec![0; panel.len()];

    for section in panel.cross_sections() {
        let mut order = section.rows.clone();
        // stable: equal values keep panel row order
        order.sort_by(|&a, &b| compare_desc_nan_last(factor[a], factor[b]));

        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && same_value(factor[order[start]], factor[order[end]]) {
                end += 1;
            }
            let avg = (start + 1 + end) as f64 / 2.0;
            for (offset, &row) in order[start..end].iter().enumerate() {
                ranks[row] = avg;
                positions[row] = start + offset + 1;
            }
            start = end;
        }
    }

    Ok(Ranking { ranks, positions })
}

fn same_value(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn panel(n: usize) -> Panel {
        Panel::builder((0..n).map(|i| format!("S{i}")).collect())
            .column("price", vec![1.0; n])
            .build()
            .unwrap()
    }

    #[test]
    fn highest_value_ranks_first() {
        let r = rank_factor(&panel(4), &[0.1, 0.4, 0.3, 0.2]).unwrap();
        assert_eq!(r.ranks, vec![4.0, 1.0, 2.0, 3.0]);
        assert_eq!(r.positions, vec![4, 1, 2, 3]);
    }

    #[test]
    fn ties_share_average_rank() {
        let r = rank_factor(&panel(4), &[5.0, 7.0, 5.0, 1.0]).unwrap();
        assert_eq!(r.ranks, vec![2.5, 1.0, 2.5, 4.0]);
        // row order breaks the tie for positions
        assert_eq!(r.positions, vec![2, 1, 3, 4]);
    }

    #[test]
    fn undefined_values_rank_last() {
        let r = rank_factor(&panel(5), &[f64::NAN, 3.0, f64::NAN, 1.0, 2.0]).unwrap();
        assert_eq!(r.ranks, vec![4.5, 1.0, 4.5, 3.0, 2.0]);
        assert_eq!(r.positions, vec![4, 1, 5, 3, 2]);
    }

    #[test]
    fn no_rows_dropped() {
        let r = rank_factor(&panel(3), &[f64::NAN; 3]).unwrap();
        assert_eq!(r.ranks, vec![2.0, 2.0, 2.0]);
        assert_eq!(r.positions, vec![1, 2, 3]);
    }

    #[test]
    fn ranks_each_cross_section_separately() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let panel = Panel::builder(
            ["A", "B", "A", "B"].iter().map(|s| s.to_string()).collect(),
        )
        .dates(vec![d(1), d(1), d(2), d(2)])
        .column("price", vec![1.0; 4])
        .build()
        .unwrap();
        let r = rank_factor(&panel, &[1.0, 2.0, 4.0, 3.0]).unwrap();
        assert_eq!(r.ranks, vec![2.0, 1.0, 1.0, 2.0]);
        assert_eq!(r.positions, vec![2, 1, 1, 2]);
    }

    #[test]
    fn length_mismatch_rejected() {
        let err = rank_factor(&panel(3), &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, FactorError::Configuration { .. }));
    }
}
