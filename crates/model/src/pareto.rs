// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Multi-objective Pareto reduction.

/// Optimisation direction of one objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Smaller is better.
    Min,
    /// Larger is better.
    Max,
}

/// One objective: how to read a value out of an item, and which direction
/// is better.
pub struct Objective<T> {
    /// Extracts the objective value from an item.
    pub value: fn(&T) -> f64,
    /// Optimisation direction.
    pub polarity: Polarity,
}

/// Objective vector of one item, normalised so that smaller is always
/// better.
fn normalised<T>(item: &T, objectives: &[Objective<T>]) -> Vec<f64> {
    objectives
        .iter()
        .map(|o| match o.polarity {
            Polarity::Min => (o.value)(item),
            Polarity::Max => -(o.value)(item),
        })
        .collect()
}

/// `a` dominates `b` when it is no worse in every objective and strictly
/// better in at least one.
fn dominates(a: &[f64], b: &[f64]) -> bool {
    let no_worse = a.iter().zip(b).all(|(x, y)| x <= y);
    let strictly_better = a.iter().zip(b).any(|(x, y)| x < y);
    no_worse && strictly_better
}

/// Returns the non-dominated subset of `items` under `objectives`.
///
/// Items with identical objective vectors collapse to the first one seen,
/// so the result is deterministic for a given input order. Quadratic in the
/// number of items, which is fine for the few hundred candidates a tuning
/// space produces.
pub fn pareto_front<T: Clone>(items: &[T], objectives: &[Objective<T>]) -> Vec<T> {
    let vectors: Vec<Vec<f64>> = items.iter().map(|i| normalised(i, objectives)).collect();

    items
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            !vectors.iter().enumerate().any(|(j, other)| {
                if *i == j {
                    return false;
                }
                dominates(other, &vectors[*i]) || (other == &vectors[*i] && j < *i)
            })
        })
        .map(|(_, item)| item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        power: f64,
        tps: f64,
    }

    fn objectives() -> [Objective<Point>; 2] {
        [
            Objective { value: |p: &Point| p.power, polarity: Polarity::Min },
            Objective { value: |p: &Point| p.tps, polarity: Polarity::Max },
        ]
    }

    fn p(power: f64, tps: f64) -> Point {
        Point { power, tps }
    }

    #[test]
    fn dominated_points_are_removed() {
        // (3, 50) is beaten by (2, 60) in both objectives.
        let items = vec![p(2.0, 60.0), p(3.0, 50.0), p(5.0, 100.0)];
        let front = pareto_front(&items, &objectives());
        assert_eq!(front, vec![p(2.0, 60.0), p(5.0, 100.0)]);
    }

    #[test]
    fn front_is_sound() {
        let items = vec![
            p(1.0, 10.0),
            p(2.0, 30.0),
            p(2.5, 25.0),
            p(4.0, 40.0),
            p(6.0, 40.0),
        ];
        let front = pareto_front(&items, &objectives());
        for a in &front {
            let beaten = items
                .iter()
                .any(|b| b.power <= a.power && b.tps >= a.tps && (b.power < a.power || b.tps > a.tps));
            assert!(!beaten, "{a:?} is dominated but survived");
        }
    }

    #[test]
    fn front_is_complete() {
        let items = vec![p(1.0, 10.0), p(2.0, 30.0), p(3.0, 20.0), p(4.0, 40.0)];
        let front = pareto_front(&items, &objectives());
        for a in &items {
            let dominated = items
                .iter()
                .any(|b| b.power <= a.power && b.tps >= a.tps && (b.power < a.power || b.tps > a.tps));
            if !dominated {
                assert!(front.contains(a), "{a:?} is non-dominated but missing");
            }
        }
    }

    #[test]
    fn ties_collapse_to_first_seen() {
        let items = vec![p(2.0, 30.0), p(2.0, 30.0), p(1.0, 10.0)];
        let front = pareto_front(&items, &objectives());
        assert_eq!(front, vec![p(2.0, 30.0), p(1.0, 10.0)]);
    }

    #[test]
    fn single_item_survives() {
        let items = vec![p(7.0, 1.0)];
        assert_eq!(pareto_front(&items, &objectives()), items);
    }

    #[test]
    fn empty_input_yields_empty_front() {
        let items: Vec<Point> = Vec::new();
        assert!(pareto_front(&items, &objectives()).is_empty());
    }

    #[test]
    fn polarity_is_respected() {
        // With both objectives minimised, high-tps points are no longer
        // protected by their throughput.
        let both_min = [
            Objective { value: |p: &Point| p.power, polarity: Polarity::Min },
            Objective { value: |p: &Point| p.tps, polarity: Polarity::Min },
        ];
        let items = vec![p(2.0, 60.0), p(2.0, 50.0), p(1.0, 50.0)];
        let front = pareto_front(&items, &both_min);
        assert_eq!(front, vec![p(1.0, 50.0)]);
    }
}
