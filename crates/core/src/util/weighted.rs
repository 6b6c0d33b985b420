use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
    Rng,
};

/// Normalize a weight value so it can be used for selection. `NaN` and
/// negative values become zero. Positive infinity is preserved, since it has
/// special meaning during selection (see [WeightedTable]).
pub fn sanitize_weight(weight: f32) -> f32 {
    if weight.is_nan() {
        0.0
    } else {
        weight.max(0.0)
    }
}

/// A one-shot weighted random selector. Collect a set of items with weights,
/// then pick one with probability proportional to its weight.
///
/// Selection rules:
/// - Zero, negative, and `NaN` weights are never selected
/// - If any item has a weight of `+inf`, the pick is guaranteed to be one of
///   the infinite items (chosen uniformly among them)
/// - If no item has a positive weight, there is no pick
#[derive(Clone, Debug)]
pub struct WeightedTable<T> {
    entries: Vec<(T, f32)>,
}

impl<T> WeightedTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Add an item to the table. The weight is sanitized on the way in.
    pub fn push(&mut self, item: T, weight: f32) {
        self.entries.push((item, sanitize_weight(weight)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all (finite) weights in the table
    pub fn total_weight(&self) -> f64 {
        self.entries
            .iter()
            .map(|(_, w)| *w as f64)
            .filter(|w| w.is_finite())
            .sum()
    }

    /// Pick the index of an item. See [Self::pick].
    pub fn pick_index(&self, rng: &mut impl Rng) -> Option<usize> {
        // Infinite weights trump everything else
        let infinite: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, w))| w.is_infinite())
            .map(|(i, _)| i)
            .collect();
        if !infinite.is_empty() {
            return infinite.choose(rng).copied();
        }

        // f64, so the total of several huge f32 weights stays finite. Fails
        // when there are no entries or they're all zero.
        let weights = self.entries.iter().map(|(_, w)| *w as f64);
        let distribution: WeightedIndex<f64> =
            WeightedIndex::new(weights).ok()?;
        Some(distribution.sample(rng))
    }

    /// Pick a random item, with probability proportional to its weight.
    /// Returns `None` if no item can be picked.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<&T> {
        self.pick_index(rng).map(|i| &self.entries[i].0)
    }

    /// Consume the table and pick an item by value.
    pub fn into_pick(mut self, rng: &mut impl Rng) -> Option<T> {
        let index = self.pick_index(rng)?;
        Some(self.entries.swap_remove(index).0)
    }
}

impl<T> Default for WeightedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(T, f32)> for WeightedTable<T> {
    fn from_iter<I: IntoIterator<Item = (T, f32)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (item, weight) in iter {
            table.push(item, weight);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_sanitize_weight() {
        assert_eq!(sanitize_weight(3.5), 3.5);
        assert_eq!(sanitize_weight(-1.0), 0.0);
        assert_eq!(sanitize_weight(f32::NAN), 0.0);
        assert_eq!(sanitize_weight(f32::INFINITY), f32::INFINITY);
        assert_eq!(sanitize_weight(f32::NEG_INFINITY), 0.0);
    }

    /// Large-sample frequencies should converge to w_i / sum(w)
    #[test]
    fn test_pick_distribution() {
        let mut rng = Pcg64::seed_from_u64(1234);
        let table: WeightedTable<usize> =
            vec![(0, 1.0), (1, 2.0), (2, 7.0)].into_iter().collect();
        assert_eq!(table.total_weight(), 10.0);
        let samples = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..samples {
            counts[*table.pick(&mut rng).unwrap()] += 1;
        }
        for (count, expected) in counts.iter().zip([0.1, 0.2, 0.7]) {
            let actual = *count as f64 / samples as f64;
            assert!(
                (actual - expected).abs() < 0.01,
                "expected ~{expected}, got {actual} in {counts:?}"
            );
        }
    }

    #[test]
    fn test_pick_zero_weight_never_selected() {
        let mut rng = Pcg64::seed_from_u64(99);
        let table: WeightedTable<&str> =
            vec![("zero", 0.0), ("nan", f32::NAN), ("neg", -4.0), ("one", 1.0)]
                .into_iter()
                .collect();
        for _ in 0..1000 {
            assert_eq!(table.pick(&mut rng), Some(&"one"));
        }
    }

    #[test]
    fn test_pick_infinite_always_selected() {
        let mut rng = Pcg64::seed_from_u64(7);
        let table: WeightedTable<&str> = vec![
            ("big", f32::MAX),
            ("inf", f32::INFINITY),
            ("small", 1.0),
        ]
        .into_iter()
        .collect();
        for _ in 0..1000 {
            assert_eq!(table.pick(&mut rng), Some(&"inf"));
        }
    }

    /// Weights that would overflow an f32 sum are still picked fairly
    #[test]
    fn test_pick_huge_finite_weights() {
        let mut rng = Pcg64::seed_from_u64(3);
        let table: WeightedTable<usize> =
            vec![(0, f32::MAX), (1, f32::MAX), (2, 0.0)]
                .into_iter()
                .collect();
        let mut counts = [0usize; 3];
        for _ in 0..1000 {
            counts[table.pick_index(&mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[2], 0);
        assert!(counts[0] > 400 && counts[1] > 400, "{counts:?}");
    }

    #[test]
    fn test_pick_empty() {
        let mut rng = Pcg64::seed_from_u64(0);
        let empty: WeightedTable<u8> = WeightedTable::new();
        assert_eq!(empty.pick(&mut rng), None);
        let zeroes: WeightedTable<u8> =
            vec![(1, 0.0), (2, 0.0)].into_iter().collect();
        assert_eq!(zeroes.pick(&mut rng), None);
        assert_eq!(zeroes.into_pick(&mut rng), None);
    }
}
