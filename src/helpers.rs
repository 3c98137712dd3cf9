use chrono::Duration;
use indexmap::IndexMap;
use std::hash::Hash;

pub trait FractionalDays {
    fn num_fractional_days(&self) -> f64;
    fn fractional_days(fractional_days: f64) -> Self;
}

impl FractionalDays for Duration {
    fn num_fractional_days(&self) -> f64 {
        let seconds_in_a_day = 24.0 * 3600.0;
        self.num_seconds() as f64 / seconds_in_a_day
    }

    fn fractional_days(fractional_days: f64) -> Self {
        Duration::seconds((fractional_days * 24. * 60. * 60.).round() as i64)
    }
}

pub trait GroupByInsertion<A, B> {
    /// Groups the provided elements by A, sorted by the first presence of A,
    /// via an `IndexMap` so the grouping order is deterministic.
    fn into_group_by_insertion(self) -> Vec<(A, Vec<B>)>;
}

impl<A, B, I> GroupByInsertion<A, B> for I
where
    A: Hash + Eq,
    I: IntoIterator<Item = (A, B)>,
{
    fn into_group_by_insertion(self) -> Vec<(A, Vec<B>)> {
        let mut grouping: IndexMap<A, Vec<B>> = IndexMap::new();
        for (key, item) in self {
            grouping.entry(key).or_default().push(item);
        }
        grouping.into_iter().collect::<Vec<_>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn group_by_insertion_preserves_first_seen_order() {
        let items = vec![("b", 1), ("a", 2), ("b", 3)];
        let grouped = items.into_group_by_insertion();
        assert_eq!(grouped, vec![("b", vec![1, 3]), ("a", vec![2])]);
    }
}
