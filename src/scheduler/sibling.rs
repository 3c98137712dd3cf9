//! Sibling spacing: keeps two cards from the same note landing on the same
//! review day. Grounded in the teacher's `api::operations::note` sibling
//! lookups, reused here for the `_adjRevIvl`-style day nudge (the precise
//! probe order and fallback below is reverse-engineered from
//! `test_adjIvl` in the origin's test suite to match its exact numbers).

use crate::model::{Card, CardId, Queue};
use crate::store::Store;
use crate::Error;

use super::Scheduler;

/// Given the "ideal" graduated due day and the due days already held by a
/// card's siblings, nudges away from an exact collision. `min_space == 0`
/// disables the check entirely. Probe order is `[ideal-1, ideal+1]`; if
/// both are also taken, the ideal is accepted as-is.
pub(super) fn adjust_for_siblings(ideal_due: i64, sibling_dues: &[i64], min_space: i64) -> i64 {
    if min_space <= 0 || !sibling_dues.contains(&ideal_due) {
        return ideal_due;
    }
    for candidate in [ideal_due - 1, ideal_due + 1] {
        if !sibling_dues.contains(&candidate) {
            return candidate;
        }
    }
    ideal_due
}

impl<S: Store> Scheduler<S> {
    /// Due days already held by `card`'s siblings that are live in the
    /// review queue (the only state a collision is meaningful against).
    pub(super) fn sibling_review_dues(&self, card: &Card) -> Result<Vec<i64>, Error> {
        let sibling_ids: Vec<CardId> = self
            .store
            .sibling_ids(card.note_id)?
            .into_iter()
            .filter(|&id| id != card.id)
            .collect();
        let mut dues = Vec::with_capacity(sibling_ids.len());
        for id in sibling_ids {
            let sibling = self.store.get_card(id)?;
            if sibling.queue == Queue::Review {
                dues.push(sibling.due);
            }
        }
        Ok(dues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn probes_minus_one_then_plus_one_then_falls_back_to_ideal() {
        assert_eq!(adjust_for_siblings(7, &[], 1), 7);
        assert_eq!(adjust_for_siblings(7, &[7], 1), 6);
        assert_eq!(adjust_for_siblings(7, &[7, 6], 1), 8);
        assert_eq!(adjust_for_siblings(7, &[7, 6, 8], 1), 7);
    }

    #[test]
    fn disabled_when_min_space_is_zero() {
        assert_eq!(adjust_for_siblings(7, &[7], 0), 7);
    }
}
