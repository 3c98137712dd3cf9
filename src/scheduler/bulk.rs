//! Bulk card operations (component I): suspend/bury and their inverses,
//! forgetting, manual rescheduling, and new-card ordering. Grounded in the
//! teacher's `api::operations::card` bulk mutators, generalized from its
//! sqlx batched `UPDATE` statements to plain `Store::update_card` calls in
//! a loop (there is no transaction boundary to batch here: `update_card` is
//! documented as all-or-nothing per call).

use crate::model::{Card, CardId, CardType, Queue};
use crate::store::Store;
use crate::Error;
use rand::seq::SliceRandom;
use rand::Rng;

use super::Scheduler;

impl<S: Store> Scheduler<S> {
    /// Parks cards outside the live queues without disturbing their
    /// scheduling fields. A card mid-relearn keeps `edue` set, so
    /// `unsuspend`/`unbury` can tell it was lapsed when it was parked.
    pub fn suspend(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        self.park(card_ids, Queue::Suspended)
    }

    pub fn bury(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        self.park(card_ids, Queue::Buried)
    }

    fn park(&mut self, card_ids: &[CardId], queue: Queue) -> Result<(), Error> {
        for &id in card_ids {
            let mut card = self.store.get_card(id)?;
            card.queue = queue;
            self.store.update_card(card)?;
        }
        Ok(())
    }

    pub fn unsuspend(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        let now = self.now_secs();
        for &id in card_ids {
            let mut card = self.store.get_card(id)?;
            unpark(&mut card, now);
            self.store.update_card(card)?;
        }
        Ok(())
    }

    pub fn unbury(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        self.unsuspend(card_ids)
    }

    /// Releases every buried card, called once per session close (buried
    /// cards are meant to reappear the next time the caller studies).
    pub fn unbury_all(&mut self) -> Result<(), Error> {
        let now = self.now_secs();
        let ids: Vec<CardId> = self
            .store
            .all_cards()?
            .into_iter()
            .filter(|c| c.queue == Queue::Buried)
            .map(|c| c.id)
            .collect();
        for id in ids {
            let mut card = self.store.get_card(id)?;
            unpark(&mut card, now);
            self.store.update_card(card)?;
        }
        Ok(())
    }

    /// Forces a lapsed card straight back into the review queue, skipping
    /// any remaining relearn steps. A no-op for a card that isn't mid-lapse.
    pub fn restore_failed(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        for &id in card_ids {
            let mut card = self.store.get_card(id)?;
            if card.card_type == CardType::Review && card.edue != 0 {
                card.queue = Queue::Review;
                card.due = card.edue;
                card.edue = 0;
                card.step = 0;
                card.cycles = 0;
                self.store.update_card(card)?;
            }
        }
        Ok(())
    }

    /// Resets cards to the fresh new-card state, placed at the end of the
    /// new queue.
    pub fn forget(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        for &id in card_ids {
            let mut card = self.store.get_card(id)?;
            let position = self.next_new_position();
            card.card_type = CardType::New;
            card.queue = Queue::New;
            card.due = position;
            card.edue = 0;
            card.ivl = 0;
            card.factor = 0;
            card.reps = 0;
            card.lapses = 0;
            card.streak = 0;
            card.step = 0;
            card.cycles = 0;
            self.store.update_card(card)?;
        }
        Ok(())
    }

    /// Force-reschedules review cards to a random interval in
    /// `[min_days, max_days]`, as if they'd just graduated with that
    /// interval. Does nothing to a card that isn't in the review state.
    pub fn reschedule(&mut self, card_ids: &[CardId], min_days: i64, max_days: i64) -> Result<(), Error> {
        let today = self.today();
        let lo = min_days.max(1);
        let hi = max_days.max(lo);
        for &id in card_ids {
            let mut card = self.store.get_card(id)?;
            if card.card_type == CardType::Review {
                card.card_type = CardType::Review;
                card.queue = Queue::Review;
                card.ivl = self.rng.gen_range(lo..=hi).max(1);
                card.due = today + card.ivl;
                self.store.update_card(card)?;
            }
        }
        Ok(())
    }

    /// Reassigns new-card due positions by id order (the order cards were
    /// added), matching `NewOrder::Added`.
    pub fn sort_new_by_creation(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        let mut ids = card_ids.to_vec();
        ids.sort_unstable();
        for id in ids {
            let mut card = self.store.get_card(id)?;
            if card.queue == Queue::New {
                card.due = self.next_new_position();
                self.store.update_card(card)?;
            }
        }
        Ok(())
    }

    /// Reassigns new-card due positions randomly, matching `NewOrder::Random`.
    /// The set of due values held by `card_ids` is preserved, just shuffled
    /// among them, rather than drawing fresh positions.
    pub fn randomize_new(&mut self, card_ids: &[CardId]) -> Result<(), Error> {
        let mut cards = Vec::with_capacity(card_ids.len());
        for &id in card_ids {
            cards.push(self.store.get_card(id)?);
        }
        let mut dues: Vec<i64> = cards
            .iter()
            .filter(|c| c.queue == Queue::New)
            .map(|c| c.due)
            .collect();
        dues.shuffle(&mut self.rng);
        let mut dues = dues.into_iter();
        for mut card in cards {
            if card.queue == Queue::New {
                card.due = dues.next().expect("same count as filtered above");
                self.store.update_card(card)?;
            }
        }
        Ok(())
    }

    /// Assigns contiguous new-card due positions `start, start+1, …` to
    /// `card_ids` in the order given. If `shift`, every other new card
    /// whose due would now collide is pushed past the assigned block.
    #[allow(clippy::cast_possible_wrap)]
    pub fn sort(&mut self, card_ids: &[CardId], start: i64, shift: bool) -> Result<(), Error> {
        let end = start + card_ids.len() as i64;
        for (offset, &id) in card_ids.iter().enumerate() {
            let mut card = self.store.get_card(id)?;
            card.due = start + offset as i64;
            self.store.update_card(card)?;
        }
        if shift {
            let moved: std::collections::HashSet<CardId> = card_ids.iter().copied().collect();
            let mut collisions: Vec<Card> = self
                .store
                .all_cards()?
                .into_iter()
                .filter(|c| {
                    c.queue == Queue::New && !moved.contains(&c.id) && c.due >= start && c.due < end
                })
                .collect();
            collisions.sort_unstable_by_key(|c| c.due);
            for (offset, mut card) in collisions.into_iter().enumerate() {
                card.due = end + offset as i64;
                self.store.update_card(card)?;
            }
        }
        Ok(())
    }
}

/// Reverses `suspend`/`bury`: a new card comes back as new, a
/// still-learning card is made immediately due, and a lapsed review card
/// restores its saved due (clearing `edue`); an un-lapsed review card's
/// due is left untouched.
fn unpark(card: &mut Card, now: i64) {
    match card.card_type {
        CardType::New => card.queue = Queue::New,
        CardType::Learning => {
            card.queue = Queue::Learning;
            card.due = now;
        }
        CardType::Review => {
            if card.edue != 0 {
                card.due = card.edue;
                card.edue = 0;
            }
            card.queue = Queue::Review;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, Configuration};
    use crate::model::{Card, Group};
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn scheduler() -> Scheduler<InMemoryStore> {
        let mut store = InMemoryStore::new(ConfigResolver::new(Configuration::default()));
        store.insert_group(Group {
            id: 1,
            name: "default".to_string(),
        });
        Scheduler::new(store, Utc::now(), vec![1])
    }

    #[test]
    fn suspend_then_unsuspend_round_trips_a_lapsed_review_card() {
        let mut sched = scheduler();
        let mut card = Card::new_new(1, 1, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Learning;
        card.ivl = 3;
        card.edue = 500;
        sched.store_mut().insert_card(card);

        sched.suspend(&[1]).unwrap();
        let parked = sched.store().get_card(1).unwrap();
        assert_eq!(parked.queue, Queue::Suspended);
        assert_eq!(parked.edue, 500);

        sched.unsuspend(&[1]).unwrap();
        let restored = sched.store().get_card(1).unwrap();
        assert_eq!(restored.queue, Queue::Review);
        assert_eq!(restored.due, 500);
        assert_eq!(restored.edue, 0);
    }

    #[test]
    fn suspend_then_unsuspend_leaves_an_un_lapsed_review_card_due_untouched() {
        let mut sched = scheduler();
        let mut card = Card::new_new(2, 2, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 10;
        card.due = 42;
        sched.store_mut().insert_card(card);

        sched.suspend(&[2]).unwrap();
        sched.unsuspend(&[2]).unwrap();
        let restored = sched.store().get_card(2).unwrap();
        assert_eq!(restored.due, 42);
        assert_eq!(restored.queue, Queue::Review);
    }

    #[test]
    fn forget_resets_a_review_card_to_new() {
        let mut sched = scheduler();
        let mut card = Card::new_new(3, 3, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 80;
        card.factor = 2600;
        card.reps = 12;
        card.lapses = 3;
        sched.store_mut().insert_card(card);

        sched.forget(&[3]).unwrap();
        let reset = sched.store().get_card(3).unwrap();
        assert_eq!(reset.card_type, CardType::New);
        assert_eq!(reset.queue, Queue::New);
        assert_eq!(reset.ivl, 0);
        assert_eq!(reset.reps, 0, "a forgotten card must not carry its old lapse count into a fresh leech check");
        assert_eq!(reset.lapses, 0);
    }

    #[test]
    fn reschedule_picks_an_interval_in_range_and_moves_to_review() {
        let mut sched = scheduler();
        let mut card = Card::new_new(6, 6, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        sched.store_mut().insert_card(card);

        sched.reschedule(&[6], 5, 5).unwrap();
        let rescheduled = sched.store().get_card(6).unwrap();
        assert_eq!(rescheduled.ivl, 5);
        assert_eq!(rescheduled.due, sched.today() + 5);
    }

    #[test]
    fn sort_assigns_contiguous_positions_and_shifts_out_collisions() {
        let mut sched = scheduler();
        sched.store_mut().insert_card(Card::new_new(7, 7, 1, 0, 100));
        sched.store_mut().insert_card(Card::new_new(8, 8, 1, 1, 101));

        sched.sort(&[7], 100, true).unwrap();
        let sorted = sched.store().get_card(7).unwrap();
        assert_eq!(sorted.due, 100);
        let shifted = sched.store().get_card(8).unwrap();
        assert_eq!(shifted.due, 101, "card 8 didn't collide with the single-card block, so stays put");

        sched.sort(&[7, 8], 50, true).unwrap();
        assert_eq!(sched.store().get_card(7).unwrap().due, 50);
        assert_eq!(sched.store().get_card(8).unwrap().due, 51);
    }

    #[test]
    fn randomize_new_preserves_the_due_set() {
        let mut sched = scheduler();
        sched.store_mut().insert_card(Card::new_new(9, 9, 1, 0, 10));
        sched.store_mut().insert_card(Card::new_new(11, 11, 1, 1, 20));
        sched.store_mut().insert_card(Card::new_new(12, 12, 1, 2, 30));

        sched.randomize_new(&[9, 11, 12]).unwrap();
        let mut dues: Vec<i64> = [9, 11, 12]
            .iter()
            .map(|&id| sched.store().get_card(id).unwrap().due)
            .collect();
        dues.sort_unstable();
        assert_eq!(dues, vec![10, 20, 30]);
    }
}
