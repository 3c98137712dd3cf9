//! Cram mode (component J): a session-scoped overlay queue for drilling
//! review cards without touching their real schedule, unless the caller's
//! configuration asks for rescheduling on exit. Grounded in the teacher's
//! `schedulers::fsrs` filtered-deck handling, collapsed here to the
//! synchronous single-overlay version this crate's configuration supports.

use super::{interval, Scheduler};
use crate::model::{CardType, Grade, GroupId, Queue, RevLogType, RevisionLog};
use crate::store::Store;
use crate::{Error, LibraryError, SchedulerErrorKind};

impl<S: Store> Scheduler<S> {
    /// Pulls every review card in `group_ids` whose `due - today` falls in
    /// `[min_days, max_days]` into the cram queue. `edue` saves the original
    /// due so the card can come back to it; `ivl`/`factor` are left
    /// untouched, since cram's interim steps never mutate them.
    pub fn cram_groups(
        &mut self,
        group_ids: &[GroupId],
        min_days: i64,
        max_days: i64,
    ) -> Result<usize, Error> {
        let today = self.today();
        let cards = self.store.cards_in_groups(group_ids)?;
        let mut pulled = 0;
        for mut card in cards {
            let offset = card.due - today;
            if card.card_type == CardType::Review
                && card.queue == Queue::Review
                && offset >= min_days
                && offset <= max_days
            {
                card.edue = card.due;
                card.queue = Queue::Crammed;
                card.step = 0;
                card.cycles = 0;
                self.store.update_card(card)?;
                pulled += 1;
            }
        }
        Ok(pulled)
    }
}

/// Called by `answer_card` when the drawn card is mid-cram.
pub(super) fn answer_cram<S: Store>(
    sched: &mut Scheduler<S>,
    mut card: crate::model::Card,
    grade_value: u32,
) -> Result<crate::model::Card, Error> {
    let grade = Grade::from_u32(grade_value).ok_or({
        Error::Library(LibraryError::Scheduler(SchedulerErrorKind::InvalidGrade(
            grade_value,
        )))
    })?;
    let config = sched.store.resolve_config(card.group_id);
    let delays = &config.cram.delays;
    let now = sched.now_secs();
    let today = sched.today();

    let new_interval = if delays.is_empty() {
        exit_cram(&mut card, &config, today);
        card.ivl
    } else {
        match grade {
            Grade::Again => {
                card.step = 0;
                card.cycles += 1;
                let offset = interval::fuzzed_step_seconds(delays[0], sched.rng_opt());
                card.due = now + offset;
                -offset
            }
            Grade::Hard => {
                card.cycles += 1;
                let idx = (card.step as usize).min(delays.len() - 1);
                let offset = interval::fuzzed_step_seconds(delays[idx], sched.rng_opt());
                card.due = now + offset;
                -offset
            }
            Grade::Good => {
                card.cycles += 1;
                card.step += 1;
                if card.step as usize >= delays.len() {
                    exit_cram(&mut card, &config, today);
                    card.ivl
                } else {
                    let idx = card.step as usize;
                    let offset = interval::fuzzed_step_seconds(delays[idx], sched.rng_opt());
                    card.due = now + offset;
                    -offset
                }
            }
            Grade::Easy => {
                exit_cram(&mut card, &config, today);
                card.ivl
            }
        }
    };

    sched.store.append_revlog(RevisionLog {
        card_id: card.id,
        time_ms: now * 1000,
        grade: grade_value,
        new_interval,
        last_interval: 0,
        new_factor: card.factor,
        taken_ms: 0,
        log_type: RevLogType::Cram,
    })?;
    sched.store.update_card(card.clone())?;
    Ok(card)
}

/// Exits the cram overlay. Three policies per `cram.resched`/`cram.reset`:
/// - `resched == false`: restore the original schedule verbatim.
/// - `resched == true, reset == false`: keep the original ivl, but rebase
///   due as if the card had been reviewed today — `today + days_waited`,
///   where `days_waited = today - (original_due - original_ivl)`.
/// - `resched == true, reset == true`: treat it as a fresh review, `ivl =
///   1`, `due = today + 1`.
fn exit_cram(
    card: &mut crate::model::Card,
    config: &crate::config::Configuration,
    today: i64,
) {
    card.queue = Queue::Review;
    card.card_type = CardType::Review;
    if !config.cram.resched {
        card.due = card.edue;
    } else if config.cram.reset {
        card.ivl = 1;
        card.due = today + 1;
    } else {
        let original_due = card.edue;
        let days_waited = today - (original_due - card.ivl);
        card.due = today + days_waited;
    }
    card.edue = 0;
    card.step = 0;
    card.cycles = 0;
}

/// Called from `Scheduler::on_close`: pulls any cards still mid-cram back
/// to review using the same exit policy a graduation would use.
pub(super) fn revert_all_cramming<S: Store>(sched: &mut Scheduler<S>) -> Result<(), Error> {
    let today = sched.today();
    let ids: Vec<_> = sched
        .store
        .all_cards()?
        .into_iter()
        .filter(|c| c.queue == Queue::Crammed)
        .map(|c| c.id)
        .collect();
    for id in ids {
        let mut card = sched.store.get_card(id)?;
        let config = sched.store.resolve_config(card.group_id);
        exit_cram(&mut card, &config, today);
        sched.store.update_card(card)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DEFAULT_ROLLOVER_HOUR;
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
        let mut scheduler = Scheduler::new(store, Utc::now(), vec![1]);
        scheduler.disable_fuzz();
        let _ = DEFAULT_ROLLOVER_HOUR;
        scheduler
    }

    #[test]
    fn cram_pulls_matching_cards_and_restores_without_resched() {
        let mut sched = scheduler();
        sched.store_mut().config.default.cram.resched = false;
        sched.store_mut().config.default.cram.delays = vec![1.0];
        let today = sched.today();
        let mut card = Card::new_new(1, 1, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 100;
        card.factor = 2500;
        card.due = today + 25;
        sched.store_mut().insert_card(card);

        let pulled = sched.cram_groups(&[1], 10, 30).unwrap();
        assert_eq!(pulled, 1, "due is 25 days out, within [10, 30] even though ivl=100 is not");
        let crammed = sched.store().get_card(1).unwrap();
        assert_eq!(crammed.queue, Queue::Crammed);
        assert_eq!(crammed.edue, today + 25);

        let card = sched.answer_card(crammed, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.queue, Queue::Review);
        assert_eq!(card.due, today + 25);
        assert_eq!(card.ivl, 100);
    }

    #[test]
    fn cram_groups_filters_on_days_until_due_not_interval() {
        let mut sched = scheduler();
        let today = sched.today();
        for (id, offset) in [(10, 1), (11, 2), (12, 3)] {
            let mut card = Card::new_new(id, id, 1, 0, 0);
            card.card_type = CardType::Review;
            card.queue = Queue::Review;
            card.ivl = 100;
            card.due = today + offset;
            sched.store_mut().insert_card(card);
        }

        let pulled = sched.cram_groups(&[1], 1, 2).unwrap();
        assert_eq!(pulled, 2, "only the cards due within 1-2 days are pulled, regardless of ivl");
        assert_eq!(sched.store().get_card(10).unwrap().queue, Queue::Crammed);
        assert_eq!(sched.store().get_card(11).unwrap().queue, Queue::Crammed);
        assert_eq!(sched.store().get_card(12).unwrap().queue, Queue::Review);
    }

    #[test]
    fn cram_with_resched_but_no_reset_rebases_due_to_today_plus_days_waited() {
        let mut sched = scheduler();
        sched.store_mut().config.default.cram.resched = true;
        sched.store_mut().config.default.cram.reset = false;
        sched.store_mut().config.default.cram.delays = vec![1.0];
        let today = sched.today();
        let mut card = Card::new_new(3, 3, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 20;
        card.factor = 2500;
        card.due = today + 15;
        sched.store_mut().insert_card(card);

        sched.cram_groups(&[1], 10, 30).unwrap();
        let crammed = sched.store().get_card(3).unwrap();
        let card = sched.answer_card(crammed, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.ivl, 20, "resched without reset keeps the original interval");
        let days_waited = today - (today + 15 - 20);
        assert_eq!(card.due, today + days_waited);
    }

    #[test]
    fn cram_with_reset_treats_exit_as_a_fresh_review() {
        let mut sched = scheduler();
        sched.store_mut().config.default.cram.resched = true;
        sched.store_mut().config.default.cram.reset = true;
        sched.store_mut().config.default.cram.delays = vec![1.0];
        let today = sched.today();
        let mut card = Card::new_new(2, 2, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 20;
        card.factor = 2500;
        card.due = today + 15;
        sched.store_mut().insert_card(card);

        sched.cram_groups(&[1], 10, 30).unwrap();
        let crammed = sched.store().get_card(2).unwrap();
        let card = sched.answer_card(crammed, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.ivl, 1);
        assert_eq!(card.due, today + 1);
    }
}
