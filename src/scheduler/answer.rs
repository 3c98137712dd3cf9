//! The answer processor: the state-machine transition a single `(card,
//! grade)` pair drives. Grounded in the teacher's `schedulers::sm2::answer`
//! module, generalized from its 3-button ease scale to the 4-grade
//! (Again/Hard/Good/Easy) scale this crate's configuration exposes.

use super::leech;
use super::{interval, Scheduler};
use crate::config::Configuration;
use crate::model::{
    Card, CardType, Grade, Queue, RevLogType, RevisionLog, DEFAULT_FACTOR,
};
use crate::store::Store;
use crate::{Error, LibraryError, SchedulerErrorKind};
use rand::RngCore;
use std::cmp;

/// Outcome of one learning/relearn/review step, prior to logging: the value
/// to record as `new_interval` on the revlog row, its log type, and whether
/// this answer just made the card a leech.
struct StepOutcome {
    new_interval: i64,
    log_type: RevLogType,
    became_leech: bool,
}

impl<S: Store> Scheduler<S> {
    pub(super) fn rng_opt(&mut self) -> Option<&mut dyn RngCore> {
        if self.fuzz_enabled {
            Some(&mut self.rng)
        } else {
            None
        }
    }

    /// Records the learner's answer, mutates `card` to its next scheduling
    /// state, appends a revlog row, and updates today's counters. Returns
    /// the updated card.
    pub fn answer_card(&mut self, card: Card, grade_value: u32) -> Result<Card, Error> {
        if card.queue == Queue::Crammed {
            return super::cram::answer_cram(self, card, grade_value);
        }

        let grade = Grade::from_u32(grade_value).ok_or({
            Error::Library(LibraryError::Scheduler(SchedulerErrorKind::InvalidGrade(
                grade_value,
            )))
        })?;

        let mut card = card;
        let now = self.now_secs();
        let today = self.today();
        let config = self.resolve_config(card.group_id);

        let taken_ms = Self::taken_ms(&card, now);
        let prior_idx = card.count_idx();
        let old_queue = card.queue;
        let old_step = card.step;
        let old_ivl = card.ivl;
        let old_card_type = card.card_type;

        card.reps += 1;

        let outcome = match (card.card_type, card.queue) {
            (CardType::New, Queue::New) | (CardType::Learning, Queue::Learning) => {
                self.handle_learning_step(&mut card, grade, &config, now, today)?
            }
            (CardType::Review, Queue::Learning) => {
                self.handle_relearn_step(&mut card, grade, &config, now, today)
            }
            (CardType::Review, Queue::Review) => {
                self.handle_review_pass(&mut card, grade, &config, now, today)?
            }
            _ => {
                return Err(Error::Library(LibraryError::Scheduler(
                    SchedulerErrorKind::InvalidGrade(grade_value),
                )))
            }
        };

        let last_interval =
            Self::encode_previous(old_card_type, old_queue, old_step, old_ivl, &config);

        self.store.append_revlog(RevisionLog {
            card_id: card.id,
            time_ms: now * 1000,
            grade: grade_value,
            new_interval: outcome.new_interval,
            last_interval,
            new_factor: card.factor,
            taken_ms,
            log_type: outcome.log_type,
        })?;

        let mut counters = self.store.daily_counters(today);
        match prior_idx {
            Some(0) => counters.new_done += 1,
            Some(1) => counters.learn_done += 1,
            Some(2) => counters.review_done += 1,
            _ => {}
        }
        counters.time_today_ms += taken_ms;
        self.store.set_daily_counters(today, counters)?;

        if outcome.became_leech {
            log::info!("card {} became a leech at {} lapses", card.id, card.lapses);
            match config.lapse.leech_action {
                crate::config::LeechAction::Suspend => {
                    card.queue = Queue::Suspended;
                }
                crate::config::LeechAction::TagOnly => {}
            }
            for hook in &mut self.hooks.leech {
                hook(&card);
            }
        }

        self.store.update_card(card.clone())?;
        Ok(card)
    }

    /// Side-effect-free preview of what `answer_card(card, grade)` would
    /// record as `new_interval`: seconds (negative) for a learning-style
    /// step, days (positive) once graduated. Runs the same state-machine
    /// branch against a clone of `card` with fuzz forced off, touches
    /// nothing in the store, and persists no revlog row.
    pub fn next_interval(&mut self, card: &Card, grade_value: u32) -> Result<i64, Error> {
        let grade = Grade::from_u32(grade_value).ok_or({
            Error::Library(LibraryError::Scheduler(SchedulerErrorKind::InvalidGrade(
                grade_value,
            )))
        })?;
        let config = self.resolve_config(card.group_id);
        let now = self.now_secs();
        let today = self.today();
        let mut preview = card.clone();
        let was_fuzz_enabled = self.fuzz_enabled;
        self.fuzz_enabled = false;

        let outcome = match (preview.card_type, preview.queue) {
            (CardType::New, Queue::New) | (CardType::Learning, Queue::Learning) => {
                self.handle_learning_step(&mut preview, grade, &config, now, today)
            }
            (CardType::Review, Queue::Learning) => {
                Ok(self.handle_relearn_step(&mut preview, grade, &config, now, today))
            }
            (CardType::Review, Queue::Review) => {
                self.handle_review_pass(&mut preview, grade, &config, now, today)
            }
            _ => Err(Error::Library(LibraryError::Scheduler(
                SchedulerErrorKind::InvalidGrade(grade_value),
            ))),
        };
        self.fuzz_enabled = was_fuzz_enabled;
        outcome.map(|o| o.new_interval)
    }

    fn taken_ms(card: &Card, now: i64) -> i64 {
        let elapsed = (now as f64 - card.timer_started).max(0.0);
        (elapsed.min(60.0) * 1000.0) as i64
    }

    /// The new card / still-learning step sub-machine (component F, the
    /// `new` learning steps). `cycles` counts every answer in this episode,
    /// pass or fail; `step` is the position reached in `new.delays`.
    fn handle_learning_step(
        &mut self,
        card: &mut Card,
        grade: Grade,
        config: &Configuration,
        now: i64,
        today: i64,
    ) -> Result<StepOutcome, Error> {
        let delays = &config.new.delays;
        Ok(match grade {
            Grade::Again => {
                card.step = 0;
                card.cycles += 1;
                let offset = interval::fuzzed_step_seconds(delays[0], self.rng_opt());
                card.card_type = CardType::Learning;
                card.queue = Queue::Learning;
                card.due = now + offset;
                StepOutcome {
                    new_interval: -offset,
                    log_type: RevLogType::Learn,
                    became_leech: false,
                }
            }
            Grade::Hard => {
                card.cycles += 1;
                let idx = (card.step as usize).min(delays.len() - 1);
                let offset = interval::fuzzed_step_seconds(delays[idx], self.rng_opt());
                card.card_type = CardType::Learning;
                card.queue = Queue::Learning;
                card.due = now + offset;
                StepOutcome {
                    new_interval: -offset,
                    log_type: RevLogType::Learn,
                    became_leech: false,
                }
            }
            Grade::Good => {
                card.cycles += 1;
                card.step += 1;
                if card.step as usize >= delays.len() {
                    let ivl = self.graduation_ivl(card, config.new.ints[0], today, config)?;
                    Self::graduate_new(card, ivl, today);
                    StepOutcome {
                        new_interval: card.ivl,
                        log_type: RevLogType::Learn,
                        became_leech: false,
                    }
                } else {
                    let idx = card.step as usize;
                    let offset = interval::fuzzed_step_seconds(delays[idx], self.rng_opt());
                    card.card_type = CardType::Learning;
                    card.queue = Queue::Learning;
                    card.due = now + offset;
                    StepOutcome {
                        new_interval: -offset,
                        log_type: RevLogType::Learn,
                        became_leech: false,
                    }
                }
            }
            Grade::Easy => {
                let base_ivl = if card.cycles == 0 {
                    config.new.ints[2]
                } else {
                    config.new.ints[1]
                };
                card.cycles += 1;
                let ivl = self.graduation_ivl(card, base_ivl, today, config)?;
                Self::graduate_new(card, ivl, today);
                StepOutcome {
                    new_interval: card.ivl,
                    log_type: RevLogType::Learn,
                    became_leech: false,
                }
            }
        })
    }

    /// The graduation-time counterpart of the sibling spacing rule: the
    /// computed ivl is nudged by at most one day so the new due doesn't
    /// exactly coincide with another card of the same note already in
    /// review.
    fn graduation_ivl(
        &self,
        card: &Card,
        ideal_ivl: i64,
        today: i64,
        config: &Configuration,
    ) -> Result<i64, Error> {
        let ideal_due = today + ideal_ivl;
        let sibling_dues = self.sibling_review_dues(card)?;
        let adjusted_due = super::sibling::adjust_for_siblings(
            ideal_due,
            &sibling_dues,
            config.rev.min_space,
        );
        Ok(adjusted_due - today)
    }

    fn graduate_new(card: &mut Card, ivl: i64, today: i64) {
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.factor = DEFAULT_FACTOR;
        card.ivl = ivl;
        card.due = today + ivl;
        card.step = 0;
        card.edue = 0;
        card.streak = 0;
    }

    /// The relearn sub-machine a lapsed review card runs through
    /// (`type == Review, queue == Learning`). Reuses the same `step`/
    /// `cycles` fields the new-card machine uses, against `lapse.delays`.
    fn handle_relearn_step(
        &mut self,
        card: &mut Card,
        grade: Grade,
        config: &Configuration,
        now: i64,
        _today: i64,
    ) -> StepOutcome {
        let delays = &config.lapse.delays;
        if delays.is_empty() {
            Self::restore_from_lapse(card);
            return StepOutcome {
                new_interval: card.ivl,
                log_type: RevLogType::Relearn,
                became_leech: false,
            };
        }
        match grade {
            Grade::Again => {
                card.step = 0;
                card.cycles += 1;
                let offset = interval::fuzzed_step_seconds(delays[0], self.rng_opt());
                card.due = now + offset;
                StepOutcome {
                    new_interval: -offset,
                    log_type: RevLogType::Relearn,
                    became_leech: false,
                }
            }
            Grade::Hard => {
                card.cycles += 1;
                let idx = (card.step as usize).min(delays.len() - 1);
                let offset = interval::fuzzed_step_seconds(delays[idx], self.rng_opt());
                card.due = now + offset;
                StepOutcome {
                    new_interval: -offset,
                    log_type: RevLogType::Relearn,
                    became_leech: false,
                }
            }
            Grade::Good => {
                card.cycles += 1;
                card.step += 1;
                if card.step as usize >= delays.len() {
                    Self::restore_from_lapse(card);
                    StepOutcome {
                        new_interval: card.ivl,
                        log_type: RevLogType::Relearn,
                        became_leech: false,
                    }
                } else {
                    let idx = card.step as usize;
                    let offset = interval::fuzzed_step_seconds(delays[idx], self.rng_opt());
                    card.due = now + offset;
                    StepOutcome {
                        new_interval: -offset,
                        log_type: RevLogType::Relearn,
                        became_leech: false,
                    }
                }
            }
            Grade::Easy => {
                Self::restore_from_lapse(card);
                StepOutcome {
                    new_interval: card.ivl,
                    log_type: RevLogType::Relearn,
                    became_leech: false,
                }
            }
        }
    }

    /// Ends a relearn episode: `edue` (the due saved at lapse time) becomes
    /// the live due again, and is cleared so it stops meaning anything.
    fn restore_from_lapse(card: &mut Card) {
        card.queue = Queue::Review;
        card.due = card.edue;
        card.edue = 0;
        card.step = 0;
    }

    /// The plain review-queue answer (component F's "review pass"
    /// handler): AGAIN triggers a lapse, the other three grades apply the
    /// SM-2-style interval/ease update.
    fn handle_review_pass(
        &mut self,
        card: &mut Card,
        grade: Grade,
        config: &Configuration,
        now: i64,
        today: i64,
    ) -> Result<StepOutcome, Error> {
        Ok(if grade == Grade::Again {
            card.lapses += 1;
            card.streak = 0;
            let new_ivl = interval::lapse_interval(card.ivl, config.lapse.mult, config.lapse.min_int);
            card.ivl = new_ivl;
            card.factor = interval::clamp_factor(card.factor - 200);
            let new_due = today + new_ivl;
            let became_leech = leech::is_leech(card.lapses, config.lapse.leech_threshold);

            if config.lapse.relearn && !config.lapse.delays.is_empty() {
                card.edue = new_due;
                card.queue = Queue::Learning;
                card.step = 0;
                card.cycles = 0;
                let offset = interval::fuzzed_step_seconds(config.lapse.delays[0], self.rng_opt());
                card.due = now + offset;
                StepOutcome {
                    new_interval: -offset,
                    log_type: RevLogType::Review,
                    became_leech,
                }
            } else {
                card.due = new_due;
                card.edue = 0;
                StepOutcome {
                    new_interval: new_ivl,
                    log_type: RevLogType::Review,
                    became_leech,
                }
            }
        } else {
            let delay_days = cmp::max(0, today - card.due);
            let outcome = interval::review_pass_outcome(card.ivl, card.factor, delay_days, grade, &config.rev);
            let factor = interval::clamp_factor(outcome.factor);
            let ivl = interval::fuzzed_interval(outcome.ivl, config.rev.fuzz, self.rng_opt());
            card.factor = factor;
            card.ivl = ivl;
            card.streak += 1;
            let ideal_due = today + ivl;
            let sibling_dues = self.sibling_review_dues(card)?;
            card.due = super::sibling::adjust_for_siblings(ideal_due, &sibling_dues, config.rev.min_space);
            StepOutcome {
                new_interval: ivl,
                log_type: RevLogType::Review,
                became_leech: false,
            }
        })
    }

    /// What `last_interval` should read for the state the card was in
    /// *before* this answer, using the documented sign convention: negative
    /// seconds while in a learning-style queue, positive days once in the
    /// review queue.
    fn encode_previous(
        old_card_type: CardType,
        old_queue: Queue,
        old_step: u32,
        old_ivl: i64,
        config: &Configuration,
    ) -> i64 {
        match old_queue {
            Queue::Learning => {
                let delays = if old_card_type == CardType::Review {
                    &config.lapse.delays
                } else {
                    &config.new.delays
                };
                if delays.is_empty() {
                    0
                } else {
                    let idx = (old_step as usize).min(delays.len() - 1);
                    -((delays[idx] * 60.0).round() as i64)
                }
            }
            Queue::Review => old_ivl,
            Queue::New | Queue::Suspended | Queue::Buried | Queue::Crammed => 0,
        }
    }
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
    fn new_card_graduates_after_three_goods_matching_scenario_1() {
        let mut sched = scheduler();
        sched.store_mut().config.default.new.delays = vec![0.5, 3.0, 10.0];
        sched.store_mut().insert_card(Card::new_new(1, 1, 1, 0, 0));
        let mut card = sched.store().get_card(1).unwrap();

        card = sched.answer_card(card, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.step, 1);
        assert_eq!(card.cycles, 1);
        assert_eq!(card.queue, Queue::Learning);

        card = sched.answer_card(card, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.cycles, 2);
        assert_eq!(card.queue, Queue::Learning);

        card = sched.answer_card(card, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.queue, Queue::Review);
        assert_eq!(card.card_type, CardType::Review);
        assert_eq!(card.ivl, 1);
    }

    #[test]
    fn easy_on_first_sight_applies_bonus_interval() {
        let mut sched = scheduler();
        sched.store_mut().insert_card(Card::new_new(2, 2, 1, 0, 0));
        let card = sched.store().get_card(2).unwrap();
        let card = sched.answer_card(card, Grade::Easy.as_u32()).unwrap();
        assert_eq!(card.ivl, 7);
        assert_eq!(card.queue, Queue::Review);
    }

    #[test]
    fn lapse_enters_relearn_and_restores_saved_due() {
        let mut sched = scheduler();
        let mut card = Card::new_new(3, 3, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 100;
        card.factor = 2500;
        card.due = sched.today();
        sched.store_mut().insert_card(card.clone());

        let card = sched.answer_card(card, Grade::Again.as_u32()).unwrap();
        assert_eq!(card.queue, Queue::Learning);
        assert_eq!(card.card_type, CardType::Review);
        assert_eq!(card.ivl, 1);
        assert_eq!(card.lapses, 1);
        assert!(card.edue > 0);

        let today = sched.today();
        let card = sched.answer_card(card, Grade::Good.as_u32()).unwrap();
        assert_eq!(card.queue, Queue::Review);
        assert_eq!(card.due, today + 1);
        assert_eq!(card.edue, 0);
    }

    #[test]
    fn four_siblings_graduating_good_space_apart_matching_scenario_7() {
        let mut sched = scheduler();
        sched.store_mut().config.default.new.delays = vec![1.0];
        sched.store_mut().config.default.new.ints = [7, 4, 7];
        for ord in 0_u32..4 {
            sched
                .store_mut()
                .insert_card(Card::new_new(10 + i64::from(ord), 100, 1, ord, 0));
        }

        let mut ivls = Vec::new();
        for id in 10..14 {
            let card = sched.store().get_card(id).unwrap();
            let card = sched.answer_card(card, Grade::Good.as_u32()).unwrap();
            ivls.push(card.ivl);
        }
        assert_eq!(ivls, vec![7, 6, 8, 7]);
    }

    #[test]
    fn next_interval_previews_without_mutating_or_persisting() {
        let mut sched = scheduler();
        let mut card = Card::new_new(5, 5, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 100;
        card.factor = 2500;
        card.due = sched.today();
        sched.store_mut().insert_card(card.clone());

        let previewed = sched.next_interval(&card, Grade::Good.as_u32()).unwrap();
        assert_eq!(previewed, 250);

        let untouched = sched.store().get_card(5).unwrap();
        assert_eq!(untouched.ivl, 100);
        assert!(sched.store().revlog_for_card(5).unwrap().is_empty());
    }

    #[test]
    fn lapse_flags_leech_at_threshold() {
        let mut sched = scheduler();
        let mut card = Card::new_new(4, 4, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Review;
        card.ivl = 100;
        card.factor = 2500;
        card.lapses = 15;
        card.due = sched.today();
        sched.store_mut().insert_card(card.clone());

        let card = sched.answer_card(card, Grade::Again.as_u32()).unwrap();
        assert_eq!(card.lapses, 16);
        assert_eq!(card.queue, Queue::Suspended);
    }
}
