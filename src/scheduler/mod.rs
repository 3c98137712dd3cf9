//! The scheduler: ties the clock, configuration resolver, and store
//! together into the queue-build/select/answer pipeline described by the
//! component table. Grounded in the teacher's `schedulers::SrsScheduler`
//! trait (here collapsed to one concrete algorithm, since this crate has
//! exactly one scheduling policy rather than a pluggable registry) and its
//! `api::review` orchestration (`get_review_card`, `rate_card`).

mod answer;
mod bulk;
mod cram;
pub mod interval;
mod leech;
mod sibling;
mod stats;

use crate::clock::{Clock, DEFAULT_ROLLOVER_HOUR};
use crate::model::{Card, CardId, GroupId, NoteId, Queue};
use crate::store::Store;
use crate::Error;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;

/// Minutes within which a trailing learning card is shown immediately
/// rather than reporting the session as finished.
pub const COLLAPSE_WINDOW_MINUTES: i64 = 20;

pub type LeechHook = Box<dyn FnMut(&Card)>;
pub type ResetHook = Box<dyn FnMut()>;

/// `(new, learn, review)` counts for a group or group set.
pub type QueueCounts = (u32, u32, u32);

#[derive(Default)]
pub struct Hooks {
    pub leech: Vec<LeechHook>,
    pub reset: Vec<ResetHook>,
}

pub struct Scheduler<S: Store> {
    pub(crate) store: S,
    pub(crate) clock: Clock,
    pub(crate) selected_groups: Vec<GroupId>,

    pub(crate) new_queue: VecDeque<CardId>,
    pub(crate) learning_queue: VecDeque<CardId>,
    pub(crate) review_queue: VecDeque<CardId>,

    pub(crate) new_count: u32,
    pub(crate) learn_count: u32,
    pub(crate) review_count: u32,

    last_seen_now: i64,
    last_shown_note: Option<NoteId>,
    pick_counter: u32,
    next_new_position: i64,

    pub(crate) rng: StdRng,
    pub(crate) fuzz_enabled: bool,

    pub hooks: Hooks,
}

impl<S: Store> Scheduler<S> {
    pub fn new(store: S, created_at: chrono::DateTime<Utc>, selected_groups: Vec<GroupId>) -> Self {
        Scheduler {
            store,
            clock: Clock::new(created_at, DEFAULT_ROLLOVER_HOUR),
            selected_groups,
            new_queue: VecDeque::new(),
            learning_queue: VecDeque::new(),
            review_queue: VecDeque::new(),
            new_count: 0,
            learn_count: 0,
            review_count: 0,
            last_seen_now: 0,
            last_shown_note: None,
            pick_counter: 0,
            next_new_position: 0,
            rng: StdRng::from_entropy(),
            fuzz_enabled: true,
            hooks: Hooks::default(),
        }
    }

    /// Disables fuzz and seeds the rng deterministically, for tests.
    #[must_use]
    pub fn with_deterministic_rng(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn disable_fuzz(&mut self) {
        self.fuzz_enabled = false;
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Clock reading guarded against going backwards within a session (see
    /// the error-handling design's clock note): intervals computed from it
    /// stay monotonic even if the wall clock jumps back.
    pub(crate) fn now_secs(&mut self) -> i64 {
        let observed = Utc::now().timestamp();
        let now = observed.max(self.last_seen_now);
        self.last_seen_now = now;
        now
    }

    pub(crate) fn today(&self) -> i64 {
        self.clock.today()
    }

    fn resolve_config(&self, group_id: GroupId) -> crate::config::Configuration {
        self.store.resolve_config(group_id)
    }

    /// Rebuilds the three live queues and their counters from the store.
    /// Fires the `reset` observer hook on completion.
    pub fn reset(&mut self) -> Result<(), Error> {
        let today = self.today();
        let counters = self.store.daily_counters(today);
        let cards = self.store.cards_in_groups(&self.selected_groups)?;

        let mut new_cards: Vec<Card> = cards
            .iter()
            .filter(|c| c.queue == Queue::New)
            .cloned()
            .collect();
        new_cards.sort_by_key(|c| c.due);
        let new_cap = self
            .selected_groups
            .first()
            .map_or(u32::MAX, |g| self.resolve_config(*g).new.per_day)
            .saturating_sub(counters.new_done);
        let new_cards = dedupe_siblings(new_cards);
        let new_cards: Vec<Card> = new_cards.into_iter().take(new_cap as usize).collect();

        let mut learning_cards: Vec<Card> = cards
            .iter()
            .filter(|c| c.queue == Queue::Learning)
            .cloned()
            .collect();
        learning_cards.sort_by_key(|c| c.due);

        let mut review_cards: Vec<Card> = cards
            .iter()
            .filter(|c| c.queue == Queue::Review && c.due <= today)
            .cloned()
            .collect();
        review_cards.sort_by_key(|c| c.due);
        let rev_cap = self
            .selected_groups
            .first()
            .map_or(u32::MAX, |g| self.resolve_config(*g).rev.per_day)
            .saturating_sub(counters.review_done);
        let review_cards: Vec<Card> = review_cards.into_iter().take(rev_cap as usize).collect();

        self.new_queue = new_cards.iter().map(|c| c.id).collect();
        self.learning_queue = learning_cards.iter().map(|c| c.id).collect();
        self.review_queue = review_cards.iter().map(|c| c.id).collect();

        self.new_count = self.new_queue.len() as u32;
        self.learn_count = self.learning_queue.len() as u32;
        self.review_count = self.review_queue.len() as u32;
        self.last_shown_note = None;

        log::info!(
            "reset queues for groups {:?}: {} new, {} learning, {} review",
            self.selected_groups,
            self.new_count,
            self.learn_count,
            self.review_count
        );

        for hook in &mut self.hooks.reset {
            hook();
        }
        Ok(())
    }

    /// Live counters for the currently selected groups: `(new, learn, review)`.
    pub fn counts(&self) -> (u32, u32, u32) {
        (self.new_count, self.learn_count, self.review_count)
    }

    /// Counts across every group in the store, ignoring the current
    /// selection, without mutating the live queues.
    pub fn all_counts(&self) -> Result<(u32, u32, u32), Error> {
        let groups: Vec<GroupId> = self.store.groups()?.into_iter().map(|g| g.id).collect();
        self.counts_for(&groups)
    }

    /// Counts for the currently selected groups, without rebuilding the
    /// live queues (unlike `reset`, this does not apply daily caps).
    pub fn sel_counts(&self) -> Result<(u32, u32, u32), Error> {
        self.counts_for(&self.selected_groups)
    }

    fn counts_for(&self, groups: &[GroupId]) -> Result<QueueCounts, Error> {
        let today = self.today();
        let cards = self.store.cards_in_groups(groups)?;
        let mut new = 0;
        let mut learn = 0;
        let mut review = 0;
        for card in cards {
            match card.queue {
                Queue::New => new += 1,
                Queue::Learning => learn += 1,
                Queue::Review if card.due <= today => review += 1,
                _ => {}
            }
        }
        Ok((new, learn, review))
    }

    /// Which counter (0/1/2) a card belongs to, independent of whether it
    /// is actually present in the in-memory queues.
    pub fn count_idx(&self, card: &Card) -> Option<usize> {
        card.count_idx()
    }

    /// Next card to review, or `None` if the session has nothing left.
    /// Priority: due learning cards, then an interleaving of new/review,
    /// then a collapse of soon-due learning cards, then nothing. Never
    /// returns two siblings in a row unless only siblings remain.
    pub fn get_card(&mut self) -> Result<Option<Card>, Error> {
        let now = self.now_secs();

        if let Some(id) = self.peek_due_learning(now)? {
            return self.take_from_learning(id);
        }

        if let Some(card) = self.pick_new_or_review()? {
            return Ok(Some(card));
        }

        if let Some(id) = self.peek_collapsible_learning(now)? {
            return self.take_from_learning(id);
        }

        Ok(None)
    }

    fn peek_due_learning(&self, now: i64) -> Result<Option<CardId>, Error> {
        for &id in &self.learning_queue {
            let card = self.store.get_card(id)?;
            if card.due <= now {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    fn peek_collapsible_learning(&self, now: i64) -> Result<Option<CardId>, Error> {
        let window = now + COLLAPSE_WINDOW_MINUTES * 60;
        let mut best: Option<(i64, CardId)> = None;
        for &id in &self.learning_queue {
            let card = self.store.get_card(id)?;
            if card.due <= window && best.is_none_or(|(due, _)| card.due < due) {
                best = Some((card.due, id));
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    fn take_from_learning(&mut self, id: CardId) -> Result<Option<Card>, Error> {
        self.learning_queue.retain(|&x| x != id);
        let card = self.store.get_card(id)?;
        self.last_shown_note = Some(card.note_id);
        self.start_timer(card)
    }

    fn pick_new_or_review(&mut self) -> Result<Option<Card>, Error> {
        if self.new_queue.is_empty() && self.review_queue.is_empty() {
            return Ok(None);
        }
        self.pick_counter = self.pick_counter.wrapping_add(1);
        // Roughly proportional to remaining counts, biased toward review:
        // every fourth pick favors new when both queues have cards.
        let prefer_new = self.pick_counter % 4 == 0;
        let from_new = if self.new_queue.is_empty() {
            false
        } else if self.review_queue.is_empty() {
            true
        } else {
            prefer_new
        };

        let id = if from_new {
            self.pop_non_sibling(true)
        } else {
            self.pop_non_sibling(false)
        };
        let Some(id) = id else { return Ok(None) };
        if from_new {
            self.new_count = self.new_count.saturating_sub(1);
        } else {
            self.review_count = self.review_count.saturating_sub(1);
        }
        let card = self.store.get_card(id)?;
        self.last_shown_note = Some(card.note_id);
        self.start_timer(card)
    }

    fn pop_non_sibling(&mut self, from_new: bool) -> Option<CardId> {
        let queue = if from_new {
            &mut self.new_queue
        } else {
            &mut self.review_queue
        };
        if queue.is_empty() {
            return None;
        }
        let last = self.last_shown_note;
        // Find the first entry that isn't a sibling of the last shown card;
        // fall back to the front if everything left is a sibling.
        let ids: Vec<CardId> = queue.iter().copied().collect();
        let mut chosen = ids.first().copied();
        for &id in &ids {
            let Ok(card) = self.store.get_card(id) else {
                continue;
            };
            if last != Some(card.note_id) {
                chosen = Some(id);
                break;
            }
        }
        if let Some(id) = chosen {
            queue.retain(|&x| x != id);
        }
        chosen
    }

    fn start_timer(&mut self, mut card: Card) -> Result<Option<Card>, Error> {
        let now = self.now_secs();
        card.timer_started = now as f64;
        self.store.update_card(card.clone())?;
        Ok(Some(card))
    }

    /// Seconds of review time logged so far today.
    pub fn time_today(&self) -> i64 {
        self.store.daily_counters(self.today()).time_today_ms / 1000
    }

    /// Total answers logged so far today, across all three queues.
    pub fn reps_today(&self) -> u32 {
        let c = self.store.daily_counters(self.today());
        c.new_done + c.review_done + c.learn_done
    }

    /// Clears buried state and any transient session flags. Should be
    /// called once per day when the caller's session ends.
    pub fn on_close(&mut self) -> Result<(), Error> {
        cram::revert_all_cramming(self)?;
        self.unbury_all()?;
        Ok(())
    }

    /// A human-readable summary of what remains, for when `get_card`
    /// returns nothing.
    pub fn finished_msg(&self) -> String {
        if self.learn_count > 0 {
            format!(
                "No cards due right now. {} learning card(s) will be ready again soon.",
                self.learn_count
            )
        } else {
            "Congratulations! You have finished this deck for now.".to_string()
        }
    }

    pub(crate) fn next_new_position(&mut self) -> i64 {
        self.next_new_position += 1;
        self.next_new_position
    }
}

/// Groups new cards by note so siblings don't appear back-to-back, then
/// flattens the groups round-robin while preserving each group's internal
/// (due-sorted) order. Grounded in the teacher's `GroupByInsertion` helper.
fn dedupe_siblings(cards: Vec<Card>) -> Vec<Card> {
    use crate::helpers::GroupByInsertion;
    let grouped: Vec<(NoteId, Vec<Card>)> = cards
        .into_iter()
        .map(|c| (c.note_id, c))
        .into_group_by_insertion();
    let mut queues: Vec<VecDeque<Card>> = grouped.into_iter().map(|(_, v)| v.into()).collect();
    let mut out = Vec::new();
    loop {
        let mut progressed = false;
        for q in &mut queues {
            if let Some(c) = q.pop_front() {
                out.push(c);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    out
}
