//! The scheduler's sole external collaborator. `Store` is a plain
//! synchronous trait (see the concurrency design: there is no concurrency
//! to manage in a single-user, single-process scheduler, so `async fn`
//! here would be ceremony without payoff). `InMemoryStore` is the reference
//! implementation used by the scheduler's own test suite and by examples;
//! a real deployment backs `Store` with its own persistence layer against
//! the documented card/revlog column layout.

use crate::config::{ConfigResolver, Configuration};
use crate::model::{Card, CardId, DailyCounters, DayNumber, Group, GroupId, NoteId, RevisionLog};
use crate::{Error, LibraryError, StoreErrorKind};
use std::collections::HashMap;

pub trait Store {
    fn get_card(&self, id: CardId) -> Result<Card, Error>;

    /// All cards belonging to one of `group_ids`. Callers filter by queue
    /// themselves; the store has no notion of "the live queues".
    fn cards_in_groups(&self, group_ids: &[GroupId]) -> Result<Vec<Card>, Error>;

    fn all_cards(&self) -> Result<Vec<Card>, Error>;

    /// Replaces a card in place. Must not partially apply: a failing call
    /// leaves the prior value untouched.
    fn update_card(&mut self, card: Card) -> Result<(), Error>;

    /// The ids of every card sharing `note_id`, the card's own id included.
    fn sibling_ids(&self, note_id: NoteId) -> Result<Vec<CardId>, Error>;

    fn groups(&self) -> Result<Vec<Group>, Error>;
    fn group(&self, id: GroupId) -> Result<Group, Error>;

    /// The effective configuration for a card's group: the global default,
    /// overridden per-group.
    fn resolve_config(&self, group_id: GroupId) -> Configuration;

    fn append_revlog(&mut self, row: RevisionLog) -> Result<(), Error>;
    fn revlog_for_card(&self, card_id: CardId) -> Result<Vec<RevisionLog>, Error>;

    fn daily_counters(&self, day: DayNumber) -> DailyCounters;
    fn set_daily_counters(&mut self, day: DayNumber, counters: DailyCounters) -> Result<(), Error>;
}

/// In-memory reference [`Store`]. Mutations clone-then-swap rather than
/// write through a partial borrow, so a failing call (today, only
/// "not found" can fail) never leaves a half-applied card behind.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    cards: HashMap<CardId, Card>,
    notes: HashMap<NoteId, Vec<CardId>>,
    groups: HashMap<GroupId, Group>,
    revlog: Vec<RevisionLog>,
    daily_counters: HashMap<DayNumber, DailyCounters>,
    pub config: ConfigResolver,
}

impl InMemoryStore {
    pub fn new(config: ConfigResolver) -> Self {
        InMemoryStore {
            config,
            ..Default::default()
        }
    }

    pub fn insert_group(&mut self, group: Group) {
        self.groups.insert(group.id, group);
    }

    pub fn insert_card(&mut self, card: Card) {
        self.notes.entry(card.note_id).or_default().push(card.id);
        self.cards.insert(card.id, card);
    }
}

impl Store for InMemoryStore {
    fn get_card(&self, id: CardId) -> Result<Card, Error> {
        self.cards
            .get(&id)
            .cloned()
            .ok_or(Error::Library(LibraryError::Store(StoreErrorKind::CardNotFound(id))))
    }

    fn cards_in_groups(&self, group_ids: &[GroupId]) -> Result<Vec<Card>, Error> {
        Ok(self
            .cards
            .values()
            .filter(|c| group_ids.contains(&c.group_id))
            .cloned()
            .collect())
    }

    fn all_cards(&self) -> Result<Vec<Card>, Error> {
        Ok(self.cards.values().cloned().collect())
    }

    fn update_card(&mut self, card: Card) -> Result<(), Error> {
        if !self.cards.contains_key(&card.id) {
            return Err(Error::Library(LibraryError::Store(
                StoreErrorKind::CardNotFound(card.id),
            )));
        }
        self.cards.insert(card.id, card);
        Ok(())
    }

    fn sibling_ids(&self, note_id: NoteId) -> Result<Vec<CardId>, Error> {
        Ok(self.notes.get(&note_id).cloned().unwrap_or_default())
    }

    fn groups(&self) -> Result<Vec<Group>, Error> {
        Ok(self.groups.values().cloned().collect())
    }

    fn group(&self, id: GroupId) -> Result<Group, Error> {
        self.groups
            .get(&id)
            .cloned()
            .ok_or(Error::Library(LibraryError::Store(StoreErrorKind::GroupNotFound(id))))
    }

    fn resolve_config(&self, group_id: GroupId) -> Configuration {
        self.config.resolve(group_id)
    }

    fn append_revlog(&mut self, row: RevisionLog) -> Result<(), Error> {
        self.revlog.push(row);
        Ok(())
    }

    fn revlog_for_card(&self, card_id: CardId) -> Result<Vec<RevisionLog>, Error> {
        Ok(self
            .revlog
            .iter()
            .filter(|r| r.card_id == card_id)
            .cloned()
            .collect())
    }

    fn daily_counters(&self, day: DayNumber) -> DailyCounters {
        self.daily_counters.get(&day).copied().unwrap_or_default()
    }

    fn set_daily_counters(&mut self, day: DayNumber, counters: DailyCounters) -> Result<(), Error> {
        self.daily_counters.insert(day, counters);
        Ok(())
    }
}
