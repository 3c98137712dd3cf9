use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};

pub type CardId = i64;
pub type NoteId = i64;
pub type GroupId = i64;
pub type DayNumber = i64;

/// Default ease factor assigned on graduation, in thousandths (2500 = 2.5).
pub const DEFAULT_FACTOR: i64 = 2500;
/// Ease factor never drops below this, in thousandths.
pub const MIN_FACTOR: i64 = 1300;

/// Long-term category of a card, independent of its current queue.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
pub enum CardType {
    New,
    Learning,
    Review,
}

impl CardType {
    pub fn as_i8(self) -> i8 {
        match self {
            CardType::New => 0,
            CardType::Learning => 1,
            CardType::Review => 2,
        }
    }

    pub fn from_i8(n: i8) -> Option<Self> {
        match n {
            0 => Some(CardType::New),
            1 => Some(CardType::Learning),
            2 => Some(CardType::Review),
            _ => None,
        }
    }
}

/// Current scheduling bucket. Negative values are the "parked" states.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
pub enum Queue {
    Suspended,
    Buried,
    Crammed,
    New,
    Learning,
    Review,
}

impl Queue {
    pub fn as_i8(self) -> i8 {
        match self {
            Queue::Suspended => -1,
            Queue::Buried => -2,
            Queue::Crammed => -3,
            Queue::New => 0,
            Queue::Learning => 1,
            Queue::Review => 2,
        }
    }

    pub fn from_i8(n: i8) -> Option<Self> {
        match n {
            -1 => Some(Queue::Suspended),
            -2 => Some(Queue::Buried),
            -3 => Some(Queue::Crammed),
            0 => Some(Queue::New),
            1 => Some(Queue::Learning),
            2 => Some(Queue::Review),
            _ => None,
        }
    }
}

/// Learner's self-assessment of a card just answered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display)]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub fn from_u32(n: u32) -> Option<Self> {
        match n {
            1 => Some(Grade::Again),
            2 => Some(Grade::Hard),
            3 => Some(Grade::Good),
            4 => Some(Grade::Easy),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Grade::Again => 1,
            Grade::Hard => 2,
            Grade::Good => 3,
            Grade::Easy => 4,
        }
    }
}

/// Reason a card currently sits outside the three live queues.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParkReason {
    Suspended,
    Buried,
}

/// Rust-native encoding of `(type, queue)`. This is total and lossless for
/// every legal combination, and is the representation scheduler logic
/// should be written against; the flat integer fields on [`Card`] remain
/// the store round-trip format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CardState {
    New,
    Learning {
        cycles: u32,
        step: u32,
    },
    Review {
        ivl: i64,
        factor: i64,
        streak: u32,
    },
    Lapsed {
        ivl: i64,
        factor: i64,
        edue: DayNumber,
        step: u32,
    },
    Cramming {
        original_due: DayNumber,
        ivl: i64,
        factor: i64,
    },
    /// `lapsed` records whether the card was mid-relearn (edue holds a
    /// pending pre-lapse due) at the moment it was parked.
    Parked {
        reason: ParkReason,
        lapsed: bool,
    },
}

/// Mutable per-card scheduling state. Field names and the `due`/`edue`
/// dual meaning mirror the persisted column layout so a real store can
/// reproduce it verbatim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub group_id: GroupId,
    pub ord: u32,
    pub card_type: CardType,
    pub queue: Queue,
    /// NEW/REVIEW: day number. LEARNING: unix seconds.
    pub due: i64,
    /// Saved original due while the card is in a lapse (or cram) sub-queue; 0 when unused.
    pub edue: i64,
    pub ivl: i64,
    pub factor: i64,
    pub reps: u32,
    pub lapses: u32,
    pub streak: u32,
    /// Position within the current learning step set.
    pub step: u32,
    pub cycles: u32,
    pub timer_started: f64,
}

impl Card {
    pub fn new_new(id: CardId, note_id: NoteId, group_id: GroupId, ord: u32, due: i64) -> Self {
        Card {
            id,
            note_id,
            group_id,
            ord,
            card_type: CardType::New,
            queue: Queue::New,
            due,
            edue: 0,
            ivl: 0,
            factor: 0,
            reps: 0,
            lapses: 0,
            streak: 0,
            step: 0,
            cycles: 0,
            timer_started: 0.0,
        }
    }

    /// Derives the tagged-sum state from `(card_type, queue)` and the
    /// relevant scalar fields. Inconsistent combinations (a race or a
    /// manual edit) fall back to `New`; check `is_consistent` first if that
    /// matters to the caller.
    pub fn state(&self) -> CardState {
        match (self.card_type, self.queue) {
            (CardType::Learning, Queue::Learning) => CardState::Learning {
                cycles: self.cycles,
                step: self.step,
            },
            (CardType::Review, Queue::Review) => CardState::Review {
                ivl: self.ivl,
                factor: self.factor,
                streak: self.streak,
            },
            (CardType::Review, Queue::Learning) => CardState::Lapsed {
                ivl: self.ivl,
                factor: self.factor,
                edue: self.edue,
                step: self.step,
            },
            (_, Queue::Crammed) => CardState::Cramming {
                original_due: self.edue,
                ivl: self.ivl,
                factor: self.factor,
            },
            (_, Queue::Suspended) => CardState::Parked {
                reason: ParkReason::Suspended,
                lapsed: self.edue != 0,
            },
            (_, Queue::Buried) => CardState::Parked {
                reason: ParkReason::Buried,
                lapsed: self.edue != 0,
            },
            _ => CardState::New,
        }
    }

    /// Whether `(card_type, queue)` is one of the legal combinations.
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.card_type, self.queue),
            (CardType::New, Queue::New)
                | (CardType::Learning | CardType::Review, Queue::Learning)
                | (CardType::Review, Queue::Review)
        ) || matches!(self.queue, Queue::Suspended | Queue::Buried | Queue::Crammed)
    }

    /// Which live counter (0 = new, 1 = learning, 2 = review) this card
    /// belongs to, independent of whether it is actually present in the
    /// in-memory queues. Parked/crammed cards have no home counter.
    pub fn count_idx(&self) -> Option<usize> {
        match self.state() {
            CardState::New => Some(0),
            CardState::Learning { .. } | CardState::Lapsed { .. } => Some(1),
            CardState::Review { .. } => Some(2),
            CardState::Cramming { .. } | CardState::Parked { .. } => None,
        }
    }
}

/// A set of fields shared by one or more cards. The scheduler only cares
/// about note identity for sibling detection (two cards are siblings iff
/// they share `note_id`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub group_id: GroupId,
    pub fields: HashMap<String, String>,
    pub tags: Vec<String>,
}

/// A hierarchical container for cards, identified by id and a
/// `::`-separated name path (e.g. `"foo::bar"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

/// `type` discriminant for a [`RevisionLog`] row.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, Display)]
pub enum RevLogType {
    Learn,
    Review,
    Relearn,
    Cram,
}

impl RevLogType {
    pub fn as_i8(self) -> i8 {
        match self {
            RevLogType::Learn => 0,
            RevLogType::Review => 1,
            RevLogType::Relearn => 2,
            RevLogType::Cram => 3,
        }
    }
}

/// One row of the revision log. `last_interval` is negative when expressed
/// in seconds (learning steps), positive when in days -- this encoding is
/// observable and must be preserved.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RevisionLog {
    pub card_id: CardId,
    pub time_ms: i64,
    pub grade: u32,
    pub new_interval: i64,
    pub last_interval: i64,
    pub new_factor: i64,
    pub taken_ms: i64,
    pub log_type: RevLogType,
}

/// Per-day counters, keyed by day number; reset on day rollover.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct DailyCounters {
    pub new_done: u32,
    pub review_done: u32,
    pub learn_done: u32,
    pub time_today_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn state_derives_lapsed_from_review_type_in_the_learning_queue() {
        let mut card = Card::new_new(1, 1, 1, 0, 0);
        card.card_type = CardType::Review;
        card.queue = Queue::Learning;
        card.ivl = 5;
        card.edue = 42;
        assert!(matches!(card.state(), CardState::Lapsed { ivl: 5, edue: 42, .. }));
        assert_eq!(card.count_idx(), Some(1));
    }

    #[test]
    fn is_consistent_rejects_a_new_card_type_parked_as_buried() {
        let mut card = Card::new_new(1, 1, 1, 0, 0);
        assert!(card.is_consistent());
        card.queue = Queue::Buried;
        assert!(card.is_consistent(), "any type may be buried");

        card.card_type = CardType::New;
        card.queue = Queue::Review;
        assert!(!card.is_consistent(), "a New card has no business being in the review queue");
    }

    #[test]
    fn cramming_and_parked_cards_have_no_home_counter() {
        let mut card = Card::new_new(1, 1, 1, 0, 0);
        card.queue = Queue::Crammed;
        assert_eq!(card.count_idx(), None);
        card.queue = Queue::Suspended;
        assert_eq!(card.count_idx(), None);
    }
}
