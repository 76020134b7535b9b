use rand::seq::SliceRandom;
use rand::Rng;

use crate::model::{Card, Rank, Suit};

pub const DECK_SIZE: usize = 52;

/// A single 52-card deck. Cards are dealt from the end of the sequence.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A full deck in canonical order: suit-major, rank-minor.
    pub fn new() -> Self {
        let cards = Suit::ALL
            .iter()
            .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card::new(rank, suit)))
            .collect();
        Deck { cards }
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Throw away whatever is left and start over with a fresh, unshuffled
    /// deck.
    pub fn reset(&mut self) {
        *self = Deck::new();
    }

    pub fn peek(&self) -> Option<&Card> {
        self.cards.last()
    }

    pub fn count(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Move `top` to the top of the deck so that they are dealt first, in the
    /// order given. Cards not currently in the deck are skipped.
    pub fn stack(&mut self, top: &[Card]) {
        let mut stacked = Vec::with_capacity(top.len());
        for card in top {
            if let Some(i) = self.cards.iter().position(|c| c == card) {
                stacked.push(self.cards.remove(i));
            }
        }
        self.cards.extend(stacked.into_iter().rev());
    }
}

impl Default for Deck {
    fn default() -> Self {
        Deck::new()
    }
}

/// Decides the order of a freshly reset deck at the start of every round.
pub trait Shuffler {
    fn shuffle(&mut self, deck: &mut Deck);
}

/// Shuffles uniformly at random.
#[derive(Debug, Clone)]
pub struct RandomShuffler<R>(pub R);

impl<R: Rng> Shuffler for RandomShuffler<R> {
    fn shuffle(&mut self, deck: &mut Deck) {
        deck.shuffle(&mut self.0);
    }
}

/// Deals a fixed sequence of cards before the rest of the deck, every round.
///
/// Useful for replaying a known game and for scripted tests.
#[derive(Debug, Clone, Default)]
pub struct Stacked {
    order: Vec<Card>,
}

impl Stacked {
    pub fn new(order: Vec<Card>) -> Self {
        Stacked { order }
    }
}

impl Shuffler for Stacked {
    fn shuffle(&mut self, deck: &mut Deck) {
        deck.stack(&self.order);
    }
}
