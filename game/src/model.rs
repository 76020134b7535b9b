use std::fmt;

use serde::{Deserialize, Serialize};

/// The highest hand value that is not a bust.
pub const BLACKJACK: u32 = 21;

/// Card ranks, in the order a fresh deck generates them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// The blackjack value of the rank, counting an ace as 11.
    pub fn value(self) -> u32 {
        match self {
            Rank::Ace => 11,
            Rank::Jack | Rank::Queen | Rank::King => 10,
            numeral => numeral.wire() as u32,
        }
    }

    /// The rank as it appears on the wire: 1 for an ace, 11 to 13 for the
    /// face cards, the numeral otherwise.
    pub fn wire(self) -> u16 {
        match self {
            Rank::Ace => 1,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
            numeral => numeral as u16 + 2,
        }
    }

    pub fn from_wire(n: u16) -> Option<Rank> {
        match n {
            1 => Some(Rank::Ace),
            2..=13 => Some(Rank::ALL[n as usize - 2]),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rank::Jack => f.write_str("Jack"),
            Rank::Queen => f.write_str("Queen"),
            Rank::King => f.write_str("King"),
            Rank::Ace => f.write_str("Ace"),
            numeral => write!(f, "{}", numeral.wire()),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    /// The 1-based index used on the wire.
    pub fn wire(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_wire(n: u8) -> Option<Suit> {
        match n {
            1..=4 => Some(Suit::ALL[n as usize - 1]),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Card { rank, suit }
    }

    pub fn value(&self) -> u32 {
        self.rank.value()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.rank, self.suit)
    }
}

/// Score a hand of cards.
///
/// Every ace starts out counting 11. While the total is over 21 and some ace
/// is still counted high, that ace drops to 1. Aces are visited in hand
/// order, though the final total does not depend on it.
pub fn hand_value(cards: &[Card]) -> u32 {
    evaluate(cards).0
}

// Returns the total and the number of aces still counted as 11.
fn evaluate(cards: &[Card]) -> (u32, usize) {
    let mut total: u32 = cards.iter().map(Card::value).sum();
    let mut soft_aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    while total > BLACKJACK && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    (total, soft_aces)
}

/// Which side of the table a card belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Party {
    Player,
    Dealer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Player => f.write_str("player"),
            Party::Dealer => f.write_str("dealer"),
        }
    }
}

/// How a finished round turned out, from the player's point of view.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => f.write_str("win"),
            Outcome::Loss => f.write_str("loss"),
            Outcome::Tie => f.write_str("tie"),
        }
    }
}

/// The cards held by one party during a single round.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Self {
        Hand { cards: Vec::new() }
    }

    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn value(&self) -> u32 {
        hand_value(&self.cards)
    }

    pub fn is_busted(&self) -> bool {
        self.value() > BLACKJACK
    }

    /// Whether an ace is still being counted as 11.
    pub fn is_soft(&self) -> bool {
        evaluate(&self.cards).1 > 0
    }

    /// A natural: exactly two cards worth 21.
    pub fn is_blackjack(&self) -> bool {
        self.cards.len() == 2 && self.value() == BLACKJACK
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, card) in self.cards.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", card)?;
        }
        Ok(())
    }
}

impl Extend<Card> for Hand {
    fn extend<I: IntoIterator<Item = Card>>(&mut self, iter: I) {
        self.cards.extend(iter)
    }
}
