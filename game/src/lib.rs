#![warn(rust_2018_idioms)]

pub mod deck;
pub mod model;
pub mod protocol;
pub mod round;
pub mod strategy;

pub use deck::{Deck, RandomShuffler, Shuffler, Stacked};
pub use model::{hand_value, Card, Hand, Outcome, Party, Rank, Suit};
pub use protocol::{Message, Move, Offer, Payload, Request, ResultCode, WireCodec};
pub use round::{determine_outcome, Phase, Round};
pub use strategy::{StandOn, Strategy, HOUSE_RULE};
