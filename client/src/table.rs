//! The client's view of a round.
//!
//! The server never says whose card it is sending; ownership follows from
//! the order. The first two cards are the player's, the third is the
//! dealer's up card, and any later card goes to the player until the player
//! stands, to the dealer afterwards.

use log::warn;

use netjack_game::{Card, Hand, Move, Outcome, Party, Payload};

/// What happened at the table, in the order the client learnt about it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Event {
    RoundStarted { round: u8, rounds: u8 },
    /// `hand_value` is the value of the recipient's visible hand, this card
    /// included.
    CardDealt {
        to: Party,
        card: Card,
        hand_value: u32,
    },
    /// The server waits for a move; answer with `Session::submit_move`.
    TurnPrompt { hand_value: u32 },
    RoundResolved { round: u8, outcome: Outcome },
}

#[derive(Debug, Clone)]
pub struct Table {
    round: u8,
    player: Hand,
    dealer: Hand,
    cards_seen: usize,
    player_turn: bool,
    awaiting_move: bool,
    outcome: Option<Outcome>,
}

impl Table {
    pub fn new(round: u8) -> Self {
        Table {
            round,
            player: Hand::new(),
            dealer: Hand::new(),
            cards_seen: 0,
            player_turn: true,
            awaiting_move: false,
            outcome: None,
        }
    }

    pub fn round(&self) -> u8 {
        self.round
    }

    pub fn player(&self) -> &Hand {
        &self.player
    }

    /// The dealer's cards seen so far.
    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    pub fn is_awaiting_move(&self) -> bool {
        self.awaiting_move
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }

    /// Take in a payload from the server.
    pub fn observe(&mut self, payload: Payload) -> Vec<Event> {
        let mut events = Vec::with_capacity(2);
        match payload.result.outcome() {
            Some(outcome) => {
                // A card riding on a result is the one the player busted on.
                if let Some(card) = payload.card {
                    events.push(self.deal(Party::Player, card));
                }
                self.outcome = Some(outcome);
                self.awaiting_move = false;
                events.push(Event::RoundResolved {
                    round: self.round,
                    outcome,
                });
            }
            None => {
                let card = match payload.card {
                    Some(card) => card,
                    None => {
                        warn!("ignoring an ongoing payload without a card");
                        return events;
                    }
                };
                self.cards_seen += 1;
                let to = match self.cards_seen {
                    1 | 2 => Party::Player,
                    3 => Party::Dealer,
                    _ if self.player_turn => Party::Player,
                    _ => Party::Dealer,
                };
                events.push(self.deal(to, card));
                if self.cards_seen >= 3 && self.player_turn {
                    self.awaiting_move = true;
                    events.push(Event::TurnPrompt {
                        hand_value: self.player.value(),
                    });
                }
            }
        }
        events
    }

    /// Record the move sent in answer to a `TurnPrompt`.
    pub fn moved(&mut self, mv: Move) {
        self.awaiting_move = false;
        if mv == Move::Stand {
            self.player_turn = false;
        }
    }

    fn deal(&mut self, to: Party, card: Card) -> Event {
        let hand = match to {
            Party::Player => &mut self.player,
            Party::Dealer => &mut self.dealer,
        };
        hand.push(card);
        Event::CardDealt {
            to,
            card,
            hand_value: hand.value(),
        }
    }
}
