//! The server-side state machine for a single round of Blackjack.
//!
//! The machine is free of I/O: each transition returns the payloads that
//! should be sent to the client, in order, and the caller feeds player
//! moves back in. A `Round` is reused across the rounds of a session;
//! `start` resets the deck and both hands.

use log::debug;

use crate::deck::{Deck, Shuffler};
use crate::model::{Hand, Outcome, Party};
use crate::protocol::{Move, Payload, ResultCode};
use crate::strategy::{Strategy, HOUSE_RULE};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    Dealing,
    PlayerTurn,
    DealerTurn,
    Resolved,
}

/// Settle a round.
///
/// A busted player always loses, even if the dealer would have busted too.
pub fn determine_outcome(
    player_busted: bool,
    dealer_busted: bool,
    player_value: u32,
    dealer_value: u32,
) -> Outcome {
    if player_busted {
        Outcome::Loss
    } else if dealer_busted || player_value > dealer_value {
        Outcome::Win
    } else if player_value < dealer_value {
        Outcome::Loss
    } else {
        Outcome::Tie
    }
}

#[derive(Debug, Clone)]
pub struct Round {
    deck: Deck,
    player: Hand,
    dealer: Hand,
    phase: Phase,
    outcome: Option<Outcome>,
}

impl Round {
    pub fn new() -> Self {
        Round {
            deck: Deck::new(),
            player: Hand::new(),
            dealer: Hand::new(),
            phase: Phase::Dealing,
            outcome: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_player_turn(&self) -> bool {
        self.phase == Phase::PlayerTurn
    }

    /// The outcome, once the round is resolved.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn player(&self) -> &Hand {
        &self.player
    }

    pub fn dealer(&self) -> &Hand {
        &self.dealer
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Reset everything and deal the opening hands: two cards to the player,
    /// then two to the dealer, the second being the hole card.
    ///
    /// Returns the player's two cards and the dealer's up card.
    pub fn start<S: Shuffler + ?Sized>(&mut self, shuffler: &mut S) -> Vec<Payload> {
        self.deck.reset();
        shuffler.shuffle(&mut self.deck);
        self.player.clear();
        self.dealer.clear();
        self.outcome = None;
        self.phase = Phase::Dealing;

        let mut out = Vec::with_capacity(3);
        for party in [Party::Player, Party::Player, Party::Dealer, Party::Dealer] {
            if !self.deal_to(party) {
                self.abort(&mut out);
                return out;
            }
        }
        out.extend(self.player.cards().iter().map(|&c| Payload::card(c)));
        out.extend(self.dealer.cards().first().map(|&c| Payload::card(c)));
        self.phase = Phase::PlayerTurn;
        out
    }

    /// Apply the player's move. Moves outside the player's turn are ignored.
    pub fn play(&mut self, mv: Move) -> Vec<Payload> {
        let mut out = Vec::new();
        if self.phase != Phase::PlayerTurn {
            debug!("ignoring {} outside the player's turn", mv);
            return out;
        }
        match mv {
            Move::Hit => self.player_hits(&mut out),
            Move::Stand => self.dealer_turn(&mut out),
        }
        out
    }

    fn player_hits(&mut self, out: &mut Vec<Payload>) {
        let card = match self.deck.deal() {
            Some(card) => card,
            None => return self.abort(out),
        };
        self.player.push(card);
        if self.player.is_busted() {
            out.push(Payload {
                result: ResultCode::Loss,
                card: Some(card),
            });
            self.settle(Outcome::Loss);
        } else {
            out.push(Payload::card(card));
        }
    }

    fn dealer_turn(&mut self, out: &mut Vec<Payload>) {
        self.phase = Phase::DealerTurn;
        if let Some(&hole) = self.dealer.cards().get(1) {
            out.push(Payload::card(hole));
        }
        while HOUSE_RULE.should_hit(&self.dealer) {
            match self.deck.deal() {
                Some(card) => {
                    self.dealer.push(card);
                    out.push(Payload::card(card));
                }
                None => break,
            }
        }
        let outcome = determine_outcome(
            self.player.is_busted(),
            self.dealer.is_busted(),
            self.player.value(),
            self.dealer.value(),
        );
        out.push(Payload::result(outcome));
        self.settle(outcome);
    }

    // The deck ran dry: call it a tie.
    fn abort(&mut self, out: &mut Vec<Payload>) {
        debug!("deck exhausted during {:?}", self.phase);
        out.push(Payload::result(Outcome::Tie));
        self.settle(Outcome::Tie);
    }

    fn deal_to(&mut self, party: Party) -> bool {
        match self.deck.deal() {
            Some(card) => {
                match party {
                    Party::Player => self.player.push(card),
                    Party::Dealer => self.dealer.push(card),
                }
                true
            }
            None => false,
        }
    }

    fn settle(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.phase = Phase::Resolved;
    }
}

impl Default for Round {
    fn default() -> Self {
        Round::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::{Stacked, DECK_SIZE};
    use crate::model::{Card, Rank, Suit};

    fn c(rank: Rank) -> Card {
        Card::new(rank, Suit::Spades)
    }

    fn h(rank: Rank) -> Card {
        Card::new(rank, Suit::Hearts)
    }

    fn started(order: Vec<Card>) -> (Round, Vec<Payload>) {
        let mut round = Round::new();
        let out = round.start(&mut Stacked::new(order));
        (round, out)
    }

    fn cards_dealt(round: &Round) -> usize {
        round.player().len() + round.dealer().len()
    }

    // Leaves only the given number of cards in the deck.
    struct Short(usize);

    impl Shuffler for Short {
        fn shuffle(&mut self, deck: &mut Deck) {
            while deck.count() > self.0 {
                deck.deal();
            }
        }
    }

    #[test]
    fn outcome_table() {
        assert_eq!(determine_outcome(false, true, 18, 25), Outcome::Win);
        assert_eq!(determine_outcome(false, false, 20, 18), Outcome::Win);
        assert_eq!(determine_outcome(false, false, 18, 20), Outcome::Loss);
        assert_eq!(determine_outcome(false, false, 20, 20), Outcome::Tie);
        assert_eq!(determine_outcome(true, false, 25, 18), Outcome::Loss);
        assert_eq!(determine_outcome(true, true, 25, 25), Outcome::Loss);
    }

    #[test]
    fn opening_deal_shows_three_cards() {
        let (round, out) = started(vec![
            c(Rank::Ten),
            c(Rank::Seven),
            c(Rank::Six),
            c(Rank::Nine),
        ]);
        assert_eq!(round.phase(), Phase::PlayerTurn);
        assert_eq!(
            out,
            vec![
                Payload::card(c(Rank::Ten)),
                Payload::card(c(Rank::Seven)),
                Payload::card(c(Rank::Six)),
            ]
        );
        assert_eq!(round.dealer().cards(), &[c(Rank::Six), c(Rank::Nine)]);
        assert_eq!(round.deck().count() + cards_dealt(&round), DECK_SIZE);
    }

    #[test]
    fn dealer_draws_to_seventeen_and_beats_player() {
        let (mut round, _) = started(vec![
            c(Rank::Ten),
            c(Rank::Seven),
            c(Rank::Six),
            c(Rank::Nine),
            c(Rank::Five),
        ]);
        let out = round.play(Move::Stand);
        assert_eq!(
            out,
            vec![
                Payload::card(c(Rank::Nine)),
                Payload::card(c(Rank::Five)),
                Payload::result(Outcome::Loss),
            ]
        );
        assert_eq!(round.dealer().value(), 20);
        assert_eq!(round.player().len(), 2);
        assert_eq!(round.outcome(), Some(Outcome::Loss));
        assert_eq!(round.phase(), Phase::Resolved);
        assert_eq!(round.deck().count() + cards_dealt(&round), DECK_SIZE);
    }

    #[test]
    fn dealer_never_draws_on_seventeen() {
        let (mut round, _) = started(vec![
            c(Rank::Ten),
            c(Rank::Nine),
            c(Rank::King),
            c(Rank::Seven),
        ]);
        let out = round.play(Move::Stand);
        assert_eq!(
            out,
            vec![Payload::card(c(Rank::Seven)), Payload::result(Outcome::Win)]
        );
        assert_eq!(round.dealer().len(), 2);
    }

    #[test]
    fn dealer_bust_is_a_win() {
        let (mut round, _) = started(vec![
            c(Rank::Ten),
            c(Rank::Two),
            h(Rank::Ten),
            h(Rank::Six),
            c(Rank::King),
        ]);
        let out = round.play(Move::Stand);
        assert_eq!(out.last(), Some(&Payload::result(Outcome::Win)));
        assert!(round.dealer().is_busted());
        assert_eq!(round.outcome(), Some(Outcome::Win));
    }

    #[test]
    fn equal_hands_tie() {
        let (mut round, _) = started(vec![
            c(Rank::Ten),
            c(Rank::Eight),
            c(Rank::Queen),
            h(Rank::Eight),
        ]);
        let out = round.play(Move::Stand);
        assert_eq!(out.last(), Some(&Payload::result(Outcome::Tie)));
    }

    #[test]
    fn hit_without_bust_keeps_the_turn() {
        let (mut round, _) = started(vec![
            c(Rank::Two),
            c(Rank::Three),
            c(Rank::Ten),
            c(Rank::Seven),
            c(Rank::Four),
        ]);
        let out = round.play(Move::Hit);
        assert_eq!(out, vec![Payload::card(c(Rank::Four))]);
        assert!(round.is_player_turn());
        assert_eq!(round.player().value(), 9);
    }

    #[test]
    fn bust_sends_the_card_with_a_loss_and_skips_the_dealer() {
        let (mut round, _) = started(vec![
            c(Rank::King),
            c(Rank::Queen),
            c(Rank::Two),
            c(Rank::Three),
            h(Rank::Five),
        ]);
        let out = round.play(Move::Hit);
        assert_eq!(
            out,
            vec![Payload {
                result: ResultCode::Loss,
                card: Some(h(Rank::Five)),
            }]
        );
        assert_eq!(round.outcome(), Some(Outcome::Loss));
        assert_eq!(round.dealer().len(), 2);
        assert!(round.play(Move::Hit).is_empty());
    }

    #[test]
    fn standing_at_three_cards_gives_the_player_nothing_more() {
        let (mut round, _) = started(vec![
            c(Rank::Two),
            c(Rank::Three),
            h(Rank::Two),
            h(Rank::Three),
            c(Rank::Four),
        ]);
        round.play(Move::Hit);
        assert_eq!(round.player().len(), 3);
        round.play(Move::Stand);
        assert_eq!(round.player().len(), 3);
        assert!(round.dealer().value() >= 17);
        assert!(round.play(Move::Hit).is_empty());
        assert_eq!(round.player().len(), 3);
    }

    #[test]
    fn exhausted_deck_while_dealing_is_a_tie() {
        let mut round = Round::new();
        let out = round.start(&mut Short(3));
        assert_eq!(out, vec![Payload::result(Outcome::Tie)]);
        assert_eq!(round.outcome(), Some(Outcome::Tie));
    }

    #[test]
    fn exhausted_deck_on_hit_is_a_tie() {
        let mut round = Round::new();
        round.start(&mut Short(4));
        assert!(round.is_player_turn());
        let out = round.play(Move::Hit);
        assert_eq!(out, vec![Payload::result(Outcome::Tie)]);
        assert_eq!(round.outcome(), Some(Outcome::Tie));
    }

    #[test]
    fn exhausted_deck_stops_the_dealer() {
        let mut round = Round::new();
        round.start(&mut Short(4));
        let out = round.play(Move::Stand);
        // Hole card then the result, no draws.
        assert_eq!(out.len(), 2);
        assert_eq!(round.phase(), Phase::Resolved);
    }

    #[test]
    fn rounds_reset_between_starts() {
        let mut round = Round::new();
        let mut shuffler = Stacked::new(vec![
            c(Rank::Ten),
            c(Rank::Nine),
            h(Rank::Ten),
            h(Rank::Eight),
        ]);
        round.start(&mut shuffler);
        round.play(Move::Stand);
        assert_eq!(round.outcome(), Some(Outcome::Win));
        let out = round.start(&mut shuffler);
        assert_eq!(out.len(), 3);
        assert_eq!(round.outcome(), None);
        assert_eq!(round.player().len(), 2);
        assert_eq!(round.dealer().len(), 2);
        assert_eq!(round.deck().count(), DECK_SIZE - 4);
    }
}
