use crate::model::Hand;
use crate::protocol::Move;

/// The value at which the house stops drawing.
pub const DEALER_STANDS_ON: u32 = 17;

/// Decides whether a party takes another card.
///
/// The dealer and the player hold the same kind of `Hand`; what differs is
/// who makes the decision. Automated parties implement this trait, while an
/// interactive player's moves come from outside (the network on the server,
/// the user on the client).
pub trait Strategy {
    fn should_hit(&self, hand: &Hand) -> bool;

    fn decide(&self, hand: &Hand) -> Move {
        if self.should_hit(hand) {
            Move::Hit
        } else {
            Move::Stand
        }
    }
}

/// Hit while below the threshold, stand from it onwards.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StandOn(pub u32);

impl Strategy for StandOn {
    fn should_hit(&self, hand: &Hand) -> bool {
        hand.value() < self.0
    }
}

/// The fixed house rule: the dealer hits below 17 and stands on 17 or more.
pub const HOUSE_RULE: StandOn = StandOn(DEALER_STANDS_ON);
