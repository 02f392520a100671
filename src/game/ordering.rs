//! Initiative ordering: card scores and the canonical participant order.
//!
//! The order is computed once, when cards are assigned, and written back as
//! the stored row sequence.

use std::cmp::Ordering;

use crate::game::cards::{CardId, JokerColor, Rank, Suit};
use crate::game::state::ParticipantRow;

pub const BLACK_JOKER_SCORE: i32 = 1001;
pub const RED_JOKER_SCORE: i32 = 1000;
pub const NO_CARD_SCORE: i32 = -1;

fn rank_value(rank: Rank) -> i32 {
    match rank {
        Rank::Ace => 14,
        Rank::King => 13,
        Rank::Queen => 12,
        Rank::Jack => 11,
        Rank::Ten => 10,
        Rank::Nine => 9,
        Rank::Eight => 8,
        Rank::Seven => 7,
        Rank::Six => 6,
        Rank::Five => 5,
        Rank::Four => 4,
        Rank::Three => 3,
        Rank::Two => 2,
        Rank::Joker => 0,
    }
}

fn suit_value(suit: Suit) -> i32 {
    match suit {
        Suit::Spades => 4,
        Suit::Hearts => 3,
        Suit::Diamonds => 2,
        Suit::Clubs => 1,
    }
}

/// Initiative score of a card; higher acts first. `None` scores lowest.
pub fn score(card: Option<CardId>) -> i32 {
    let Some(card) = card else {
        return NO_CARD_SCORE;
    };
    let card = card.card();
    match card.joker_color {
        Some(JokerColor::Black) => BLACK_JOKER_SCORE,
        Some(JokerColor::Red) => RED_JOKER_SCORE,
        None => rank_value(card.rank) * 10 + card.suit.map_or(0, suit_value),
    }
}

/// Priority class: 0 joker, 1 on hold, 2 any other card, 3 no card.
fn class(row: &ParticipantRow) -> u8 {
    if row.holds_joker() {
        0
    } else if row.on_hold {
        1
    } else if row.current_card_id.is_some() {
        2
    } else {
        3
    }
}

fn compare(a: &ParticipantRow, b: &ParticipantRow) -> Ordering {
    let (ca, cb) = (class(a), class(b));
    ca.cmp(&cb).then_with(|| match ca {
        0 | 2 => score(b.current_card_id).cmp(&score(a.current_card_id)),
        _ => a.kind.cmp(&b.kind).then_with(|| compare_names(&a.name, &b.name)),
    })
}

/// Case-insensitive, falling back to byte order so the result is total.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Sort rows into initiative order in place. Stable: rows that compare
/// equal keep their relative positions.
pub fn sort_participants_by_initiative(rows: &mut [ParticipantRow]) {
    rows.sort_by(compare);
}
