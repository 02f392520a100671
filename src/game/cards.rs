//! Card catalog: the fixed 54-card table (52 standard cards + 2 Jokers).
//!
//! The table is built once per process and never mutated. Documents refer to
//! cards by their stable string id (`"AS"`, `"10H"`, `"JK-R"`, `"JK-B"`);
//! in memory a card is a [`CardId`], a compact index into the catalog that
//! serializes back to that string.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// Number of cards in a complete deck.
pub const DECK_SIZE: usize = 54;

pub const RED_JOKER_ID: &str = "JK-R";
pub const BLACK_JOKER_ID: &str = "JK-B";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    /// Single-letter code used in card ids.
    pub fn letter(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Suit::Spades => '\u{2660}',   // ♠
            Suit::Hearts => '\u{2665}',   // ♥
            Suit::Diamonds => '\u{2666}', // ♦
            Suit::Clubs => '\u{2663}',    // ♣
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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
    Joker,
}

impl Rank {
    /// Standard ranks, high to low (the order cards are generated in).
    pub const STANDARD: [Rank; 13] = [
        Rank::Ace,
        Rank::King,
        Rank::Queen,
        Rank::Jack,
        Rank::Ten,
        Rank::Nine,
        Rank::Eight,
        Rank::Seven,
        Rank::Six,
        Rank::Five,
        Rank::Four,
        Rank::Three,
        Rank::Two,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
            Rank::Joker => "JOKER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JokerColor {
    Red,
    Black,
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: String,
    pub rank: Rank,
    /// `None` for Jokers.
    pub suit: Option<Suit>,
    /// `Some` only for Jokers.
    pub joker_color: Option<JokerColor>,
    /// Display label, e.g. `A♠`, `10♦`, `Red Joker`.
    pub label: String,
}

static CATALOG: OnceLock<Vec<Card>> = OnceLock::new();

/// The full catalog, generated on first use.
pub fn catalog() -> &'static [Card] {
    CATALOG.get_or_init(build_catalog)
}

fn build_catalog() -> Vec<Card> {
    let mut cards = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL {
        for rank in Rank::STANDARD {
            cards.push(Card {
                id: format!("{}{}", rank.code(), suit.letter()),
                rank,
                suit: Some(suit),
                joker_color: None,
                label: format!("{}{}", rank.code(), suit.symbol()),
            });
        }
    }
    cards.push(Card {
        id: RED_JOKER_ID.to_string(),
        rank: Rank::Joker,
        suit: None,
        joker_color: Some(JokerColor::Red),
        label: "Red Joker".to_string(),
    });
    cards.push(Card {
        id: BLACK_JOKER_ID.to_string(),
        rank: Rank::Joker,
        suit: None,
        joker_color: Some(JokerColor::Black),
        label: "Black Joker".to_string(),
    });
    cards
}

// ── CardId ─────────────────────────────────────────────────────────

/// Handle to a catalog entry. Serializes as the card's string id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CardId(u8);

impl CardId {
    /// Look up a card by its string id. Returns `None` for unknown ids.
    pub fn parse(id: &str) -> Option<CardId> {
        catalog()
            .iter()
            .position(|card| card.id == id)
            .map(|idx| CardId(idx as u8))
    }

    /// Every card in catalog order.
    pub fn all() -> impl Iterator<Item = CardId> {
        (0..DECK_SIZE as u8).map(CardId)
    }

    pub fn red_joker() -> CardId {
        CardId(DECK_SIZE as u8 - 2)
    }

    pub fn black_joker() -> CardId {
        CardId(DECK_SIZE as u8 - 1)
    }

    pub fn card(self) -> &'static Card {
        &catalog()[self.0 as usize]
    }

    pub fn as_str(self) -> &'static str {
        &self.card().id
    }

    pub fn label(self) -> &'static str {
        &self.card().label
    }

    pub fn is_joker(self) -> bool {
        self.card().rank == Rank::Joker
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({})", self.as_str())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        CardId::parse(&id).ok_or_else(|| de::Error::custom(format!("unknown card id `{}`", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_has_54_unique_ids() {
        let ids: HashSet<&str> = catalog().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(catalog().len(), DECK_SIZE);
        assert_eq!(ids.len(), DECK_SIZE);
        assert!(ids.contains("AS"));
        assert!(ids.contains("10H"));
        assert!(ids.contains("2C"));
        assert!(ids.contains(RED_JOKER_ID));
        assert!(ids.contains(BLACK_JOKER_ID));
    }

    #[test]
    fn jokers_have_color_and_no_suit() {
        let red = CardId::red_joker().card();
        assert_eq!(red.id, RED_JOKER_ID);
        assert_eq!(red.suit, None);
        assert_eq!(red.joker_color, Some(JokerColor::Red));
        assert_eq!(CardId::black_joker().card().joker_color, Some(JokerColor::Black));
        assert!(CardId::black_joker().is_joker());
        assert!(!CardId::parse("AS").unwrap().is_joker());
    }

    #[test]
    fn labels_use_suit_symbols() {
        assert_eq!(CardId::parse("AS").unwrap().label(), "A\u{2660}");
        assert_eq!(CardId::parse("10D").unwrap().label(), "10\u{2666}");
    }

    #[test]
    fn parse_rejects_unknown_ids() {
        assert!(CardId::parse("1S").is_none());
        assert!(CardId::parse("AX").is_none());
        assert!(CardId::parse("").is_none());
    }

    #[test]
    fn card_id_serializes_as_string() {
        let id = CardId::parse("QH").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""QH""#);
        let back: CardId = serde_json::from_str(r#""QH""#).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<CardId>(r#""ZZ""#).is_err());
    }
}
