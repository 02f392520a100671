//! Deck engine: the three card piles and the draw/discard/reshuffle moves.
//!
//! `remaining` is a stack whose top is the end of the vector. Every move
//! keeps the piles disjoint and their union equal to the full catalog.

use log::{debug, info, warn};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::EngineError;
use crate::game::cards::{CardId, DECK_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub remaining: Vec<CardId>,
    /// Cards currently held by some participant.
    #[serde(default)]
    pub in_play: Vec<CardId>,
    #[serde(default)]
    pub discard: Vec<CardId>,
    /// Set when a Joker is drawn; the deck is rebuilt at end of round.
    #[serde(default)]
    pub reshuffle_after_round: bool,
}

/// Pile sizes, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCounts {
    pub remaining: usize,
    pub in_play: usize,
    pub discard: usize,
    pub total: usize,
}

impl Default for Deck {
    /// All 54 cards in catalog order, nothing drawn.
    fn default() -> Self {
        Self {
            remaining: CardId::all().collect(),
            in_play: Vec::new(),
            discard: Vec::new(),
            reshuffle_after_round: false,
        }
    }
}

/// Uniform in-place Fisher–Yates shuffle.
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [CardId], rng: &mut R) {
    cards.shuffle(rng);
}

impl Deck {
    /// A fresh deck with every card shuffled into `remaining`.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Deck::default();
        shuffle(&mut deck.remaining, rng);
        deck
    }

    /// Draw the top card into `in_play`.
    ///
    /// An empty `remaining` pile is refilled from `discard` (shuffled) first.
    /// Fails with `InsufficientCards` and changes nothing when both are empty.
    pub fn deal_single_card<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<CardId, EngineError> {
        if self.remaining.is_empty() && !self.discard.is_empty() {
            self.remaining = std::mem::take(&mut self.discard);
            shuffle(&mut self.remaining, rng);
            info!("[deck] auto-reshuffle: moved {} cards from discard to remaining", self.remaining.len());
        }

        let Some(card) = self.remaining.pop() else {
            warn!("[deck] no cards available to draw");
            return Err(EngineError::InsufficientCards);
        };
        self.in_play.push(card);
        if card.is_joker() && !self.reshuffle_after_round {
            self.reshuffle_after_round = true;
            debug!("[deck] joker drawn, reshuffle flagged");
        }
        debug!(
            "[deck] drew {} (remaining {}, in play {})",
            card,
            self.remaining.len(),
            self.in_play.len()
        );
        Ok(card)
    }

    /// Move `card` from `in_play` to `discard`. Returns false (and changes
    /// nothing) when the card is not in play.
    pub fn discard(&mut self, card: CardId) -> bool {
        match self.in_play.iter().position(|c| *c == card) {
            Some(idx) => {
                self.in_play.remove(idx);
                self.discard.push(card);
                debug!("[deck] discarded {}", card);
                true
            }
            None => {
                warn!("[deck] card not in play: {}", card);
                false
            }
        }
    }

    /// Move everything in play to the discard pile. Returns how many moved.
    pub fn discard_all_in_play(&mut self) -> usize {
        let count = self.in_play.len();
        self.discard.append(&mut self.in_play);
        count
    }

    /// Merge `discard` into `remaining`, shuffle, and clear the reshuffle flag.
    pub fn reshuffle_discard_and_remaining<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if !self.in_play.is_empty() {
            warn!("[deck] reshuffling with {} cards still in play", self.in_play.len());
        }
        self.remaining.append(&mut self.discard);
        shuffle(&mut self.remaining, rng);
        self.reshuffle_after_round = false;
        info!("[deck] reshuffled: {} cards remaining", self.remaining.len());
    }

    /// Collect all three piles back into a shuffled `remaining`.
    pub fn rebuild<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.remaining.append(&mut self.in_play);
        self.remaining.append(&mut self.discard);
        shuffle(&mut self.remaining, rng);
        self.reshuffle_after_round = false;
    }

    pub fn counts(&self) -> DeckCounts {
        DeckCounts {
            remaining: self.remaining.len(),
            in_play: self.in_play.len(),
            discard: self.discard.len(),
            total: self.remaining.len() + self.in_play.len() + self.discard.len(),
        }
    }

    /// True when the piles are disjoint and together hold exactly the catalog.
    pub fn is_conserved(&self) -> bool {
        let all: Vec<CardId> = self
            .remaining
            .iter()
            .chain(&self.in_play)
            .chain(&self.discard)
            .copied()
            .collect();
        let unique: HashSet<CardId> = all.iter().copied().collect();
        all.len() == DECK_SIZE && unique.len() == DECK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn card(id: &str) -> CardId {
        CardId::parse(id).unwrap()
    }

    #[test]
    fn shuffled_deck_is_complete() {
        let deck = Deck::shuffled(&mut rng());
        assert_eq!(deck.remaining.len(), DECK_SIZE);
        assert!(deck.in_play.is_empty());
        assert!(deck.discard.is_empty());
        assert!(deck.is_conserved());
    }

    #[test]
    fn deal_pops_top_into_in_play() {
        let mut deck = Deck::shuffled(&mut rng());
        let top = *deck.remaining.last().unwrap();
        let dealt = deck.deal_single_card(&mut rng()).unwrap();
        assert_eq!(dealt, top);
        assert_eq!(deck.in_play, vec![top]);
        assert_eq!(deck.remaining.len(), DECK_SIZE - 1);
        assert!(deck.is_conserved());
    }

    #[test]
    fn dealing_a_joker_flags_reshuffle() {
        let mut deck = Deck::default();
        // catalog order ends with the Black Joker
        let dealt = deck.deal_single_card(&mut rng()).unwrap();
        assert_eq!(dealt, CardId::black_joker());
        assert!(deck.reshuffle_after_round);
    }

    #[test]
    fn empty_remaining_refills_from_discard() {
        let mut deck = Deck {
            remaining: Vec::new(),
            in_play: Vec::new(),
            discard: CardId::all().collect(),
            reshuffle_after_round: false,
        };
        deck.deal_single_card(&mut rng()).unwrap();
        assert!(deck.discard.is_empty());
        assert_eq!(deck.remaining.len(), DECK_SIZE - 1);
        assert_eq!(deck.in_play.len(), 1);
        assert!(deck.is_conserved());
    }

    #[test]
    fn exhausted_deck_fails_without_change() {
        let mut deck = Deck {
            remaining: Vec::new(),
            in_play: CardId::all().collect(),
            discard: Vec::new(),
            reshuffle_after_round: false,
        };
        let before = deck.clone();
        assert_eq!(deck.deal_single_card(&mut rng()), Err(EngineError::InsufficientCards));
        assert_eq!(deck, before);
    }

    #[test]
    fn discard_moves_from_in_play_only() {
        let mut deck = Deck::default();
        let dealt = deck.deal_single_card(&mut rng()).unwrap();
        assert!(deck.discard(dealt));
        assert_eq!(deck.discard, vec![dealt]);
        assert!(deck.in_play.is_empty());

        // not in play: no-op
        assert!(!deck.discard(card("AS")));
        assert_eq!(deck.discard.len(), 1);
        assert!(deck.is_conserved());
    }

    #[test]
    fn reshuffle_merges_discard_and_clears_flag() {
        let mut r = rng();
        let mut deck = Deck::shuffled(&mut r);
        for _ in 0..3 {
            deck.deal_single_card(&mut r).unwrap();
        }
        deck.discard_all_in_play();
        deck.reshuffle_after_round = true;
        deck.reshuffle_discard_and_remaining(&mut r);
        assert_eq!(deck.remaining.len(), DECK_SIZE);
        assert!(deck.discard.is_empty());
        assert!(!deck.reshuffle_after_round);
        assert!(deck.is_conserved());
    }

    #[test]
    fn rebuild_collects_all_piles() {
        let mut r = rng();
        let mut deck = Deck::shuffled(&mut r);
        for _ in 0..5 {
            deck.deal_single_card(&mut r).unwrap();
        }
        let first = deck.in_play[0];
        deck.discard(first);
        deck.rebuild(&mut r);
        assert_eq!(deck.counts().remaining, DECK_SIZE);
        assert_eq!(deck.counts().in_play, 0);
        assert_eq!(deck.counts().discard, 0);
        assert!(deck.is_conserved());
    }

    #[test]
    fn duplicate_card_breaks_conservation() {
        let mut deck = Deck::default();
        deck.discard.push(card("AS"));
        assert!(!deck.is_conserved());
    }

    #[test]
    fn shuffle_is_roughly_uniform() {
        // position of one card over many shuffles of a 4-card slice
        let mut r = rng();
        let mut hits = [0u32; 4];
        let base: Vec<CardId> = CardId::all().take(4).collect();
        for _ in 0..4000 {
            let mut cards = base.clone();
            shuffle(&mut cards, &mut r);
            let pos = cards.iter().position(|c| *c == base[0]).unwrap();
            hits[pos] += 1;
        }
        for count in hits {
            assert!((800..1200).contains(&count), "skewed shuffle: {:?}", hits);
        }
    }
}
