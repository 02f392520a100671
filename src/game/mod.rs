//! Encounter engine: card catalog, deck piles, initiative ordering and the
//! turn state machine. Everything here is synchronous and free of I/O; the
//! sync and undo layers drive it through [`commands::apply`].

pub mod cards;
pub mod commands;
pub mod deck;
pub mod ordering;
pub mod participants;
pub mod state;
pub mod turns;
pub mod view;
