// Gamba module - points ledger, roulette and duels.

pub mod coin_flip;
pub mod duel_service;
pub mod ledger;
pub mod roulette;

#[cfg(test)]
pub mod test_support;

pub use coin_flip::{CoinFlip, OsCoinFlip};
pub use duel_service::{
    AcceptOutcome, DeclineOutcome, Duel, DuelConfig, DuelService, DuelStore, NewDuel, Participant,
    ProposeOutcome, DUEL_GAME,
};
pub use ledger::{
    credited, BalanceRow, GambaError, LedgerEntry, LedgerService, LedgerStore, NewLedgerEntry,
    MAX_BALANCE,
};
pub use roulette::{RouletteOutcome, RouletteService};
