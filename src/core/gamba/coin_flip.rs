use rand::rngs::OsRng;
use rand::Rng;

/// Source of the single fair bit that settles a wager.
pub trait CoinFlip: Send + Sync {
    fn flip(&self) -> bool;
}

/// Draws from the operating system's CSPRNG, so outcomes can't be predicted
/// from earlier ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsCoinFlip;

impl CoinFlip for OsCoinFlip {
    fn flip(&self) -> bool {
        let mut rng = OsRng;
        rng.gen_bool(0.5)
    }
}

/// Always lands on the same side.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedCoinFlip(pub bool);

#[cfg(test)]
impl CoinFlip for FixedCoinFlip {
    fn flip(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_coin_flip_lands_on_both_sides() {
        let coin = OsCoinFlip;
        let heads = (0..1_000).filter(|_| coin.flip()).count();
        // Astronomically unlikely to fail for a fair coin.
        assert!(heads > 350 && heads < 650, "got {} heads", heads);
    }
}
