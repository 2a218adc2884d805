/// Number of matches in every pool.
pub const MATCHES_PER_POOL: usize = 15;

/// Cost of a single-outcome combination, in minor units.
pub const BASE_STAKE_UNIT: u64 = 100;

/// Points awarded per correctly predicted match.
pub const POINTS_PER_CORRECT_MATCH: u64 = 10;

/// Platform commission taken from the pot at closure (basis points).
pub const COMMISSION_RATE_BPS: u64 = 1_500;

/// Prize pool split across the three tiers (basis points of the prize pool).
pub const FIRST_TIER_BPS: u64 = 7_000;
pub const SECOND_TIER_BPS: u64 = 2_000;
pub const THIRD_TIER_BPS: u64 = 1_000;

/// Referrer commission on a referred user's first stake (basis points).
pub const REFERRAL_RATE_BPS: u64 = 500;

/// Smallest withdrawal a user may request, in minor units.
pub const MIN_WITHDRAWAL_AMOUNT: u64 = 1_000;

/// Maximum distinct outcomes a single match pick may cover (1, X, 2).
pub const MAX_CHOSEN_OUTCOMES: usize = 3;

/// Maximum name length for user registration and pool names.
pub const MAX_NAME_LENGTH: usize = 64;

/// Apply a basis-points rate to an amount, rounding down.
pub fn apply_bps(amount: u64, bps: u64) -> u64 {
    ((amount as u128).saturating_mul(bps as u128) / 10_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(10_000, COMMISSION_RATE_BPS), 1_500);
        assert_eq!(apply_bps(10_000, FIRST_TIER_BPS), 7_000);
        assert_eq!(apply_bps(0, FIRST_TIER_BPS), 0);
        // Rounds down
        assert_eq!(apply_bps(1, 1_500), 0);
        assert_eq!(apply_bps(u64::MAX, 10_000), u64::MAX);
    }

    #[test]
    fn test_tier_split_covers_whole_pool() {
        assert_eq!(FIRST_TIER_BPS + SECOND_TIER_BPS + THIRD_TIER_BPS, 10_000);
    }
}
