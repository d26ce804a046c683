//! Integer payout arithmetic.
//!
//! All intermediate products are computed in `u128` so that amounts near
//! `u64::MAX` cannot overflow, and every division truncates (floor). Fees
//! round down in favour of the pool; pro-rata rewards round down in favour
//! of the treasury, so the sum of all claims never exceeds the distributable
//! reward amount.

use thiserror::Error;

/// Fee rates are expressed in basis points of this denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("fee rate {0} bps exceeds denominator {BPS_DENOMINATOR}")]
    FeeRateOutOfRange(u16),
    #[error("reward base is zero")]
    ZeroRewardBase,
    #[error("payout does not fit in u64")]
    Overflow,
}

/// Fee taken on `total_pool` at `fee_rate_bps`, truncating.
pub fn fee_amount(total_pool: u64, fee_rate_bps: u16) -> Result<u64, PayoutError> {
    if u64::from(fee_rate_bps) > BPS_DENOMINATOR {
        return Err(PayoutError::FeeRateOutOfRange(fee_rate_bps));
    }
    let fee = u128::from(total_pool) * u128::from(fee_rate_bps)
        / u128::from(BPS_DENOMINATOR);
    // fee <= total_pool because fee_rate_bps <= BPS_DENOMINATOR
    Ok(fee as u64)
}

/// Pro-rata share of `reward_amount` for a stake of `stake` out of a winning
/// sub-pool of `reward_base`, floor division.
pub fn pro_rata(
    stake: u64,
    reward_amount: u64,
    reward_base: u64,
) -> Result<u64, PayoutError> {
    if reward_base == 0 {
        return Err(PayoutError::ZeroRewardBase);
    }
    let reward =
        u128::from(stake) * u128::from(reward_amount) / u128::from(reward_base);
    u64::try_from(reward).map_err(|_| PayoutError::Overflow)
}
