//! Reward engine: fixes the payout constants of a resolved match and
//! accumulates the fee into the treasury.

use heed::types::SerdeBincode;
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{
    math::payout,
    state::{Error, matches::Match},
    types::{AmountOverflowError, FixtureId},
};

#[derive(Clone)]
pub struct Dbs {
    /// Uncollected fee across all matches, zeroed in full by sweeps.
    treasury: DatabaseUnique<UnitKey, SerdeBincode<u64>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 1;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        let treasury = DatabaseUnique::create(env, rwtxn, "treasury")?;
        if treasury.try_get(rwtxn, &())?.is_none() {
            treasury.put(rwtxn, &(), &0u64)?;
        }
        Ok(Self { treasury })
    }

    pub fn balance(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.treasury.try_get(rotxn, &())?.unwrap_or(0))
    }

    fn accrue(&self, rwtxn: &mut RwTxn, fee: u64) -> Result<u64, Error> {
        let balance = self
            .balance(rwtxn)?
            .checked_add(fee)
            .ok_or(AmountOverflowError)?;
        self.treasury.put(rwtxn, &(), &balance)?;
        Ok(balance)
    }

    /// Drains the accumulator in full, returning the swept amount.
    pub fn drain(&self, rwtxn: &mut RwTxn) -> Result<u64, Error> {
        let balance = self.balance(rwtxn)?;
        self.treasury.put(rwtxn, &(), &0u64)?;
        Ok(balance)
    }

    /// Computes the fixed reward constants for a freshly resolved match and
    /// accrues the fee. Invoked exactly once per fixture: a match whose
    /// reward fields are already set fails the precondition rather than
    /// re-summing.
    ///
    /// An outcome code naming no side leaves `reward_base` at zero; nobody
    /// can claim and the fee is still taken on the full pool.
    pub fn calculate_rewards(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        match_: &mut Match,
    ) -> Result<(), Error> {
        if match_.reward_base != 0 || match_.reward_amount != 0 {
            return Err(Error::RewardsAlreadyComputed { fixture: *fixture });
        }
        let fee = if match_.winning_position().is_some() {
            payout::fee_amount(match_.total_pool, match_.terms.fee_rate_bps)?
        } else {
            // outcome code names no side: nobody can claim, the whole pool
            // is forfeit to the treasury
            match_.total_pool
        };
        match_.reward_base = match_.winning_pool();
        match_.reward_amount = match_.total_pool - fee;
        let treasury_balance = self.accrue(rwtxn, fee)?;
        tracing::info!(
            fixture = %fixture,
            reward_base = match_.reward_base,
            reward_amount = match_.reward_amount,
            fee,
            treasury_balance,
            "rewards computed"
        );
        Ok(())
    }
}
