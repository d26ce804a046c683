//! Ledger state: match registry, stake ledger, reward engine and the
//! configuration record, all backed by one LMDB environment.
//!
//! Every mutating operation takes `&mut RwTxn` and stages its effects in
//! that transaction; the caller commits. The exclusive write transaction is
//! the serialization boundary: no call observes another call's partial
//! effects, and aborting the transaction rolls back everything, including
//! effects staged before a failed external transfer.

use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, RoTxn, RwTxn, UnitKey};
use thiserror::Error as ThisError;

use crate::{
    math::payout,
    types::{AccountId, FixtureId, OUTCOME_UNRESOLVED, Position},
};

pub mod error;
pub mod matches;
pub mod rewards;
pub mod stakes;

#[cfg(test)]
mod ledger_tests;

pub use error::Error;
pub use matches::{Match, MatchTerms};
pub use stakes::StakeEntry;

/// Hard cap on the fee rate, in basis points.
pub const MAX_FEE_RATE_BPS: u16 = 3_000;

/// Capability checks for privileged operations. The ledger consults this at
/// the top of each gated call and aborts with an authorization error before
/// touching any state.
pub trait AccessGate {
    fn is_scheduler(&self, caller: &AccountId) -> bool;
    fn is_admin(&self, caller: &AccountId) -> bool;
}

/// External value-movement failure. Fatal to the call; the caller aborts the
/// write transaction, rolling back every staged ledger effect.
#[derive(Debug, Clone, ThisError)]
#[error("value transfer failed: {reason}")]
pub struct TransferError {
    pub reason: String,
}

/// Moves stake in and payouts out. Both directions are all-or-nothing:
/// exactly `amount` moves, or the call fails with no effect.
pub trait ValueTransfer {
    fn transfer_in(&self, from: &AccountId, amount: u64) -> Result<(), TransferError>;
    fn transfer_out(&self, to: &AccountId, amount: u64) -> Result<(), TransferError>;
}

/// Versioned global configuration. Matches snapshot the betting terms by
/// value when scheduled, so mutating this record never retroactively alters
/// an in-flight match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub min_bet: u64,
    pub max_bet: u64,
    pub fee_rate_bps: u16,
    pub buffer_secs: u64,
    pub scheduler: AccountId,
    pub admin: AccountId,
    pub paused: bool,
    pub version: u64,
}

impl LedgerConfig {
    pub fn terms(&self) -> MatchTerms {
        MatchTerms {
            min_bet: self.min_bet,
            max_bet: self.max_bet,
            fee_rate_bps: self.fee_rate_bps,
            buffer_secs: self.buffer_secs,
        }
    }
}

/// [`AccessGate`] backed by the scheduler/admin addresses of a
/// [`LedgerConfig`] snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ConfigGate {
    scheduler: AccountId,
    admin: AccountId,
}

impl AccessGate for ConfigGate {
    fn is_scheduler(&self, caller: &AccountId) -> bool {
        *caller == self.scheduler
    }

    fn is_admin(&self, caller: &AccountId) -> bool {
        *caller == self.admin
    }
}

/// Per-fixture reward paid out by a claim, plus the transferred total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub rewards: Vec<(FixtureId, u64)>,
    pub total: u64,
}

/// One page of a participant's staking history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMatchesPage {
    pub fixtures: Vec<FixtureId>,
    pub entries: Vec<StakeEntry>,
    pub claimable: Vec<bool>,
    pub next_cursor: Option<u64>,
}

#[derive(Clone)]
pub struct State {
    config: DatabaseUnique<UnitKey, SerdeBincode<LedgerConfig>>,
    matches: matches::Dbs,
    stakes: stakes::Dbs,
    rewards: rewards::Dbs,
}

impl State {
    pub const NUM_DBS: u32 =
        matches::Dbs::NUM_DBS + stakes::Dbs::NUM_DBS + rewards::Dbs::NUM_DBS + 1;

    /// Creates (or opens) all tables and seeds the configuration record on
    /// first run. An existing configuration is left untouched.
    pub fn new(env: &sneed::Env, initial_config: LedgerConfig) -> Result<Self, Error> {
        if initial_config.fee_rate_bps > MAX_FEE_RATE_BPS {
            return Err(Error::FeeRateTooHigh {
                bps: initial_config.fee_rate_bps,
                max: MAX_FEE_RATE_BPS,
            });
        }
        let mut rwtxn = env.write_txn()?;
        let config = DatabaseUnique::create(env, &mut rwtxn, "ledger_config")?;
        let matches = matches::Dbs::new(env, &mut rwtxn)?;
        let stakes = stakes::Dbs::new(env, &mut rwtxn)?;
        let rewards = rewards::Dbs::new(env, &mut rwtxn)?;
        if config.try_get(&rwtxn, &())?.is_none() {
            config.put(&mut rwtxn, &(), &initial_config)?;
        }
        rwtxn.commit()?;
        Ok(Self {
            config,
            matches,
            stakes,
            rewards,
        })
    }

    pub fn config(&self, rotxn: &RoTxn) -> Result<LedgerConfig, Error> {
        // seeded in `new`, so the record always exists
        self.config.try_get(rotxn, &())?.ok_or_else(|| {
            Error::DatabaseError("ledger config record missing".to_owned())
        })
    }

    /// Gate backed by the currently configured scheduler/admin addresses.
    pub fn config_gate(&self, rotxn: &RoTxn) -> Result<ConfigGate, Error> {
        let config = self.config(rotxn)?;
        Ok(ConfigGate {
            scheduler: config.scheduler,
            admin: config.admin,
        })
    }

    fn require_scheduler(
        gate: &impl AccessGate,
        caller: &AccountId,
    ) -> Result<(), Error> {
        if gate.is_scheduler(caller) {
            Ok(())
        } else {
            Err(Error::NotScheduler { caller: *caller })
        }
    }

    fn require_admin(gate: &impl AccessGate, caller: &AccountId) -> Result<(), Error> {
        if gate.is_admin(caller) {
            Ok(())
        } else {
            Err(Error::NotAdmin { caller: *caller })
        }
    }

    // === match registry ===

    /// Schedules a fixture for betting. Requires the scheduling capability
    /// and a strictly future start time. Re-scheduling a fixture whose pool
    /// is non-zero is rejected, resolved or not: the old round's stake
    /// entries would otherwise carry over into the new one.
    pub fn start_match(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        fixture: &FixtureId,
        start_time: u64,
        now: u64,
    ) -> Result<(), Error> {
        Self::require_scheduler(gate, caller)?;
        let config = self.config(rwtxn)?;
        if config.paused {
            return Err(Error::Paused);
        }
        self.matches
            .schedule(rwtxn, fixture, start_time, now, config.terms())?;
        Ok(())
    }

    /// Bulk [`Self::start_match`]. The first failing element fails the whole
    /// call; the caller aborts the transaction, leaving every element
    /// unmodified.
    pub fn start_matches(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        schedules: &[(FixtureId, u64)],
        now: u64,
    ) -> Result<(), Error> {
        for (fixture, start_time) in schedules {
            self.start_match(rwtxn, gate, caller, fixture, *start_time, now)?;
        }
        Ok(())
    }

    /// Records the outcome of a started match and fixes its reward
    /// constants. Requires the scheduling capability, `now` at or past the
    /// close gate (the scheduled start time), a non-zero outcome code, and
    /// that the match is not already finished.
    pub fn resolve_match(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        fixture: &FixtureId,
        outcome_code: u8,
        now: u64,
    ) -> Result<(), Error> {
        Self::require_scheduler(gate, caller)?;
        let mut match_ = self.matches.apply_outcome(rwtxn, fixture, outcome_code, now)?;
        self.rewards.calculate_rewards(rwtxn, fixture, &mut match_)?;
        self.matches.put(rwtxn, fixture, &match_)?;
        Ok(())
    }

    /// Bulk [`Self::resolve_match`] with all-or-nothing semantics.
    pub fn resolve_matches(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        outcomes: &[(FixtureId, u8)],
        now: u64,
    ) -> Result<(), Error> {
        for (fixture, outcome_code) in outcomes {
            self.resolve_match(rwtxn, gate, caller, fixture, *outcome_code, now)?;
        }
        Ok(())
    }

    // === stake ledger ===

    /// Stakes `amount` on `position` for an open match. All ledger effects
    /// are staged before the inbound transfer is requested; if the transfer
    /// fails the caller aborts the transaction and nothing persists.
    #[allow(clippy::too_many_arguments)]
    pub fn place_stake(
        &self,
        rwtxn: &mut RwTxn,
        transfer: &impl ValueTransfer,
        fixture: &FixtureId,
        participant: &AccountId,
        position: Position,
        amount: u64,
        now: u64,
    ) -> Result<(), Error> {
        let config = self.config(rwtxn)?;
        if config.paused {
            return Err(Error::Paused);
        }
        let mut match_ = self.matches.get(rwtxn, fixture)?;
        if !match_.is_bettable(now) {
            return Err(Error::MatchNotBettable { fixture: *fixture });
        }
        if amount < match_.terms.min_bet || amount > match_.terms.max_bet {
            return Err(Error::BetAmountOutOfBounds {
                amount,
                min: match_.terms.min_bet,
                max: match_.terms.max_bet,
            });
        }
        let entry =
            self.stakes
                .upsert_stake(rwtxn, fixture, participant, position, amount)?;
        match_.credit_stake(position, amount)?;
        self.matches.put(rwtxn, fixture, &match_)?;
        // effects are staged; the transfer is the last thing that can fail
        transfer.transfer_in(participant, amount)?;
        tracing::debug!(
            fixture = %fixture,
            participant = %participant,
            position = %position,
            amount,
            entry_amount = entry.amount,
            total_pool = match_.total_pool,
            "stake placed"
        );
        Ok(())
    }

    /// Claims the rewards of every listed fixture for `participant`,
    /// paying the accumulated total in one outbound transfer. Any fixture
    /// failing its preconditions fails the whole call; no partial claims.
    pub fn claim(
        &self,
        rwtxn: &mut RwTxn,
        transfer: &impl ValueTransfer,
        fixtures: &[FixtureId],
        participant: &AccountId,
        now: u64,
    ) -> Result<ClaimReceipt, Error> {
        let mut rewards = Vec::with_capacity(fixtures.len());
        let mut total = 0u64;
        for fixture in fixtures {
            let match_ = self.matches.get(rwtxn, fixture)?;
            if !match_.is_started() {
                return Err(Error::MatchNotStarted { fixture: *fixture });
            }
            if now <= match_.close_time {
                return Err(Error::MatchNotClosable {
                    fixture: *fixture,
                    close_time: match_.close_time,
                    now,
                });
            }
            let not_claimable = Error::NotClaimable {
                fixture: *fixture,
                participant: *participant,
            };
            let Some(entry) = self.stakes.try_get_entry(rwtxn, fixture, participant)?
            else {
                return Err(not_claimable);
            };
            if !Self::entry_claimable(&match_, &entry) {
                return Err(not_claimable);
            }
            let reward =
                payout::pro_rata(entry.amount, match_.reward_amount, match_.reward_base)?;
            self.stakes.mark_claimed(rwtxn, fixture, participant, &entry)?;
            total = total
                .checked_add(reward)
                .ok_or(crate::types::AmountOverflowError)?;
            rewards.push((*fixture, reward));
            tracing::debug!(
                fixture = %fixture,
                participant = %participant,
                stake = entry.amount,
                reward,
                "stake claimed"
            );
        }
        if total > 0 {
            transfer.transfer_out(participant, total)?;
        }
        Ok(ClaimReceipt { rewards, total })
    }

    fn entry_claimable(match_: &Match, entry: &StakeEntry) -> bool {
        if match_.outcome == OUTCOME_UNRESOLVED {
            return false;
        }
        // a zero reward base cannot pay out; claimability implies the entry
        // sits inside the winning sub-pool, but guard the denominator anyway
        if match_.reward_base == 0 {
            return false;
        }
        entry.amount != 0
            && !entry.claimed
            && match_.winning_position() == Some(entry.position)
    }

    /// True iff `participant` holds an unclaimed winning stake on a
    /// resolved fixture.
    pub fn claimable(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
        participant: &AccountId,
    ) -> Result<bool, Error> {
        let Some(match_) = self.matches.try_get(rotxn, fixture)? else {
            return Ok(false);
        };
        let Some(entry) = self.stakes.try_get_entry(rotxn, fixture, participant)?
        else {
            return Ok(false);
        };
        Ok(Self::entry_claimable(&match_, &entry))
    }

    /// Emergency-refund eligibility query. No refund execution path exists;
    /// this mirrors the query surface of the original ledger.
    pub fn refundable(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
        participant: &AccountId,
        now: u64,
    ) -> Result<bool, Error> {
        let Some(match_) = self.matches.try_get(rotxn, fixture)? else {
            return Ok(false);
        };
        let Some(entry) = self.stakes.try_get_entry(rotxn, fixture, participant)?
        else {
            return Ok(false);
        };
        Ok(!entry.claimed
            && entry.amount != 0
            && now > match_.close_time.saturating_sub(match_.terms.buffer_secs))
    }

    // === query surface ===

    pub fn try_get_match(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
    ) -> Result<Option<Match>, Error> {
        self.matches.try_get(rotxn, fixture)
    }

    /// Every fixture still open for betting at `now`, via a registry scan.
    pub fn open_matches(
        &self,
        rotxn: &RoTxn,
        now: u64,
    ) -> Result<Vec<(FixtureId, Match)>, Error> {
        self.matches.open(rotxn, now)
    }

    pub fn fetch_matches(
        &self,
        rotxn: &RoTxn,
        fixtures: &[FixtureId],
    ) -> Result<Vec<Option<Match>>, Error> {
        fixtures
            .iter()
            .map(|fixture| self.matches.try_get(rotxn, fixture))
            .collect()
    }

    pub fn stake_entry(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
        participant: &AccountId,
    ) -> Result<Option<StakeEntry>, Error> {
        self.stakes.try_get_entry(rotxn, fixture, participant)
    }

    pub fn match_count(
        &self,
        rotxn: &RoTxn,
        participant: &AccountId,
    ) -> Result<u64, Error> {
        self.stakes.user_fixture_count(rotxn, participant)
    }

    /// Pages through a participant's staking history, oldest first. The
    /// index may repeat a fixture the participant staked on more than once.
    pub fn list_user_matches(
        &self,
        rotxn: &RoTxn,
        participant: &AccountId,
        cursor: u64,
        size: u64,
    ) -> Result<UserMatchesPage, Error> {
        let all = self.stakes.user_fixtures(rotxn, participant)?;
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(all.len());
        let end = start.saturating_add(usize::try_from(size).unwrap_or(usize::MAX))
            .min(all.len());
        let fixtures: Vec<FixtureId> = all[start..end].to_vec();
        let mut entries = Vec::with_capacity(fixtures.len());
        let mut claimable = Vec::with_capacity(fixtures.len());
        for fixture in &fixtures {
            let Some(entry) = self.stakes.try_get_entry(rotxn, fixture, participant)?
            else {
                // index entries are only appended together with a stake entry
                return Err(Error::DatabaseError(format!(
                    "user index references fixture {fixture} without a stake entry"
                )));
            };
            claimable.push(self.claimable(rotxn, fixture, participant)?);
            entries.push(entry);
        }
        let next_cursor = (end < all.len()).then_some(end as u64);
        Ok(UserMatchesPage {
            fixtures,
            entries,
            claimable,
            next_cursor,
        })
    }

    // === treasury ===

    pub fn treasury_balance(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        self.rewards.balance(rotxn)
    }

    /// Sweeps the full treasury balance to `to`. Admin capability required.
    pub fn sweep_treasury(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        transfer: &impl ValueTransfer,
        caller: &AccountId,
        to: &AccountId,
    ) -> Result<u64, Error> {
        Self::require_admin(gate, caller)?;
        let swept = self.rewards.drain(rwtxn)?;
        if swept > 0 {
            transfer.transfer_out(to, swept)?;
        }
        tracing::info!(to = %to, swept, "treasury swept");
        Ok(swept)
    }

    // === configuration surface ===

    /// Pauses or resumes the ledger. While paused, scheduling and staking
    /// are rejected; resolution and claims stay available so participants
    /// can exit.
    pub fn set_paused(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        paused: bool,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        self.mutate_config(rwtxn, |config| {
            config.paused = paused;
            Ok(())
        })
    }

    pub fn set_bet_bounds(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        min_bet: u64,
        max_bet: u64,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        self.mutate_config_paused(rwtxn, |config| {
            config.min_bet = min_bet;
            config.max_bet = max_bet;
            Ok(())
        })
    }

    pub fn set_fee_rate(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        fee_rate_bps: u16,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        if fee_rate_bps > MAX_FEE_RATE_BPS {
            return Err(Error::FeeRateTooHigh {
                bps: fee_rate_bps,
                max: MAX_FEE_RATE_BPS,
            });
        }
        self.mutate_config_paused(rwtxn, |config| {
            config.fee_rate_bps = fee_rate_bps;
            Ok(())
        })
    }

    pub fn set_buffer(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        buffer_secs: u64,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        self.mutate_config_paused(rwtxn, |config| {
            config.buffer_secs = buffer_secs;
            Ok(())
        })
    }

    pub fn set_scheduler(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        scheduler: AccountId,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        self.mutate_config_paused(rwtxn, |config| {
            config.scheduler = scheduler;
            Ok(())
        })
    }

    pub fn set_admin(
        &self,
        rwtxn: &mut RwTxn,
        gate: &impl AccessGate,
        caller: &AccountId,
        admin: AccountId,
    ) -> Result<(), Error> {
        Self::require_admin(gate, caller)?;
        self.mutate_config_paused(rwtxn, |config| {
            config.admin = admin;
            Ok(())
        })
    }

    /// Configuration mutation allowed only while the ledger is paused, so
    /// no match is scheduled or staked against a moving target.
    fn mutate_config_paused(
        &self,
        rwtxn: &mut RwTxn,
        f: impl FnOnce(&mut LedgerConfig) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let config = self.config(rwtxn)?;
        if !config.paused {
            return Err(Error::NotPaused);
        }
        self.mutate_config(rwtxn, f)
    }

    fn mutate_config(
        &self,
        rwtxn: &mut RwTxn,
        f: impl FnOnce(&mut LedgerConfig) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut config = self.config(rwtxn)?;
        f(&mut config)?;
        config.version += 1;
        self.config.put(rwtxn, &(), &config)?;
        tracing::info!(version = config.version, "ledger config updated");
        Ok(())
    }
}
