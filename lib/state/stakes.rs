//! Stake ledger: per-participant positions and the user discovery index.

use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn};

use crate::{
    state::Error,
    types::{AccountId, AmountOverflowError, FixtureId, Position},
};

/// One participant's position on one fixture. At most one open position per
/// (fixture, participant); repeat stakes are additive on the same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub position: Position,
    pub amount: u64,
    pub claimed: bool,
}

#[derive(Clone)]
pub struct Dbs {
    /// (fixture, participant) -> stake entry
    entries: DatabaseUnique<
        SerdeBincode<(FixtureId, AccountId)>,
        SerdeBincode<StakeEntry>,
    >,
    /// participant -> fixtures ever staked on, append-only. Duplicates are
    /// tolerated; the index exists for discovery, not accounting.
    user_index: DatabaseUnique<SerdeBincode<AccountId>, SerdeBincode<Vec<FixtureId>>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 2;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            entries: DatabaseUnique::create(env, rwtxn, "stake_entries")?,
            user_index: DatabaseUnique::create(env, rwtxn, "user_fixture_index")?,
        })
    }

    pub fn try_get_entry(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
        participant: &AccountId,
    ) -> Result<Option<StakeEntry>, Error> {
        Ok(self.entries.try_get(rotxn, &(*fixture, *participant))?)
    }

    /// Creates or tops up a position. A second stake on a different side of
    /// the same fixture is rejected without touching the entry.
    pub fn upsert_stake(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        participant: &AccountId,
        position: Position,
        amount: u64,
    ) -> Result<StakeEntry, Error> {
        let entry = match self.try_get_entry(rwtxn, fixture, participant)? {
            Some(existing) if existing.amount != 0 => {
                if existing.position != position {
                    return Err(Error::PositionMismatch {
                        fixture: *fixture,
                        existing: existing.position,
                        requested: position,
                    });
                }
                StakeEntry {
                    position,
                    amount: existing
                        .amount
                        .checked_add(amount)
                        .ok_or(AmountOverflowError)?,
                    claimed: existing.claimed,
                }
            }
            _ => StakeEntry {
                position,
                amount,
                claimed: false,
            },
        };
        self.entries.put(rwtxn, &(*fixture, *participant), &entry)?;
        self.append_user_fixture(rwtxn, participant, fixture)?;
        Ok(entry)
    }

    /// Flips the claimed flag. Callers must have checked claimability.
    pub fn mark_claimed(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        participant: &AccountId,
        entry: &StakeEntry,
    ) -> Result<(), Error> {
        let claimed = StakeEntry {
            claimed: true,
            ..*entry
        };
        Ok(self.entries.put(rwtxn, &(*fixture, *participant), &claimed)?)
    }

    fn append_user_fixture(
        &self,
        rwtxn: &mut RwTxn,
        participant: &AccountId,
        fixture: &FixtureId,
    ) -> Result<(), Error> {
        let mut fixtures = self
            .user_index
            .try_get(rwtxn, participant)?
            .unwrap_or_default();
        fixtures.push(*fixture);
        Ok(self.user_index.put(rwtxn, participant, &fixtures)?)
    }

    /// All fixtures the participant has ever staked on, oldest first.
    pub fn user_fixtures(
        &self,
        rotxn: &RoTxn,
        participant: &AccountId,
    ) -> Result<Vec<FixtureId>, Error> {
        Ok(self
            .user_index
            .try_get(rotxn, participant)?
            .unwrap_or_default())
    }

    pub fn user_fixture_count(
        &self,
        rotxn: &RoTxn,
        participant: &AccountId,
    ) -> Result<u64, Error> {
        Ok(self.user_fixtures(rotxn, participant)?.len() as u64)
    }
}
