//! Match registry: per-fixture lifecycle state and aggregated pool totals.

use fallible_iterator::FallibleIterator;
use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn};

use crate::{
    state::Error,
    types::{AmountOverflowError, FixtureId, OUTCOME_UNRESOLVED, Position},
};

/// Configuration values a match captures by value when it is scheduled.
/// Later configuration changes never retroactively alter an in-flight match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTerms {
    pub min_bet: u64,
    pub max_bet: u64,
    pub fee_rate_bps: u16,
    pub buffer_secs: u64,
}

/// One schedulable fixture and everything staked on it.
///
/// Lifecycle: scheduled by a privileged start call, grows its pools while
/// open, resolved exactly once, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Scheduled kick-off. Staking closes strictly before this.
    pub start_time: u64,
    /// `start_time - buffer`; staking closes at this instant. Nonzero iff
    /// the match has been scheduled.
    pub lock_time: u64,
    /// Gate for resolution. Fixed to `start_time` when scheduled, rewritten
    /// with the resolution timestamp once the outcome lands.
    pub close_time: u64,
    /// 0 until resolved, then the operator-supplied outcome code.
    pub outcome: u8,
    pub finished: bool,
    pub total_pool: u64,
    pub home_pool: u64,
    pub away_pool: u64,
    pub draw_pool: u64,
    /// Winning sub-pool size at resolution; pro-rata denominator.
    pub reward_base: u64,
    /// Total pool minus fee; pro-rata numerator.
    pub reward_amount: u64,
    pub terms: MatchTerms,
}

impl Match {
    /// A fresh schedule for the fixture under the given terms.
    pub fn scheduled(start_time: u64, terms: MatchTerms) -> Self {
        Self {
            start_time,
            lock_time: start_time.saturating_sub(terms.buffer_secs),
            close_time: start_time,
            outcome: OUTCOME_UNRESOLVED,
            finished: false,
            total_pool: 0,
            home_pool: 0,
            away_pool: 0,
            draw_pool: 0,
            reward_base: 0,
            reward_amount: 0,
            terms,
        }
    }

    pub fn is_started(&self) -> bool {
        self.lock_time != 0
    }

    /// True iff staking is still open: the match was scheduled and `now` is
    /// strictly before both the lock window and kick-off.
    pub fn is_bettable(&self, now: u64) -> bool {
        self.is_started() && now < self.start_time && now < self.lock_time
    }

    pub fn winning_position(&self) -> Option<Position> {
        Position::from_outcome_code(self.outcome)
    }

    /// The sub-pool staked on the winning side; zero when the outcome code
    /// names no side (including unresolved).
    pub fn winning_pool(&self) -> u64 {
        match self.winning_position() {
            Some(Position::Home) => self.home_pool,
            Some(Position::Away) => self.away_pool,
            Some(Position::Draw) => self.draw_pool,
            None => 0,
        }
    }

    /// Adds `amount` to the total pool and the chosen sub-pool, checked.
    pub fn credit_stake(
        &mut self,
        position: Position,
        amount: u64,
    ) -> Result<(), AmountOverflowError> {
        self.total_pool = self
            .total_pool
            .checked_add(amount)
            .ok_or(AmountOverflowError)?;
        let sub_pool = match position {
            Position::Home => &mut self.home_pool,
            Position::Away => &mut self.away_pool,
            Position::Draw => &mut self.draw_pool,
        };
        *sub_pool = sub_pool.checked_add(amount).ok_or(AmountOverflowError)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Dbs {
    /// fixture id -> match record
    matches: DatabaseUnique<SerdeBincode<FixtureId>, SerdeBincode<Match>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 1;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            matches: DatabaseUnique::create(env, rwtxn, "matches")?,
        })
    }

    pub fn try_get(
        &self,
        rotxn: &RoTxn,
        fixture: &FixtureId,
    ) -> Result<Option<Match>, Error> {
        Ok(self.matches.try_get(rotxn, fixture)?)
    }

    pub fn get(&self, rotxn: &RoTxn, fixture: &FixtureId) -> Result<Match, Error> {
        self.try_get(rotxn, fixture)?
            .ok_or(Error::MatchNotFound { fixture: *fixture })
    }

    pub fn put(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        match_: &Match,
    ) -> Result<(), Error> {
        Ok(self.matches.put(rwtxn, fixture, match_)?)
    }

    /// Scans the registry for fixtures still open for betting at `now`.
    pub fn open(
        &self,
        rotxn: &RoTxn,
        now: u64,
    ) -> Result<Vec<(FixtureId, Match)>, Error> {
        let open = self
            .matches
            .iter(rotxn)?
            .filter(|(_, match_)| Ok(match_.is_bettable(now)))
            .collect()?;
        Ok(open)
    }

    /// Schedules (or re-arms) a fixture. A fixture that ever collected
    /// stakes cannot be re-armed, resolved or not: the stake entries of the
    /// old round survive in the stakes table, and a fresh schedule would let
    /// them claim against the new round's reward constants. Pools are never
    /// decremented, so a staked fixture id is single-use.
    pub fn schedule(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        start_time: u64,
        now: u64,
        terms: MatchTerms,
    ) -> Result<Match, Error> {
        if start_time <= now {
            return Err(Error::StartTimeNotFuture { start_time, now });
        }
        // lock_time == 0 is the unscheduled sentinel; a start this close to
        // the epoch would saturate the lock window onto it
        if start_time <= terms.buffer_secs {
            return Err(Error::StartTimeWithinBuffer {
                start_time,
                buffer_secs: terms.buffer_secs,
            });
        }
        match self.try_get(rwtxn, fixture)? {
            Some(existing) if existing.total_pool != 0 => {
                return Err(Error::MatchHasStakes {
                    fixture: *fixture,
                    total_pool: existing.total_pool,
                });
            }
            _ => {}
        }
        let match_ = Match::scheduled(start_time, terms);
        self.put(rwtxn, fixture, &match_)?;
        tracing::info!(
            fixture = %fixture,
            start_time,
            lock_time = match_.lock_time,
            "match scheduled"
        );
        Ok(match_)
    }

    /// Applies an outcome to a started, closable, not-yet-finished match.
    /// Reward constants are computed by the caller afterwards, exactly once.
    pub fn apply_outcome(
        &self,
        rwtxn: &mut RwTxn,
        fixture: &FixtureId,
        outcome_code: u8,
        now: u64,
    ) -> Result<Match, Error> {
        if outcome_code == OUTCOME_UNRESOLVED {
            return Err(Error::UnresolvedOutcomeCode);
        }
        let mut match_ = self.get(rwtxn, fixture)?;
        if !match_.is_started() {
            return Err(Error::MatchNotStarted { fixture: *fixture });
        }
        if match_.finished {
            return Err(Error::MatchAlreadyResolved { fixture: *fixture });
        }
        if now < match_.close_time {
            return Err(Error::MatchNotClosable {
                fixture: *fixture,
                close_time: match_.close_time,
                now,
            });
        }
        match_.outcome = outcome_code;
        match_.finished = true;
        match_.close_time = now;
        self.put(rwtxn, fixture, &match_)?;
        tracing::info!(
            fixture = %fixture,
            outcome_code,
            total_pool = match_.total_pool,
            "match resolved"
        );
        Ok(match_)
    }
}

#[cfg(test)]
mod tests {
    use super::{Match, MatchTerms};

    fn terms() -> MatchTerms {
        MatchTerms {
            min_bet: 1,
            max_bet: u64::MAX,
            fee_rate_bps: 1000,
            buffer_secs: 30,
        }
    }

    #[test]
    fn lock_time_is_start_minus_buffer() {
        let m = Match::scheduled(1_000, terms());
        assert_eq!(m.lock_time, 970);
        assert_eq!(m.close_time, 1_000);
    }

    #[test]
    fn bettable_window_boundaries() {
        let m = Match::scheduled(1_000, terms());
        assert!(m.is_bettable(969));
        assert!(!m.is_bettable(970)); // now == lock_time rejects
        assert!(!m.is_bettable(1_000));
        assert!(!m.is_bettable(2_000));
    }

    #[test]
    fn unscheduled_match_is_never_bettable() {
        let mut m = Match::scheduled(1_000, terms());
        m.lock_time = 0;
        assert!(!m.is_bettable(0));
    }

    #[test]
    fn pool_sum_invariant_after_credits() {
        use crate::types::Position;
        let mut m = Match::scheduled(1_000, terms());
        m.credit_stake(Position::Home, 5).unwrap();
        m.credit_stake(Position::Away, 7).unwrap();
        m.credit_stake(Position::Draw, 11).unwrap();
        m.credit_stake(Position::Home, 13).unwrap();
        assert_eq!(m.total_pool, m.home_pool + m.away_pool + m.draw_pool);
        assert_eq!(m.home_pool, 18);
    }

    #[test]
    fn credit_overflow_is_checked() {
        use crate::types::Position;
        let mut m = Match::scheduled(1_000, terms());
        m.credit_stake(Position::Home, u64::MAX).unwrap();
        assert!(m.credit_stake(Position::Away, 1).is_err());
    }
}
