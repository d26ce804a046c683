//! State errors

use sneed::{db::error as db, env::error as env, rwtxn::error as rwtxn};
use thiserror::Error;
use transitive::Transitive;

use crate::{
    math::payout::PayoutError,
    state::TransferError,
    types::{AccountId, AmountOverflowError, FixtureId, Position},
};

#[derive(Debug, Error, Transitive)]
#[transitive(from(db::Clear, db::Error))]
#[transitive(from(db::Delete, db::Error))]
#[transitive(from(db::Error, sneed::Error))]
#[transitive(from(db::IterInit, db::Error))]
#[transitive(from(db::IterItem, db::Error))]
#[transitive(from(db::Last, db::Error))]
#[transitive(from(db::Put, db::Error))]
#[transitive(from(db::TryGet, db::Error))]
#[transitive(from(env::CreateDb, env::Error))]
#[transitive(from(env::Error, sneed::Error))]
#[transitive(from(env::WriteTxn, env::Error))]
#[transitive(from(rwtxn::Commit, rwtxn::Error))]
#[transitive(from(rwtxn::Error, sneed::Error))]
pub enum Error {
    #[error(transparent)]
    AmountOverflow(#[from] AmountOverflowError),
    #[error("bet amount {amount} outside bounds [{min}, {max}]")]
    BetAmountOutOfBounds { amount: u64, min: u64, max: u64 },
    #[error("database consistency error: {0}")]
    DatabaseError(String),
    #[error(transparent)]
    Db(#[from] sneed::Error),
    #[error("fee rate {bps} bps exceeds maximum {max} bps")]
    FeeRateTooHigh { bps: u16, max: u16 },
    #[error("fixture {fixture} already resolved")]
    MatchAlreadyResolved { fixture: FixtureId },
    #[error(
        "fixture {fixture} already collected a pool of {total_pool} and cannot be re-scheduled"
    )]
    MatchHasStakes { fixture: FixtureId, total_pool: u64 },
    #[error("fixture {fixture} is not open for staking")]
    MatchNotBettable { fixture: FixtureId },
    #[error("fixture {fixture} not closable: close time {close_time}, now {now}")]
    MatchNotClosable {
        fixture: FixtureId,
        close_time: u64,
        now: u64,
    },
    #[error("fixture {fixture} not found")]
    MatchNotFound { fixture: FixtureId },
    #[error("fixture {fixture} was never scheduled")]
    MatchNotStarted { fixture: FixtureId },
    #[error("caller {caller} lacks the admin capability")]
    NotAdmin { caller: AccountId },
    #[error("nothing claimable for {participant} on fixture {fixture}")]
    NotClaimable {
        fixture: FixtureId,
        participant: AccountId,
    },
    #[error("configuration can only change while the ledger is paused")]
    NotPaused,
    #[error("caller {caller} lacks the scheduling capability")]
    NotScheduler { caller: AccountId },
    #[error("ledger is paused")]
    Paused,
    #[error(transparent)]
    Payout(#[from] PayoutError),
    #[error(
        "existing {existing} position on fixture {fixture} conflicts with requested {requested}"
    )]
    PositionMismatch {
        fixture: FixtureId,
        existing: Position,
        requested: Position,
    },
    #[error("rewards for fixture {fixture} already computed")]
    RewardsAlreadyComputed { fixture: FixtureId },
    #[error("start time {start_time} is not in the future (now {now})")]
    StartTimeNotFuture { start_time: u64, now: u64 },
    #[error(
        "start time {start_time} does not clear the {buffer_secs}s lock buffer"
    )]
    StartTimeWithinBuffer { start_time: u64, buffer_secs: u64 },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("outcome code 0 denotes an unresolved fixture and cannot be applied")]
    UnresolvedOutcomeCode,
}
