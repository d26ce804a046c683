//! Claimability and gate logic tests that need no database environment.

#[cfg(test)]
mod tests {
    use crate::{
        state::{
            AccessGate, ConfigGate, LedgerConfig, State,
            matches::{Match, MatchTerms},
            stakes::StakeEntry,
        },
        types::{AccountId, Position},
    };

    fn terms() -> MatchTerms {
        MatchTerms {
            min_bet: 1,
            max_bet: u64::MAX,
            fee_rate_bps: 1000,
            buffer_secs: 30,
        }
    }

    fn resolved_match(outcome: u8, home_pool: u64, away_pool: u64) -> Match {
        let mut m = Match::scheduled(1_000, terms());
        m.home_pool = home_pool;
        m.away_pool = away_pool;
        m.total_pool = home_pool + away_pool;
        m.outcome = outcome;
        m.finished = true;
        m.close_time = 1_001;
        m.reward_base = m.winning_pool();
        m.reward_amount = m.total_pool - m.total_pool / 10;
        m
    }

    fn entry(position: Position, amount: u64, claimed: bool) -> StakeEntry {
        StakeEntry {
            position,
            amount,
            claimed,
        }
    }

    #[test]
    fn winning_stake_is_claimable() {
        let m = resolved_match(1, 100, 200);
        assert!(State::entry_claimable(&m, &entry(Position::Home, 100, false)));
    }

    #[test]
    fn unresolved_match_is_never_claimable() {
        let mut m = resolved_match(1, 100, 200);
        m.outcome = 0;
        assert!(!State::entry_claimable(&m, &entry(Position::Home, 100, false)));
    }

    #[test]
    fn losing_side_is_not_claimable() {
        let m = resolved_match(1, 100, 200);
        assert!(!State::entry_claimable(&m, &entry(Position::Away, 200, false)));
        assert!(!State::entry_claimable(&m, &entry(Position::Draw, 1, false)));
    }

    #[test]
    fn claimed_or_empty_entries_are_not_claimable() {
        let m = resolved_match(1, 100, 200);
        assert!(!State::entry_claimable(&m, &entry(Position::Home, 100, true)));
        assert!(!State::entry_claimable(&m, &entry(Position::Home, 0, false)));
    }

    #[test]
    fn zero_reward_base_is_not_claimable() {
        // outcome code 4 names no side; winning pool (and so the base) is zero
        let m = resolved_match(4, 100, 200);
        assert_eq!(m.reward_base, 0);
        assert!(!State::entry_claimable(&m, &entry(Position::Home, 100, false)));
    }

    #[test]
    fn config_gate_checks_capabilities() {
        let scheduler = AccountId([1; 20]);
        let admin = AccountId([2; 20]);
        let outsider = AccountId([3; 20]);
        let config = LedgerConfig {
            min_bet: 1,
            max_bet: 100,
            fee_rate_bps: 500,
            buffer_secs: 30,
            scheduler,
            admin,
            paused: false,
            version: 0,
        };
        let gate = ConfigGate {
            scheduler: config.scheduler,
            admin: config.admin,
        };
        assert!(gate.is_scheduler(&scheduler));
        assert!(!gate.is_scheduler(&admin));
        assert!(gate.is_admin(&admin));
        assert!(!gate.is_admin(&outsider));
    }

    #[test]
    fn terms_snapshot_copies_config_values() {
        let config = LedgerConfig {
            min_bet: 5,
            max_bet: 50,
            fee_rate_bps: 250,
            buffer_secs: 60,
            scheduler: AccountId([1; 20]),
            admin: AccountId([2; 20]),
            paused: false,
            version: 7,
        };
        let terms = config.terms();
        assert_eq!(terms.min_bet, 5);
        assert_eq!(terms.max_bet, 50);
        assert_eq!(terms.fee_rate_bps, 250);
        assert_eq!(terms.buffer_secs, 60);
    }
}
