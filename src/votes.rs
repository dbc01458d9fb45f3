//! Like/dislike voting on pins and trips.
//!
//! Each (account, target) pair is in one of three states. A vote row exists
//! only for LIKED (dir = 1) or DISLIKED (dir = -1), and the table's primary key
//! keeps an account out of both sets at once. The target's `likes` counter is
//! adjusted in the same transaction as the vote row.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::accounts::AccountRef;
use crate::error::{AppError, AppResult};
use crate::feed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    Neutral,
    Liked,
    Disliked,
}

impl VoteState {
    /// Contribution of this state to the target's `likes` counter.
    fn weight(self) -> i64 {
        match self {
            VoteState::Neutral => 0,
            VoteState::Liked => 1,
            VoteState::Disliked => -1,
        }
    }

    fn from_dir(dir: Option<i64>) -> Self {
        match dir {
            Some(d) if d > 0 => VoteState::Liked,
            Some(d) if d < 0 => VoteState::Disliked,
            _ => VoteState::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Like,
    Dislike,
    Clear,
}

impl Direction {
    /// Only the sign matters: 7 is a like, -2 a dislike, 0 clears.
    pub fn from_signum(value: i64) -> Self {
        match value.signum() {
            1 => Direction::Like,
            -1 => Direction::Dislike,
            _ => Direction::Clear,
        }
    }

    fn target_state(self) -> VoteState {
        match self {
            Direction::Like => VoteState::Liked,
            Direction::Dislike => VoteState::Disliked,
            Direction::Clear => VoteState::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VoteRejection {
    #[error("already liked")]
    AlreadyLiked,
    #[error("already disliked")]
    AlreadyDisliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: VoteState,
    pub to: VoteState,
    /// Change to apply to the `likes` counter
    pub delta: i64,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

pub fn transition(from: VoteState, direction: Direction) -> Result<Transition, VoteRejection> {
    let to = direction.target_state();
    match (from, to) {
        (VoteState::Liked, VoteState::Liked) => Err(VoteRejection::AlreadyLiked),
        (VoteState::Disliked, VoteState::Disliked) => Err(VoteRejection::AlreadyDisliked),
        _ => Ok(Transition {
            from,
            to,
            delta: to.weight() - from.weight(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Pin,
    Trip,
}

impl VoteTarget {
    pub fn noun(self) -> &'static str {
        match self {
            VoteTarget::Pin => "pin",
            VoteTarget::Trip => "trip",
        }
    }

    fn table(self) -> &'static str {
        match self {
            VoteTarget::Pin => "pins",
            VoteTarget::Trip => "trips",
        }
    }

    fn votes_table(self) -> &'static str {
        match self {
            VoteTarget::Pin => "pin_votes",
            VoteTarget::Trip => "trip_votes",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            VoteTarget::Pin => "pin_id",
            VoteTarget::Trip => "trip_id",
        }
    }

    fn not_found(self) -> AppError {
        match self {
            VoteTarget::Pin => AppError::not_found("Pin"),
            VoteTarget::Trip => AppError::not_found("Trip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub transition: Transition,
    /// Counter value after the vote
    pub likes: i64,
    /// False when the owner's feed could not be updated (or nobody owns the target)
    pub notified: bool,
}

fn feed_message(actor: &str, target: VoteTarget, name: &str, to: VoteState) -> String {
    let noun = target.noun();
    match to {
        VoteState::Liked => format!("{actor} liked your {noun} {name}"),
        VoteState::Disliked => format!("{actor} disliked your {noun} {name}"),
        VoteState::Neutral => format!("{actor} took back their vote on your {noun} {name}"),
    }
}

/// Move `actor`'s vote on the target in `direction`.
///
/// Repeating a like or a dislike is rejected with a conflict and changes
/// nothing. Clearing when there is no vote is an accepted no-op.
pub fn apply_vote(
    conn: &mut Connection,
    target: VoteTarget,
    target_id: &str,
    actor: &AccountRef,
    direction: Direction,
) -> AppResult<VoteOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (name, owner): (String, Option<String>) = tx
        .query_row(
            &format!(
                "SELECT name, linked_account FROM {} WHERE id = ?1",
                target.table()
            ),
            params![target_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| target.not_found())?;

    let current: Option<i64> = tx
        .query_row(
            &format!(
                "SELECT dir FROM {} WHERE {} = ?1 AND account_id = ?2",
                target.votes_table(),
                target.key_column()
            ),
            params![target_id, actor.id],
            |row| row.get(0),
        )
        .optional()?;

    let step = transition(VoteState::from_dir(current), direction).map_err(|rejection| {
        let action = match rejection {
            VoteRejection::AlreadyLiked => "liked",
            VoteRejection::AlreadyDisliked => "disliked",
        };
        AppError::Conflict(format!("account already {} {}", action, target.noun()))
    })?;

    if !step.is_noop() {
        match step.to {
            VoteState::Neutral => {
                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE {} = ?1 AND account_id = ?2",
                        target.votes_table(),
                        target.key_column()
                    ),
                    params![target_id, actor.id],
                )?;
            }
            VoteState::Liked | VoteState::Disliked => {
                tx.execute(
                    &format!(
                        "INSERT INTO {votes} ({key}, account_id, dir) VALUES (?1, ?2, ?3)
                         ON CONFLICT({key}, account_id) DO UPDATE SET
                           dir = excluded.dir,
                           voted_at = datetime('now')",
                        votes = target.votes_table(),
                        key = target.key_column()
                    ),
                    params![target_id, actor.id, step.to.weight()],
                )?;
            }
        }
        tx.execute(
            &format!(
                "UPDATE {} SET likes = likes + ?1 WHERE id = ?2",
                target.table()
            ),
            params![step.delta, target_id],
        )?;
    }

    let likes: i64 = tx.query_row(
        &format!("SELECT likes FROM {} WHERE id = ?1", target.table()),
        params![target_id],
        |row| row.get(0),
    )?;
    tx.commit()?;

    let notified = if step.is_noop() {
        false
    } else {
        let message = feed_message(&actor.username, target, &name, step.to);
        feed::notify_owner(conn, owner.as_deref(), &message)
    };

    tracing::debug!(
        target_kind = target.noun(),
        target_id,
        actor = %actor.id,
        delta = step.delta,
        "Vote applied"
    );

    Ok(VoteOutcome {
        transition: step,
        likes,
        notified,
    })
}

/// (likedBy, dislikedBy) for one target, in vote order.
pub fn load_voters(
    conn: &Connection,
    target: VoteTarget,
    target_id: &str,
) -> AppResult<(Vec<String>, Vec<String>)> {
    let mut stmt = conn.prepare(&format!(
        "SELECT account_id, dir FROM {} WHERE {} = ?1 ORDER BY rowid",
        target.votes_table(),
        target.key_column()
    ))?;
    let rows = stmt
        .query_map(params![target_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let (liked, disliked): (Vec<_>, Vec<_>) = rows.into_iter().partition(|(_, dir)| *dir > 0);
    Ok((
        liked.into_iter().map(|(id, _)| id).collect(),
        disliked.into_iter().map(|(id, _)| id).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;
    use crate::db::{accounts, now_timestamp};
    use crate::feed::load_feed;

    const ALL_DIRECTIONS: [Direction; 3] = [Direction::Like, Direction::Dislike, Direction::Clear];

    #[test]
    fn transition_table() {
        use Direction::*;
        use VoteState::*;

        let cases = [
            (Neutral, Like, Liked, 1),
            (Neutral, Dislike, Disliked, -1),
            (Neutral, Clear, Neutral, 0),
            (Liked, Dislike, Disliked, -2),
            (Liked, Clear, Neutral, -1),
            (Disliked, Like, Liked, 2),
            (Disliked, Clear, Neutral, 1),
        ];
        for (from, dir, to, delta) in cases {
            let t = transition(from, dir).unwrap();
            assert_eq!((t.to, t.delta), (to, delta), "{from:?} + {dir:?}");
        }

        assert_eq!(transition(Liked, Like), Err(VoteRejection::AlreadyLiked));
        assert_eq!(
            transition(Disliked, Dislike),
            Err(VoteRejection::AlreadyDisliked)
        );
    }

    #[test]
    fn direction_uses_sign_only() {
        assert_eq!(Direction::from_signum(5), Direction::Like);
        assert_eq!(Direction::from_signum(-9), Direction::Dislike);
        assert_eq!(Direction::from_signum(0), Direction::Clear);
    }

    #[test]
    fn every_sequence_keeps_counter_equal_to_final_state() {
        // all sequences of length 5 over {like, dislike, clear}
        for mut code in 0..3usize.pow(5) {
            let mut state = VoteState::Neutral;
            let mut likes = 0i64;
            let mut last_accepted = None;
            for _ in 0..5 {
                let dir = ALL_DIRECTIONS[code % 3];
                code /= 3;
                match transition(state, dir) {
                    Ok(t) => {
                        likes += t.delta;
                        state = t.to;
                        last_accepted = Some(dir);
                    }
                    Err(_) => {
                        // rejected only when repeating the current vote
                        assert_eq!(dir.target_state(), state);
                    }
                }
            }
            assert_eq!(likes, state.weight());
            if let Some(dir) = last_accepted {
                assert_eq!(state, dir.target_state());
            }
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        pool: crate::state::DbPool,
        owner: AccountRef,
        voter: AccountRef,
    }

    fn fixture() -> Fixture {
        let (tmp, pool) = migrated_pool();
        let conn = pool.get().unwrap();
        let ts = now_timestamp();
        conn.execute(
            "INSERT INTO accounts (id, username, create_date) VALUES ('owner', 'olive', ?1), ('voter', 'victor', ?1)",
            params![ts],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO pins (id, name, linked_account, create_date) VALUES ('p1', 'Lookout', 'owner', ?1)",
            params![ts],
        )
        .unwrap();
        let owner = accounts::find_ref(&conn, "owner").unwrap();
        let voter = accounts::find_ref(&conn, "voter").unwrap();
        drop(conn);
        Fixture {
            _tmp: tmp,
            pool,
            owner,
            voter,
        }
    }

    #[test]
    fn like_then_dislike_then_clear() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();

        let out = apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Like).unwrap();
        assert_eq!(out.likes, 1);
        assert!(out.notified);
        assert_eq!(
            load_voters(&conn, VoteTarget::Pin, "p1").unwrap(),
            (vec!["voter".to_string()], vec![])
        );

        let out =
            apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Dislike).unwrap();
        assert_eq!(out.likes, -1);
        assert_eq!(out.transition.delta, -2);
        assert_eq!(
            load_voters(&conn, VoteTarget::Pin, "p1").unwrap(),
            (vec![], vec!["voter".to_string()])
        );

        let out = apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Clear).unwrap();
        assert_eq!(out.likes, 0);
        assert_eq!(
            load_voters(&conn, VoteTarget::Pin, "p1").unwrap(),
            (vec![], vec![])
        );

        assert_eq!(
            load_feed(&conn, &fx.owner.id).unwrap(),
            vec![
                "victor took back their vote on your pin Lookout",
                "victor disliked your pin Lookout",
                "victor liked your pin Lookout",
            ]
        );
    }

    #[test]
    fn duplicate_like_is_a_conflict_and_changes_nothing() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();

        apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Like).unwrap();
        let err =
            apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Like).unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "account already liked pin"));

        let likes: i64 = conn
            .query_row("SELECT likes FROM pins WHERE id = 'p1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(likes, 1);
        assert_eq!(load_feed(&conn, &fx.owner.id).unwrap().len(), 1);
    }

    #[test]
    fn clearing_without_a_vote_is_silent_noop() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();

        let out = apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Clear).unwrap();
        assert!(out.transition.is_noop());
        assert_eq!(out.likes, 0);
        assert!(!out.notified);
        assert!(load_feed(&conn, &fx.owner.id).unwrap().is_empty());
    }

    #[test]
    fn missing_target_is_not_found() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let err = apply_vote(&mut conn, VoteTarget::Trip, "nope", &fx.voter, Direction::Like)
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn vote_survives_missing_owner_account() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        conn.execute("UPDATE pins SET linked_account = 'gone' WHERE id = 'p1'", [])
            .unwrap();

        let out = apply_vote(&mut conn, VoteTarget::Pin, "p1", &fx.voter, Direction::Like).unwrap();
        assert_eq!(out.likes, 1);
        assert!(!out.notified);
    }

    #[test]
    fn parallel_voters_keep_counter_consistent() {
        let fx = fixture();
        const VOTERS: usize = 6;
        const STEPS: usize = 15;
        let direction_for = |v: usize, k: usize| ALL_DIRECTIONS[(v * 7 + k * k) % 3];
        {
            let conn = fx.pool.get().unwrap();
            let ts = now_timestamp();
            for v in 0..VOTERS {
                conn.execute(
                    "INSERT INTO accounts (id, username, create_date) VALUES (?1, ?1, ?2)",
                    params![format!("pv{v}"), ts],
                )
                .unwrap();
            }
        }

        std::thread::scope(|s| {
            for v in 0..VOTERS {
                let pool = fx.pool.clone();
                s.spawn(move || {
                    let mut conn = pool.get().unwrap();
                    let voter = accounts::find_ref(&conn, &format!("pv{v}")).unwrap();
                    for k in 0..STEPS {
                        match apply_vote(&mut conn, VoteTarget::Pin, "p1", &voter, direction_for(v, k)) {
                            Ok(_) | Err(AppError::Conflict(_)) => {}
                            Err(e) => panic!("vote failed: {e}"),
                        }
                    }
                });
            }
        });

        // each voter's own sequence is serial, so its final state is deterministic
        let mut expected_likes = 0;
        for v in 0..VOTERS {
            let mut state = VoteState::Neutral;
            for k in 0..STEPS {
                if let Ok(t) = transition(state, direction_for(v, k)) {
                    state = t.to;
                }
            }
            expected_likes += state.weight();
        }

        let conn = fx.pool.get().unwrap();
        let (liked, disliked) = load_voters(&conn, VoteTarget::Pin, "p1").unwrap();
        let likes: i64 = conn
            .query_row("SELECT likes FROM pins WHERE id = 'p1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(likes, liked.len() as i64 - disliked.len() as i64);
        assert_eq!(likes, expected_likes);
        assert!(liked.iter().all(|id| !disliked.contains(id)));
    }

    #[test]
    fn counter_matches_sets_across_many_voters() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let ts = now_timestamp();
        let mut voters = Vec::new();
        for i in 0..6 {
            let id = format!("v{i}");
            conn.execute(
                "INSERT INTO accounts (id, username, create_date) VALUES (?1, ?1, ?2)",
                params![id, ts],
            )
            .unwrap();
            voters.push(accounts::find_ref(&conn, &id).unwrap());
        }

        for (i, voter) in voters.iter().enumerate() {
            let first = ALL_DIRECTIONS[i % 3];
            let second = ALL_DIRECTIONS[(i + 1) % 3];
            for dir in [first, second] {
                let _ = apply_vote(&mut conn, VoteTarget::Pin, "p1", voter, dir);
            }
        }

        let (liked, disliked) = load_voters(&conn, VoteTarget::Pin, "p1").unwrap();
        let likes: i64 = conn
            .query_row("SELECT likes FROM pins WHERE id = 'p1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(likes, liked.len() as i64 - disliked.len() as i64);
        assert!(liked.iter().all(|id| !disliked.contains(id)));
    }
}
