//! Filter and update compilation.
//!
//! Both compilers are pure: they turn domain values into a store-neutral plan
//! (`Predicate`, `WriteOp`) that the MongoDB adapter renders to BSON and the
//! in-memory store evaluates directly.

use chrono::{DateTime, Utc};

use crate::models::{Board, Filter, Member};

/// Document fields a predicate can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    BoardId,
    OwnerId,
    MemberId,
}

impl Field {
    /// Path of the field inside a stored board document.
    pub fn path(self) -> &'static str {
        match self {
            Field::BoardId => "_id",
            Field::OwnerId => "owner_id",
            Field::MemberId => "members.member_id",
        }
    }
}

/// A compiled board query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every document.
    All,
    /// The field (or, for array paths, any element) equals one of the values.
    In { field: Field, values: Vec<String> },
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    fn is_in(field: Field, values: &[String]) -> Self {
        Predicate::In {
            field,
            values: values.to_vec(),
        }
    }

    /// Evaluate the predicate against a board.
    pub fn matches(&self, board: &Board) -> bool {
        match self {
            Predicate::All => true,
            Predicate::In { field, values } => match field {
                Field::BoardId => values.contains(&board.board_id),
                Field::OwnerId => values.contains(&board.owner_id),
                Field::MemberId => board
                    .members
                    .iter()
                    .any(|m| values.contains(&m.member_id)),
            },
            Predicate::Or(clauses) => clauses.iter().any(|c| c.matches(board)),
            Predicate::And(clauses) => clauses.iter().all(|c| c.matches(board)),
        }
    }
}

/// Compile a listing filter into a predicate.
///
/// Owner and member ids widen each other (OR) when both are given; every other
/// clause narrows (AND). An empty filter compiles to `Predicate::All`.
pub fn compile_filter(filter: &Filter) -> Predicate {
    let mut clauses = Vec::new();

    if !filter.board_ids.is_empty() {
        clauses.push(Predicate::is_in(Field::BoardId, &filter.board_ids));
    }

    match (filter.owner_ids.is_empty(), filter.member_ids.is_empty()) {
        (false, false) => clauses.push(Predicate::Or(vec![
            Predicate::is_in(Field::OwnerId, &filter.owner_ids),
            Predicate::is_in(Field::MemberId, &filter.member_ids),
        ])),
        (false, true) => clauses.push(Predicate::is_in(Field::OwnerId, &filter.owner_ids)),
        (true, false) => clauses.push(Predicate::is_in(Field::MemberId, &filter.member_ids)),
        (true, true) => {}
    }

    match clauses.len() {
        0 => Predicate::All,
        1 => clauses.remove(0),
        _ => Predicate::And(clauses),
    }
}

/// Scalar fields overwritten on every save. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetFields {
    pub name: Option<String>,
    pub metadata: Option<String>,
}

impl SetFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.metadata.is_none()
    }
}

/// Fields written only when the upsert inserts a new document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFields {
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// One entry of an ordered bulk write against a single board document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Remove every member whose id is listed.
    PullMembers {
        board_id: String,
        member_ids: Vec<String>,
    },
    /// Insert-or-update the board, adding members with set semantics.
    Upsert {
        board_id: String,
        set: SetFields,
        set_on_insert: InsertFields,
        add_members: Vec<Member>,
    },
}

fn present(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Compile a board save into its ordered write operations.
///
/// The members list is a delta: every incoming member id is pulled first, then
/// the members not flagged for deletion are added back. Stale role grants for a
/// member are replaced in the same batch, and a member flagged for deletion is
/// never re-added. Members absent from the request are left alone.
pub fn compile_update(board: &Board) -> Vec<WriteOp> {
    let mut ops = Vec::with_capacity(2);

    let replaced = board.replaced_member_ids();
    if !replaced.is_empty() {
        ops.push(WriteOp::PullMembers {
            board_id: board.board_id.clone(),
            member_ids: replaced,
        });
    }

    ops.push(WriteOp::Upsert {
        board_id: board.board_id.clone(),
        set: SetFields {
            name: present(&board.name),
            metadata: present(&board.metadata),
        },
        set_on_insert: InsertFields {
            owner_id: board.owner_id.clone(),
            created_at: board.created_at.unwrap_or_else(Utc::now),
        },
        add_members: board.added_members(),
    });

    ops
}
