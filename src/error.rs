use thiserror::Error;

use crate::{money::Cents, schemas::MemberId};

/// Validation failures of groups, expenses and balances.
///
/// All of them are raised before any balance is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("expense \"{expense}\" references \"{member}\", who is not a group member")]
    InvalidReference { expense: String, member: MemberId },
    #[error("expense \"{0}\" is not split between anyone")]
    EmptySplit(String),
    #[error("expense \"{expense}\" has a negative amount ({amount})")]
    NegativeAmount { expense: String, amount: Cents },
    #[error("expense \"{expense}\" lists \"{member}\" more than once")]
    DuplicateParticipant { expense: String, member: MemberId },
    #[error("expense \"{0}\" already present!")]
    DuplicateExpense(String),
    #[error("member \"{0}\" listed more than once")]
    DuplicateMember(MemberId),
    #[error("member names cannot be empty")]
    EmptyMember,
    #[error("a group needs at least one member")]
    NoMembers,
    #[error("group name cannot be empty")]
    EmptyName,
    #[error("balances do not add up to zero (off by {0})")]
    Unbalanced(Cents),
    #[error("amount overflow")]
    Overflow,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
