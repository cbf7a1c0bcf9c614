use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    balance::{compute_balances, Balances},
    error::SplitError,
    exchange::{settle_up, Transfer},
    money::Cents,
};

pub type MemberId = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: Cents,
    pub paid_by: MemberId,
    pub split_between: Vec<MemberId>,
    pub date: DateTime<Utc>,
}

impl Expense {
    /// Checks the expense on its own and against `members`.
    pub fn validate(&self, members: &HashSet<&str>) -> Result<(), SplitError> {
        if self.amount.is_negative() {
            return Err(SplitError::NegativeAmount {
                expense: self.id.clone(),
                amount: self.amount,
            });
        }
        if self.split_between.is_empty() {
            return Err(SplitError::EmptySplit(self.id.clone()));
        }

        let reference = |member: &MemberId| SplitError::InvalidReference {
            expense: self.id.clone(),
            member: member.clone(),
        };
        if !members.contains(self.paid_by.as_str()) {
            return Err(reference(&self.paid_by));
        }

        let mut seen = HashSet::with_capacity(self.split_between.len());
        for participant in &self.split_between {
            if !members.contains(participant.as_str()) {
                return Err(reference(participant));
            }
            if !seen.insert(participant.as_str()) {
                return Err(SplitError::DuplicateParticipant {
                    expense: self.id.clone(),
                    member: participant.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub members: Vec<MemberId>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Group {
    /// Builds an empty group, trimming member names and rejecting blank or
    /// repeated ones.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = MemberId>,
    ) -> Result<Self, SplitError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(SplitError::EmptyName);
        }
        Ok(Self {
            id: id.into(),
            name,
            members: normalize_members(members)?,
            expenses: vec![],
            owner: None,
        })
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn member_set(&self) -> HashSet<&str> {
        self.members.iter().map(String::as_str).collect()
    }

    pub fn expense(&self, id: &str) -> Option<&Expense> {
        self.expenses.iter().find(|expense| expense.id == id)
    }

    pub fn add_expense(&mut self, expense: Expense) -> Result<(), SplitError> {
        self.check_new_expense(&expense)?;
        self.expenses.push(expense);
        Ok(())
    }

    /// Validation done by [`Group::add_expense`], without appending.
    pub fn check_new_expense(&self, expense: &Expense) -> Result<(), SplitError> {
        if self.expense(&expense.id).is_some() {
            return Err(SplitError::DuplicateExpense(expense.id.clone()));
        }
        expense.validate(&self.member_set())
    }

    pub fn remove_expense(&mut self, id: &str) -> Option<Expense> {
        let index = self.expenses.iter().position(|expense| expense.id == id)?;
        Some(self.expenses.remove(index))
    }

    pub fn balances(&self) -> Result<Balances, SplitError> {
        compute_balances(&self.members, &self.expenses)
    }

    pub fn settle_up(&self) -> Result<Vec<Transfer>, SplitError> {
        settle_up(&self.balances()?)
    }
}

/// Parses a comma-separated member list such as `"John, Sarah,Mike"`.
pub fn parse_members(text: &str) -> Result<Vec<MemberId>, SplitError> {
    normalize_members(text.split(',').map(str::to_string))
}

fn normalize_members(
    members: impl IntoIterator<Item = MemberId>,
) -> Result<Vec<MemberId>, SplitError> {
    let mut normalized: Vec<MemberId> = Vec::new();
    for member in members {
        let member = member.trim();
        if member.is_empty() {
            return Err(SplitError::EmptyMember);
        }
        if normalized.iter().any(|existing| existing == member) {
            return Err(SplitError::DuplicateMember(member.to_string()));
        }
        normalized.push(member.to_string());
    }
    if normalized.is_empty() {
        return Err(SplitError::NoMembers);
    }
    Ok(normalized)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn expense(id: &str, amount: i64, paid_by: &str, split: &[&str]) -> Expense {
        Expense {
            id: id.to_string(),
            description: format!("expense {id}"),
            amount: Cents::new(amount),
            paid_by: paid_by.to_string(),
            split_between: split.iter().map(|m| m.to_string()).collect(),
            date: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn apartment() -> Group {
        Group::new("1", "Apartment", parse_members("John, Sarah, Mike").unwrap()).unwrap()
    }

    #[test]
    fn parse_members_trims_entries() {
        assert_eq!(
            parse_members(" John,Sarah ,  Mike").unwrap(),
            vec!["John", "Sarah", "Mike"]
        );
    }

    #[test]
    fn parse_members_rejects_blank_and_repeated_names() {
        assert_eq!(parse_members("John,,Mike"), Err(SplitError::EmptyMember));
        assert_eq!(parse_members("   "), Err(SplitError::EmptyMember));
        assert_eq!(
            parse_members("John, Mike, John"),
            Err(SplitError::DuplicateMember("John".to_string()))
        );
    }

    #[test]
    fn new_group_requires_name_and_members() {
        assert_eq!(
            Group::new("1", "  ", vec!["a".to_string()]),
            Err(SplitError::EmptyName)
        );
        assert_eq!(Group::new("1", "Trip", Vec::new()), Err(SplitError::NoMembers));
    }

    #[test]
    fn add_expense_validates_against_members() {
        let mut group = apartment();
        group
            .add_expense(expense("rent", 180000, "John", &["John", "Sarah", "Mike"]))
            .unwrap();

        let err = group
            .add_expense(expense("dinner", 5000, "Emma", &["John"]))
            .unwrap_err();
        assert_eq!(
            err,
            SplitError::InvalidReference {
                expense: "dinner".to_string(),
                member: "Emma".to_string(),
            }
        );

        let err = group
            .add_expense(expense("rent", 100, "John", &["Mike"]))
            .unwrap_err();
        assert_eq!(err, SplitError::DuplicateExpense("rent".to_string()));
        assert_eq!(group.expenses.len(), 1);
    }

    #[test]
    fn validate_rejects_duplicate_participants() {
        let group = apartment();
        let err = group
            .check_new_expense(&expense("taxi", 900, "Mike", &["John", "John"]))
            .unwrap_err();
        assert_eq!(
            err,
            SplitError::DuplicateParticipant {
                expense: "taxi".to_string(),
                member: "John".to_string(),
            }
        );
    }

    #[test]
    fn remove_expense_returns_the_removed_one() {
        let mut group = apartment();
        group
            .add_expense(expense("rent", 1800, "John", &["John", "Sarah"]))
            .unwrap();
        group
            .add_expense(expense("power", 300, "Sarah", &["John", "Sarah"]))
            .unwrap();

        assert_eq!(group.remove_expense("rent").map(|e| e.id), Some("rent".into()));
        assert_eq!(group.remove_expense("rent"), None);
        assert_eq!(group.expenses.len(), 1);
    }

    #[test]
    fn expense_serializes_in_camel_case() {
        let json = serde_json::to_value(expense("x", 250, "a", &["b"])).unwrap();
        assert_eq!(json["paidBy"], "a");
        assert_eq!(json["splitBetween"][0], "b");
        assert_eq!(json["amount"], 250);
    }
}
