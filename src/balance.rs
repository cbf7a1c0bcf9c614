use std::collections::{BTreeMap, HashSet};

use crate::{
    error::SplitError,
    money::Cents,
    schemas::{Expense, MemberId},
};

/// Net position of every member: positive when the group owes them money,
/// negative when they owe the group.
pub type Balances = BTreeMap<MemberId, Cents>;

/// Computes the balance of every member from the full expense list.
///
/// All expenses are validated before anything is summed, so an error never
/// comes with a half-built result. The returned balances always add up to
/// exactly zero, and the order of `expenses` does not affect them.
pub fn compute_balances(
    members: &[MemberId],
    expenses: &[Expense],
) -> Result<Balances, SplitError> {
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
    for expense in expenses {
        expense.validate(&member_set)?;
    }

    let mut balances: Balances = members
        .iter()
        .map(|member| (member.clone(), Cents::ZERO))
        .collect();

    for expense in expenses {
        adjust(&mut balances, &expense.paid_by, |b| b.checked_add(expense.amount))?;
        for (participant, share) in expense_shares(expense)? {
            adjust(&mut balances, &participant, |b| b.checked_sub(share))?;
        }
    }
    Ok(balances)
}

/// Splits `expense.amount` between its participants.
///
/// Extra cents left by the division go to participants in member id order,
/// so the same expense always splits the same way whatever order the
/// participants were listed in.
pub fn expense_shares(expense: &Expense) -> Result<Vec<(MemberId, Cents)>, SplitError> {
    if expense.split_between.is_empty() {
        return Err(SplitError::EmptySplit(expense.id.clone()));
    }
    let mut participants: Vec<&MemberId> = expense.split_between.iter().collect();
    participants.sort();

    let shares = expense
        .amount
        .split_evenly(participants.len())
        .ok_or_else(|| SplitError::NegativeAmount {
            expense: expense.id.clone(),
            amount: expense.amount,
        })?;

    Ok(participants.into_iter().cloned().zip(shares).collect())
}

fn adjust(
    balances: &mut Balances,
    member: &str,
    op: impl FnOnce(Cents) -> Option<Cents>,
) -> Result<(), SplitError> {
    // Members were checked by `Expense::validate`.
    if let Some(balance) = balances.get_mut(member) {
        *balance = op(*balance).ok_or(SplitError::Overflow)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::tests::expense;

    fn members(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn total(balances: &Balances) -> i128 {
        balances.values().map(|b| i128::from(b.cents())).sum()
    }

    #[test]
    fn no_expenses_means_everyone_is_even() {
        let balances = compute_balances(&members(&["a", "b", "c"]), &[]).unwrap();
        assert_eq!(balances.len(), 3);
        assert!(balances.values().all(|balance| balance.is_zero()));
    }

    #[test]
    fn single_expense_split_evenly() {
        let balances = compute_balances(
            &members(&["a", "b", "c", "d"]),
            &[expense("hotel", 80000, "c", &["a", "b", "c", "d"])],
        )
        .unwrap();
        assert_eq!(balances["c"], Cents::new(60000));
        assert_eq!(balances["a"], Cents::new(-20000));
        assert_eq!(balances["b"], Cents::new(-20000));
        assert_eq!(balances["d"], Cents::new(-20000));
    }

    #[test]
    fn payer_does_not_need_a_share() {
        let balances = compute_balances(
            &members(&["a", "b"]),
            &[expense("gift", 1000, "a", &["b"])],
        )
        .unwrap();
        assert_eq!(balances["a"], Cents::new(1000));
        assert_eq!(balances["b"], Cents::new(-1000));
    }

    #[test]
    fn remainder_goes_to_first_members_in_id_order() {
        let coffee = expense("coffee", 100, "z", &["c", "a", "b"]);
        let shares = expense_shares(&coffee).unwrap();
        assert_eq!(
            shares,
            vec![
                ("a".to_string(), Cents::new(34)),
                ("b".to_string(), Cents::new(33)),
                ("c".to_string(), Cents::new(33)),
            ]
        );
        assert_eq!(expense_shares(&coffee).unwrap(), shares);
        assert_eq!(shares.iter().map(|(_, c)| c.cents()).sum::<i64>(), 100);
    }

    #[test]
    fn balances_always_sum_to_zero() {
        let group = members(&["ann", "bob", "cat", "dan", "eve", "fay", "gus"]);
        let expenses: Vec<Expense> = (1..=40)
            .map(|i| {
                let payer = &group[i % group.len()];
                let split: Vec<&str> = group
                    .iter()
                    .skip(i % 3)
                    .step_by(1 + i % 2)
                    .map(String::as_str)
                    .collect();
                expense(&i.to_string(), (i as i64) * 997 + 1, payer, &split)
            })
            .collect();

        let balances = compute_balances(&group, &expenses).unwrap();
        assert_eq!(total(&balances), 0);
    }

    #[test]
    fn expense_order_does_not_matter() {
        let group = members(&["a", "b", "c"]);
        let mut expenses = vec![
            expense("1", 1000, "a", &["a", "b", "c"]),
            expense("2", 701, "b", &["a", "c"]),
            expense("3", 55, "c", &["b"]),
            expense("4", 10, "a", &["c", "b", "a"]),
        ];
        let forward = compute_balances(&group, &expenses).unwrap();
        expenses.reverse();
        let backward = compute_balances(&group, &expenses).unwrap();
        expenses.swap(0, 2);
        let shuffled = compute_balances(&group, &expenses).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
        assert_eq!(total(&forward), 0);
    }

    #[test]
    fn unknown_payer_is_rejected() {
        let err = compute_balances(
            &members(&["a", "b"]),
            &[
                expense("ok", 100, "a", &["a", "b"]),
                expense("bad", 100, "x", &["a"]),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SplitError::InvalidReference {
                expense: "bad".to_string(),
                member: "x".to_string(),
            }
        );
    }

    #[test]
    fn unknown_participant_is_rejected() {
        let err = compute_balances(&members(&["a"]), &[expense("bad", 100, "a", &["a", "y"])])
            .unwrap_err();
        assert!(matches!(err, SplitError::InvalidReference { member, .. } if member == "y"));
    }

    #[test]
    fn empty_split_is_rejected() {
        let err = compute_balances(&members(&["a"]), &[expense("void", 100, "a", &[])])
            .unwrap_err();
        assert_eq!(err, SplitError::EmptySplit("void".to_string()));
        assert!(expense_shares(&expense("void", 100, "a", &[])).is_err());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let err = compute_balances(&members(&["a"]), &[expense("refund", -5, "a", &["a"])])
            .unwrap_err();
        assert_eq!(
            err,
            SplitError::NegativeAmount {
                expense: "refund".to_string(),
                amount: Cents::new(-5),
            }
        );
    }

    #[test]
    fn extreme_balances_still_cancel_out() {
        let balances = compute_balances(
            &members(&["a", "b", "c", "d"]),
            &[
                expense("1", i64::MAX, "a", &["c"]),
                expense("2", i64::MAX, "b", &["d"]),
            ],
        )
        .unwrap();
        assert_eq!(balances["d"], Cents::new(-i64::MAX));
        assert_eq!(total(&balances), 0);
    }

    #[test]
    fn overflow_is_reported() {
        let err = compute_balances(
            &members(&["a", "b"]),
            &[
                expense("1", i64::MAX, "a", &["b"]),
                expense("2", 1, "a", &["b"]),
            ],
        )
        .unwrap_err();
        assert_eq!(err, SplitError::Overflow);
    }
}
