use std::{collections::BTreeMap, mem::swap};

use serde::{Deserialize, Serialize};

use crate::{
    balance::{compute_balances, expense_shares, Balances},
    error::SplitError,
    money::Cents,
    schemas::{Expense, MemberId},
};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Cents,
}

#[derive(Clone, Debug)]
struct PersonalBalance {
    id: MemberId,
    // Always positive: what is still owed to, or by, this member.
    amount: Cents,
}

/// Turns balances into transfers that bring everyone back to zero.
///
/// The largest creditor is repeatedly paid by the largest debtor until
/// nobody is owed anything. Ties on the amount go to the smaller member id,
/// which makes the result reproducible. Produces at most `n - 1` transfers
/// for `n` members with a non-zero balance.
pub fn settle_up(balances: &Balances) -> Result<Vec<Transfer>, SplitError> {
    // Partial sums of valid balances can leave the i64 range.
    let total: i128 = balances.values().map(|b| i128::from(b.cents())).sum();
    if total != 0 {
        let off_by = i64::try_from(total).map_err(|_| SplitError::Overflow)?;
        return Err(SplitError::Unbalanced(Cents::new(off_by)));
    }

    let mut creditors = Vec::new();
    let mut debtors = Vec::new();
    for (id, balance) in balances {
        let person = PersonalBalance {
            id: id.clone(),
            amount: balance.checked_abs().ok_or(SplitError::Overflow)?,
        };
        if balance.is_positive() {
            creditors.push(person);
        } else if balance.is_negative() {
            debtors.push(person);
        }
    }

    let mut transfers = Vec::with_capacity(creditors.len() + debtors.len());
    while let (Some(c), Some(d)) = (largest(&creditors), largest(&debtors)) {
        let amount = creditors[c].amount.min(debtors[d].amount);
        transfers.push(Transfer {
            from: debtors[d].id.clone(),
            to: creditors[c].id.clone(),
            amount,
        });

        // `amount` is the smaller of two non-negative values.
        let remaining = |person: &PersonalBalance| {
            person.amount.checked_sub(amount).ok_or(SplitError::Overflow)
        };
        creditors[c].amount = remaining(&creditors[c])?;
        debtors[d].amount = remaining(&debtors[d])?;
        if creditors[c].amount.is_zero() {
            creditors.swap_remove(c);
        }
        if debtors[d].amount.is_zero() {
            debtors.swap_remove(d);
        }
    }
    Ok(transfers)
}

fn largest(people: &[PersonalBalance]) -> Option<usize> {
    people
        .iter()
        .enumerate()
        .reduce(|best, candidate| {
            let wins = candidate.1.amount > best.1.amount
                || (candidate.1.amount == best.1.amount && candidate.1.id < best.1.id);
            if wins {
                candidate
            } else {
                best
            }
        })
        .map(|(index, _)| index)
}

/// The transfers that would happen without any simplification: every
/// participant pays back each payer directly, netted per pair of members.
pub fn direct_transfers(expenses: &[Expense]) -> Result<Vec<Transfer>, SplitError> {
    // Pairs are stored with the smaller id first; a positive amount means
    // the second member owes the first.
    let mut between_people: BTreeMap<(MemberId, MemberId), Cents> = BTreeMap::new();

    for expense in expenses {
        for (participant, share) in expense_shares(expense)? {
            if participant == expense.paid_by {
                continue;
            }
            let owes_first = expense.paid_by < participant;
            let pair = if owes_first {
                (expense.paid_by.clone(), participant)
            } else {
                (participant, expense.paid_by.clone())
            };
            let entry = between_people.entry(pair).or_insert(Cents::ZERO);
            let updated = if owes_first {
                entry.checked_add(share)
            } else {
                entry.checked_sub(share)
            };
            *entry = updated.ok_or(SplitError::Overflow)?;
        }
    }

    between_people
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|((first, second), amount)| {
            let mut from = second;
            let mut to = first;
            if amount.is_negative() {
                swap(&mut from, &mut to);
            }
            Ok(Transfer {
                from,
                to,
                amount: amount.checked_abs().ok_or(SplitError::Overflow)?,
            })
        })
        .collect()
}

/// Settles the group with whichever of [`settle_up`] and
/// [`direct_transfers`] needs fewer transfers, preferring `settle_up` on a
/// tie.
pub fn suggested_transfers(
    members: &[MemberId],
    expenses: &[Expense],
) -> Result<Vec<Transfer>, SplitError> {
    let simplified = settle_up(&compute_balances(members, expenses)?)?;
    let direct = direct_transfers(expenses)?;

    // Make sure the simplification did not end up more complicated than
    // paying everyone back directly.
    if direct.len() < simplified.len() {
        Ok(direct)
    } else {
        Ok(simplified)
    }
}
