//! Split editing rules that keep every transaction summing to zero.
//!
//! The first two splits of a transaction are its *main* splits (the from/to
//! pair). With at most two splits the transaction is *simple* and edits mirror
//! onto the other main split. With more than two, discrepancies are absorbed by
//! an unassigned split so that the user's explicit amounts are never silently
//! rewritten.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::transaction::{Split, Transaction, TransactionShape, MAIN_SPLIT_COUNT};
use crate::currency::{Amount, Currency, ExchangeRateProvider};
use crate::errors::{LedgerError, Result};

/// Stateless editor applying balancing rules to a transaction.
///
/// Every operation works on a copy and only replaces the caller's transaction
/// when it succeeds, so a failed edit leaves the transaction untouched.
pub struct TransactionBalancer<'a> {
    native: &'a Currency,
    rates: &'a dyn ExchangeRateProvider,
}

impl<'a> TransactionBalancer<'a> {
    pub fn new(native: &'a Currency, rates: &'a dyn ExchangeRateProvider) -> Self {
        Self { native, rates }
    }

    pub fn native(&self) -> &Currency {
        self.native
    }

    pub fn rates(&self) -> &dyn ExchangeRateProvider {
        self.rates
    }

    /// The amount shown in the transaction's amount column.
    pub fn displayed_amount(&self, txn: &Transaction) -> Result<Amount> {
        txn.amount(self.native, self.rates)
    }

    /// Restores the zero-sum invariant without favouring any split.
    pub fn balance(&self, txn: &mut Transaction) -> Result<()> {
        self.apply(txn, |work| {
            self.absorb(work, None)?;
            neutralize(work);
            Ok(())
        })
    }

    /// Sets the transaction-level amount.
    ///
    /// The sign of `amount` is ignored. A currency other than the reference
    /// currency becomes the transaction's currency and is applied to both main
    /// splits.
    pub fn set_amount(&self, txn: &mut Transaction, amount: Amount) -> Result<()> {
        let amount = amount.abs();
        self.apply(txn, |work| {
            let reference = work.reference_currency(self.native);
            if !amount.is_zero() && amount.currency != reference {
                retag_main_splits(work, &amount.currency)?;
            }
            while work.splits.len() < MAIN_SPLIT_COUNT {
                work.splits
                    .push(Split::unassigned(Amount::zero(amount.currency.clone())));
            }
            let (debit, credit) = main_legs(work);
            match work.shape() {
                TransactionShape::MultiSplit => {
                    // Only the debit main split moves, by the gap between the
                    // displayed amount and the new one.
                    let current = work.amount(self.native, self.rates)?;
                    let reference = work.reference_currency(self.native);
                    let mut delta =
                        Amount::new(amount.value, reference).checked_sub(&current)?;
                    if work.is_multi_currency(self.native) {
                        // The displayed amount averages both main splits.
                        delta.value *= Decimal::TWO;
                    }
                    let leg = work.splits[debit].amount.clone();
                    let change = delta.convert_to(&leg.currency, work.date, self.rates)?;
                    let base = if leg.is_positive() {
                        leg
                    } else {
                        Amount::zero(change.currency.clone())
                    };
                    let updated = base.checked_add(&change)?;
                    if updated.is_negative() {
                        return Err(LedgerError::InvalidAmount(format!(
                            "{} is below the other debits of the transaction",
                            amount
                        )));
                    }
                    write_amount(work, debit, updated)?;
                    let strong = work.splits[debit].id;
                    self.absorb(work, Some(strong))?;
                }
                _ => {
                    write_amount(work, debit, amount.clone())?;
                    write_amount(work, credit, -amount.clone())?;
                    self.absorb(work, None)?;
                }
            }
            neutralize(work);
            Ok(())
        })
    }

    /// Gives the transaction an explicit currency. The main splits are retagged
    /// without conversion and any resulting imbalance is absorbed.
    pub fn set_currency(&self, txn: &mut Transaction, currency: Currency) -> Result<()> {
        self.apply(txn, |work| {
            retag_main_splits(work, &currency)?;
            self.absorb(work, None)?;
            neutralize(work);
            Ok(())
        })
    }

    /// Sets a split's signed amount (debit positive, credit negative) and
    /// rebalances around it.
    pub fn set_split_amount(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        amount: Amount,
    ) -> Result<()> {
        self.apply(txn, |work| {
            let index = editable_index(work, split_id)?;
            let shape = work.shape();
            work.splits[index].amount = amount.clone();
            if shape == TransactionShape::Simple && work.splits.len() == MAIN_SPLIT_COUNT {
                let other = 1 - index;
                let weak = &work.splits[other];
                let mirrors = !weak.reconciled
                    && (weak.amount.is_zero() || weak.amount.currency == amount.currency);
                if mirrors {
                    work.splits[other].amount = -amount.clone();
                }
            }
            self.absorb(work, Some(split_id))?;
            neutralize(work);
            Ok(())
        })
    }

    /// Enters `amount` in the debit column. A negative value is a credit.
    pub fn set_split_debit(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        amount: Amount,
    ) -> Result<()> {
        self.set_split_amount(txn, split_id, amount)
    }

    /// Enters `amount` in the credit column. A negative value is a debit.
    pub fn set_split_credit(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        amount: Amount,
    ) -> Result<()> {
        self.set_split_amount(txn, split_id, -amount)
    }

    /// Appends a split and rebalances. Returns the new split's id.
    ///
    /// On a simple transaction, the main split carrying the same sign gives up
    /// the new split's amount so the opposite leg keeps its value.
    pub fn add_split(
        &self,
        txn: &mut Transaction,
        account: Option<Uuid>,
        amount: Amount,
        memo: impl Into<String>,
    ) -> Result<Uuid> {
        let split = Split::new(account, amount.clone()).with_memo(memo);
        let id = split.id;
        self.apply(txn, |work| {
            let was_simple = work.splits.len() == MAIN_SPLIT_COUNT;
            work.splits.push(split);
            if was_simple && !amount.is_zero() {
                let donor = (0..MAIN_SPLIT_COUNT).find(|&index| {
                    let main = &work.splits[index].amount;
                    !work.splits[index].reconciled
                        && main.currency == amount.currency
                        && main.is_positive() == amount.is_positive()
                        && !main.is_zero()
                        && main.value.abs() >= amount.value.abs()
                });
                if let Some(index) = donor {
                    let reduced = work.splits[index].amount.checked_sub(&amount)?;
                    work.splits[index].amount = reduced;
                }
            }
            self.absorb(work, Some(id))?;
            neutralize(work);
            Ok(())
        })?;
        tracing::debug!(transaction = %txn.id, split = %id, "split added");
        Ok(id)
    }

    /// Removes a split. Remaining splits shift up and the removed value is
    /// carried by an unassigned split.
    pub fn delete_split(&self, txn: &mut Transaction, split_id: Uuid) -> Result<()> {
        self.apply(txn, |work| {
            let index = editable_index(work, split_id)?;
            work.splits.remove(index);
            self.absorb(work, None)?;
            neutralize(work);
            Ok(())
        })
    }

    /// Points a split at an account, or unassigns it with `None`.
    pub fn assign_account(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        account: Option<Uuid>,
    ) -> Result<()> {
        self.apply(txn, |work| {
            let index = editable_index(work, split_id)?;
            work.splits[index].account = account;
            neutralize(work);
            Ok(())
        })
    }

    pub fn set_memo(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        memo: impl Into<String>,
    ) -> Result<()> {
        let memo = memo.into();
        self.apply(txn, |work| {
            let index = editable_index(work, split_id)?;
            work.splits[index].memo = memo;
            Ok(())
        })
    }

    /// Toggles the reconciliation flag. This is the only edit allowed on a
    /// reconciled split.
    pub fn set_reconciled(
        &self,
        txn: &mut Transaction,
        split_id: Uuid,
        reconciled: bool,
    ) -> Result<()> {
        let index = txn
            .split_index(split_id)
            .ok_or_else(|| LedgerError::SplitNotFound(split_id.to_string()))?;
        txn.splits[index].reconciled = reconciled;
        Ok(())
    }

    fn apply<F>(&self, txn: &mut Transaction, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Transaction) -> Result<()>,
    {
        let mut work = txn.clone();
        edit(&mut work)?;
        *txn = work;
        Ok(())
    }

    /// Moves any imbalance onto an unassigned split other than `strong`,
    /// appending one when none can take it.
    fn absorb(&self, work: &mut Transaction, strong: Option<Uuid>) -> Result<()> {
        let imbalance = work.imbalance(self.native, self.rates)?;
        if imbalance.is_zero() {
            return Ok(());
        }
        let reference = imbalance.currency.clone();
        let target = work.splits.iter().rposition(|split| {
            split.is_unassigned()
                && !split.reconciled
                && Some(split.id) != strong
                && (split.amount.is_zero() || split.amount.currency == reference)
        });
        match target {
            Some(index) => {
                let current = work.splits[index].amount.with_currency(reference.clone());
                work.splits[index].amount = current.checked_sub(&imbalance)?;
            }
            None => work.splits.push(Split::unassigned(-imbalance)),
        }
        tracing::debug!(transaction = %work.id, "imbalance absorbed by unassigned split");
        Ok(())
    }
}

/// Drops zero-valued unassigned splits while more than two splits remain.
fn neutralize(work: &mut Transaction) {
    let mut index = work.splits.len();
    while index > 0 && work.splits.len() > MAIN_SPLIT_COUNT {
        index -= 1;
        let split = &work.splits[index];
        if split.is_unassigned() && split.amount.is_zero() && !split.reconciled {
            work.splits.remove(index);
        }
    }
}

/// Indices of the (debit, credit) main splits. Without a signed leg the second
/// split is the debit.
fn main_legs(work: &Transaction) -> (usize, usize) {
    let first = &work.splits[0].amount;
    let second = &work.splits[1].amount;
    if first.is_positive() || second.is_negative() {
        (0, 1)
    } else {
        (1, 0)
    }
}

fn editable_index(work: &Transaction, split_id: Uuid) -> Result<usize> {
    let index = work
        .split_index(split_id)
        .ok_or_else(|| LedgerError::SplitNotFound(split_id.to_string()))?;
    if work.splits[index].reconciled {
        return Err(LedgerError::ReconciledSplitLocked(split_id));
    }
    Ok(index)
}

/// Writes a new amount, refusing to touch a reconciled split unless the value
/// is unchanged.
fn write_amount(work: &mut Transaction, index: usize, amount: Amount) -> Result<()> {
    let split = &mut work.splits[index];
    if split.reconciled {
        if split.amount == amount && split.amount.currency == amount.currency {
            return Ok(());
        }
        return Err(LedgerError::ReconciledSplitLocked(split.id));
    }
    split.amount = amount;
    Ok(())
}

fn retag_main_splits(work: &mut Transaction, currency: &Currency) -> Result<()> {
    let end = work.splits.len().min(MAIN_SPLIT_COUNT);
    for index in 0..end {
        let retagged = work.splits[index].amount.with_currency(currency.clone());
        write_amount(work, index, retagged)?;
    }
    work.currency = Some(currency.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RateBook;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn usd(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value, Currency::new("USD"))
    }

    fn simple() -> Transaction {
        Transaction::with_splits(
            NaiveDate::from_ymd_opt(2010, 2, 20).unwrap(),
            "simple",
            vec![
                Split::new(Some(Uuid::new_v4()), usd(dec!(-42))),
                Split::new(Some(Uuid::new_v4()), usd(dec!(42))),
            ],
        )
    }

    #[test]
    fn editing_main_split_mirrors_the_other() {
        let native = Currency::new("USD");
        let rates = RateBook::new();
        let balancer = TransactionBalancer::new(&native, &rates);
        let mut txn = simple();
        let first = txn.splits[0].id;
        balancer.set_split_credit(&mut txn, first, usd(dec!(50))).unwrap();
        assert_eq!(txn.splits.len(), 2);
        assert_eq!(txn.splits[0].amount, usd(dec!(-50)));
        assert_eq!(txn.splits[1].amount, usd(dec!(50)));
    }

    #[test]
    fn failed_edit_leaves_transaction_untouched() {
        let native = Currency::new("USD");
        let rates = RateBook::new();
        let balancer = TransactionBalancer::new(&native, &rates);
        let mut txn = simple();
        let first = txn.splits[0].id;
        let second = txn.splits[1].id;
        txn.splits[1].reconciled = true;
        let before = txn.clone();
        let err = balancer
            .set_split_amount(&mut txn, first, Amount::new(dec!(10), Currency::new("EUR")))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RateUnavailable { .. }));
        assert_eq!(txn, before);
        assert!(balancer.set_memo(&mut txn, second, "nope").unwrap_err().is_locked());
    }

    #[test]
    fn neutralize_keeps_two_splits() {
        let mut txn = simple();
        txn.splits.push(Split::unassigned(usd(dec!(0))));
        txn.splits[0].account = None;
        txn.splits[0].amount = usd(dec!(0));
        txn.splits[1].account = None;
        txn.splits[1].amount = usd(dec!(0));
        neutralize(&mut txn);
        assert_eq!(txn.splits.len(), 2);
    }

    #[test]
    fn main_legs_default_to_second_as_debit() {
        let mut txn = simple();
        txn.splits[0].amount = usd(dec!(0));
        txn.splits[1].amount = usd(dec!(0));
        assert_eq!(main_legs(&txn), (1, 0));
        assert_eq!(main_legs(&simple()), (1, 0));
        txn.splits[0].amount = usd(dec!(3));
        assert_eq!(main_legs(&txn), (0, 1));
    }
}
