use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::time_interval::RepeatRule;
use crate::currency::Amount;
use crate::errors::Result;

/// Planned amount for an income or expense account, repeating on a rule.
///
/// Budgets only project; they never create transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Budget {
    pub id: Uuid,
    pub account: Uuid,
    /// Balance-sheet account the money is expected to flow through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Uuid>,
    pub amount: Amount,
    pub rule: RepeatRule,
    #[serde(default)]
    pub notes: String,
}

/// One period of a budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetProjection {
    pub budget_id: Uuid,
    pub date: NaiveDate,
    pub amount: Amount,
}

impl Budget {
    pub fn new(account: Uuid, target: Option<Uuid>, amount: Amount, rule: RepeatRule) -> Self {
        Self {
            id: Uuid::new_v4(),
            account,
            target,
            amount,
            rule,
            notes: String::new(),
        }
    }

    /// Projections for every occurrence in `[from, to)`.
    pub fn projections(&self, from: NaiveDate, to: NaiveDate) -> Vec<BudgetProjection> {
        self.rule
            .occurrences_between(from, to)
            .into_iter()
            .map(|date| BudgetProjection {
                budget_id: self.id,
                date,
                amount: self.amount.clone(),
            })
            .collect()
    }

    pub fn total_for(&self, from: NaiveDate, to: NaiveDate) -> Result<Amount> {
        self.projections(from, to)
            .iter()
            .try_fold(Amount::zero(self.amount.currency.clone()), |total, projection| {
                total.checked_add(&projection.amount)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::ledger::time_interval::RepeatType;
    use rust_decimal_macros::dec;

    #[test]
    fn monthly_budget_totals_by_period() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rule = RepeatRule::new(RepeatType::Monthly, 1, start, None).unwrap();
        let budget = Budget::new(
            Uuid::new_v4(),
            None,
            Amount::new(dec!(300), Currency::new("USD")),
            rule,
        );
        let end = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(budget.projections(start, end).len(), 3);
        assert_eq!(
            budget.total_for(start, end).unwrap(),
            Amount::new(dec!(900), Currency::new("USD"))
        );
    }
}
