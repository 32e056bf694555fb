use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    account::{Account, AccountKind, EntryRef, IMBALANCE_ACCOUNT_NAME},
    balancer::TransactionBalancer,
    budget::{Budget, BudgetProjection},
    fields::{self, FieldValue, SplitField, TransactionField},
    recurring::{ScheduleMaterializer, Spawn},
    schedule::{ChangeScope, Schedule},
    transaction::{Split, Transaction},
};
use crate::currency::{Amount, Currency, ExchangeRateProvider};
use crate::errors::{LedgerError, Result};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Change notification queued by every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    AccountChanged(Uuid),
    AccountRemoved(Uuid),
    TransactionChanged(Uuid),
    TransactionRemoved(Uuid),
    ScheduleChanged(Uuid),
    ScheduleRemoved(Uuid),
    ScheduleMaterialized { schedule_id: Uuid, count: usize },
    BudgetChanged(Uuid),
    BudgetRemoved(Uuid),
}

/// What happens to splits pointing at an account that is being removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRemoval {
    /// Fail with `AccountInUse` when anything references the account.
    Reject,
    /// Point every reference at another account.
    Reassign(Uuid),
    /// Move referencing splits to the reserved imbalance account.
    Orphan,
}

/// Input for the common two-legged transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub payee: String,
    pub checkno: String,
    /// Credited account.
    pub from: Option<Uuid>,
    /// Debited account.
    pub to: Option<Uuid>,
    pub amount: Amount,
}

impl NewTransaction {
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: Amount) -> Self {
        Self {
            date,
            description: description.into(),
            payee: String::new(),
            checkno: String::new(),
            from: None,
            to: None,
            amount,
        }
    }

    pub fn from_account(mut self, account: Uuid) -> Self {
        self.from = Some(account);
        self
    }

    pub fn to_account(mut self, account: Uuid) -> Self {
        self.to = Some(account);
        self
    }

    pub fn payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = payee.into();
        self
    }
}

/// The document: accounts, transactions, schedules and budgets.
///
/// All mutations go through this type so account back-references stay in
/// sync and every stored transaction stays balanced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub id: Uuid,
    pub name: String,
    pub native_currency: Currency,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    transactions: Vec<Transaction>,
    #[serde(default)]
    schedules: Vec<Schedule>,
    #[serde(default)]
    budgets: Vec<Budget>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Ledger::schema_version_default")]
    pub schema_version: u8,
    /// Pending change notifications. Every mutation appends here and nothing
    /// trims the queue, so an embedding application must drain it with
    /// [`Ledger::take_events`].
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new(name: impl Into<String>, native_currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            native_currency,
            accounts: Vec::new(),
            transactions: Vec::new(),
            schedules: Vec::new(),
            budgets: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
            events: Vec::new(),
        }
    }

    pub fn balancer<'a>(&'a self, rates: &'a dyn ExchangeRateProvider) -> TransactionBalancer<'a> {
        TransactionBalancer::new(&self.native_currency, rates)
    }

    /// Drains queued change notifications. The queue grows without bound until
    /// this is called.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // Accounts

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.name_matches(name))
    }

    pub fn add_account(
        &mut self,
        name: impl Into<String>,
        kind: AccountKind,
        currency: Option<Currency>,
    ) -> Result<Uuid> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidInput("account name is empty".into()));
        }
        self.ensure_name_available(trimmed, kind, None)?;
        let currency = currency.unwrap_or_else(|| self.native_currency.clone());
        let account = Account::new(trimmed, kind, currency);
        let id = account.id;
        self.accounts.push(account);
        tracing::info!(account = %id, name = trimmed, %kind, "account added");
        self.events.push(LedgerEvent::AccountChanged(id));
        self.touch();
        Ok(id)
    }

    pub fn rename_account(&mut self, id: Uuid, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let kind = self.require_editable_account(id)?.kind;
        self.ensure_name_available(name.trim(), kind, Some(id))?;
        if let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) {
            account.name = name.trim().to_string();
        }
        self.events.push(LedgerEvent::AccountChanged(id));
        self.touch();
        Ok(())
    }

    pub fn set_account_kind(&mut self, id: Uuid, kind: AccountKind) -> Result<()> {
        let name = self.require_editable_account(id)?.name.clone();
        self.ensure_name_available(&name, kind, Some(id))?;
        if let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) {
            account.kind = kind;
        }
        self.events.push(LedgerEvent::AccountChanged(id));
        self.touch();
        Ok(())
    }

    /// Removes an account, dealing with references according to `removal`.
    pub fn remove_account(&mut self, id: Uuid, removal: AccountRemoval) -> Result<()> {
        let account = self.require_account(id)?.clone();
        let references = self.account_reference_count(id);
        let replacement = match removal {
            AccountRemoval::Reject if references > 0 => {
                return Err(LedgerError::AccountInUse {
                    name: account.name,
                    references,
                });
            }
            AccountRemoval::Reject => None,
            AccountRemoval::Reassign(target) => {
                if target == id {
                    return Err(LedgerError::InvalidInput(
                        "cannot reassign an account to itself".into(),
                    ));
                }
                self.require_account(target)?;
                Some(target)
            }
            AccountRemoval::Orphan if references > 0 && account.reserved => {
                return Err(LedgerError::AccountInUse {
                    name: account.name,
                    references,
                });
            }
            AccountRemoval::Orphan if references > 0 => {
                Some(self.imbalance_account_id(account.currency.clone()))
            }
            AccountRemoval::Orphan => None,
        };

        if let Some(target) = replacement {
            for txn in &mut self.transactions {
                for split in &mut txn.splits {
                    if split.account == Some(id) {
                        split.account = Some(target);
                    }
                }
            }
            for schedule in &mut self.schedules {
                for txn in schedule.transactions_mut() {
                    for split in &mut txn.splits {
                        if split.account == Some(id) {
                            split.account = Some(target);
                        }
                    }
                }
            }
        }
        let orphaned = matches!(removal, AccountRemoval::Orphan);
        self.budgets.retain(|budget| !(orphaned && budget.account == id));
        for budget in &mut self.budgets {
            if budget.account == id {
                if let Some(target) = replacement {
                    budget.account = target;
                }
            }
            if budget.target == Some(id) {
                budget.target = replacement.filter(|_| !orphaned);
            }
        }

        self.accounts.retain(|a| a.id != id);
        if let Some(target) = replacement {
            self.rebuild_entries(&[target].into_iter().collect());
            self.events.push(LedgerEvent::AccountChanged(target));
        }
        tracing::info!(account = %id, name = %account.name, ?removal, references, "account removed");
        self.events.push(LedgerEvent::AccountRemoved(id));
        self.touch();
        Ok(())
    }

    /// Id of the reserved account holding orphaned splits, created on demand.
    pub(crate) fn imbalance_account_id(&mut self, currency: Currency) -> Uuid {
        if let Some(account) = self.accounts.iter().find(|a| a.reserved) {
            return account.id;
        }
        let account = Account::imbalance(currency);
        let id = account.id;
        self.accounts.push(account);
        self.events.push(LedgerEvent::AccountChanged(id));
        self.touch();
        id
    }

    /// Drops accounts created during a step that failed afterwards, along with
    /// their queued notifications. Only for accounts nothing refers to yet.
    pub(crate) fn forget_accounts(&mut self, ids: &[Uuid]) {
        if ids.is_empty() {
            return;
        }
        self.accounts.retain(|a| !ids.contains(&a.id));
        self.events.retain(|event| match event {
            LedgerEvent::AccountChanged(id) => !ids.contains(id),
            _ => true,
        });
    }

    /// Splits, schedule splits and budgets that point at `id`.
    pub fn account_reference_count(&self, id: Uuid) -> usize {
        let splits = self
            .account(id)
            .map(|account| account.entries().len())
            .unwrap_or_default();
        let scheduled: usize = self
            .schedules
            .iter()
            .flat_map(|schedule| schedule.transactions())
            .map(|txn| txn.accounts().filter(|account| *account == id).count())
            .sum();
        let budgets = self
            .budgets
            .iter()
            .filter(|b| b.account == id || b.target == Some(id))
            .count();
        splits + scheduled + budgets
    }

    /// Sum of the account's splits in its own currency, converting foreign
    /// splits at their transaction date.
    pub fn account_balance(
        &self,
        id: Uuid,
        until: Option<NaiveDate>,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Amount> {
        let account = self.require_account(id)?;
        let mut total = Amount::zero(account.currency.clone());
        for entry in account.entries() {
            let Some(txn) = self.transaction(entry.transaction_id) else {
                continue;
            };
            if until.is_some_and(|limit| txn.date > limit) {
                continue;
            }
            if let Some(split) = txn.split(entry.split_id) {
                let converted = split.amount.convert_to(&account.currency, txn.date, rates)?;
                total = total.checked_add(&converted)?;
            }
        }
        Ok(Amount::new(total.value, account.currency.clone()))
    }

    // Transactions

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|txn| txn.id == id)
    }

    /// Transactions dated in `[from, to)`, by date.
    pub fn transactions_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Transaction> {
        let mut out: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|txn| txn.date >= from && txn.date < to)
            .collect();
        out.sort_by_key(|txn| txn.date);
        out
    }

    /// Records a from/to transaction: `from` is credited, `to` debited.
    pub fn new_transaction(
        &mut self,
        draft: NewTransaction,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        let (from, to, amount) = if draft.amount.is_negative() {
            (draft.to, draft.from, draft.amount.abs())
        } else {
            (draft.from, draft.to, draft.amount)
        };
        let mut txn = Transaction::with_splits(
            draft.date,
            draft.description,
            vec![
                Split::new(from, -amount.clone()),
                Split::new(to, amount),
            ],
        );
        txn.payee = draft.payee;
        txn.checkno = draft.checkno;
        self.insert_transaction(txn, rates)
    }

    /// Stores an arbitrary transaction after validating its accounts and
    /// balancing it.
    pub fn insert_transaction(
        &mut self,
        txn: Transaction,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        if self.transaction(txn.id).is_some() {
            return Err(LedgerError::InvalidInput(format!(
                "transaction {} already exists",
                txn.id
            )));
        }
        let mut txn = txn;
        self.balancer(rates).balance(&mut txn)?;
        self.validate_accounts(&txn)?;
        let id = txn.id;
        let touched: HashSet<Uuid> = txn.accounts().collect();
        self.transactions.push(txn);
        self.rebuild_entries(&touched);
        tracing::debug!(transaction = %id, "transaction added");
        self.events.push(LedgerEvent::TransactionChanged(id));
        self.touch();
        Ok(id)
    }

    pub fn remove_transaction(&mut self, id: Uuid) -> Result<Transaction> {
        let index = self.transaction_index(id)?;
        if let Some(split) = self.transactions[index].splits.iter().find(|s| s.reconciled) {
            return Err(LedgerError::ReconciledSplitLocked(split.id));
        }
        let txn = self.transactions.remove(index);
        self.rebuild_entries(&txn.accounts().collect());
        self.events.push(LedgerEvent::TransactionRemoved(id));
        self.touch();
        Ok(txn)
    }

    /// Applies `edit` to a copy of the transaction and commits it only when
    /// the edit succeeds and every referenced account exists.
    pub fn edit_transaction<F, R>(
        &mut self,
        id: Uuid,
        rates: &dyn ExchangeRateProvider,
        edit: F,
    ) -> Result<R>
    where
        F: FnOnce(&TransactionBalancer<'_>, &mut Transaction) -> Result<R>,
    {
        let index = self.transaction_index(id)?;
        let mut work = self.transactions[index].clone();
        let result = edit(&self.balancer(rates), &mut work)?;
        self.validate_accounts(&work)?;
        let mut touched: HashSet<Uuid> = self.transactions[index].accounts().collect();
        touched.extend(work.accounts());
        self.transactions[index] = work;
        self.rebuild_entries(&touched);
        self.events.push(LedgerEvent::TransactionChanged(id));
        self.touch();
        Ok(result)
    }

    pub fn set_transaction_amount(
        &mut self,
        id: Uuid,
        amount: Amount,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| balancer.set_amount(txn, amount))
    }

    pub fn set_transaction_currency(
        &mut self,
        id: Uuid,
        currency: Currency,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| balancer.set_currency(txn, currency))
    }

    pub fn set_split_amount(
        &mut self,
        id: Uuid,
        split_id: Uuid,
        amount: Amount,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| {
            balancer.set_split_amount(txn, split_id, amount)
        })
    }

    pub fn add_split(
        &mut self,
        id: Uuid,
        account: Option<Uuid>,
        amount: Amount,
        memo: &str,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        self.edit_transaction(id, rates, |balancer, txn| {
            balancer.add_split(txn, account, amount, memo)
        })
    }

    pub fn delete_split(
        &mut self,
        id: Uuid,
        split_id: Uuid,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| balancer.delete_split(txn, split_id))
    }

    pub fn assign_split_account(
        &mut self,
        id: Uuid,
        split_id: Uuid,
        account: Option<Uuid>,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| {
            balancer.assign_account(txn, split_id, account)
        })
    }

    pub fn set_split_reconciled(
        &mut self,
        id: Uuid,
        split_id: Uuid,
        reconciled: bool,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| {
            balancer.set_reconciled(txn, split_id, reconciled)
        })
    }

    pub fn set_split_field(
        &mut self,
        id: Uuid,
        split_id: Uuid,
        field: SplitField,
        value: FieldValue,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| {
            fields::set_split_field(balancer, txn, split_id, field, value)
        })
    }

    pub fn set_transaction_field(
        &mut self,
        id: Uuid,
        field: TransactionField,
        value: FieldValue,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        self.edit_transaction(id, rates, |balancer, txn| {
            fields::set_transaction_field(balancer, txn, field, value)
        })
    }

    // Schedules

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn schedule(&self, id: Uuid) -> Option<&Schedule> {
        self.schedules.iter().find(|schedule| schedule.id == id)
    }

    pub fn add_schedule(
        &mut self,
        schedule: Schedule,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<Uuid> {
        let mut schedule = schedule;
        let mut template = schedule.template().clone();
        self.balancer(rates).balance(&mut template)?;
        self.validate_accounts(&template)?;
        schedule.set_template(template);
        let id = schedule.id;
        tracing::info!(schedule = %id, rule = %schedule.rule().label(), "schedule added");
        self.schedules.push(schedule);
        self.events.push(LedgerEvent::ScheduleChanged(id));
        self.touch();
        Ok(id)
    }

    pub fn remove_schedule(&mut self, id: Uuid) -> Result<Schedule> {
        let index = self
            .schedules
            .iter()
            .position(|schedule| schedule.id == id)
            .ok_or(LedgerError::ScheduleNotFound(id))?;
        let schedule = self.schedules.remove(index);
        self.events.push(LedgerEvent::ScheduleRemoved(id));
        self.touch();
        Ok(schedule)
    }

    /// Applies `edit` to a copy of the schedule. The template, every global
    /// change and every modified occurrence are balanced before the copy is
    /// committed.
    pub fn edit_schedule<F, R>(
        &mut self,
        id: Uuid,
        rates: &dyn ExchangeRateProvider,
        edit: F,
    ) -> Result<R>
    where
        F: FnOnce(&mut Schedule) -> Result<R>,
    {
        let native = self.native_currency.clone();
        let balancer = TransactionBalancer::new(&native, rates);
        self.update_schedule(id, |schedule| {
            let result = edit(schedule)?;
            for txn in schedule.transactions_mut() {
                balancer.balance(txn)?;
            }
            Ok(result)
        })
    }

    /// Commits `edit` on a copy of the schedule. Callers balance whatever
    /// transactions they hand to the schedule.
    fn update_schedule<F, R>(&mut self, id: Uuid, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Schedule) -> Result<R>,
    {
        let index = self
            .schedules
            .iter()
            .position(|schedule| schedule.id == id)
            .ok_or(LedgerError::ScheduleNotFound(id))?;
        let mut work = self.schedules[index].clone();
        let result = edit(&mut work)?;
        for txn in work.transactions() {
            self.validate_accounts(txn)?;
        }
        self.schedules[index] = work;
        self.events.push(LedgerEvent::ScheduleChanged(id));
        self.touch();
        Ok(result)
    }

    pub fn set_schedule_template(
        &mut self,
        id: Uuid,
        template: Transaction,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        let mut template = template;
        self.balancer(rates).balance(&mut template)?;
        self.update_schedule(id, |schedule| {
            schedule.set_template(template);
            Ok(())
        })
    }

    pub fn delete_schedule_occurrence(&mut self, id: Uuid, date: NaiveDate) -> Result<()> {
        self.update_schedule(id, |schedule| schedule.delete_occurrence(date))
    }

    pub fn reset_schedule_occurrence(&mut self, id: Uuid, date: NaiveDate) -> Result<bool> {
        self.update_schedule(id, |schedule| Ok(schedule.reset_occurrence(date)))
    }

    pub fn set_schedule_stop_date(&mut self, id: Uuid, stop: Option<NaiveDate>) -> Result<()> {
        self.update_schedule(id, |schedule| schedule.set_stop_date(stop))
    }

    /// Saves an edited spawn back into its schedule, either as a one-off
    /// override or as a change for this and every later occurrence.
    pub fn edit_spawn(
        &mut self,
        id: Uuid,
        recurrence_date: NaiveDate,
        edited: Transaction,
        scope: ChangeScope,
        rates: &dyn ExchangeRateProvider,
    ) -> Result<()> {
        let mut edited = edited;
        self.balancer(rates).balance(&mut edited)?;
        self.update_schedule(id, |schedule| match scope {
            ChangeScope::ThisOccurrence => schedule.change_occurrence(recurrence_date, edited),
            ChangeScope::FromThisDateForward => {
                if !schedule.rule().is_occurrence(recurrence_date) {
                    return Err(LedgerError::InvalidInput(format!(
                        "{recurrence_date} is not an occurrence of schedule {id}"
                    )));
                }
                schedule.reset_occurrence(recurrence_date);
                schedule.change_globally(recurrence_date, edited);
                Ok(())
            }
        })
    }

    /// Spawns of every schedule in `[from, to)`.
    pub fn materialize(&mut self, from: NaiveDate, to: NaiveDate) -> Vec<Spawn> {
        let spawns = ScheduleMaterializer::materialize_all(&self.schedules, from, to);
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for spawn in &spawns {
            *counts.entry(spawn.schedule_id).or_default() += 1;
        }
        for schedule in &self.schedules {
            if let Some(count) = counts.get(&schedule.id) {
                self.events.push(LedgerEvent::ScheduleMaterialized {
                    schedule_id: schedule.id,
                    count: *count,
                });
            }
        }
        spawns
    }

    /// Spawns from `today` up to `horizon_days` ahead.
    pub fn upcoming_spawns(&mut self, today: NaiveDate, horizon_days: i64) -> Vec<Spawn> {
        let end = today
            .checked_add_signed(Duration::days(horizon_days.max(0)))
            .unwrap_or(NaiveDate::MAX);
        self.materialize(today, end)
    }

    /// Stored transactions and spawns in `[from, to)`, by date.
    pub fn transactions_with_spawns(&mut self, from: NaiveDate, to: NaiveDate) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions_between(from, to)
            .into_iter()
            .cloned()
            .collect();
        out.extend(
            self.materialize(from, to)
                .into_iter()
                .map(|spawn| spawn.transaction)
                .filter(|txn| txn.date >= from && txn.date < to),
        );
        out.sort_by_key(|txn| txn.date);
        out
    }

    // Budgets

    pub fn budgets(&self) -> &[Budget] {
        &self.budgets
    }

    pub fn budget(&self, id: Uuid) -> Option<&Budget> {
        self.budgets.iter().find(|budget| budget.id == id)
    }

    pub fn add_budget(&mut self, budget: Budget) -> Result<Uuid> {
        let account = self.require_account(budget.account)?;
        if account.kind.is_balance_sheet() {
            return Err(LedgerError::InvalidInput(format!(
                "budgets apply to income or expense accounts, `{}` is {}",
                account.name, account.kind
            )));
        }
        if let Some(target) = budget.target {
            self.require_account(target)?;
        }
        let id = budget.id;
        self.budgets.push(budget);
        self.events.push(LedgerEvent::BudgetChanged(id));
        self.touch();
        Ok(id)
    }

    pub fn remove_budget(&mut self, id: Uuid) -> Result<Budget> {
        let index = self
            .budgets
            .iter()
            .position(|budget| budget.id == id)
            .ok_or(LedgerError::BudgetNotFound(id))?;
        let budget = self.budgets.remove(index);
        self.events.push(LedgerEvent::BudgetRemoved(id));
        self.touch();
        Ok(budget)
    }

    pub fn budget_projections(&self, from: NaiveDate, to: NaiveDate) -> Vec<BudgetProjection> {
        let mut out: Vec<BudgetProjection> = self
            .budgets
            .iter()
            .flat_map(|budget| budget.projections(from, to))
            .collect();
        out.sort_by_key(|projection| projection.date);
        out
    }

    // Consistency

    /// Verifies that every split points at an existing account, that account
    /// back-references match, and that every transaction balances.
    pub fn check_consistency(&self, rates: &dyn ExchangeRateProvider) -> Result<()> {
        self.check_structure()?;
        for txn in &self.transactions {
            let imbalance = txn.imbalance(&self.native_currency, rates)?;
            if !imbalance.is_zero() {
                return Err(LedgerError::Inconsistent(format!(
                    "transaction {} is off by {imbalance}",
                    txn.id
                )));
            }
        }
        Ok(())
    }

    /// Rate-free part of [`Ledger::check_consistency`].
    pub fn check_structure(&self) -> Result<()> {
        let mut names: HashSet<(String, AccountKind)> = HashSet::new();
        for account in &self.accounts {
            if !names.insert((account.name.to_lowercase(), account.kind)) {
                return Err(LedgerError::Inconsistent(format!(
                    "duplicate account `{}`",
                    account.name
                )));
            }
        }
        for txn in &self.transactions {
            for split in &txn.splits {
                if let Some(account) = split.account {
                    let Some(owner) = self.account(account) else {
                        return Err(LedgerError::Inconsistent(format!(
                            "split {} references missing account {account}",
                            split.id
                        )));
                    };
                    let entry = EntryRef {
                        transaction_id: txn.id,
                        split_id: split.id,
                    };
                    if !owner.entries().contains(&entry) {
                        return Err(LedgerError::Inconsistent(format!(
                            "account `{}` is missing entry for split {}",
                            owner.name, split.id
                        )));
                    }
                }
            }
        }
        let expected: usize = self.transactions.iter().map(|t| t.accounts().count()).sum();
        let recorded: usize = self.accounts.iter().map(|a| a.entries().len()).sum();
        if expected != recorded {
            return Err(LedgerError::Inconsistent(format!(
                "{recorded} account entries recorded for {expected} assigned splits"
            )));
        }
        for schedule in &self.schedules {
            for txn in schedule.transactions() {
                if let Some(missing) = txn.accounts().find(|id| self.account(*id).is_none()) {
                    return Err(LedgerError::Inconsistent(format!(
                        "schedule {} references missing account {missing}",
                        schedule.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Recomputes every account's back-references from the transactions.
    pub(crate) fn rebuild_all_entries(&mut self) {
        let all: HashSet<Uuid> = self.accounts.iter().map(|a| a.id).collect();
        self.rebuild_entries(&all);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }

    fn rebuild_entries(&mut self, accounts: &HashSet<Uuid>) {
        let mut order: Vec<&Transaction> = self.transactions.iter().collect();
        order.sort_by_key(|txn| txn.date);
        let mut rebuilt: HashMap<Uuid, Vec<EntryRef>> =
            accounts.iter().map(|id| (*id, Vec::new())).collect();
        for txn in order {
            for split in &txn.splits {
                if let Some(entries) = split.account.and_then(|id| rebuilt.get_mut(&id)) {
                    entries.push(EntryRef {
                        transaction_id: txn.id,
                        split_id: split.id,
                    });
                }
            }
        }
        for account in &mut self.accounts {
            if let Some(entries) = rebuilt.remove(&account.id) {
                account.entries = entries;
            }
        }
    }

    fn require_account(&self, id: Uuid) -> Result<&Account> {
        self.account(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    fn require_editable_account(&self, id: Uuid) -> Result<&Account> {
        let account = self.require_account(id)?;
        if account.reserved {
            return Err(LedgerError::InvalidInput(format!(
                "{} is a reserved account",
                account.name
            )));
        }
        Ok(account)
    }

    fn transaction_index(&self, id: Uuid) -> Result<usize> {
        self.transactions
            .iter()
            .position(|txn| txn.id == id)
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    fn validate_accounts(&self, txn: &Transaction) -> Result<()> {
        match txn.accounts().find(|id| self.account(*id).is_none()) {
            Some(missing) => Err(LedgerError::AccountNotFound(missing.to_string())),
            None => Ok(()),
        }
    }

    fn ensure_name_available(
        &self,
        name: &str,
        kind: AccountKind,
        except: Option<Uuid>,
    ) -> Result<()> {
        let reserved = name.eq_ignore_ascii_case(IMBALANCE_ACCOUNT_NAME);
        let taken = self
            .accounts
            .iter()
            .any(|a| Some(a.id) != except && a.kind == kind && a.name_matches(name));
        if reserved || taken {
            return Err(LedgerError::DuplicateAccount(name.to_string()));
        }
        Ok(())
    }
}
