//! Ledger domain models: accounts, balanced transactions, schedules and budgets.

pub mod account;
pub mod balancer;
pub mod budget;
pub mod fields;
#[allow(clippy::module_inception)]
pub mod ledger;
pub mod recurring;
pub mod schedule;
pub mod time_interval;
pub mod transaction;

pub use account::{Account, AccountKind, EntryRef, IMBALANCE_ACCOUNT_NAME};
pub use balancer::TransactionBalancer;
pub use budget::{Budget, BudgetProjection};
pub use fields::{FieldValue, SplitField, TransactionField};
pub use ledger::{AccountRemoval, Ledger, LedgerEvent, NewTransaction, CURRENT_SCHEMA_VERSION};
pub use recurring::{spawn_id, ScheduleMaterializer, Spawn, SpawnOrigin};
pub use schedule::{ChangeScope, Schedule, ScheduleException};
pub use time_interval::{RepeatRule, RepeatType};
pub use transaction::{Split, Transaction, TransactionShape};
