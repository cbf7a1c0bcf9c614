//! Shared-expense groups: exact per-member balances and the transfers that
//! settle them, plus the HTTP service that stores groups.
//!
//! ```rust
//! use settleup::{compute_balances, settle_up, Cents, Expense};
//!
//! let members = vec!["ann".to_string(), "bob".to_string()];
//! let dinner = Expense {
//!     id: "dinner".into(),
//!     description: "Dinner".into(),
//!     amount: Cents::new(30_00),
//!     paid_by: "ann".into(),
//!     split_between: members.clone(),
//!     date: chrono::Utc::now(),
//! };
//!
//! let balances = compute_balances(&members, &[dinner]).unwrap();
//! assert_eq!(balances["bob"], Cents::new(-15_00));
//! let transfers = settle_up(&balances).unwrap();
//! assert_eq!(transfers[0].from, "bob");
//! ```

pub mod auth;
pub mod balance;
pub mod config;
pub mod error;
pub mod exchange;
pub mod money;
pub mod routes;
pub mod schemas;
pub mod store;

pub use balance::{compute_balances, expense_shares, Balances};
pub use error::SplitError;
pub use exchange::{direct_transfers, settle_up, suggested_transfers, Transfer};
pub use money::Cents;
pub use schemas::{parse_members, Expense, Group, MemberId};
