//! kubecheck-core: the resource health evaluator
//!
//! Filters listed resources, evaluates each one against a check rule and
//! folds the outcomes into a monitoring verdict.

pub mod cert;
pub mod check;
pub mod dns;
pub mod error;
pub mod evaluate;
pub mod filter;
pub mod query;
pub mod resource;
pub mod runner;
pub mod verdict;

pub use check::{CheckConfig, Rule};
pub use error::{CertificateError, QueryError};
pub use filter::{NameFilter, ResourceFilter};
pub use query::{ClusterQuery, HostResolver, ListScope};
pub use resource::*;
pub use runner::run_check;
pub use verdict::{Outcome, Severity, Status, Verdict};
