//! The interview session layer over a fact engine: the intercepting fact
//! graph with its save-time corrections, the filing-status clearing policy,
//! the W-2 normalizers and the tax amount change check.

pub mod amount;
pub mod field_clearing;
pub mod interceptor;
pub mod w2;

pub use amount::AmountChange;
pub use field_clearing::{fields_to_clear_on_filing_status_change, CLEARABLE_DEPENDENT_FACTS};
pub use interceptor::InterceptingFactGraph;
