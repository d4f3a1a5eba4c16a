//! Quality metrics: churn, bugs, code movement, coverage, meaningful code.

pub mod bugs;
pub mod code_churn;
pub mod code_movement;
pub mod meaningful_code;
pub mod test_doc;
