//! End-to-end tests: history → regime → sweep → publish → decide → settle.

mod common;
mod decision_flow;
mod tuning;
