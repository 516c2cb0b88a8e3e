//! Domain models for the clinic patient flow.

mod attendance;
mod catalog;
mod flow;
mod history;
mod odontogram;
mod patient;
mod referral;
mod specialty;
mod triage;

pub use attendance::*;
pub use catalog::*;
pub use flow::*;
pub use history::*;
pub use odontogram::*;
pub use patient::*;
pub use referral::*;
pub use specialty::*;
pub use triage::*;
