//! Admission decision engine.
//!
//! Evaluates join requests against the membership policy and drives them
//! through decline / re-verify / approve transitions.

pub mod admission;
pub mod evaluator;
pub mod policy;
pub mod prompt;
pub mod scheduler;
pub mod session;

pub use admission::{AdmissionEngine, AdmissionOutcome, VerifyOutcome};
pub use evaluator::{evaluate, Evaluation};
pub use policy::{ChannelRef, MembershipPolicy};
pub use scheduler::ApprovalScheduler;
