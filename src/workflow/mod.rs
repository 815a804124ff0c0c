mod ledger;
mod registry;
mod request;
mod status;

pub use ledger::StatusLedger;
pub use registry::{StatusRegistry, Workflow};
pub use request::{Decision, DecisionEvent, RequestState, StatusRequest};
pub use status::{EntityRef, HasStatus, ModelStatus, StatusPatch};
