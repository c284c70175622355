// State machine module for automation executions
//
// Every execution record moves pending -> success | failed exactly once. The
// transition table lives in `execution_state_machine`; persistence is the
// automation logger's concern.

pub mod errors;
pub mod events;
pub mod execution_state_machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::ExecutionEvent;
pub use execution_state_machine::ExecutionStateMachine;
pub use states::ExecutionStatus;
