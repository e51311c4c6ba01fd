//! Shared primitives: the parameter store, the global step counter,
//! cooperative cancellation, and wall-clock continuity.

pub mod param_store;
pub mod run_clock;
pub mod step_counter;
pub mod stop_token;

pub use param_store::{param_store, ParamStore, SharedParamStore, StoreError};
pub use run_clock::RunClock;
pub use step_counter::{step_counter, SharedStepCounter, StepCounter};
pub use stop_token::StopToken;
