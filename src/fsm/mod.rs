//! Agent state machine
//!
//! - `state`: the closed set of states and the legal transition table
//! - `machine`: per-agent machine that rejects illegal requests
//! - `decision`: the per-tick rule list choosing a desired state
//! - `setup`: entry/exit hooks (patrol loops, flee targets, search patterns)

pub mod decision;
pub mod machine;
pub mod setup;
pub mod state;

pub use decision::{decide, select_state, DecisionInputs, StateContext};
pub use machine::{StateMachine, Transition};
pub use setup::{compute_retreat_target, generate_patrol_route, generate_search_route, on_enter, on_exit};
pub use state::{next_hop, AgentState};
