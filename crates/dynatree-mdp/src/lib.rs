//! YAML-described Markov decision processes with time-dependent rewards,
//! compiled into an environment model the `dynatree-core` planner can search.

mod builder;
mod compiled;
mod error;
mod io;
mod model;
mod spec;

pub use builder::MdpBuilder;
pub use compiled::{CompiledMdp, StateKey, Step};
pub use error::MdpError;
pub use io::{compile_yaml, load_model, load_yaml, parse_yaml, save_yaml};
pub use model::MdpModel;
pub use spec::{ActionSpec, MdpSpec, OutcomeSpec, StateSpec};
