//! Python virtual environment provisioner.
//!
//! Creates `<base_dir>/<env_name>` with the configured interpreter, then runs
//! the environment's own pip (with an explicit [`layout::Activation`]) to
//! upgrade itself and install a requirements file.

pub mod error;
pub mod interpreter;
pub mod layout;
pub mod log;
pub mod marker;
pub mod provision;
pub mod runner;
pub mod verify;

pub use error::{ProvisionError, Step};
pub use layout::{Activation, EnvState, Shell, VenvLayout};
pub use provision::{ProvisionPlan, ProvisionReport, Provisioner, StepRecord};
pub use runner::{CommandRunner, SystemRunner, ToolInvocation, ToolOutput};
