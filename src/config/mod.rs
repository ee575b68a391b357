// ABOUTME: Configuration values used while assembling and running plans.
// ABOUTME: Probes, restart policies, unit parsers, execution mode and .env lookup.

mod env;
mod mode;
mod probe;
mod restart_policy;
mod units;

pub use env::{Environment, parse_env_file};
pub use mode::{DESTROY_VAR, DRY_RUN_VAR, Mode};
pub use probe::{HealthProbe, ProbeTarget};
pub use restart_policy::RestartPolicy;
pub use units::{PortMapping, Protocol, parse_cpus, parse_memory};
