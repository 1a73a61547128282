use rayon::prelude::*;
use tracing::info;

use crate::errors::{CascadeError, ConfigError};
use crate::params::ParameterMap;

/// A configured, single-threaded unit of work
///
/// `configure` fails when a required parameter is missing; `run` never mutates its input and
/// either returns a complete output container or an error.
pub trait Task: Sized + Sync {
    /// Name used in logs, errors and output container ids
    const NAME: &'static str;

    type Input: Sync;
    type Output: Send;

    fn configure(params: &ParameterMap) -> Result<Self, ConfigError>;

    fn run(&self, input: &Self::Input) -> Result<Self::Output, CascadeError>;

    /// Suffix appended to the id of the container this task produces
    fn suffix() -> String {
        format!("-{}", Self::NAME)
    }
}

/// Runs one configured task over independent inputs on the rayon pool
///
/// # Arguments
///
/// * `task` - the configured task
/// * `inputs` - independent inputs, e.g. one per raw file
///
/// # Returns
///
/// * `Vec<Result<T::Output, CascadeError>>` - one result per input, in input order
pub fn run_parallel<T: Task>(task: &T, inputs: &[T::Input]) -> Vec<Result<T::Output, CascadeError>> {
    info!(task = T::NAME, inputs = inputs.len(), "running task in parallel");
    inputs.par_iter().map(|input| task.run(input)).collect()
}
