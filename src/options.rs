use crate::env::{VALIDATE_ARGS_VAR, env_flag};

/// Options which control how a distribution checks its arguments and
/// reports statistics.
///
/// ```
/// use rten_prob::DistributionOptions;
///
/// let mut opts = DistributionOptions::default();
/// opts.validate_args(true).name("reshaped");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionOptions {
    pub(crate) validate_args: bool,
    pub(crate) allow_nan_stats: bool,
    pub(crate) name: Option<String>,
}

impl DistributionOptions {
    /// Create options with argument validation disabled and NaN statistics
    /// allowed, ignoring the environment.
    pub fn new() -> DistributionOptions {
        DistributionOptions {
            validate_args: false,
            allow_nan_stats: true,
            name: None,
        }
    }

    /// Set whether arguments are checked.
    ///
    /// When disabled, invalid arguments may produce incorrect results rather
    /// than errors. Checks which can be performed statically at construction
    /// are always done.
    pub fn validate_args(&mut self, enable: bool) -> &mut Self {
        self.validate_args = enable;
        self
    }

    /// Set whether statistics which are undefined for some batch members are
    /// reported as NaN. If false, an error is returned instead.
    pub fn allow_nan_stats(&mut self, allow: bool) -> &mut Self {
        self.allow_nan_stats = allow;
        self
    }

    /// Set the name of the distribution.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_validating(&self) -> bool {
        self.validate_args
    }

    pub fn allows_nan_stats(&self) -> bool {
        self.allow_nan_stats
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for DistributionOptions {
    /// Create default options.
    ///
    /// Argument validation is enabled if the `RTEN_PROB_VALIDATE_ARGS`
    /// environment variable is set to a true value.
    fn default() -> Self {
        let mut opts = DistributionOptions::new();
        opts.validate_args(env_flag(VALIDATE_ARGS_VAR, false));
        opts
    }
}
