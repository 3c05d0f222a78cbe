/// Name of the environment variable that sets the default for
/// [`DistributionOptions::validate_args`](crate::DistributionOptions::validate_args).
pub const VALIDATE_ARGS_VAR: &str = "RTEN_PROB_VALIDATE_ARGS";

/// Interpret a string value such as "1" or "no" as a boolean.
pub fn str_as_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Return whether a feature flag controlled by an environment variable is
/// enabled.
pub fn env_flag(name: &str, default: bool) -> bool {
    let Ok(value) = std::env::var(name) else {
        return default;
    };
    str_as_bool(&value).unwrap_or_else(|| {
        log::warn!("Unrecognized boolean value \"{}\" for {}", value, name);
        default
    })
}
