//! Record a failure at the line that saw it, then hand the `Result` back.

use std::fmt::Display;
use std::panic::Location;

pub trait ResultExt<T, E> {
    /// Emit an error event with `context` and the caller's file and line.
    ///
    /// ```ignore
    /// files.put(&handle, &blob).await.log("storing document file")?;
    /// ```
    fn log(self, context: &str) -> Result<T, E>;

    /// Like [`ResultExt::log`] at warn level, for failures the caller falls back from.
    fn log_warn(self, context: &str) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log(self, context: &str) -> Result<T, E> {
        if let Err(err) = &self {
            let location = Location::caller();
            tracing::error!(error = %err, context, %location, "Operation failed");
        }
        self
    }

    #[track_caller]
    fn log_warn(self, context: &str) -> Result<T, E> {
        if let Err(err) = &self {
            let location = Location::caller();
            tracing::warn!(error = %err, context, %location, "Falling back after failure");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passes_through() {
        let result: Result<u64, String> = Ok(3600);
        assert_eq!(result.log("reading lifetime").unwrap(), 3600);
    }

    #[test]
    fn test_err_passes_through() {
        let result: Result<(), &str> = Err("disk full");
        assert_eq!(result.log("writing blob").unwrap_err(), "disk full");

        let result: Result<(), &str> = Err("missing");
        assert!(result.log_warn("loading config").is_err());
    }
}
