use std::path::Path;

use config::Config as eConfig;
use eyre::{bail, Result, WrapErr};
use serde_derive::{Deserialize, Serialize};

use crate::routines::linalg::Float;
use crate::routines::optimization::{LineSearchOptions, NewtonCgOptions};

/// Contains all settings for tncore
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Stopping rules of the Newton-CG solver
    pub solver: Solver,
    /// Parameters of the backtracking line search
    pub line_search: LineSearch,
    /// Configuration of the fitted model
    pub model: Model,
    /// Configuration for logging
    pub log: Log,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        self.line_search.validate()?;
        self.model.validate()?;
        Ok(())
    }

    /// Solver options in the requested precision
    pub fn newton_cg_options<A: Float>(&self) -> NewtonCgOptions<A> {
        NewtonCgOptions {
            tol: A::lit(self.solver.tol),
            max_iter: self.solver.max_iter,
            max_inner: self.solver.max_inner,
            max_descent_attempts: self.solver.max_descent_attempts,
            line_search: self.line_search.options(),
        }
    }
}

/// Stopping rules of the Newton-CG solver
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Solver {
    /// Convergence tolerance on the largest absolute gradient component
    pub tol: f64,
    /// Maximum number of outer (Newton) iterations
    pub max_iter: usize,
    /// Maximum number of conjugate gradient iterations per solve
    pub max_inner: usize,
    /// Number of CG solves attempted per iteration before giving up on finding a descent direction
    pub max_descent_attempts: usize,
}

impl Default for Solver {
    fn default() -> Self {
        Solver {
            tol: 1e-4,
            max_iter: 100,
            max_inner: 100,
            max_descent_attempts: 10,
        }
    }
}

impl Solver {
    pub fn validate(&self) -> Result<()> {
        if !self.tol.is_finite() || self.tol <= 0.0 {
            bail!("The solver tolerance must be positive, got {}", self.tol);
        }
        if self.max_descent_attempts == 0 {
            bail!("The solver needs at least one attempt at finding a descent direction");
        }
        Ok(())
    }
}

/// Parameters of the backtracking line search
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct LineSearch {
    /// First step length tried, usually the full Newton step
    pub alpha0: f64,
    /// Sufficient decrease constant, in (0, 1)
    pub c1: f64,
    /// Factor applied to the step length after a rejected trial, in (0, 1)
    pub shrink: f64,
    /// Maximum number of trial points
    pub max_trials: usize,
}

impl Default for LineSearch {
    fn default() -> Self {
        LineSearch {
            alpha0: 1.0,
            c1: 1e-4,
            shrink: 0.5,
            max_trials: 40,
        }
    }
}

impl LineSearch {
    pub fn validate(&self) -> Result<()> {
        self.options::<f64>().validate()
    }

    pub fn options<A: Float>(&self) -> LineSearchOptions<A> {
        LineSearchOptions {
            alpha0: A::lit(self.alpha0),
            c1: A::lit(self.c1),
            shrink: A::lit(self.shrink),
            max_trials: self.max_trials,
            x_evaluated: true,
        }
    }
}

/// Configuration of the fitted model
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Model {
    /// Whether to fit an intercept, stored first in the parameter vector
    pub fit_intercept: bool,
    /// Strength of the L2 penalty on the coefficients
    pub l2: f64,
}

impl Default for Model {
    fn default() -> Self {
        Model {
            fit_intercept: true,
            l2: 0.0,
        }
    }
}

impl Model {
    pub fn validate(&self) -> Result<()> {
        if !self.l2.is_finite() || self.l2 < 0.0 {
            bail!("The L2 penalty must be non-negative, got {}", self.l2);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct Log {
    /// The maximum log level to display
    ///
    /// Any [tracing_subscriber::EnvFilter] directive is accepted, most commonly one of
    /// - `trace`
    /// - `debug`
    /// - `info`
    /// - `warn`
    /// - `error`
    pub level: String,
    /// Optional file to write the log to, in addition to stdout
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("info"),
            file: None,
        }
    }
}

/// Parses the settings from a TOML configuration file
///
/// Values can be overridden with environment variables prefixed with `TNCORE_`, using a double
/// underscore between the section and the key, e.g. `TNCORE_SOLVER__MAX_ITER=50`.
///
/// # Errors
///
/// Fails if the file cannot be read, contains unknown keys, or holds invalid values.
pub fn read(path: impl Into<String>) -> Result<Settings> {
    let settings_path = path.into();

    let parsed = eConfig::builder()
        .add_source(config::File::with_name(&settings_path).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix("TNCORE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err_with(|| format!("Could not read settings from {}", settings_path))?;

    // Deserialize settings to the Settings struct
    let settings: Settings = parsed.try_deserialize()?;

    // Validate entries
    settings.validate()?;

    Ok(settings)
}

/// Writes a pretty-printed JSON copy of the settings to `path`
pub fn write_settings_to_file(settings: &Settings, path: impl AsRef<Path>) -> Result<()> {
    let serialized = serde_json::to_string_pretty(settings)?;
    std::fs::write(path.as_ref(), serialized)
        .wrap_err_with(|| format!("Could not write settings to {}", path.as_ref().display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let settings = Settings::new();
        settings.validate()?;
        assert_eq!(settings.solver.max_descent_attempts, 10);
        assert_eq!(settings.line_search.max_trials, 40);
        assert!(settings.model.fit_intercept);
        assert_eq!(settings.log.level, "info");
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut settings = Settings::new();
        settings.solver.tol = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::new();
        settings.line_search.c1 = 1.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::new();
        settings.line_search.shrink = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::new();
        settings.line_search.alpha0 = -1.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::new();
        settings.line_search.max_trials = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::new();
        settings.model.l2 = -0.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn converts_to_solver_options() {
        let mut settings = Settings::new();
        settings.solver.tol = 1e-8;
        settings.solver.max_iter = 7;
        settings.line_search.shrink = 0.25;
        let options = settings.newton_cg_options::<f32>();
        assert_eq!(options.tol, 1e-8_f32);
        assert_eq!(options.max_iter, 7);
        assert_eq!(options.line_search.shrink, 0.25_f32);
        assert!(options.line_search.x_evaluated);
    }
}
