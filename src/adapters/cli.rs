use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::warn;

/// Upper bound on `argv` entries, including the leading `php`.
pub const MAX_ARGV: usize = 127;

/// An `artisan` invocation requested by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementCommand {
    args: Vec<String>,
    env_vars: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
}

impl ManagementCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a command line on spaces. Runs of spaces produce no empty
    /// arguments; tokens beyond [`MAX_ARGV`] are dropped.
    #[must_use]
    pub fn parse(command_line: &str) -> Self {
        Self::new().with_args(command_line.split(' ').filter(|t| !t.is_empty()))
    }

    #[must_use]
    pub fn with_arg(mut self, s: impl Into<String>) -> Self {
        if self.args.len() + 1 >= MAX_ARGV {
            #[cfg(feature = "tracing")]
            warn!(max = MAX_ARGV, "Too many command arguments, dropping extra");
            return self;
        }
        self.args.push(s.into());
        self
    }

    #[must_use]
    pub fn with_args<I, S>(self, iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        iter.into_iter()
            .fold(self, |cmd, arg| cmd.with_arg(arg))
    }

    #[must_use]
    pub fn with_env(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.env_vars
            .push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn env_vars(&self) -> &[(String, String)] {
        &self.env_vars
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// `["php", args...]`
    pub fn argv(&self) -> Vec<String> {
        std::iter::once("php".to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}
