//! Build metadata reported by `version` commands.

use serde::Serialize;
use std::fmt;

/// Immutable description of the running binary.
///
/// Binaries construct one with [`BuildInfo::from_env`] from their own `env!` values
/// and pass it to whatever prints or serves version information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub git_commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: Option<&'static str>,
}

impl BuildInfo {
    #[must_use]
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            git_commit: None,
            build_date: None,
            target: None,
        }
    }

    /// Build info with optional fields taken from compile-time env values
    /// (`POOL_GIT_COMMIT`, `POOL_BUILD_DATE`, `POOL_BUILD_TARGET`), typically
    /// produced by `option_env!` in the calling binary.
    #[must_use]
    pub const fn from_env(
        name: &'static str,
        version: &'static str,
        git_commit: Option<&'static str>,
        build_date: Option<&'static str>,
        target: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            version,
            git_commit,
            build_date,
            target,
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)?;
        if let Some(commit) = self.git_commit {
            write!(f, " ({commit})")?;
        }
        if let Some(date) = self.build_date {
            write!(f, " built {date}")?;
        }
        if let Some(target) = self.target {
            write!(f, " for {target}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn display_includes_only_known_fields() {
        assert_eq!(BuildInfo::new("pool-server", "0.3.0").to_string(), "pool-server 0.3.0");

        let full = BuildInfo::from_env(
            "pool-server",
            "0.3.0",
            Some("abc1234"),
            Some("2026-01-02"),
            Some("x86_64-unknown-linux-gnu"),
        );
        assert_eq!(
            full.to_string(),
            "pool-server 0.3.0 (abc1234) built 2026-01-02 for x86_64-unknown-linux-gnu"
        );
    }
}
