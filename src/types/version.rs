use std::fmt;

use crate::error::{Error, Result};

/// A `major.minor` release version, or the unset sentinel when the raw
/// string did not match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version(Option<(u32, u32)>);

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self(Some((major, minor)))
    }

    pub const fn unset() -> Self {
        Self(None)
    }

    /// Parses `<digits>.<digits>`. Anything else, including a missing minor
    /// component, yields the unset version.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::unset();
        };

        let Some((major, minor)) = raw.trim().split_once('.') else {
            return Self::unset();
        };

        match (parse_digits(major), parse_digits(minor)) {
            (Some(major), Some(minor)) => Self::new(major, minor),
            _ => Self::unset(),
        }
    }

    /// Extracts the release from a server version string such as
    /// `P4D/LINUX26X86_64/2023.1/2468153 (2023/06/07)`.
    pub fn from_server_version(raw: &str) -> Self {
        Self::parse(raw.split('/').nth(2))
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    pub const fn major(&self) -> Option<u32> {
        match self.0 {
            Some((major, _)) => Some(major),
            None => None,
        }
    }

    pub const fn minor(&self) -> Option<u32> {
        match self.0 {
            Some((_, minor)) => Some(minor),
            None => None,
        }
    }

    /// Returns true if this version is at least `minimum`.
    ///
    /// An unset `self` never satisfies the check. An unset `minimum` is a
    /// caller error.
    pub fn compare_at_least(&self, minimum: &Version) -> Result<bool> {
        let Some((min_major, min_minor)) = minimum.0 else {
            return Err(Error::InvalidMinimumVersion(minimum.to_string()));
        };

        let Some((major, minor)) = self.0 else {
            return Ok(false);
        };

        if major < min_major {
            return Ok(false);
        }
        if major == min_major && minor < min_minor {
            return Ok(false);
        }
        Ok(true)
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some((major, minor)) => write!(f, "{major}.{minor}"),
            None => Ok(()),
        }
    }
}
