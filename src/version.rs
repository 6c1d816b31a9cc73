//! Dotted-numeric version tokens used to name per-version settings directories

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `major.minor[.build[.revision]]` version
///
/// Ordering is component-wise; a missing `build` or `revision` sorts before
/// any present value, so `1.0 < 1.0.0 < 1.0.0.0 < 1.0.0.1`.
///
/// The token remembers the exact text it was parsed from, so a directory
/// named `01.2` is found again under that name.
#[derive(Debug, Clone)]
pub struct VersionToken {
    major: u32,
    minor: u32,
    build: Option<u32>,
    revision: Option<u32>,
    text: String,
}

impl VersionToken {
    /// Parse a version string
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidVersion` unless the string is 2 to 4
    /// dot-separated unsigned integers.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(text.to_string());

        let parts = text
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u32>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<u32>>>()?;

        match parts.as_slice() {
            [major, minor] => Ok(Self::from_parts(*major, *minor, None, None, text)),
            [major, minor, build] => Ok(Self::from_parts(*major, *minor, Some(*build), None, text)),
            [major, minor, build, revision] => Ok(Self::from_parts(
                *major,
                *minor,
                Some(*build),
                Some(*revision),
                text,
            )),
            _ => Err(invalid()),
        }
    }

    fn from_parts(
        major: u32,
        minor: u32,
        build: Option<u32>,
        revision: Option<u32>,
        text: &str,
    ) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
            text: text.to_string(),
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn build(&self) -> Option<u32> {
        self.build
    }

    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// The text this token was parsed from (used as the directory name)
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn sort_key(&self) -> (u32, u32, Option<u32>, Option<u32>) {
        (self.major, self.minor, self.build, self.revision)
    }
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for VersionToken {}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl FromStr for VersionToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
