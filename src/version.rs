//! Module and export versions
//!
//! A version is `major.minor` where either part may be absent. An import
//! without a version sees the newest export; an import with only a major
//! sees the newest minor of that major.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor: Option<u32>,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major: Some(major),
            minor: Some(minor),
        }
    }

    pub const fn major(major: u32) -> Self {
        Self {
            major: Some(major),
            minor: None,
        }
    }

    pub const fn none() -> Self {
        Self {
            major: None,
            minor: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.major.is_none()
    }

    /// Whether an export carrying this version is visible to a request
    /// for `requested`.
    pub fn satisfies(&self, requested: Version) -> bool {
        let Some(major) = self.major else {
            return true;
        };
        let Some(requested_major) = requested.major else {
            return true;
        };
        if major != requested_major {
            return false;
        }
        match requested.minor {
            Some(requested_minor) => self.minor.is_none_or(|minor| minor <= requested_minor),
            None => true,
        }
    }

    /// Preference between two eligible exports; the greater one wins.
    pub fn rank(&self, other: &Version) -> Ordering {
        let key = |v: &Version| (v.major.is_some(), v.major, v.minor.is_some(), v.minor);
        key(self).cmp(&key(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.major, self.minor) {
            (Some(major), Some(minor)) => write!(f, "{}.{}", major, minor),
            (Some(major), None) => write!(f, "{}", major),
            _ => Ok(()),
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Version::none());
        }
        let parse = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| Error::InvalidInput(format!("Invalid version: {}", s)))
        };
        match s.split_once('.') {
            Some((major, minor)) => Ok(Version::new(parse(major)?, parse(minor)?)),
            None => Ok(Version::major(parse(s)?)),
        }
    }
}
