// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 etldag contributors

//! Step URIs
//!
//! A step is named `<scheme>://<path>`. Most schemes give the path a fixed
//! shape (`channel/namespace/version/short_name` for processed data,
//! `namespace/version/short_name.ext` for snapshots); the rest are opaque.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::{EtlDagError, EtlDagResult};

/// Step URI scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    Snapshot,
    SnapshotPrivate,
    Data,
    DataPrivate,
    Walden,
    Github,
    Etag,
    Export,
    Backport,
    Grapher,
    #[serde(rename = "open_numbers")]
    OpenNumbers,
}

impl Scheme {
    pub const ALL: [Scheme; 11] = [
        Scheme::Snapshot,
        Scheme::SnapshotPrivate,
        Scheme::Data,
        Scheme::DataPrivate,
        Scheme::Walden,
        Scheme::Github,
        Scheme::Etag,
        Scheme::Export,
        Scheme::Backport,
        Scheme::Grapher,
        Scheme::OpenNumbers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::SnapshotPrivate => "snapshot-private",
            Self::Data => "data",
            Self::DataPrivate => "data-private",
            Self::Walden => "walden",
            Self::Github => "github",
            Self::Etag => "etag",
            Self::Export => "export",
            Self::Backport => "backport",
            Self::Grapher => "grapher",
            Self::OpenNumbers => "open_numbers",
        }
    }

    /// Schemes whose steps come from outside the DAG and may be referenced
    /// without a definition
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Self::Snapshot | Self::SnapshotPrivate | Self::Walden | Self::Github | Self::Etag
        )
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::DataPrivate | Self::SnapshotPrivate)
    }

    /// Number of path segments this scheme expects, if it is structured
    fn layout(&self) -> Option<Layout> {
        match self {
            Self::Data | Self::DataPrivate | Self::Export | Self::Grapher | Self::Backport => {
                Some(Layout::Channelled)
            }
            Self::Snapshot | Self::SnapshotPrivate | Self::Walden => Some(Layout::Snapshot),
            Self::Github | Self::Etag | Self::OpenNumbers => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| format!("unknown scheme '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Channelled,
    Snapshot,
}

/// Dataset version as written in a step path
///
/// Variant order is the ordering: any raw string is older than any date, and
/// `latest` is newer than everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    Other(String),
    /// `YYYY` or `YYYY-MM-DD`; a bare year has month and day 0
    Date { year: u16, month: u8, day: u8 },
    Latest,
}

impl Version {
    pub fn parse(s: &str) -> Self {
        if s == "latest" {
            return Self::Latest;
        }

        let all_digits = |part: &str, len: usize| {
            part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
        };

        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [year] if all_digits(year, 4) => Self::Date {
                year: year.parse().unwrap_or_default(),
                month: 0,
                day: 0,
            },
            [year, month, day]
                if all_digits(year, 4) && all_digits(month, 2) && all_digits(day, 2) =>
            {
                let month: u8 = month.parse().unwrap_or_default();
                let day: u8 = day.parse().unwrap_or_default();
                if (1..=12).contains(&month) && (1..=31).contains(&day) {
                    Self::Date {
                        year: year.parse().unwrap_or_default(),
                        month,
                        day,
                    }
                } else {
                    Self::Other(s.to_string())
                }
            }
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Date {
                year,
                month: 0,
                day: 0,
            } => write!(f, "{:04}", year),
            Self::Date { year, month, day } => write!(f, "{:04}-{:02}-{:02}", year, month, day),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// The structured part of a step path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepParts {
    /// `garden`, `meadow`, `grapher`, ... (absent for snapshots)
    pub channel: Option<String>,
    pub namespace: String,
    pub version: Version,
    pub short_name: String,
    /// File extension of a snapshot (`csv`, `xlsx.dvc`, ...)
    pub extension: Option<String>,
}

/// A parsed step URI
///
/// Equality, ordering and hashing use the original string only.
#[derive(Debug, Clone)]
pub struct StepUri {
    raw: String,
    scheme: Scheme,
    path: String,
    parts: Option<StepParts>,
}

impl StepUri {
    pub fn parse(uri: &str) -> EtlDagResult<Self> {
        let invalid = |reason: &str| EtlDagError::InvalidStepUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        if uri.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let (scheme, path) = uri
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' separator"))?;
        let scheme: Scheme = scheme.parse().map_err(|e: String| invalid(&e))?;

        if path.is_empty() {
            return Err(invalid("empty path"));
        }
        if path.split('/').any(str::is_empty) {
            return Err(invalid("empty path segment"));
        }

        let parts = scheme.layout().and_then(|layout| Self::split_parts(layout, path));

        Ok(Self {
            raw: uri.to_string(),
            scheme,
            path: path.to_string(),
            parts,
        })
    }

    fn split_parts(layout: Layout, path: &str) -> Option<StepParts> {
        let segments: Vec<&str> = path.split('/').collect();
        match (layout, segments.as_slice()) {
            (Layout::Channelled, [channel, namespace, version, short_name]) => Some(StepParts {
                channel: Some(channel.to_string()),
                namespace: namespace.to_string(),
                version: Version::parse(version),
                short_name: short_name.to_string(),
                extension: None,
            }),
            (Layout::Snapshot, [namespace, version, file]) => {
                let (short_name, extension) = match file.split_once('.') {
                    Some((name, ext)) => (name, Some(ext.to_string())),
                    None => (*file, None),
                };
                Some(StepParts {
                    channel: None,
                    namespace: namespace.to_string(),
                    version: Version::parse(version),
                    short_name: short_name.to_string(),
                    extension,
                })
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Everything after `://`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parts(&self) -> Option<&StepParts> {
        self.parts.as_ref()
    }

    pub fn channel(&self) -> Option<&str> {
        self.parts.as_ref().and_then(|p| p.channel.as_deref())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.namespace.as_str())
    }

    pub fn version(&self) -> Option<&Version> {
        self.parts.as_ref().map(|p| &p.version)
    }

    pub fn short_name(&self) -> Option<&str> {
        self.parts.as_ref().map(|p| p.short_name.as_str())
    }

    pub fn is_source(&self) -> bool {
        self.scheme.is_source()
    }

    pub fn is_private(&self) -> bool {
        self.scheme.is_private()
    }

    /// True when the scheme expects a fixed path shape that this URI lacks
    pub fn is_malformed(&self) -> bool {
        self.scheme.layout().is_some() && self.parts.is_none()
    }

    /// Expected path shape for this scheme, for messages
    pub fn expected_shape(&self) -> Option<&'static str> {
        match self.scheme.layout()? {
            Layout::Channelled => Some("<channel>/<namespace>/<version>/<short_name>"),
            Layout::Snapshot => Some("<namespace>/<version>/<short_name>[.extension]"),
        }
    }
}

impl PartialEq for StepUri {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for StepUri {}

impl Hash for StepUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for StepUri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StepUri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for StepUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StepUri {
    type Err = EtlDagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for StepUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for StepUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
