//! Reference domain types shared by the resolver, the diff engine and the
//! transports.
//!
//! Reference names are slash-delimited namespace paths (`refs/heads/main`).
//! Targets are opaque: the mirror never interprets a hash beyond comparing
//! names, so [`ObjectId`] is kept as the transport reported it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A fully qualified reference name, e.g. `refs/heads/main` or `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RefName(pub String);

impl RefName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this name starts with `prefix`. Every name has the empty prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RefName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RefName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An opaque content hash as reported by the repository or the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefTarget {
    /// Points directly at an object.
    Direct(ObjectId),
    /// Points at another reference (`HEAD -> refs/heads/master`).
    Symbolic(RefName),
}

/// A named pointer held by one repository view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub name: RefName,
    pub target: RefTarget,
}

impl Reference {
    pub fn direct(name: impl Into<RefName>, id: impl Into<ObjectId>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Direct(id.into()),
        }
    }

    pub fn symbolic(name: impl Into<RefName>, target: impl Into<RefName>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Symbolic(target.into()),
        }
    }

    /// The object id when this is a direct reference.
    pub fn object_id(&self) -> Option<&ObjectId> {
        match &self.target {
            RefTarget::Direct(id) => Some(id),
            RefTarget::Symbolic(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RefSpecs
// ---------------------------------------------------------------------------

/// Pattern that maps every reference onto itself.
pub const MIRROR_PATTERN: &str = "refs/*";

/// A push/fetch directive in `src:dst` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefSpec {
    /// Map `src` onto `dst`. Patterns may carry a trailing `*`.
    Update { src: String, dst: String },
    /// Remove `dst` from the remote (empty source side).
    Delete { dst: RefName },
}

impl RefSpec {
    /// `refs/*:refs/*`, the refspec that mirrors every reference.
    pub fn mirror() -> Self {
        RefSpec::Update {
            src: MIRROR_PATTERN.to_string(),
            dst: MIRROR_PATTERN.to_string(),
        }
    }

    pub fn delete(name: impl Into<RefName>) -> Self {
        RefSpec::Delete { dst: name.into() }
    }

    /// Destination side of the refspec.
    pub fn destination(&self) -> &str {
        match self {
            RefSpec::Update { dst, .. } => dst,
            RefSpec::Delete { dst } => dst.as_str(),
        }
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSpec::Update { src, dst } => write!(f, "{src}:{dst}"),
            RefSpec::Delete { dst } => write!(f, ":{dst}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
