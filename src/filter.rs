//! Include/exclude constraints on the levels of the archive tree.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::grammar::Segment;
use crate::util::segments;

type ValueSets = BTreeMap<Segment, BTreeSet<String>>;

/// Decides whether a (base-relative) directory path is worth descending into.
///
/// A segment absent from both maps is unconstrained. The filter is built once
/// per walk and never changes while the walk runs.
///
/// Only the seven hierarchy levels are consulted. Variables are picked after
/// the walk, so constraints on `variable` are refused when parsing input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFilter")]
pub struct SegmentFilter {
    includes: ValueSets,
    excludes: ValueSets,
}

// Campaign files may give a single value where a list is expected.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_set(self) -> BTreeSet<String> {
        match self {
            OneOrMany::One(v) => BTreeSet::from([v]),
            OneOrMany::Many(v) => v.into_iter().collect(),
        }
    }
}

#[derive(Deserialize)]
struct RawFilter {
    #[serde(default)]
    includes: BTreeMap<Segment, OneOrMany>,
    #[serde(default)]
    excludes: BTreeMap<Segment, OneOrMany>,
}

impl TryFrom<RawFilter> for SegmentFilter {
    type Error = Error;

    fn try_from(raw: RawFilter) -> Result<Self> {
        let sets = |m: BTreeMap<Segment, OneOrMany>| {
            m.into_iter()
                .map(|(k, v)| check_level(k).map(|k| (k, v.into_set())))
                .collect::<Result<ValueSets>>()
        };
        Ok(Self {
            includes: sets(raw.includes)?,
            excludes: sets(raw.excludes)?,
        })
    }
}

fn check_level(segment: Segment) -> Result<Segment> {
    if Segment::HIERARCHY.contains(&segment) {
        Ok(segment)
    } else {
        Err(Error::Config(format!(
            "cannot filter on {segment}; select variables with the `variables` list instead"
        )))
    }
}

impl SegmentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, segment: Segment, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes
            .entry(segment)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, segment: Segment, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes
            .entry(segment)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn includes(&self, segment: Segment) -> Option<&BTreeSet<String>> {
        self.includes.get(&segment)
    }

    pub fn excludes(&self, segment: Segment) -> Option<&BTreeSet<String>> {
        self.excludes.get(&segment)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Returns `true` if this is an acceptable path.
    ///
    /// The candidate is zipped positionally against the seven hierarchy
    /// levels; extra segments are ignored. An empty candidate is always
    /// accepted so unparsable listings never stop a walk.
    pub fn accepts(&self, candidate: &str) -> bool {
        let bits: Vec<(Segment, &str)> = Segment::HIERARCHY
            .into_iter()
            .zip(segments(candidate))
            .collect();

        // Deepest level first, so the most specific constraint is the one reported.
        for &(segment, value) in bits.iter().rev() {
            if !self.accepts_value(segment, value) {
                tracing::debug!("filtered out {} ({}={})", candidate, segment, value);
                return false;
            }
        }
        true
    }

    fn accepts_value(&self, segment: Segment, value: &str) -> bool {
        if let Some(allowed) = self.includes.get(&segment) {
            if !allowed.contains(value) {
                return false;
            }
        }
        if let Some(forbidden) = self.excludes.get(&segment) {
            if forbidden.contains(value) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for SegmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_sets(f: &mut fmt::Formatter<'_>, sets: &ValueSets) -> fmt::Result {
            f.write_str("{")?;
            for (i, (seg, values)) in sets.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {:?}", seg, values)?;
            }
            f.write_str("}")
        }

        f.write_str("SegmentFilter(includes=")?;
        write_sets(f, &self.includes)?;
        f.write_str(", excludes=")?;
        write_sets(f, &self.excludes)?;
        f.write_str(")")
    }
}

/// Parses a command-line constraint such as `model=MIROC5,NorESM1-M`.
pub fn parse_constraint(s: &str) -> Result<(Segment, Vec<String>)> {
    let (name, values) = s.split_once('=').ok_or_else(|| {
        Error::Config(format!(
            "invalid constraint {:?} (expected <segment>=<value>[,<value>...])",
            s
        ))
    })?;
    let segment = check_level(name.trim().parse()?)?;
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(Error::Config(format!("constraint {:?} has no values", s)));
    }
    Ok((segment, values))
}
