//! Naming convention of the CMIP5 tree on the CEDA archive.
//!
//! Every dataset lives at
//! `<base>/<group>/<model>/<experiment>/<freq>/<realm>/<cmor_table>/<ensemble>/latest/<variable>`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::util::{join_remote, segments};

/// Path of CMIP5 output on the CEDA FTP server.
pub const CEDA_BASE_PATH: &str = "badc/cmip5/data/cmip5/output1";

/// Directory name marking the current revision of a dataset. Variables live beneath it.
pub const LEAF_MARKER: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Group,
    Model,
    Experiment,
    Freq,
    Realm,
    CmorTable,
    Ensemble,
    Variable,
}

impl Segment {
    /// The seven directory levels above the leaf marker, shallowest first.
    pub const HIERARCHY: [Segment; 7] = [
        Segment::Group,
        Segment::Model,
        Segment::Experiment,
        Segment::Freq,
        Segment::Realm,
        Segment::CmorTable,
        Segment::Ensemble,
    ];

    pub const ALL: [Segment; 8] = [
        Segment::Group,
        Segment::Model,
        Segment::Experiment,
        Segment::Freq,
        Segment::Realm,
        Segment::CmorTable,
        Segment::Ensemble,
        Segment::Variable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Group => "group",
            Segment::Model => "model",
            Segment::Experiment => "experiment",
            Segment::Freq => "freq",
            Segment::Realm => "realm",
            Segment::CmorTable => "cmor_table",
            Segment::Ensemble => "ensemble",
            Segment::Variable => "variable",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Segment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Segment::ALL
            .into_iter()
            .find(|seg| seg.as_str() == s)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown segment name {:?} (expected one of: {})",
                    s,
                    Segment::ALL.map(Segment::as_str).join(", ")
                ))
            })
    }
}

/// Position-wise layout below the base path. `None` is the leaf marker slot.
const LAYOUT: [Option<Segment>; 9] = [
    Some(Segment::Group),
    Some(Segment::Model),
    Some(Segment::Experiment),
    Some(Segment::Freq),
    Some(Segment::Realm),
    Some(Segment::CmorTable),
    Some(Segment::Ensemble),
    None,
    Some(Segment::Variable),
];

const MARKER_POSITION: usize = 7;

/// The complete set of segment values identifying one downloadable dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub group: String,
    pub model: String,
    pub experiment: String,
    pub freq: String,
    pub realm: String,
    pub cmor_table: String,
    pub ensemble: String,
    pub variable: String,
}

impl DatasetDescriptor {
    pub fn get(&self, segment: Segment) -> &str {
        match segment {
            Segment::Group => &self.group,
            Segment::Model => &self.model,
            Segment::Experiment => &self.experiment,
            Segment::Freq => &self.freq,
            Segment::Realm => &self.realm,
            Segment::CmorTable => &self.cmor_table,
            Segment::Ensemble => &self.ensemble,
            Segment::Variable => &self.variable,
        }
    }
}

impl fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}/{}/{}",
            self.group,
            self.model,
            self.experiment,
            self.freq,
            self.realm,
            self.cmor_table,
            self.ensemble,
            self.variable
        )
    }
}

/// Best-effort breakdown of a path. Trailing segments missing from the path
/// are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParsedPath {
    values: BTreeMap<Segment, String>,
}

impl ParsedPath {
    pub fn get(&self, segment: Segment) -> Option<&str> {
        self.values.get(&segment).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == Segment::ALL.len()
    }

    /// Builds a descriptor when every segment is present.
    pub fn to_descriptor(&self) -> Option<DatasetDescriptor> {
        let get = |seg| self.get(seg).map(str::to_string);
        Some(DatasetDescriptor {
            group: get(Segment::Group)?,
            model: get(Segment::Model)?,
            experiment: get(Segment::Experiment)?,
            freq: get(Segment::Freq)?,
            realm: get(Segment::Realm)?,
            cmor_table: get(Segment::CmorTable)?,
            ensemble: get(Segment::Ensemble)?,
            variable: get(Segment::Variable)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathGrammar {
    base: String,
}

impl Default for PathGrammar {
    fn default() -> Self {
        Self::new(CEDA_BASE_PATH)
    }
}

impl PathGrammar {
    pub fn new(base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self {
            base: base.trim_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Strips the base path, if present, leaving the convention-named part.
    pub fn relative<'a>(&self, path: &'a str) -> &'a str {
        let path = path.trim_start_matches('/');
        if self.base.is_empty() {
            return path;
        }
        match path.strip_prefix(self.base.as_str()) {
            Some("") => "",
            Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => path,
        }
    }

    /// Lenient parse: zips segments positionally against the layout, drops
    /// the marker slot and ignores anything past the variable.
    pub fn parse(&self, path: &str) -> ParsedPath {
        let values = LAYOUT
            .iter()
            .zip(segments(self.relative(path)))
            .filter_map(|(name, value)| name.map(|seg| (seg, value.to_string())))
            .collect();
        ParsedPath { values }
    }

    /// Strict parse: the path must name exactly one dataset below the marker.
    pub fn descriptor(&self, path: &str) -> Result<DatasetDescriptor> {
        let parts: Vec<&str> = segments(self.relative(path)).collect();
        if parts.len() != LAYOUT.len() {
            return Err(Error::MalformedPath {
                path: path.to_string(),
                reason: format!(
                    "expected {} segments below the base path, found {}",
                    LAYOUT.len(),
                    parts.len()
                ),
            });
        }
        if parts[MARKER_POSITION] != LEAF_MARKER {
            return Err(Error::MalformedPath {
                path: path.to_string(),
                reason: format!(
                    "expected {:?} at position {}, found {:?}",
                    LEAF_MARKER,
                    MARKER_POSITION + 1,
                    parts[MARKER_POSITION]
                ),
            });
        }
        self.parse(path).to_descriptor().ok_or_else(|| Error::MalformedPath {
            path: path.to_string(),
            reason: "incomplete dataset path".to_string(),
        })
    }

    /// Remote directory holding the files of one dataset.
    pub fn build(&self, d: &DatasetDescriptor) -> String {
        let rel = [
            d.group.as_str(),
            d.model.as_str(),
            d.experiment.as_str(),
            d.freq.as_str(),
            d.realm.as_str(),
            d.cmor_table.as_str(),
            d.ensemble.as_str(),
            LEAF_MARKER,
            d.variable.as_str(),
        ]
        .join("/");
        join_remote(&self.base, &rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn miroc() -> DatasetDescriptor {
        DatasetDescriptor {
            group: "MIROC".into(),
            model: "MIROC5".into(),
            experiment: "sstClim".into(),
            freq: "mon".into(),
            realm: "aerosol".into(),
            cmor_table: "aero".into(),
            ensemble: "r1i1p1".into(),
            variable: "cldncl".into(),
        }
    }

    #[test]
    fn build_follows_archive_convention() {
        let grammar = PathGrammar::default();
        assert_eq!(
            grammar.build(&miroc()),
            "badc/cmip5/data/cmip5/output1/MIROC/MIROC5/sstClim/mon/aerosol/aero/r1i1p1/latest/cldncl"
        );
    }

    #[test]
    fn parse_inverts_build() {
        for base in [CEDA_BASE_PATH, "root", ""] {
            let grammar = PathGrammar::new(base);
            let d = miroc();
            assert_eq!(grammar.descriptor(&grammar.build(&d)).unwrap(), d);
            assert_eq!(grammar.parse(&grammar.build(&d)).to_descriptor(), Some(d));
        }
    }

    #[test]
    fn parse_of_relative_leaf_path() {
        let grammar = PathGrammar::default();
        let parsed = grammar.parse("MRI/MRI-CGCM3/piControl/mon/atmos/cfMon/r1i1p1/latest/pctisccp");
        assert!(parsed.is_complete());
        assert_eq!(parsed.get(Segment::CmorTable), Some("cfMon"));
        assert_eq!(parsed.get(Segment::Variable), Some("pctisccp"));
    }

    #[test]
    fn short_paths_parse_partially() {
        let grammar = PathGrammar::new("root");
        let parsed = grammar.parse("root/G/M/EXP");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.get(Segment::Experiment), Some("EXP"));
        assert_eq!(parsed.get(Segment::Freq), None);
        assert!(!parsed.is_complete());
        assert!(grammar.parse("").is_empty());
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"group":"G","model":"M","experiment":"EXP"}"#
        );
    }

    #[test]
    fn strict_descriptor_rejects_short_and_misplaced_marker() {
        let grammar = PathGrammar::new("root");
        assert!(matches!(
            grammar.descriptor("root/G/M/EXP"),
            Err(Error::MalformedPath { .. })
        ));
        assert!(matches!(
            grammar.descriptor("root/G/M/EXP/mon/atmos/Amon/r1i1p1/v2/varA"),
            Err(Error::MalformedPath { .. })
        ));
    }

    #[test]
    fn relative_only_strips_whole_base_segments() {
        let grammar = PathGrammar::new("root");
        assert_eq!(grammar.relative("root/G/M"), "G/M");
        assert_eq!(grammar.relative("root"), "");
        assert_eq!(grammar.relative("rootless/G"), "rootless/G");
    }

    #[test]
    fn segment_names_round_trip_through_from_str() {
        for seg in Segment::ALL {
            assert_eq!(seg.as_str().parse::<Segment>().unwrap(), seg);
        }
        assert!("latest".parse::<Segment>().is_err());
    }
}
