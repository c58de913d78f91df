//! Campaign files: named download sets kept as data instead of scripts.
//!
//! ```json
//! {
//!   "save_path": "cmip5_aie/{experiment}/{model}",
//!   "overwrite": true,
//!   "sets": [
//!     { "name": "Set 1 - radiation",
//!       "product": { "group_models": [["MIROC", "MIROC5"]], "experiments": ["sstClim"],
//!                    "freqs": ["mon"], "realms": ["atmos"], "cmor_tables": ["Amon"],
//!                    "ensembles": ["r1i1p1"], "variables": ["rlut", "rsut"] } },
//!     { "name": "Set 2 - rsdscs everywhere",
//!       "discover": { "filter": { "includes": { "experiment": "historicalNat", "freq": "mon" } },
//!                     "variables": ["rsdscs"] } }
//!   ]
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::fetcher::{FetchSummary, SavePathTemplate};
use crate::filter::SegmentFilter;
use crate::generator::DatasetAxes;
use crate::session::Connect;

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Campaign {
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    pub sets: Vec<CampaignSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignSet {
    pub name: String,
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub product: Option<DatasetAxes>,
    #[serde(default)]
    pub discover: Option<Discovery>,
}

/// Datasets found by walking the archive rather than listed up front.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Discovery {
    #[serde(default)]
    pub filter: SegmentFilter,
    /// Variables to keep; empty keeps every variable found.
    #[serde(default)]
    pub variables: BTreeSet<String>,
}

/// What a set resolves to once validated.
#[derive(Debug, Clone)]
pub enum SetSource<'a> {
    Product(&'a DatasetAxes),
    Discover(&'a Discovery),
}

#[derive(Debug, Clone)]
struct PlannedSet<'a> {
    name: &'a str,
    template: SavePathTemplate,
    overwrite: bool,
    source: SetSource<'a>,
}

impl Campaign {
    pub fn load(path: &Path) -> Result<Self> {
        let campaign_err = |reason: String| Error::Campaign {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| campaign_err(e.to_string()))?;
        let campaign: Campaign =
            serde_json::from_str(&text).map_err(|e| campaign_err(e.to_string()))?;
        campaign.plan().map_err(|e| campaign_err(e.to_string()))?;
        Ok(campaign)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let campaign: Campaign = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid campaign: {}", e)))?;
        campaign.plan()?;
        Ok(campaign)
    }

    fn plan(&self) -> Result<Vec<PlannedSet<'_>>> {
        self.sets
            .iter()
            .map(|set| {
                let source = match (&set.product, &set.discover) {
                    (Some(axes), None) => SetSource::Product(axes),
                    (None, Some(discovery)) => SetSource::Discover(discovery),
                    _ => {
                        return Err(Error::Config(format!(
                            "set {:?} needs exactly one of `product` or `discover`",
                            set.name
                        )));
                    }
                };
                let save_path = set
                    .save_path
                    .as_deref()
                    .or(self.save_path.as_deref())
                    .ok_or_else(|| {
                        Error::Config(format!("set {:?} has no save_path", set.name))
                    })?;
                Ok(PlannedSet {
                    name: &set.name,
                    template: SavePathTemplate::new(save_path)?,
                    overwrite: set.overwrite.unwrap_or(self.overwrite),
                    source,
                })
            })
            .collect()
    }

    /// Runs every set in order. The first failing set stops the campaign.
    pub fn run<C: Connect>(&self, archive: &Archive<C>) -> Result<FetchSummary> {
        let mut total = FetchSummary::default();
        for set in self.plan()? {
            tracing::info!("--- BEGIN {}", set.name);
            let summary = match set.source {
                SetSource::Product(axes) => {
                    archive.fetch(axes.iter(), &set.template, set.overwrite)?
                }
                SetSource::Discover(discovery) => archive.discover_and_fetch(
                    &discovery.filter,
                    &discovery.variables,
                    &set.template,
                    set.overwrite,
                )?,
            };
            tracing::info!("--- END {}", set.name);
            total.merge(summary);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Segment;

    const CAMPAIGN: &str = r#"{
        "save_path": "out/{experiment}/{model}",
        "sets": [
            { "name": "radiation",
              "product": { "group_models": [["MIROC", "MIROC5"], ["NCC", "NorESM1-M"]],
                           "experiments": ["sstClim"], "freqs": ["mon"], "realms": ["atmos"],
                           "cmor_tables": ["Amon"], "ensembles": ["r1i1p1"],
                           "variables": ["rlut", "rsut"] } },
            { "name": "historicalNat", "overwrite": false, "save_path": "chien/{experiment}/{model}",
              "discover": { "filter": { "includes": { "experiment": "historicalNat", "freq": ["mon"] } },
                            "variables": ["rsdscs"] } }
        ]
    }"#;

    #[test]
    fn parses_both_kinds_of_set() {
        let campaign = Campaign::from_json(CAMPAIGN).unwrap();
        assert!(campaign.overwrite);
        let plan = campaign.plan().unwrap();
        assert_eq!(plan.len(), 2);

        match &plan[0].source {
            SetSource::Product(axes) => assert_eq!(axes.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(plan[0].template.as_str(), "out/{experiment}/{model}");
        assert!(plan[0].overwrite);

        match &plan[1].source {
            SetSource::Discover(d) => {
                assert!(d.filter.includes(Segment::Experiment).is_some());
                assert!(d.variables.contains("rsdscs"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!plan[1].overwrite);
        assert_eq!(plan[1].template.as_str(), "chien/{experiment}/{model}");
    }

    #[test]
    fn a_set_needs_exactly_one_source() {
        let text = r#"{ "save_path": "x", "sets": [ { "name": "empty" } ] }"#;
        assert!(matches!(Campaign::from_json(text), Err(Error::Config(_))));
    }

    #[test]
    fn a_set_needs_a_save_path() {
        let text = r#"{ "sets": [ { "name": "s", "discover": {} } ] }"#;
        assert!(Campaign::from_json(text).is_err());
    }

    #[test]
    fn bad_templates_are_caught_before_running() {
        let text = r#"{ "save_path": "{institute}", "sets": [ { "name": "s", "discover": {} } ] }"#;
        assert!(matches!(
            Campaign::from_json(text),
            Err(Error::Template { .. })
        ));
    }
}
