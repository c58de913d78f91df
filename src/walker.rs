//! Discovery of dataset leaves in the remote tree.
//!
//! Directory listings are the only metadata available, so the walker relies on
//! two conventions of the archive:
//! - listing a plain file returns that file's own path and nothing else;
//! - a directory holding a `latest` entry is a leaf, and the entries of
//!   `latest` are the variables.
//!
//! Everything above a leaf is pruned with a [`SegmentFilter`] before being
//! listed; an unfiltered walk of the whole archive is impractically slow.

use crate::error::{Error, Result};
use crate::filter::SegmentFilter;
use crate::grammar::{LEAF_MARKER, PathGrammar};
use crate::session::RemoteSession;
use crate::util::{basename, join_remote};

/// What to do with a directory whose listing comes back empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyListing {
    /// Fail the whole walk with [`Error::RemoteListing`].
    #[default]
    Abort,
    /// Log a warning and carry on with the remaining branches.
    Skip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub directories_listed: usize,
    pub files_seen: usize,
    pub pruned: usize,
    pub skipped_empty: usize,
}

pub struct TreeWalker<'a> {
    grammar: &'a PathGrammar,
    filter: &'a SegmentFilter,
    on_empty: EmptyListing,
}

impl<'a> TreeWalker<'a> {
    pub fn new(grammar: &'a PathGrammar, filter: &'a SegmentFilter) -> Self {
        Self {
            grammar,
            filter,
            on_empty: EmptyListing::default(),
        }
    }

    pub fn with_empty_listing(mut self, on_empty: EmptyListing) -> Self {
        self.on_empty = on_empty;
        self
    }

    /// Walks depth-first from `start_path` and returns the full path of every
    /// variable found under a leaf, in listing order.
    pub fn walk<S>(&self, session: &mut S, start_path: &str) -> Result<Vec<String>>
    where
        S: RemoteSession + ?Sized,
    {
        self.walk_with_stats(session, start_path)
            .map(|(leaves, _)| leaves)
    }

    pub fn walk_with_stats<S>(
        &self,
        session: &mut S,
        start_path: &str,
    ) -> Result<(Vec<String>, WalkStats)>
    where
        S: RemoteSession + ?Sized,
    {
        tracing::debug!("walking from {:?} with {}", start_path, self.filter);

        let mut stats = WalkStats::default();
        let mut found = Vec::new();
        let mut pending = vec![start_path.trim_end_matches('/').to_string()];

        while let Some(dir) = pending.pop() {
            let mut entries = session.list(&dir)?;
            entries.sort();
            stats.directories_listed += 1;

            if entries.is_empty() {
                match self.on_empty {
                    EmptyListing::Abort => return Err(Error::RemoteListing { path: dir }),
                    EmptyListing::Skip => {
                        tracing::warn!("empty listing for {}; skipping branch", dir);
                        stats.skipped_empty += 1;
                        continue;
                    }
                }
            }

            // A lone entry naming the queried path means it is a file, not a directory.
            if entries.len() == 1 && entries[0].trim_end_matches('/') == dir {
                tracing::debug!("--- Found a file: {}", dir);
                stats.files_seen += 1;
                continue;
            }

            tracing::debug!("Files/dirs in {}: {:?}", dir, entries);

            if entries.iter().any(|e| basename(e) == LEAF_MARKER) {
                let leaf_dir = join_remote(&dir, LEAF_MARKER);
                tracing::info!("!!! Found a leaf directory - {}", leaf_dir);

                let mut variables = session.list(&leaf_dir)?;
                variables.sort();
                stats.directories_listed += 1;
                if variables.is_empty() {
                    tracing::warn!("leaf directory {} has no variables", leaf_dir);
                }

                for (i, var) in variables.into_iter().enumerate() {
                    tracing::info!("    {}) {}", i + 1, basename(&var));
                    found.push(var);
                }
                continue;
            }

            let before = entries.len();
            let mut children: Vec<String> = entries
                .into_iter()
                .filter(|e| self.filter.accepts(self.grammar.relative(e)))
                .collect();
            stats.pruned += before - children.len();

            // Reversed so that popping visits siblings in listing order.
            children.reverse();
            pending.extend(children);
        }

        tracing::info!(
            "walk of {:?} found {} variable(s) ({} listings, {} pruned)",
            start_path,
            found.len(),
            stats.directories_listed,
            stats.pruned
        );
        Ok((found, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Segment;
    use crate::session::MemoryArchive;
    use pretty_assertions::assert_eq;

    fn tree() -> MemoryArchive {
        MemoryArchive::new()
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varA/a_1.nc", "1")
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varB/b_1.nc", "2")
    }

    #[test]
    fn finds_every_variable_without_filters() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new();
        let mut session = tree().session();
        let leaves = TreeWalker::new(&grammar, &filter)
            .walk(&mut session, "root")
            .unwrap();
        assert_eq!(
            leaves,
            vec![
                "root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varA",
                "root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varB",
            ]
        );
    }

    #[test]
    fn excluded_model_prunes_the_whole_branch() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new().exclude(Segment::Model, ["M"]);
        let archive = tree();
        let mut session = archive.session();
        let leaves = TreeWalker::new(&grammar, &filter)
            .walk(&mut session, "root")
            .unwrap();
        assert!(leaves.is_empty());
        // Only the base and the group were ever listed.
        assert_eq!(archive.listed(), vec!["root", "root/G"]);
    }

    #[test]
    fn a_leaf_reports_every_variable_it_holds() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new().include(Segment::Ensemble, ["r1i1p1"]);
        let archive = tree().with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varC/c_1.nc", "3");
        let mut session = archive.session();
        let (leaves, stats) = TreeWalker::new(&grammar, &filter)
            .walk_with_stats(&mut session, "root")
            .unwrap();
        assert_eq!(leaves.len(), 3);
        assert!(leaves[2].ends_with("/latest/varC"));
        assert_eq!(stats.pruned, 0);
    }

    #[test]
    fn a_lone_self_entry_is_a_file() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new();
        let archive = tree().with_file("root/README", "hello");
        let mut session = archive.session();
        let (leaves, stats) = TreeWalker::new(&grammar, &filter)
            .walk_with_stats(&mut session, "root")
            .unwrap();
        assert_eq!(leaves.len(), 2);
        assert_eq!(stats.files_seen, 1);
    }

    #[test]
    fn empty_listing_aborts_by_default() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new();
        let mut session = tree().session();
        let err = TreeWalker::new(&grammar, &filter)
            .walk(&mut session, "root/G/missing")
            .unwrap_err();
        assert!(matches!(err, Error::RemoteListing { path } if path == "root/G/missing"));
    }

    #[test]
    fn empty_listing_can_skip_the_branch() {
        let grammar = PathGrammar::new("root");
        let filter = SegmentFilter::new();
        let mut session = tree().session();
        let (leaves, stats) = TreeWalker::new(&grammar, &filter)
            .with_empty_listing(EmptyListing::Skip)
            .walk_with_stats(&mut session, "root/G/missing")
            .unwrap();
        assert!(leaves.is_empty());
        assert_eq!(stats.skipped_empty, 1);
    }
}
