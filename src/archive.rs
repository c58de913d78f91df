//! Top-level operations. Each one opens its own session and closes it again
//! before returning, whether or not the operation succeeded.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::fetcher::{BatchFetcher, FetchSummary, SavePathTemplate};
use crate::filter::SegmentFilter;
use crate::grammar::{DatasetDescriptor, PathGrammar};
use crate::session::{Connect, RemoteSession};
use crate::walker::{EmptyListing, TreeWalker};

pub struct Archive<C> {
    connector: C,
    grammar: PathGrammar,
    on_empty: EmptyListing,
    progress: bool,
}

impl<C: Connect> Archive<C> {
    pub fn new(connector: C, grammar: PathGrammar) -> Self {
        Self {
            connector,
            grammar,
            on_empty: EmptyListing::default(),
            progress: true,
        }
    }

    pub fn with_empty_listing(mut self, on_empty: EmptyListing) -> Self {
        self.on_empty = on_empty;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn grammar(&self) -> &PathGrammar {
        &self.grammar
    }

    /// Runs `f` on a fresh session rooted at `/`, then closes the session.
    /// An error from `f` takes precedence over an error from closing.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut C::Session) -> Result<T>,
    {
        let mut session = self.connector.connect()?;
        let result = session.change_directory("/").and_then(|_| f(&mut session));
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Finds every variable path below the base path that the filter lets through.
    pub fn walk(&self, filter: &SegmentFilter) -> Result<Vec<String>> {
        tracing::info!("Filter settings - {}", filter);
        let walker = TreeWalker::new(&self.grammar, filter).with_empty_listing(self.on_empty);
        let leaves = self.with_session(|session| walker.walk(session, self.grammar.base()))?;
        tracing::info!("... done!");
        Ok(leaves)
    }

    /// Walks with `filter` and turns the leaves into descriptors, keeping only
    /// `variables` (all of them when the set is empty).
    pub fn discover(
        &self,
        filter: &SegmentFilter,
        variables: &BTreeSet<String>,
    ) -> Result<Vec<DatasetDescriptor>> {
        let leaves = self.walk(filter)?;
        let mut datasets = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            match self.grammar.descriptor(leaf) {
                Ok(d) if variables.is_empty() || variables.contains(&d.variable) => datasets.push(d),
                Ok(_) => {}
                Err(e) => tracing::warn!("ignoring leaf outside the naming convention: {}", e),
            }
        }
        tracing::info!(
            "{} of {} discovered variable(s) selected",
            datasets.len(),
            leaves.len()
        );
        Ok(datasets)
    }

    pub fn fetch<I>(
        &self,
        descriptors: I,
        template: &SavePathTemplate,
        overwrite: bool,
    ) -> Result<FetchSummary>
    where
        I: IntoIterator<Item = DatasetDescriptor>,
    {
        let fetcher = BatchFetcher::new(&self.grammar, template)
            .with_overwrite(overwrite)
            .with_progress(self.progress);
        self.with_session(|session| fetcher.fetch(session, descriptors))
    }

    /// Discovery followed by a batch download, each on its own session.
    pub fn discover_and_fetch(
        &self,
        filter: &SegmentFilter,
        variables: &BTreeSet<String>,
        template: &SavePathTemplate,
        overwrite: bool,
    ) -> Result<FetchSummary> {
        let datasets = self.discover(filter, variables)?;
        self.fetch(datasets, template, overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::MemoryArchive;

    #[test]
    fn session_is_closed_after_success_and_failure() {
        let remote = MemoryArchive::new().with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/v/f.nc", "x");
        let archive = Archive::new(remote.clone(), PathGrammar::new("root"));

        assert_eq!(archive.walk(&SegmentFilter::new()).unwrap().len(), 1);
        assert_eq!(remote.sessions_opened(), 1);
        assert_eq!(remote.sessions_closed(), 1);

        let err = archive
            .with_session(|s| TreeWalker::new(archive.grammar(), &SegmentFilter::new()).walk(s, "root/nope"))
            .unwrap_err();
        assert!(matches!(err, Error::RemoteListing { .. }));
        assert_eq!(remote.sessions_opened(), 2);
        assert_eq!(remote.sessions_closed(), 2);
    }

    #[test]
    fn discover_keeps_requested_variables_only() {
        let remote = MemoryArchive::new()
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/rsut/f.nc", "x")
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/rlut/f.nc", "y");
        let archive = Archive::new(remote, PathGrammar::new("root"));
        let wanted = BTreeSet::from(["rsut".to_string()]);
        let found = archive.discover(&SegmentFilter::new(), &wanted).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].variable, "rsut");
        assert_eq!(found[0].cmor_table, "Amon");
    }
}
