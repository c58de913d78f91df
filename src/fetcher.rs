use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::grammar::{DatasetDescriptor, PathGrammar, Segment};
use crate::session::RemoteSession;
use crate::util::basename;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Field(Segment),
}

/// Local directory pattern such as `cmip5_aie/{experiment}/{model}`.
///
/// Placeholders are segment names; `{{` and `}}` stand for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePathTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl SavePathTemplate {
    pub fn new(template: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Template {
            template: template.to_string(),
            reason,
        };

        let mut pieces = Vec::new();
        let mut text = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(invalid("unclosed '{'".to_string())),
                        }
                    }
                    let segment = Segment::from_str(name.trim())
                        .map_err(|_| invalid(format!("unknown placeholder {{{}}}", name)))?;
                    if !text.is_empty() {
                        pieces.push(Piece::Text(std::mem::take(&mut text)));
                    }
                    pieces.push(Piece::Field(segment));
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            pieces.push(Piece::Text(text));
        }

        Ok(Self {
            source: template.to_string(),
            pieces,
        })
    }

    pub fn render(&self, d: &DatasetDescriptor) -> PathBuf {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(t) => out.push_str(t),
                Piece::Field(seg) => out.push_str(d.get(*seg)),
            }
        }
        PathBuf::from(out)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for SavePathTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for SavePathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub datasets: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub bytes: u64,
}

impl FetchSummary {
    pub fn merge(&mut self, other: FetchSummary) {
        self.datasets += other.datasets;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.bytes += other.bytes;
    }
}

/// Mirrors the files of each dataset into a local directory.
pub struct BatchFetcher<'a> {
    grammar: &'a PathGrammar,
    template: &'a SavePathTemplate,
    overwrite: bool,
    progress: bool,
}

impl<'a> BatchFetcher<'a> {
    pub fn new(grammar: &'a PathGrammar, template: &'a SavePathTemplate) -> Self {
        Self {
            grammar,
            template,
            overwrite: true,
            progress: true,
        }
    }

    /// When false, files already present locally are left alone and not downloaded.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Processes the descriptors in order. The first failure aborts the batch;
    /// a file being written at that moment is left as is.
    pub fn fetch<S, I>(&self, session: &mut S, descriptors: I) -> Result<FetchSummary>
    where
        S: RemoteSession + ?Sized,
        I: IntoIterator<Item = DatasetDescriptor>,
    {
        let mut summary = FetchSummary::default();

        tracing::info!("Iterating over requested datasets...");
        for (i, dataset) in descriptors.into_iter().enumerate() {
            tracing::info!("   {}) {}", i + 1, dataset);
            self.fetch_one(session, &dataset, &mut summary)?;
            summary.datasets += 1;
        }

        tracing::info!(
            "... done: {} dataset(s), {} file(s) downloaded ({} bytes), {} skipped",
            summary.datasets,
            summary.downloaded,
            summary.bytes,
            summary.skipped
        );
        Ok(summary)
    }

    fn fetch_one<S>(
        &self,
        session: &mut S,
        dataset: &DatasetDescriptor,
        summary: &mut FetchSummary,
    ) -> Result<()>
    where
        S: RemoteSession + ?Sized,
    {
        let save_path = self.template.render(dataset);
        if !save_path.as_os_str().is_empty() && !save_path.exists() {
            std::fs::create_dir_all(&save_path).map_err(|source| Error::LocalWrite {
                path: save_path.clone(),
                source,
            })?;
        }

        let remote_dir = self.grammar.build(dataset);
        tracing::info!("      Retrieving files in {}", remote_dir);
        let mut files = session.list(&remote_dir)?;
        files.sort();
        if files.is_empty() {
            return Err(Error::remote_msg(
                format!("failed to list {remote_dir}"),
                "no such dataset on the archive",
            ));
        }

        let pb = self.progress_bar(files.len());
        for remote in &files {
            let name = basename(remote);
            let dest = save_path.join(name);
            tracing::info!("      {}", name);

            if dest.exists() && !self.overwrite {
                tracing::info!("      File exists; skipping {}", dest.display());
                summary.skipped += 1;
            } else {
                tracing::info!("      Downloading/writing to {}", dest.display());
                summary.bytes += download(session, remote, &dest)?;
                summary.downloaded += 1;
            }

            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        Ok(())
    }

    fn progress_bar(&self, files: usize) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = ProgressBar::new(files as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} {pos}/{len} file(s) {wide_bar} {elapsed}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    }
}

fn download<S>(session: &mut S, remote: &str, dest: &Path) -> Result<u64>
where
    S: RemoteSession + ?Sized,
{
    let local_err = |source| Error::LocalWrite {
        path: dest.to_path_buf(),
        source,
    };
    let file = File::create(dest).map_err(local_err)?;
    let mut out = BufWriter::new(file);
    let n = session
        .retrieve(remote, &mut out)
        .map_err(|e| e.at_local_path(dest))?;
    out.flush().map_err(local_err)?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryArchive;

    fn dataset() -> DatasetDescriptor {
        DatasetDescriptor {
            group: "G".into(),
            model: "M".into(),
            experiment: "EXP".into(),
            freq: "mon".into(),
            realm: "atmos".into(),
            cmor_table: "Amon".into(),
            ensemble: "r1i1p1".into(),
            variable: "varA".into(),
        }
    }

    #[test]
    fn template_substitutes_segment_values() {
        let t = SavePathTemplate::new("out/{experiment}/{model}_{variable}").unwrap();
        assert_eq!(t.render(&dataset()), PathBuf::from("out/EXP/M_varA"));
        assert_eq!(t.to_string(), "out/{experiment}/{model}_{variable}");
    }

    #[test]
    fn template_supports_escaped_braces() {
        let t = SavePathTemplate::new("{{raw}}/{cmor_table}").unwrap();
        assert_eq!(t.render(&dataset()), PathBuf::from("{raw}/Amon"));
    }

    #[test]
    fn template_rejects_unknown_or_broken_placeholders() {
        for bad in ["{institute}", "out/{model", "out/model}"] {
            assert!(
                matches!(SavePathTemplate::new(bad), Err(Error::Template { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn downloads_every_file_of_a_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let archive = MemoryArchive::new()
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varA/a_1.nc", "one")
            .with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varA/a_2.nc", "two!");
        let grammar = PathGrammar::new("root");
        let template =
            SavePathTemplate::new(&format!("{}/{{experiment}}/{{model}}", dir.path().display()))
                .unwrap();

        let mut session = archive.session();
        let summary = BatchFetcher::new(&grammar, &template)
            .with_progress(false)
            .fetch(&mut session, [dataset()])
            .unwrap();

        assert_eq!(summary.datasets, 1);
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.bytes, 7);
        let saved = dir.path().join("EXP/M");
        assert_eq!(std::fs::read_to_string(saved.join("a_1.nc")).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(saved.join("a_2.nc")).unwrap(), "two!");
    }

    #[test]
    fn missing_dataset_is_a_remote_session_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive =
            MemoryArchive::new().with_file("root/G/M/EXP/mon/atmos/Amon/r1i1p1/latest/varA/a.nc", "A");
        let grammar = PathGrammar::new("root");
        let template = SavePathTemplate::new(&dir.path().display().to_string()).unwrap();
        let mut missing = dataset();
        missing.model = "NOPE".into();

        let mut session = archive.session();
        let err = BatchFetcher::new(&grammar, &template)
            .with_progress(false)
            .fetch(&mut session, [dataset(), missing])
            .unwrap_err();

        match err {
            Error::RemoteSession { context, .. } => assert!(context.contains("/NOPE/"), "{context}"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(archive.retrieved().len(), 1);
    }
}
