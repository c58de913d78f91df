use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::session::{Connect, RemoteSession};
use crate::util::join_remote;

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    listed: Vec<String>,
    retrieved: Vec<String>,
    opened: usize,
    closed: usize,
}

/// An archive held in memory, answering listings the way the CEDA FTP server does.
///
/// Cloning shares the same tree and the same call log, so a clone kept by
/// the caller can inspect what sessions did.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    state: Rc<RefCell<State>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.state
            .borrow_mut()
            .files
            .insert(path.trim_matches('/').to_string(), content.into());
    }

    /// Paths passed to `list`, in call order.
    pub fn listed(&self) -> Vec<String> {
        self.state.borrow().listed.clone()
    }

    /// Paths passed to `retrieve`, in call order.
    pub fn retrieved(&self) -> Vec<String> {
        self.state.borrow().retrieved.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.borrow().closed
    }

    pub fn session(&self) -> MemorySession {
        self.state.borrow_mut().opened += 1;
        MemorySession {
            state: Rc::clone(&self.state),
            cwd: String::new(),
            open: true,
        }
    }
}

impl Connect for MemoryArchive {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        Ok(self.session())
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

pub struct MemorySession {
    state: Rc<RefCell<State>>,
    cwd: String,
    open: bool,
}

impl MemorySession {
    fn resolve(&self, path: &str) -> Result<String> {
        if !self.open {
            return Err(Error::remote_msg("memory", "session already closed"));
        }
        if path.starts_with('/') {
            Ok(path.trim_matches('/').to_string())
        } else {
            Ok(join_remote(&self.cwd, path.trim_end_matches('/')))
        }
    }
}

impl RemoteSession for MemorySession {
    fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        let mut state = self.state.borrow_mut();
        state.listed.push(path.to_string());

        if state.files.contains_key(&dir) {
            return Ok(vec![path.trim_end_matches('/').to_string()]);
        }

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };
        let children: BTreeSet<&str> = state
            .files
            .keys()
            .filter_map(|k| k.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .collect();

        let shown = path.trim_end_matches('/');
        Ok(children
            .into_iter()
            .map(|name| join_remote(shown, name))
            .collect())
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64> {
        let file = self.resolve(path)?;
        let mut state = self.state.borrow_mut();
        state.retrieved.push(path.to_string());
        let content = state
            .files
            .get(&file)
            .ok_or_else(|| Error::remote_msg(format!("failed to retrieve {}", path), "550 no such file"))?;
        sink.write_all(content).map_err(Error::Sink)?;
        Ok(content.len() as u64)
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        self.cwd = self.resolve(path)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.borrow_mut().closed += 1;
        }
        Ok(())
    }
}
