use std::io::{Read, Write};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

use crate::config::{ArchiveConfig, Credentials};
use crate::error::{Error, Result};
use crate::session::{Connect, RemoteSession};
use crate::util::normalize_entry;

/// Opens authenticated FTP sessions against the archive host.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    host: String,
    port: u16,
    credentials: Credentials,
}

impl FtpConnector {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            credentials: config.credentials.clone(),
        }
    }
}

impl Connect for FtpConnector {
    type Session = FtpSession;

    fn connect(&self) -> Result<FtpSession> {
        tracing::info!(
            "Attempting to connect to {} as '{}'",
            self.endpoint(),
            self.credentials.username
        );

        let mut stream = FtpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| Error::remote(format!("failed to connect to {}", self.endpoint()), e))?;

        if let Err(e) = stream.login(&self.credentials.username, &self.credentials.password) {
            let _ = stream.quit();
            return Err(Error::remote(format!("login to {} failed", self.endpoint()), e));
        }
        let mut session = FtpSession {
            endpoint: self.endpoint(),
            stream: Some(stream),
        };
        session
            .stream()?
            .transfer_type(FileType::Binary)
            .map_err(|e| Error::remote("failed to switch to binary mode", e))?;

        tracing::info!("Success!");
        Ok(session)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct FtpSession {
    endpoint: String,
    stream: Option<FtpStream>,
}

impl FtpSession {
    fn stream(&mut self) -> Result<&mut FtpStream> {
        let endpoint = &self.endpoint;
        self.stream
            .as_mut()
            .ok_or_else(|| Error::remote_msg(endpoint.clone(), "session already closed"))
    }
}

impl RemoteSession for FtpSession {
    fn list(&mut self, path: &str) -> Result<Vec<String>> {
        let arg = if path.is_empty() { None } else { Some(path) };
        match self.stream()?.nlst(arg) {
            Ok(entries) => Ok(entries
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(|e| normalize_entry(path, e))
                .collect()),
            // Servers answer 550 for both missing and empty directories.
            Err(FtpError::UnexpectedResponse(resp)) if resp.status == Status::FileUnavailable => {
                tracing::debug!("NLST {} returned 550", path);
                Ok(Vec::new())
            }
            Err(e) => Err(Error::remote(format!("failed to list {}", path), e)),
        }
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64> {
        let stream = self.stream()?;
        let mut data = stream
            .retr_as_stream(path)
            .map_err(|e| Error::remote(format!("failed to retrieve {}", path), e))?;

        let mut total: u64 = 0;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = match data.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    return Err(Error::remote(
                        format!("transfer of {} interrupted", path),
                        FtpError::ConnectionError(e),
                    ));
                }
            };
            sink.write_all(&buf[..n]).map_err(Error::Sink)?;
            total += n as u64;
        }

        stream
            .finalize_retr_stream(data)
            .map_err(|e| Error::remote(format!("failed to finish transfer of {}", path), e))?;
        Ok(total)
    }

    fn change_directory(&mut self, path: &str) -> Result<()> {
        tracing::info!("Changing to {}", path);
        self.stream()?
            .cwd(path)
            .map_err(|e| Error::remote(format!("failed to change directory to {}", path), e))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::info!("Closing connection to {}", self.endpoint);
            stream
                .quit()
                .map_err(|e| Error::remote(format!("failed to close {}", self.endpoint), e))?;
        }
        Ok(())
    }
}

impl Drop for FtpSession {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.quit();
        }
    }
}
