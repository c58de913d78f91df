use std::io;
use std::path::PathBuf;

use suppaftp::{FtpError, Status};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Login, connection or remote command failure. Fatal to the whole operation.
    #[error("{context}: {message}")]
    RemoteSession {
        context: String,
        message: String,
        #[source]
        source: Option<FtpError>,
    },

    /// A directory that should have entries came back empty.
    #[error("error querying {path}: remote listing is empty")]
    RemoteListing { path: String },

    #[error("failed to write {}: {source}", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Raised by a session when the sink of a retrieve rejects a write.
    /// The fetcher rewrites it into [`Error::LocalWrite`] once the destination is known.
    #[error("failed to write retrieved bytes: {0}")]
    Sink(#[source] io::Error),

    #[error("malformed dataset path {path:?}: {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("invalid save path template {template:?}: {reason}")]
    Template { template: String, reason: String },

    #[error("failed to load campaign {}: {reason}", .path.display())]
    Campaign { path: PathBuf, reason: String },

    #[error("{0}")]
    Config(String),
}

impl Error {
    pub(crate) fn remote(context: impl Into<String>, err: FtpError) -> Self {
        let context = context.into();
        let message = describe_ftp_error(&err);
        Error::RemoteSession {
            context,
            message,
            source: Some(err),
        }
    }

    pub(crate) fn remote_msg(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RemoteSession {
            context: context.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the local destination to a sink failure.
    pub(crate) fn at_local_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::Sink(source) => Error::LocalWrite {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}

fn describe_ftp_error(err: &FtpError) -> String {
    match err {
        FtpError::UnexpectedResponse(resp) if resp.status == Status::NotLoggedIn => format!(
            "login rejected by server (FTP {}).\n\nHow to fix:\n1) Check the username and password of your CEDA account\n2) Make sure the account has been granted access to CMIP5 data\n3) Set CEDA_USERNAME / CEDA_PASSWORD or put `username:` and `password:` in .cedarc\n\nServer message: {}",
            resp.status.code(),
            String::from_utf8_lossy(&resp.body).trim()
        ),
        FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable => format!(
            "path not available on server (FTP {}): {}",
            resp.status.code(),
            String::from_utf8_lossy(&resp.body).trim()
        ),
        FtpError::UnexpectedResponse(resp) => format!(
            "unexpected reply (FTP {}): {}",
            resp.status.code(),
            String::from_utf8_lossy(&resp.body).trim()
        ),
        other => other.to_string(),
    }
}
