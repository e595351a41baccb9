use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::traits::SessionStore;
use super::types::{Credentials, Session};
use crate::error::Error;
use crate::types::{AccessToken, User};

/// On-disk layout: the two session keys plus the redirect target.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
}

/// Session store backed by a single JSON file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers see either the old or the new document. The
/// file is created with owner-only permissions on Unix.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Document {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Document::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Session file unreadable");
                return Document::default();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Session file malformed");
            Document::default()
        })
    }

    fn write_document(&self, doc: &Document) -> Result<(), Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .map_err(|e| Error::Store(format!("create {}: {e}", dir.display())))?;

        let contents = serde_json::to_vec_pretty(doc)
            .map_err(|e| Error::Store(format!("serialize session: {e}")))?;

        // NamedTempFile is created 0600 on Unix.
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::Store(format!("temp file in {}: {e}", dir.display())))?;
        tmp.write_all(&contents)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::Store(format!("write session: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Store(format!("replace {}: {}", self.path.display(), e.error)))?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut Document)) -> Result<(), Error> {
        let _guard = self.write_lock.lock();
        let mut doc = self.read_document();
        f(&mut doc);
        self.write_document(&doc)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Session {
        let doc = self.read_document();
        match (doc.token, doc.user) {
            (Some(token), Some(user)) => match serde_json::from_value::<User>(user) {
                Ok(user) => Session::authenticated(Credentials::new(AccessToken::new(token), user)),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed persisted user");
                    Session::anonymous()
                }
            },
            (None, None) => Session::anonymous(),
            (token, _) => {
                tracing::warn!(
                    has_token = token.is_some(),
                    "Discarding half-written persisted session"
                );
                Session::anonymous()
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        let user = serde_json::to_value(&credentials.user)
            .map_err(|e| Error::Store(format!("serialize user: {e}")))?;
        let token = credentials.token.as_str().to_owned();
        self.update(|doc| {
            doc.token = Some(token);
            doc.user = Some(user);
        })
    }

    fn clear(&self) -> Result<(), Error> {
        self.update(|doc| {
            doc.token = None;
            doc.user = None;
        })
    }

    fn load_redirect(&self) -> Option<String> {
        self.read_document().redirect_url
    }

    fn save_redirect(&self, path: &str) -> Result<(), Error> {
        let path = path.to_owned();
        self.update(|doc| doc.redirect_url = Some(path))
    }

    fn clear_redirect(&self) -> Result<(), Error> {
        self.update(|doc| doc.redirect_url = None)
    }
}
