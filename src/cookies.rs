//! Session cookies for Google Scholar profile requests.
//!
//! Scholar is far less likely to serve a CAPTCHA to a request carrying the
//! cookies of a browser session, so an exported cookie list can be stored
//! once and replayed on every run.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COOKIE_FILE_NAME: &str = ".scholar_citations_cookies.json";

/// Default cookie file path: `~/.scholar_citations_cookies.json`
pub fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(COOKIE_FILE_NAME))
        .ok_or_else(|| TrackerError::Config("Cannot determine home directory".to_string()))
}

/// Cookie entry in the browser-export JSON format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
    #[serde(default, alias = "expirationDate")]
    pub expires: Option<f64>,
}

/// Cookie file on disk
pub struct CookieJar {
    path: PathBuf,
}

impl CookieJar {
    /// Jar at the default location, falling back to the working directory.
    pub fn open_default() -> Self {
        match default_cookie_path() {
            Ok(path) => Self { path },
            Err(_) => Self {
                path: PathBuf::from(COOKIE_FILE_NAME),
            },
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Jar for a configured `cookie_file`, or the default one.
    pub fn resolve(cookie_file: Option<&Path>) -> Self {
        match cookie_file {
            Some(path) => Self::with_path(path.to_path_buf()),
            None => Self::open_default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored cookies. A missing or unreadable file counts as none, since
    /// requests still work without them.
    pub fn load(&self) -> Vec<Cookie> {
        match self.read_stored() {
            Ok(Some(cookies)) => {
                debug!(count = cookies.len(), path = %self.path.display(), "Loaded cookies");
                cookies
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No stored cookies");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable cookie file");
                Vec::new()
            }
        }
    }

    fn read_stored(&self) -> Result<Option<Vec<Cookie>>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// `Cookie` header value for Google domains, empty if none are stored.
    pub fn header_value(&self) -> String {
        cookie_header(&self.load())
    }

    /// Replace the stored cookies, creating the parent directory if needed.
    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(cookies)?)?;
        info!(count = cookies.len(), path = %self.path.display(), "Stored cookies");
        Ok(())
    }

    /// Validate a JSON cookie export and store it.
    pub fn import(&self, source: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(source)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&content)?;
        if cookies.is_empty() {
            return Err(TrackerError::Validation(format!(
                "No cookies found in {}",
                source.display()
            )));
        }
        self.save(&cookies)?;
        Ok(cookies.len())
    }

    /// Delete the cookie file. Returns whether there was one.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed stored cookies");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .filter(|c| c.domain.contains("google"))
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    fn cookie(name: &str, domain: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: format!("{}-value", name),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires: None,
        }
    }

    #[test]
    fn test_load_missing_file() {
        let jar = CookieJar::with_path(PathBuf::from("/nonexistent/path"));
        assert!(jar.load().is_empty());
        assert_eq!(jar.header_value(), "");
    }

    #[test]
    fn test_header_only_includes_google_cookies() -> Result<()> {
        let temp = NamedTempFile::new()?;
        let jar = CookieJar::with_path(temp.path().to_path_buf());
        jar.save(&[cookie("NID", ".google.com"), cookie("other", ".example.com"), cookie("GSP", "scholar.google.com")])?;
        assert_eq!(jar.header_value(), "NID=NID-value; GSP=GSP-value");
        Ok(())
    }

    #[test]
    fn test_import_browser_export() -> Result<()> {
        let export = NamedTempFile::new()?;
        std::fs::write(
            export.path(),
            r#"[{"name":"NID","value":"abc","domain":".google.com","httpOnly":true,"expirationDate":1.0}]"#,
        )?;
        let store = NamedTempFile::new()?;
        let jar = CookieJar::with_path(store.path().to_path_buf());

        assert_eq!(jar.import(export.path())?, 1);
        let loaded = jar.load();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].http_only);

        assert!(jar.clear()?);
        assert!(!jar.path().exists());
        assert!(!jar.clear()?);
        Ok(())
    }

    #[test]
    fn test_import_rejects_empty_export() -> Result<()> {
        let export = NamedTempFile::new()?;
        std::fs::write(export.path(), "[]")?;
        let jar = CookieJar::with_path(PathBuf::from("/nonexistent/jar.json"));
        assert!(matches!(jar.import(export.path()), Err(TrackerError::Validation(_))));
        Ok(())
    }

    #[test]
    fn test_unparsable_file_loads_empty() -> Result<()> {
        let temp = NamedTempFile::new()?;
        std::fs::write(temp.path(), "{ not a cookie list")?;
        let jar = CookieJar::with_path(temp.path().to_path_buf());
        assert!(jar.load().is_empty());
        Ok(())
    }

    #[test]
    fn test_save_creates_parent_directory() -> Result<()> {
        let dir = TempDir::new()?;
        let jar = CookieJar::with_path(dir.path().join("state").join("cookies.json"));
        jar.save(&[cookie("SID", ".google.com")])?;
        assert_eq!(jar.header_value(), "SID=SID-value");
        Ok(())
    }

    #[test]
    fn test_resolve_prefers_configured_file() {
        let configured = PathBuf::from("/tmp/tracker/cookies.json");
        assert_eq!(CookieJar::resolve(Some(&configured)).path(), configured.as_path());
        assert_eq!(CookieJar::resolve(None).path(), CookieJar::open_default().path());
    }
}
