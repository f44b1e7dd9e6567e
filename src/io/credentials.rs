use crate::types::{PrepError, PrepResult};
use std::path::Path;

/// Catalog account read from a `username, password` text file
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_file<P: AsRef<Path>>(path: P) -> PrepResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PrepError::Config(format!(
                "Cannot read credential file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse the first non-empty line as `username, password`
    pub fn parse(content: &str) -> PrepResult<Self> {
        let line = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| PrepError::Config("Credential file is empty".to_string()))?;

        let (username, password) = line.split_once(',').ok_or_else(|| {
            PrepError::Config("Credential file must contain 'username, password'".to_string())
        })?;
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(PrepError::Config(
                "Credential file must contain 'username, password'".to_string(),
            ));
        }

        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
