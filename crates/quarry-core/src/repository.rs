use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::RepositoryError;

pub const MAVEN_CENTRAL_REPOSITORY_URL: &str = "https://repo1.maven.org/maven2/";
pub const JBOSS_COMMUNITY_REPOSITORY_URL: &str =
    "https://repository.jboss.org/nexus/content/repositories/public/";

/// The only repository layout Quarry understands.
pub const DEFAULT_CONTENT_TYPE: &str = "default";

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Authentication {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authentication")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An upstream `default`-layout repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: String,
    pub content_type: String,
    url: Url,
    pub authentication: Option<Authentication>,
}

impl RemoteRepository {
    pub fn new(id: impl Into<String>, url: &str) -> Result<Self, RepositoryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RepositoryError::EmptyId);
        }

        let mut url = Url::parse(url.trim()).map_err(|err| RepositoryError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" | "file" => {}
            other => {
                return Err(RepositoryError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme {other:?}"),
                })
            }
        }
        // Relative resource paths are joined onto the base, which only works for directories.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            id,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            url,
            authentication: None,
        })
    }

    #[must_use]
    pub fn with_authentication(mut self, authentication: Option<Authentication>) -> Self {
        self.authentication = authentication;
        self
    }

    pub fn maven_central() -> Self {
        Self::builtin("central", MAVEN_CENTRAL_REPOSITORY_URL)
    }

    pub fn jboss_community() -> Self {
        Self::builtin("jboss.community", JBOSS_COMMUNITY_REPOSITORY_URL)
    }

    fn builtin(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            url: Url::parse(url).expect("built-in repository url is valid"),
            authentication: None,
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Resolve a layout-relative resource path against the repository base url.
    pub fn resource_url(&self, resource: &str) -> Result<Url, RepositoryError> {
        self.url
            .join(resource.trim_start_matches('/'))
            .map_err(|err| RepositoryError::InvalidUrl {
                url: format!("{}{resource}", self.url),
                reason: err.to_string(),
            })
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.url, self.content_type)
    }
}
