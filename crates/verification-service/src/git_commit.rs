//! Best-effort resolution of the upstream git commit an image version was
//! built from, by scraping its GitHub release page (spec §4.4 step 3).

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitCommitError {
    #[error("release page request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait GitCommitResolver: Send + Sync {
    /// Returns the first 40-hex-char commit SHA linked from the release
    /// page for `image_version`, or `None` if the page has no such link.
    async fn resolve(&self, image_version: &str) -> Result<Option<String>, GitCommitError>;
}

pub struct HttpGitCommitResolver {
    client: reqwest::Client,
    releases_base: String,
    commit_link: Regex,
}

impl HttpGitCommitResolver {
    pub fn new(releases_base: impl Into<String>) -> Self {
        HttpGitCommitResolver {
            client: reqwest::Client::new(),
            releases_base: releases_base.into(),
            commit_link: Regex::new(r#"href="/[^"]*/commit/([0-9a-f]{40})""#).expect("valid regex"),
        }
    }
}

impl Default for HttpGitCommitResolver {
    fn default() -> Self {
        Self::new("https://github.com/Dstack-TEE/dstack/releases/tag")
    }
}

#[async_trait]
impl GitCommitResolver for HttpGitCommitResolver {
    async fn resolve(&self, image_version: &str) -> Result<Option<String>, GitCommitError> {
        let url = format!("{}/{}", self.releases_base, image_version);
        let response = self.client.get(&url).send().await.map_err(|e| GitCommitError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let body = response.text().await.map_err(|e| GitCommitError::Request(e.to_string()))?;
        Ok(self.commit_link.captures(&body).map(|c| c[1].to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_commit_link() {
        let resolver = HttpGitCommitResolver::default();
        let body = r#"text <a href="/Dstack-TEE/dstack/commit/c06e524bd460fd9c9add1234567890abcdef1234">c06e524</a> more"#;
        let caps = resolver.commit_link.captures(body).unwrap();
        assert_eq!(&caps[1], "c06e524bd460fd9c9add1234567890abcdef1234");
    }

    #[test]
    fn no_match_returns_none() {
        let resolver = HttpGitCommitResolver::default();
        assert!(resolver.commit_link.captures("no links here").is_none());
    }
}
