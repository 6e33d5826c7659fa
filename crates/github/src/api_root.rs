//! Deriving API roots and clone URLs.

use pipeline::SourceControlError;
use url::Url;

/// API root of public GitHub.
pub const PUBLIC_API_ROOT: &str = "https://api.github.com";

/// A repository API URL that does not lead to a v3 API root.
#[derive(Debug, thiserror::Error)]
pub enum ApiRootError {
    /// The URL does not parse.
    #[error("cannot parse '{url}': {source}")]
    Parse {
        /// Rejected URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The URL path has no `/v3` segment.
    #[error("'{url}' is not a version 3 API URL")]
    NotVersion3 {
        /// Rejected URL.
        url: String,
    },
}

impl From<ApiRootError> for SourceControlError {
    fn from(err: ApiRootError) -> Self {
        let url = match &err {
            ApiRootError::Parse { url, .. } | ApiRootError::NotVersion3 { url } => url.clone(),
        };
        SourceControlError::InvalidApiUrl {
            url,
            reason: err.to_string(),
        }
    }
}

/// Returns the API root for any URL inside the API.
///
/// Public GitHub URLs map to [`PUBLIC_API_ROOT`]. Enterprise URLs are cut
/// after their last `/v3` path segment, so
/// `https://github.example/api/v3/repos/org/repo` yields
/// `https://github.example/api/v3`.
pub fn api_root(repo_url: &str) -> Result<String, ApiRootError> {
    if repo_url.contains(PUBLIC_API_ROOT) {
        return Ok(PUBLIC_API_ROOT.to_string());
    }

    let mut url = Url::parse(repo_url).map_err(|source| ApiRootError::Parse {
        url: repo_url.to_string(),
        source,
    })?;
    let path = url.path().to_string();
    let Some(start) = path.rfind("/v3") else {
        return Err(ApiRootError::NotVersion3 {
            url: repo_url.to_string(),
        });
    };
    url.set_path(&path[..start + "/v3".len()]);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// `<github_url>/<org>/<repo>.git`, replacing any path on `github_url`.
pub fn build_clone_url(github_url: &str, org: &str, repo: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(github_url)?;
    url.set_path(&format!("{org}/{repo}.git"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
