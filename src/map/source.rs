//! Map file lookup
//!
//! Clients name a map by URL (`/maps/ascent.smf`, or an absolute URL pointing
//! at the same server). Only the final path segment is used to find the file
//! inside the configured maps directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::{parse, parse_metadata, GameMap, MapError, Metadata};

pub const MAP_EXTENSION: &str = "smf";

/// Loads maps by URL. Called once per room creation.
pub trait MapSource: Send + Sync + 'static {
    fn load(&self, map_url: &str) -> Result<GameMap, MapError>;
}

/// Reads `.smf` files out of a single directory
#[derive(Debug, Clone)]
pub struct DirMapSource {
    root: PathBuf,
}

impl DirMapSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, map_url: &str) -> Result<PathBuf, MapError> {
        Ok(self.root.join(map_file_name(map_url)?))
    }
}

impl MapSource for DirMapSource {
    fn load(&self, map_url: &str) -> Result<GameMap, MapError> {
        let path = self.resolve(map_url)?;
        debug!(path = %path.display(), "Loading map");
        let text = std::fs::read_to_string(&path)?;
        parse(&text)
    }
}

/// Final path segment of a map URL, stripped of query and fragment.
/// Rejects anything that is not a plain `*.smf` file name.
pub fn map_file_name(map_url: &str) -> Result<&str, MapError> {
    let path = map_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let name = path.rsplit(['/', '\\']).next().unwrap_or_default();

    let valid = !name.is_empty()
        && !name.starts_with('.')
        && Path::new(name).extension().and_then(|e| e.to_str()) == Some(MAP_EXTENSION);

    if valid {
        Ok(name)
    } else {
        Err(MapError::InvalidUrl(map_url.to_string()))
    }
}

/// One entry of the `/maps` listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MapListing {
    pub metadata: Metadata,
    pub path: String,
}

/// Reads the metadata header of every map in `dir`. Files that fail to parse
/// are skipped. Sorted by path.
pub async fn list_maps(dir: &Path, url_prefix: &str) -> Result<Vec<MapListing>, MapError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut listings = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if map_file_name(name).is_err() || !entry.file_type().await?.is_file() {
            continue;
        }

        let text = tokio::fs::read_to_string(entry.path()).await?;
        match parse_metadata(&text) {
            Ok(metadata) => listings.push(MapListing {
                metadata,
                path: format!("{}/{}", url_prefix.trim_end_matches('/'), name),
            }),
            Err(e) => warn!(file = %name, error = %e, "Skipping unreadable map"),
        }
    }

    listings.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(listings)
}
