//! Numbered group index cached on disk.
//!
//! `groupvault groups` writes the listing here so later commands can accept
//! `#N` shorthand instead of full group ids.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use groupvault_core::errors::{Error, Result};
use groupvault_core::sync::GroupProfile;

const CACHE_FILENAME: &str = "groups.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct CachedGroup {
    pub index: usize,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupIndex {
    pub fetched_at: DateTime<Utc>,
    pub groups: Vec<CachedGroup>,
}

pub struct GroupsCache {
    path: PathBuf,
}

impl GroupsCache {
    pub fn new(data_dir: &str) -> Self {
        GroupsCache {
            path: Path::new(data_dir).join(CACHE_FILENAME),
        }
    }

    pub fn save(&self, groups: &[GroupProfile]) -> Result<GroupIndex> {
        let index = GroupIndex {
            fetched_at: Utc::now(),
            groups: groups
                .iter()
                .enumerate()
                .map(|(i, g)| CachedGroup {
                    index: i + 1,
                    id: g.id.clone(),
                    name: g.name.clone(),
                })
                .collect(),
        };
        let raw = serde_json::to_string_pretty(&index)?;
        std::fs::write(&self.path, raw).map_err(|e| {
            Error::Config(format!(
                "Could not write group index {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(index)
    }

    pub fn load(&self) -> Result<Option<GroupIndex>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::Config(format!(
                    "Could not read group index {}: {}",
                    self.path.display(),
                    err
                )))
            }
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Resolve a backup target: `#N` looks up the cached index, anything
    /// else is taken as a group id.
    pub fn resolve(&self, target: &str) -> Result<String> {
        let Some(number) = target.strip_prefix('#') else {
            return Ok(target.to_string());
        };
        let index: usize = number.parse().map_err(|_| {
            Error::Config(format!("Invalid group reference '{}'", target))
        })?;
        let cached = self.load()?.ok_or_else(|| {
            Error::Config(format!(
                "No cached group index for '{}'; run `groupvault groups` first",
                target
            ))
        })?;
        cached
            .groups
            .iter()
            .find(|g| g.index == index)
            .map(|g| g.id.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Group reference '{}' is out of range (cache holds {} groups)",
                    target,
                    cached.groups.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn group(id: &str, name: &str) -> GroupProfile {
        GroupProfile {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            image_url: None,
            creator_user_id: None,
            created_at: Utc::now(),
            updated_at: None,
            group_type: None,
            share_url: None,
            last_synced_at: None,
            last_synced_message_id: None,
        }
    }

    #[test]
    fn saved_index_resolves_numbered_references() {
        let dir = tempdir().expect("tempdir");
        let cache = GroupsCache::new(&dir.path().to_string_lossy());

        cache
            .save(&[group("g-aaa", "First"), group("g-bbb", "Second")])
            .expect("save");

        assert_eq!(cache.resolve("#1").expect("resolve"), "g-aaa");
        assert_eq!(cache.resolve("#2").expect("resolve"), "g-bbb");
        assert_eq!(cache.resolve("g-raw-id").expect("resolve"), "g-raw-id");
        assert!(cache.resolve("#3").is_err());
    }

    #[test]
    fn missing_cache_file_is_reported_for_numbered_targets() {
        let dir = tempdir().expect("tempdir");
        let cache = GroupsCache::new(&dir.path().to_string_lossy());

        assert!(cache.load().expect("load").is_none());
        assert!(cache.resolve("#1").is_err());
    }
}
