//! Persisted state: the manifest and per-slot state directories
//!
//! Layout under a state root:
//! - `manifest.json`: active category and parameter mappings per slot
//! - `<slot>/`: opaque state owned by that slot's strategy, present only
//!   for persistable strategies

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::FaceError;
use crate::model::{CategoryParams, Params, Slot, SlotSelection};
use crate::ports::Strategy;
use crate::registry::Registry;

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: u64 = 1;

/// What the manifest recorded for one slot.
///
/// Each field is `None` when its key was missing, in which case the
/// configuration supplies the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotRecord {
    /// `Some(None)` records an explicitly empty optional slot
    pub category: Option<Option<String>>,
    pub params: Option<CategoryParams>,
}

impl From<SlotSelection> for SlotRecord {
    fn from(selection: SlotSelection) -> Self {
        Self {
            category: Some(selection.category),
            params: Some(selection.params),
        }
    }
}

/// Active category and parameters per slot, as last saved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    slots: BTreeMap<Slot, SlotRecord>,
}

impl Manifest {
    pub fn get(&self, slot: Slot) -> Option<&SlotRecord> {
        self.slots.get(&slot)
    }

    pub fn insert(&mut self, slot: Slot, record: SlotRecord) {
        self.slots.insert(slot, record);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn to_json(&self) -> Value {
        let slots: Map<String, Value> = self
            .slots
            .iter()
            .map(|(slot, record)| {
                let mut entry = Map::new();
                if let Some(category) = &record.category {
                    entry.insert("category".to_string(), json!(category));
                }
                if let Some(params) = &record.params {
                    entry.insert("params".to_string(), json!(params));
                }
                (slot.as_str().to_string(), Value::Object(entry))
            })
            .collect();

        json!({
            "version": MANIFEST_VERSION,
            "slots": slots,
        })
    }

    /// Parse a manifest document.
    ///
    /// A document that is not a manifest at all is an error. A slot entry
    /// that cannot be read is dropped so that slot falls back to configuration.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let slots = value
            .get("slots")
            .and_then(Value::as_object)
            .ok_or_else(|| "missing 'slots' object".to_string())?;

        let mut manifest = Manifest::default();
        for (name, entry) in slots {
            let Ok(slot) = name.parse::<Slot>() else {
                tracing::warn!(slot = %name, "Ignoring unknown slot in manifest");
                continue;
            };

            match parse_record(entry) {
                Ok(record) => manifest.insert(slot, record),
                Err(message) => {
                    tracing::warn!(
                        slot = %slot,
                        error = %message,
                        "Ignoring unreadable manifest entry, falling back to configuration"
                    );
                }
            }
        }

        Ok(manifest)
    }

    /// Read the manifest from a state root; `None` when there is none
    pub async fn read(directory: &Path) -> Result<Option<Self>, FaceError> {
        let path = manifest_path(directory);

        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FaceError::persistence(path, e)),
        };

        let value: Value = serde_json::from_slice(&raw).map_err(|e| FaceError::CorruptManifest {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Self::from_json(&value)
            .map(Some)
            .map_err(|message| FaceError::CorruptManifest { path, message })
    }

    /// Write the manifest to a state root.
    ///
    /// Written to a temporary file first and renamed into place, so readers
    /// see either the old manifest or the new one.
    pub async fn write(&self, directory: &Path) -> Result<(), FaceError> {
        let path = manifest_path(directory);
        let tmp_path = directory.join(format!("{}.tmp", MANIFEST_FILE));

        let content = serde_json::to_vec_pretty(&self.to_json()).map_err(|e| {
            FaceError::CorruptManifest {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        fs::write(&tmp_path, content)
            .await
            .map_err(|e| FaceError::persistence(&tmp_path, e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| FaceError::persistence(&path, e))?;

        Ok(())
    }
}

fn parse_record(entry: &Value) -> Result<SlotRecord, String> {
    let entry = entry
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;

    let category = match entry.get("category") {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(category)) => Some(Some(category.clone())),
        Some(other) => return Err(format!("category must be a string, got {}", other)),
    };

    let params = match entry.get("params") {
        None => None,
        Some(params) => Some(
            serde_json::from_value::<CategoryParams>(params.clone())
                .map_err(|e| format!("invalid params: {}", e))?,
        ),
    };

    Ok(SlotRecord { category, params })
}

pub fn manifest_path(directory: &Path) -> PathBuf {
    directory.join(MANIFEST_FILE)
}

/// State directory of a slot under a state root
pub fn slot_directory(directory: &Path, slot: Slot) -> PathBuf {
    directory.join(slot.as_str())
}

/// Save a strategy's state into its slot directory.
///
/// The state is written to a staging directory next to the slot directory
/// and swapped in only once the strategy saved successfully, so a failed
/// save keeps the previous state. The slot directory only ever holds the
/// state of the strategy that is active now; non-persistable strategies
/// leave no directory.
pub(crate) async fn save_slot(
    directory: &Path,
    slot: Slot,
    strategy: &dyn Strategy,
) -> Result<(), FaceError> {
    let Some(persistable) = strategy.persistable() else {
        return clear_slot(directory, slot).await;
    };

    let staging = staging_directory(directory, slot);
    remove_dir_if_exists(&staging).await?;
    fs::create_dir_all(&staging)
        .await
        .map_err(|e| FaceError::persistence(&staging, e))?;

    if let Err(error) = persistable.save(&staging).await {
        if let Err(cleanup_error) = remove_dir_if_exists(&staging).await {
            tracing::warn!(slot = %slot, error = %cleanup_error, "Failed to remove staging directory");
        }
        return Err(error.into());
    }

    let slot_dir = slot_directory(directory, slot);
    clear_slot(directory, slot).await?;
    fs::rename(&staging, &slot_dir)
        .await
        .map_err(|e| FaceError::persistence(&slot_dir, e))?;

    tracing::debug!(slot = %slot, category = strategy.category(), "Saved strategy state");
    Ok(())
}

fn staging_directory(directory: &Path, slot: Slot) -> PathBuf {
    directory.join(format!(".{}.tmp", slot.as_str()))
}

async fn remove_dir_if_exists(path: &Path) -> Result<(), FaceError> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FaceError::persistence(path, e)),
    }
}

/// Remove a slot's state directory, if there is one
pub(crate) async fn clear_slot(directory: &Path, slot: Slot) -> Result<(), FaceError> {
    remove_dir_if_exists(&slot_directory(directory, slot)).await
}

/// Build a strategy and restore its saved state, if any
pub(crate) async fn load_slot<T: Strategy + ?Sized>(
    registry: &Registry<T>,
    category: &str,
    params: &Params,
    directory: Option<&Path>,
) -> Result<Box<T>, FaceError> {
    let mut instance = registry.build(category, params)?;

    let Some(directory) = directory else {
        return Ok(instance);
    };

    let slot_dir = slot_directory(directory, registry.slot());
    let exists = fs::try_exists(&slot_dir)
        .await
        .map_err(|e| FaceError::persistence(&slot_dir, e))?;

    if exists {
        if let Some(persistable) = instance.persistable_mut() {
            persistable.load(&slot_dir).await?;
            tracing::debug!(slot = %registry.slot(), category, "Restored strategy state");
        }
    }

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Persistable, StrategyError};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Saves `notes` to `notes.txt`; fails to save when there are none
    struct Notebook {
        notes: Option<String>,
    }

    #[async_trait]
    impl Strategy for Notebook {
        fn category(&self) -> &str {
            "notebook"
        }

        fn persistable(&self) -> Option<&dyn Persistable> {
            Some(self)
        }
    }

    #[async_trait]
    impl Persistable for Notebook {
        async fn save(&self, directory: &Path) -> Result<(), StrategyError> {
            tokio::fs::write(directory.join("partial.txt"), b"").await?;
            let notes = self
                .notes
                .as_deref()
                .ok_or_else(|| StrategyError::Serialization("no notes".to_string()))?;
            tokio::fs::write(directory.join("notes.txt"), notes).await?;
            Ok(())
        }

        async fn load(&mut self, _directory: &Path) -> Result<(), StrategyError> {
            Ok(())
        }
    }

    fn sample_manifest() -> Manifest {
        let mut params = Params::new();
        params.insert("factor".to_string(), json!(2.0));

        let mut manifest = Manifest::default();
        manifest.insert(
            Slot::Poster,
            SlotRecord {
                category: Some(Some("basic".to_string())),
                params: Some(CategoryParams::new()),
            },
        );
        manifest.insert(
            Slot::ScoreModifier,
            SlotRecord {
                category: Some(Some("scale".to_string())),
                params: Some(CategoryParams::from([("scale".to_string(), params)])),
            },
        );
        manifest.insert(
            Slot::Restriction,
            SlotRecord {
                category: Some(None),
                params: Some(CategoryParams::new()),
            },
        );
        manifest
    }

    #[tokio::test]
    async fn test_manifest_write_then_read() {
        let dir = TempDir::new().unwrap();
        let manifest = sample_manifest();

        manifest.write(dir.path()).await.unwrap();
        let read = Manifest::read(dir.path()).await.unwrap().unwrap();

        assert_eq!(read, manifest);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_slot_save_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let saved = Notebook {
            notes: Some("first".to_string()),
        };
        save_slot(dir.path(), Slot::Restriction, &saved).await.unwrap();

        let failing = Notebook { notes: None };
        let result = save_slot(dir.path(), Slot::Restriction, &failing).await;

        assert!(matches!(result, Err(FaceError::Strategy(_))));
        let slot_dir = slot_directory(dir.path(), Slot::Restriction);
        assert_eq!(std::fs::read_to_string(slot_dir.join("notes.txt")).unwrap(), "first");
        assert!(!dir.path().join(".restriction.tmp").exists());
    }

    #[tokio::test]
    async fn test_slot_save_replaces_previous_state() {
        let dir = TempDir::new().unwrap();
        let slot_dir = slot_directory(dir.path(), Slot::Restriction);
        std::fs::create_dir_all(&slot_dir).unwrap();
        std::fs::write(slot_dir.join("stale.txt"), b"old").unwrap();

        let notebook = Notebook {
            notes: Some("second".to_string()),
        };
        save_slot(dir.path(), Slot::Restriction, &notebook).await.unwrap();

        assert!(!slot_dir.join("stale.txt").exists());
        assert_eq!(std::fs::read_to_string(slot_dir.join("notes.txt")).unwrap(), "second");
        assert!(!dir.path().join(".restriction.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_manifest_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::read(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_manifest_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"{\"slots\": {\"poster\"").unwrap();

        let result = Manifest::read(dir.path()).await;
        assert!(matches!(result, Err(FaceError::CorruptManifest { .. })));
    }

    #[test]
    fn test_bad_slot_entry_is_dropped() {
        let value = json!({
            "version": 1,
            "slots": {
                "poster": {"category": 42},
                "scorer": {"category": "score", "params": {"score": {}}},
                "unknown_slot": {"category": "x"}
            }
        });

        let manifest = Manifest::from_json(&value).unwrap();
        assert!(manifest.get(Slot::Poster).is_none());
        assert_eq!(
            manifest.get(Slot::Scorer).unwrap().category,
            Some(Some("score".to_string()))
        );
    }

    #[test]
    fn test_missing_keys_stay_unset() {
        let value = json!({"slots": {"scraper": {"category": "hot"}}});

        let manifest = Manifest::from_json(&value).unwrap();
        let record = manifest.get(Slot::Scraper).unwrap();
        assert_eq!(record.category, Some(Some("hot".to_string())));
        assert!(record.params.is_none());
    }

    #[test]
    fn test_null_category_is_explicitly_empty() {
        let value = json!({"slots": {"restriction": {"category": null}}});

        let manifest = Manifest::from_json(&value).unwrap();
        assert_eq!(manifest.get(Slot::Restriction).unwrap().category, Some(None));
    }
}
