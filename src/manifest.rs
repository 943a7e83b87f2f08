//! Pack manifests: the ordered artifact list an install runs over
//!
//! A manifest is usually delivered as JSON with artifacts keyed by id:
//!
//! ```json
//! {
//!   "mods": {
//!     "jei": { "name": "Just Enough Items", "url": "https://...", "target": "both" },
//!     "optifine": { "name": "OptiFine", "url": "https://...", "target": "client", "manual": true }
//!   }
//! }
//! ```
//!
//! Key order matters: manual-artifact matching during reconciliation is
//! first-match-wins in manifest order, so the keyed form is read with a visitor
//! that keeps entries in document order.

use crate::error::{Error, Result};
use crate::types::{ArtifactDescriptor, Side, Target};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Ordered list of artifact descriptors with unique ids
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    artifacts: Vec<ArtifactDescriptor>,
}

/// Artifacts selected for one side, split by acquisition mode
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtifactSelection {
    /// Fetched by URL through the worker pool
    pub automatic: Vec<ArtifactDescriptor>,
    /// Acquired out-of-band
    pub manual: Vec<ArtifactDescriptor>,
}

impl Manifest {
    /// Build a manifest, rejecting duplicate ids
    pub fn new(artifacts: Vec<ArtifactDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(artifacts.len());
        for artifact in &artifacts {
            if artifact.id.is_empty() {
                return Err(Error::Manifest(format!(
                    "artifact {:?} has an empty id",
                    artifact.name
                )));
            }
            if !seen.insert(artifact.id.as_str()) {
                return Err(Error::Manifest(format!(
                    "duplicate artifact id {:?}",
                    artifact.id
                )));
            }
        }
        Ok(Self { artifacts })
    }

    /// Parse the keyed JSON form (`{"mods": {"<id>": {...}}}`)
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_str(json)?;
        Self::new(document.mods.0)
    }

    /// All artifacts in manifest order
    pub fn artifacts(&self) -> &[ArtifactDescriptor] {
        &self.artifacts
    }

    /// Number of artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the manifest has no artifacts
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Look up an artifact by id
    pub fn get(&self, id: &str) -> Option<&ArtifactDescriptor> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Select the artifacts for `side` and split them into automatic and manual
    ///
    /// Artifacts targeting `both` are included for every side. Manifest order is
    /// preserved within each list.
    pub fn select(&self, side: Side) -> ArtifactSelection {
        let mut selection = ArtifactSelection::default();
        for artifact in self.artifacts.iter().filter(|a| a.target.includes(side)) {
            if artifact.manual {
                selection.manual.push(artifact.clone());
            } else {
                selection.automatic.push(artifact.clone());
            }
        }
        selection
    }
}

#[derive(Deserialize)]
struct ManifestDocument {
    mods: KeyedArtifacts,
}

/// Body of a keyed artifact entry; the id comes from the map key
#[derive(Deserialize)]
struct ArtifactEntry {
    name: String,
    url: String,
    #[serde(default)]
    target: Target,
    #[serde(default)]
    manual: bool,
}

struct KeyedArtifacts(Vec<ArtifactDescriptor>);

impl<'de> Deserialize<'de> for KeyedArtifacts {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyedVisitor;

        impl<'de> Visitor<'de> for KeyedVisitor {
            type Value = KeyedArtifacts;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of artifact id to artifact entry")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut artifacts = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, entry)) = map.next_entry::<String, ArtifactEntry>()? {
                    if artifacts.iter().any(|a: &ArtifactDescriptor| a.id == id) {
                        return Err(de::Error::custom(format!("duplicate artifact id {id:?}")));
                    }
                    artifacts.push(ArtifactDescriptor {
                        id,
                        name: entry.name,
                        url: entry.url,
                        target: entry.target,
                        manual: entry.manual,
                    });
                }
                Ok(KeyedArtifacts(artifacts))
            }
        }

        deserializer.deserialize_map(KeyedVisitor)
    }
}
