//! Produces new DNA snapshots from a proposed gene patch, links them into
//! the per-target lineage, and records the learning event (spec §4.2).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::dna::types::{Dna, DnaVersion, Gene};
use crate::error::{Error, Result};
use crate::ids::{DnaId, TargetId};
use crate::store::{DnaSnapshot, LearningEvent, LearningEventType, Store, TargetPatch};

/// How strongly a proposed mutation is believed to disturb an established
/// fingerprint. Maps to the signed `trustImpact` recorded on the
/// resulting learning event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationSeverity {
    Low,
    Medium,
    High,
}

impl MutationSeverity {
    fn trust_impact(self) -> i32 {
        match self {
            Self::High => -5,
            Self::Medium => 0,
            Self::Low => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => return None,
        })
    }
}

/// A proposed shallow patch to one gene.
#[derive(Debug, Clone)]
pub struct GeneMutation {
    pub gene: Gene,
    /// Shallow patch applied over the gene's current JSON object.
    pub patch: Map<String, Value>,
    pub reason: String,
    pub confidence: f64,
    pub severity: MutationSeverity,
}

/// The outcome of a successful mutation: the new snapshot plus a diff of
/// which top-level keys within the target gene changed.
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub snapshot: DnaSnapshot,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

/// Applies gene mutations and creates the initial DNA for a new target.
/// Holds no state of its own — every call reads and writes through the
/// shared [`Store`].
pub struct Mutator {
    store: Arc<dyn Store>,
}

impl Mutator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates version `1.0.0` of the default profile for a target with no
    /// DNA yet, activates it, and emits a `birth` learning event.
    #[instrument(skip(self), fields(target_id = %target_id))]
    pub fn create_initial(&self, target_id: TargetId) -> Result<DnaSnapshot> {
        let snapshot = DnaSnapshot {
            id: DnaId::new(),
            target_id,
            version: DnaVersion::INITIAL.to_string(),
            dna: Dna::default(),
            parent_id: None,
            is_active: true,
            created_at: chrono::Utc::now(),
        };
        self.store.create_dna_snapshot(&snapshot, false)?;
        self.store.update_target_fields(
            target_id,
            TargetPatch {
                current_dna_id: Some(Some(snapshot.id)),
                ..Default::default()
            },
        )?;

        let mut event = LearningEvent::new(
            target_id,
            LearningEventType::Birth,
            "Initial DNA profile created",
            "A fresh default behavioral profile was generated for this target.",
            0,
        );
        event.dna_version_id = Some(snapshot.id);
        event.after_state = Some(serde_json::to_value(&snapshot.dna)?);
        self.store.append_learning_event(&event)?;

        debug!(dna_id = %snapshot.id, "initial DNA snapshot created");
        Ok(snapshot)
    }

    /// Applies a shallow patch to one gene of the active DNA, producing a
    /// new snapshot that links to the previous one as parent.
    #[instrument(skip(self, mutation), fields(target_id = %target_id, gene = mutation.gene.as_str(), severity = mutation.severity.as_str()))]
    pub fn mutate(&self, target_id: TargetId, mutation: GeneMutation) -> Result<MutationResult> {
        let active = self
            .store
            .get_active_dna(target_id)?
            .ok_or_else(|| Error::no_active_dna(target_id.to_string()))?;

        let mut dna = active.dna.clone();
        let (added, removed, modified) = apply_gene_patch(&mut dna, mutation.gene, &mutation.patch)?;

        let version = DnaVersion::parse(&active.version)
            .unwrap_or(DnaVersion::INITIAL)
            .bump_patch();

        let snapshot = DnaSnapshot {
            id: DnaId::new(),
            target_id,
            version: version.to_string(),
            dna,
            parent_id: Some(active.id),
            is_active: true,
            created_at: chrono::Utc::now(),
        };
        self.store.create_dna_snapshot(&snapshot, true)?;
        self.store.update_target_fields(
            target_id,
            TargetPatch {
                current_dna_id: Some(Some(snapshot.id)),
                ..Default::default()
            },
        )?;

        let mut event = LearningEvent::new(
            target_id,
            LearningEventType::Mutation,
            format!("Mutated {} gene", mutation.gene.as_str()),
            mutation.reason.clone(),
            mutation.severity.trust_impact(),
        );
        event.dna_version_id = Some(snapshot.id);
        event.mcp_confidence = Some(mutation.confidence);
        event.before_state = Some(gene_value(&active.dna, mutation.gene)?);
        event.after_state = Some(gene_value(&snapshot.dna, mutation.gene)?);
        event.dna_changes = Some(serde_json::json!({
            "gene": mutation.gene.as_str(),
            "added": added,
            "removed": removed,
            "modified": modified,
        }));
        self.store.append_learning_event(&event)?;

        debug!(new_dna_id = %snapshot.id, version = %version.to_string(), "gene mutation applied");
        Ok(MutationResult {
            snapshot,
            added,
            removed,
            modified,
        })
    }
}

fn gene_value(dna: &Dna, gene: Gene) -> Result<Value> {
    let value = match gene {
        Gene::Identity => serde_json::to_value(&dna.identity)?,
        Gene::Timing => serde_json::to_value(&dna.timing)?,
        Gene::Network => serde_json::to_value(&dna.network)?,
        Gene::Interaction => serde_json::to_value(&dna.interaction)?,
        Gene::Capabilities => serde_json::to_value(&dna.capabilities)?,
    };
    Ok(value)
}

/// Shallow-merges `patch` into the JSON object for `gene` within `dna`,
/// returning the set of top-level keys that were added, removed, or
/// modified. Deserializes the merged object back into the gene's struct so
/// type/shape mismatches in the patch surface immediately rather than
/// silently drifting the DNA's schema.
fn apply_gene_patch(
    dna: &mut Dna,
    gene: Gene,
    patch: &Map<String, Value>,
) -> Result<(Vec<String>, Vec<String>, Vec<String>)> {
    let mut whole = serde_json::to_value(&*dna)?;
    let gene_key = gene.as_str();
    let obj = whole
        .as_object_mut()
        .ok_or_else(|| Error::invariant_violation("DNA did not serialize to a JSON object"))?;

    let before = obj
        .get(gene_key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut after = before.clone();
    for (k, v) in patch {
        after.insert(k.clone(), v.clone());
    }

    let before_keys: std::collections::HashSet<&String> = before.keys().collect();
    let after_keys: std::collections::HashSet<&String> = after.keys().collect();
    let added: Vec<String> = after_keys.difference(&before_keys).map(|s| s.to_string()).collect();
    let removed: Vec<String> = before_keys.difference(&after_keys).map(|s| s.to_string()).collect();
    let modified: Vec<String> = patch
        .keys()
        .filter(|k| before.contains_key(*k) && before.get(*k) != after.get(*k))
        .cloned()
        .collect();

    obj.insert(gene_key.to_string(), Value::Object(after));
    *dna = serde_json::from_value(whole)?;

    Ok((added, removed, modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::store::SqliteStore;
    use crate::store::Target;

    fn setup() -> (Arc<SqliteStore>, Mutator, TargetId) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let target = Target::new("https://example.com");
        store.create_target(&target).unwrap();
        let mutator = Mutator::new(store.clone());
        (store, mutator, target.id)
    }

    #[test]
    fn create_initial_activates_version_one_zero_zero() {
        let (store, mutator, target_id) = setup();
        let snapshot = mutator.create_initial(target_id).unwrap();
        assert_eq!(snapshot.version, "1.0.0");
        assert!(snapshot.parent_id.is_none());
        let active = store.get_active_dna(target_id).unwrap().unwrap();
        assert_eq!(active.id, snapshot.id);
    }

    #[test]
    fn mutate_without_active_dna_fails() {
        let (_, mutator, target_id) = setup();
        let result = mutator.mutate(
            target_id,
            GeneMutation {
                gene: Gene::Timing,
                patch: Map::new(),
                reason: "test".to_string(),
                confidence: 0.5,
                severity: MutationSeverity::Low,
            },
        );
        assert!(matches!(result, Err(Error::NoActiveDna { .. })));
    }

    #[test]
    fn mutate_bumps_patch_and_links_parent() {
        let (store, mutator, target_id) = setup();
        let initial = mutator.create_initial(target_id).unwrap();

        let mut patch = Map::new();
        patch.insert("reading_speed".to_string(), Value::String("slow".to_string()));
        let result = mutator
            .mutate(
                target_id,
                GeneMutation {
                    gene: Gene::Timing,
                    patch,
                    reason: "observed slow reading pattern preferred".to_string(),
                    confidence: 0.7,
                    severity: MutationSeverity::Medium,
                },
            )
            .unwrap();

        assert_eq!(result.snapshot.version, "1.0.1");
        assert_eq!(result.snapshot.parent_id, Some(initial.id));
        assert_eq!(result.modified, vec!["reading_speed".to_string()]);
        assert_eq!(result.snapshot.dna.timing.reading_speed, "slow");

        let active = store.get_active_dna(target_id).unwrap().unwrap();
        assert_eq!(active.id, result.snapshot.id);
        let lineage = store.get_dna_lineage(target_id).unwrap();
        assert_eq!(lineage.len(), 2);
    }

    #[test]
    fn mutation_only_touches_the_target_gene() {
        let (_, mutator, target_id) = setup();
        mutator.create_initial(target_id).unwrap();

        let mut patch = Map::new();
        patch.insert(
            "tls_fingerprint".to_string(),
            Value::String("firefox-125".to_string()),
        );
        let result = mutator
            .mutate(
                target_id,
                GeneMutation {
                    gene: Gene::Network,
                    patch,
                    reason: "blend in with regional traffic".to_string(),
                    confidence: 0.4,
                    severity: MutationSeverity::High,
                },
            )
            .unwrap();

        let default = Dna::default();
        assert_eq!(result.snapshot.dna.identity, default.identity);
        assert_eq!(result.snapshot.dna.timing, default.timing);
        assert_eq!(result.snapshot.dna.network.tls_fingerprint, "firefox-125");
    }

    #[test]
    fn severity_maps_to_trust_impact() {
        assert_eq!(MutationSeverity::High.trust_impact(), -5);
        assert_eq!(MutationSeverity::Medium.trust_impact(), 0);
        assert_eq!(MutationSeverity::Low.trust_impact(), 5);
    }

    proptest::proptest! {
        #[test]
        fn patch_never_touches_other_genes(reading_speed in "[a-z]{1,16}") {
            let mut dna = Dna::default();
            let other_genes_before = (
                dna.identity.clone(),
                dna.network.clone(),
                dna.interaction.clone(),
                dna.capabilities,
                dna.temporal.clone(),
            );

            let mut patch = Map::new();
            patch.insert("reading_speed".to_string(), Value::String(reading_speed));
            apply_gene_patch(&mut dna, Gene::Timing, &patch).unwrap();

            prop_assert_eq!(dna.identity, other_genes_before.0);
            prop_assert_eq!(dna.network, other_genes_before.1);
            prop_assert_eq!(dna.interaction, other_genes_before.2);
            prop_assert_eq!(dna.capabilities, other_genes_before.3);
            prop_assert_eq!(dna.temporal, other_genes_before.4);
        }
    }
}
