//! Plan reconciliation
//!
//! Matches declared features, in declared order, against the `[[entries]]`
//! of a buildpack plan. Entries named with a feature's full id are consumed;
//! whatever is left over is unmet. Matching uses a stable partition so the
//! relative order of the remaining entries never changes.

use crate::cnb::{BuildpackPlan, LayerTypes, PlanEntry, UnmetEntry};
use crate::constants::BUILD_MODE_OPTION;
use crate::env::option_metadata_key;
use crate::features::FeatureConfig;
use crate::options::OptionSelections;
use crate::settings::{BuildMode, DevpackSettings};
use tracing::{debug, warn};

/// A declared feature together with the plan entry it consumed
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedFeature<'a> {
    pub feature: &'a FeatureConfig,
    pub full_id: String,
    /// Metadata of the consumed entries; the first entry's keys win
    pub metadata: toml::Table,
}

impl MatchedFeature<'_> {
    /// Layer types requested through entry metadata
    pub fn layer_types(&self) -> LayerTypes {
        layer_types_from_metadata(&self.full_id, &self.metadata)
    }

    /// Selections for declared options, plus `buildMode`
    pub fn option_selections(&self, fallback_mode: BuildMode) -> OptionSelections {
        let mut selections = selections_from_metadata(self.feature, &self.metadata);
        let mode = self
            .metadata
            .get(&option_metadata_key(BUILD_MODE_OPTION))
            .map(metadata_text)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback_mode.as_str().to_string());
        selections.insert(BUILD_MODE_OPTION.to_string(), mode);
        selections
    }
}

/// Outcome of matching a plan against the declared features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation<'a> {
    /// Matched features in declared order
    pub matched: Vec<MatchedFeature<'a>>,
    /// Entries no declared feature consumed, in plan order
    pub unmet: Vec<PlanEntry>,
}

impl Reconciliation<'_> {
    /// `[[unmet]]` rows for build.toml
    pub fn unmet_entries(&self) -> Vec<UnmetEntry> {
        self.unmet
            .iter()
            .map(|e| UnmetEntry {
                name: e.name.clone(),
            })
            .collect()
    }
}

/// Match `features` against the plan entries
pub fn reconcile<'a>(
    features: &'a [FeatureConfig],
    settings: &DevpackSettings,
    plan: &BuildpackPlan,
) -> Reconciliation<'a> {
    let mut remaining = plan.entries.clone();
    let mut matched = Vec::new();

    for feature in features {
        let full_id = feature.full_id(settings);
        let taken = take_entries(&mut remaining, &full_id);
        if taken.is_empty() {
            debug!("No plan entry for {}", full_id);
            continue;
        }

        if taken.len() > 1 {
            debug!("{} plan entries for {}, merging metadata", taken.len(), full_id);
        }
        let mut metadata = toml::Table::new();
        for entry in taken {
            for (key, value) in entry.metadata {
                metadata.entry(key).or_insert(value);
            }
        }

        debug!("Plan entry for {} found", full_id);
        matched.push(MatchedFeature {
            feature,
            full_id,
            metadata,
        });
    }

    debug!(
        "Reconciled plan: {} matched, {} unmet",
        matched.len(),
        remaining.len()
    );
    Reconciliation {
        matched,
        unmet: remaining,
    }
}

/// Remove every entry named `name`, keeping both halves in order
pub fn take_entries(entries: &mut Vec<PlanEntry>, name: &str) -> Vec<PlanEntry> {
    let (taken, kept): (Vec<_>, Vec<_>) =
        std::mem::take(entries).into_iter().partition(|e| e.name == name);
    *entries = kept;
    taken
}

/// `build`, `launch` and `cache` flags from entry metadata.
///
/// Keys match case-insensitively; each flag is `true` unless its own key
/// says otherwise.
pub fn layer_types_from_metadata(full_id: &str, metadata: &toml::Table) -> LayerTypes {
    let flag = |name: &str| -> bool {
        let Some((key, value)) = metadata.iter().find(|(k, _)| k.eq_ignore_ascii_case(name))
        else {
            return true;
        };
        match value {
            toml::Value::Boolean(b) => *b,
            toml::Value::String(s) if s.eq_ignore_ascii_case("true") => true,
            toml::Value::String(s) if s.eq_ignore_ascii_case("false") => false,
            other => {
                warn!(
                    "Ignoring non-boolean plan metadata {}={} for {}",
                    key, other, full_id
                );
                true
            }
        }
    };

    LayerTypes {
        build: flag("build"),
        launch: flag("launch"),
        cache: flag("cache"),
    }
}

/// Selections for declared options from `option_<opt>` metadata keys
pub fn selections_from_metadata(
    feature: &FeatureConfig,
    metadata: &toml::Table,
) -> OptionSelections {
    let mut selections = OptionSelections::new();
    for option_id in feature.options.keys() {
        if let Some(value) = metadata.get(&option_metadata_key(option_id)) {
            let text = metadata_text(value);
            if !text.is_empty() {
                selections.insert(option_id.clone(), text);
            }
        }
    }
    selections
}

fn metadata_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
