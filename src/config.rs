//! Declarative transform configuration.
//!
//! A [`WrapConfig`] lists built-in transforms with data-only parameters so a
//! gateway can be described in a JSON file:
//!
//! ```json
//! {
//!   "transforms": [
//!     { "kind": "rename_types", "prefix": "Upstream_" },
//!     { "kind": "filter_root_fields", "exclude": ["internal", { "regex": "^debug" }] },
//!     { "kind": "prune_schema" }
//!   ]
//! }
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::transform::Transform;
use crate::transforms::{
    FilterObjectFields, FilterRootFields, FilterTypes, HoistField, Pattern, PruneOptions,
    PruneSchema, RemoveObjectFieldDeprecations, RemoveObjectFieldDirectives,
    RemoveObjectFieldsWithDeprecation, RemoveObjectFieldsWithDirective, RenameObjectFields,
    RenameRootFields, RenameRootTypes, RenameTypes, RenameTypesOptions, WrapType,
};

/// Ordered list of configured transforms.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WrapConfig {
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
}

/// A string matched exactly, or `{ "regex": "..." }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PatternConfig {
    Exact(String),
    Regex { regex: String },
}

impl PatternConfig {
    fn build(&self) -> Result<Pattern, ConfigError> {
        match self {
            PatternConfig::Exact(value) => Ok(Pattern::from(value.as_str())),
            PatternConfig::Regex { regex } => Regex::new(regex)
                .map(Pattern::from)
                .map_err(|source| ConfigError::InvalidRegex {
                    pattern: regex.clone(),
                    source,
                }),
        }
    }
}

/// One built-in transform and its parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformConfig {
    /// Renames named types through `map`, then adds `prefix`/`suffix` to
    /// the rest (types listed in `exclude` keep their names).
    RenameTypes {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        suffix: Option<String>,
        #[serde(default)]
        map: IndexMap<String, String>,
        #[serde(default)]
        exclude: Vec<String>,
        #[serde(default)]
        rename_builtins: bool,
        #[serde(default = "default_true")]
        rename_scalars: bool,
    },

    /// Renames root types, e.g. `{ "Query": "RootQuery" }`.
    RenameRootTypes { map: IndexMap<String, String> },

    /// Renames root fields by name, then adds `prefix` to the rest.
    RenameRootFields {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        map: IndexMap<String, String>,
    },

    /// Renames object fields keyed by `Type.field` coordinates.
    RenameObjectFields { map: IndexMap<String, String> },

    /// Removes named types matching any pattern.
    FilterTypes { exclude: Vec<PatternConfig> },

    /// Removes root fields matching any pattern.
    FilterRootFields { exclude: Vec<PatternConfig> },

    /// Removes object fields by `Type.field` coordinate.
    FilterObjectFields { exclude: Vec<String> },

    RemoveObjectFieldsWithDeprecation { reason: PatternConfig },

    RemoveObjectFieldDeprecations { reason: PatternConfig },

    RemoveObjectFieldsWithDirective {
        name: PatternConfig,
        #[serde(default)]
        arguments: IndexMap<String, PatternConfig>,
    },

    RemoveObjectFieldDirectives {
        name: PatternConfig,
        #[serde(default)]
        arguments: IndexMap<String, PatternConfig>,
    },

    /// Moves every field of `outer` under `field_name: type_name!`.
    WrapType {
        outer: String,
        type_name: String,
        field_name: String,
    },

    /// Lifts the field at `path` below `type_name` onto it.
    HoistField {
        type_name: String,
        path: Vec<String>,
        new_field_name: String,
    },

    /// Removes unreachable and empty types. `skip_types` are never removed.
    PruneSchema {
        #[serde(default)]
        skip_empty_composite_type_pruning: bool,
        #[serde(default)]
        skip_unimplemented_interfaces_pruning: bool,
        #[serde(default)]
        skip_unused_types_pruning: bool,
        #[serde(default)]
        skip_types: Vec<String>,
    },
}

fn default_true() -> bool {
    true
}

impl WrapConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::InvalidJson { source })
    }

    /// Builds the transforms in configuration order.
    pub fn build_transforms(&self) -> Result<Vec<Arc<dyn Transform>>, ConfigError> {
        self.transforms.iter().map(TransformConfig::build).collect()
    }
}

impl TransformConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            TransformConfig::RenameTypes { .. } => "rename_types",
            TransformConfig::RenameRootTypes { .. } => "rename_root_types",
            TransformConfig::RenameRootFields { .. } => "rename_root_fields",
            TransformConfig::RenameObjectFields { .. } => "rename_object_fields",
            TransformConfig::FilterTypes { .. } => "filter_types",
            TransformConfig::FilterRootFields { .. } => "filter_root_fields",
            TransformConfig::FilterObjectFields { .. } => "filter_object_fields",
            TransformConfig::RemoveObjectFieldsWithDeprecation { .. } => {
                "remove_object_fields_with_deprecation"
            }
            TransformConfig::RemoveObjectFieldDeprecations { .. } => {
                "remove_object_field_deprecations"
            }
            TransformConfig::RemoveObjectFieldsWithDirective { .. } => {
                "remove_object_fields_with_directive"
            }
            TransformConfig::RemoveObjectFieldDirectives { .. } => "remove_object_field_directives",
            TransformConfig::WrapType { .. } => "wrap_type",
            TransformConfig::HoistField { .. } => "hoist_field",
            TransformConfig::PruneSchema { .. } => "prune_schema",
        }
    }

    pub fn build(&self) -> Result<Arc<dyn Transform>, ConfigError> {
        let transform: Arc<dyn Transform> = match self {
            TransformConfig::RenameTypes {
                prefix,
                suffix,
                map,
                exclude,
                rename_builtins,
                rename_scalars,
            } => {
                let (prefix, suffix) = (prefix.clone(), suffix.clone());
                if map.is_empty() && prefix.is_none() && suffix.is_none() {
                    return Err(self.empty("map entry, prefix or suffix"));
                }
                let (map, exclude) = (map.clone(), exclude.clone());
                let options = RenameTypesOptions::default()
                    .rename_builtins(*rename_builtins)
                    .rename_scalars(*rename_scalars);
                Arc::new(
                    RenameTypes::new(move |name| {
                        if exclude.iter().any(|excluded| excluded == name) {
                            return None;
                        }
                        if let Some(renamed) = map.get(name) {
                            return Some(renamed.clone());
                        }
                        affix(name, prefix.as_deref(), suffix.as_deref())
                    })
                    .with_options(options),
                )
            }
            TransformConfig::RenameRootTypes { map } => {
                if map.is_empty() {
                    return Err(self.empty("map entry"));
                }
                let map = map.clone();
                Arc::new(RenameRootTypes::new(move |name| map.get(name).cloned()))
            }
            TransformConfig::RenameRootFields { prefix, map } => {
                if map.is_empty() && prefix.is_none() {
                    return Err(self.empty("map entry or prefix"));
                }
                let (prefix, map) = (prefix.clone(), map.clone());
                Arc::new(RenameRootFields::new(move |_, field_name, _| {
                    map.get(field_name)
                        .cloned()
                        .or_else(|| affix(field_name, prefix.as_deref(), None))
                }))
            }
            TransformConfig::RenameObjectFields { map } => {
                if map.is_empty() {
                    return Err(self.empty("map entry"));
                }
                let mut renames = IndexMap::new();
                for (coordinate, new_name) in map {
                    renames.insert(parse_coordinate(coordinate)?, new_name.clone());
                }
                Arc::new(RenameObjectFields::new(move |type_name, field_name, _| {
                    renames
                        .get(&(type_name.to_string(), field_name.to_string()))
                        .cloned()
                }))
            }
            TransformConfig::FilterTypes { exclude } => {
                let patterns = self.patterns(exclude)?;
                Arc::new(FilterTypes::new(move |type_def| {
                    !patterns.iter().any(|p| p.matches(&type_def.name))
                }))
            }
            TransformConfig::FilterRootFields { exclude } => {
                let patterns = self.patterns(exclude)?;
                Arc::new(FilterRootFields::new(move |_, field_name, _| {
                    !patterns.iter().any(|p| p.matches(field_name))
                }))
            }
            TransformConfig::FilterObjectFields { exclude } => {
                if exclude.is_empty() {
                    return Err(self.empty("coordinate"));
                }
                let excluded = exclude
                    .iter()
                    .map(|coordinate| parse_coordinate(coordinate))
                    .collect::<Result<Vec<_>, _>>()?;
                Arc::new(FilterObjectFields::new(move |type_name, field_name, _| {
                    !excluded
                        .iter()
                        .any(|(t, f)| t == type_name && f == field_name)
                }))
            }
            TransformConfig::RemoveObjectFieldsWithDeprecation { reason } => {
                Arc::new(RemoveObjectFieldsWithDeprecation::new(reason.build()?))
            }
            TransformConfig::RemoveObjectFieldDeprecations { reason } => {
                Arc::new(RemoveObjectFieldDeprecations::new(reason.build()?))
            }
            TransformConfig::RemoveObjectFieldsWithDirective { name, arguments } => Arc::new(
                RemoveObjectFieldsWithDirective::new(name.build()?, build_arguments(arguments)?),
            ),
            TransformConfig::RemoveObjectFieldDirectives { name, arguments } => Arc::new(
                RemoveObjectFieldDirectives::new(name.build()?, build_arguments(arguments)?),
            ),
            TransformConfig::WrapType {
                outer,
                type_name,
                field_name,
            } => Arc::new(WrapType::new(
                outer.as_str(),
                type_name.as_str(),
                field_name.as_str(),
            )),
            TransformConfig::HoistField {
                type_name,
                path,
                new_field_name,
            } => {
                if path.is_empty() {
                    return Err(self.empty("path segment"));
                }
                Arc::new(HoistField::new(
                    type_name.as_str(),
                    path.clone(),
                    new_field_name.as_str(),
                ))
            }
            TransformConfig::PruneSchema {
                skip_empty_composite_type_pruning,
                skip_unimplemented_interfaces_pruning,
                skip_unused_types_pruning,
                skip_types,
            } => {
                let mut options = PruneOptions::default()
                    .skip_empty_composite_type_pruning(*skip_empty_composite_type_pruning)
                    .skip_unimplemented_interfaces_pruning(*skip_unimplemented_interfaces_pruning)
                    .skip_unused_types_pruning(*skip_unused_types_pruning);
                if !skip_types.is_empty() {
                    let skip_types = skip_types.clone();
                    options = options.skip_pruning(move |type_def| {
                        skip_types.iter().any(|name| *name == type_def.name)
                    });
                }
                Arc::new(PruneSchema::new(options))
            }
        };
        Ok(transform)
    }

    fn empty(&self, what: &'static str) -> ConfigError {
        ConfigError::Empty {
            kind: self.kind(),
            what,
        }
    }

    fn patterns(&self, configs: &[PatternConfig]) -> Result<Vec<Pattern>, ConfigError> {
        if configs.is_empty() {
            return Err(self.empty("pattern"));
        }
        configs.iter().map(PatternConfig::build).collect()
    }
}

fn affix(name: &str, prefix: Option<&str>, suffix: Option<&str>) -> Option<String> {
    if prefix.is_none() && suffix.is_none() {
        return None;
    }
    Some(format!(
        "{}{}{}",
        prefix.unwrap_or_default(),
        name,
        suffix.unwrap_or_default()
    ))
}

fn build_arguments(
    arguments: &IndexMap<String, PatternConfig>,
) -> Result<IndexMap<String, Pattern>, ConfigError> {
    arguments
        .iter()
        .map(|(name, pattern)| Ok((name.clone(), pattern.build()?)))
        .collect()
}

/// Splits `Type.field`.
fn parse_coordinate(coordinate: &str) -> Result<(String, String), ConfigError> {
    match coordinate.split_once('.') {
        Some((type_name, field_name))
            if !type_name.is_empty() && !field_name.is_empty() && !field_name.contains('.') =>
        {
            Ok((type_name.to_string(), field_name.to_string()))
        }
        _ => Err(ConfigError::InvalidCoordinate {
            coordinate: coordinate.to_string(),
        }),
    }
}
