//! Spec registry
//!
//! Holds the completion specs known to the engine. Specs are loaded from
//! `*.json` files (or inserted directly), and `loadSpec` references by name
//! are resolved once, when the registry is (re)built, so that the state
//! machine only ever sees self-contained trees.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::model::{LoadSpec, Subcommand};
use crate::error::{ArgsenseError, Result, SpecError};

/// Maximum depth of `loadSpec` chains
pub const MAX_LOAD_DEPTH: usize = 8;

/// Registry of completion specs, looked up by any root name
#[derive(Debug, Default)]
pub struct SpecRegistry {
    /// Specs as loaded, keyed by primary name
    raw: HashMap<String, Subcommand>,
    /// Resolved specs, keyed by every root name
    resolved: HashMap<String, Arc<Subcommand>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec and rebuild the resolved view.
    ///
    /// A spec whose `loadSpec` chain cannot be resolved is rejected and the
    /// registry is left as it was.
    pub fn insert(&mut self, spec: Subcommand) -> Result<()> {
        let name = spec.primary_name().to_string();
        let previous = self.insert_raw(spec)?;

        let mut failed = self.rebuild();
        let Some(index) = failed.iter().position(|(failed_name, _)| *failed_name == name) else {
            return Ok(());
        };

        let (_, err) = failed.swap_remove(index);
        match previous {
            Some(previous) => self.raw.insert(name, previous),
            None => self.raw.remove(&name),
        };
        self.rebuild();
        Err(err)
    }

    /// Decode and register one JSON spec
    ///
    /// # Arguments
    /// * `json` - Spec document
    ///
    /// # Returns
    /// * `Result<String>` - Primary name of the registered spec
    pub fn load_json(&mut self, json: &str) -> Result<String> {
        let spec: Subcommand =
            serde_json::from_str(json).map_err(|e| SpecError::InvalidFormat(e.to_string()))?;
        let name = spec.primary_name().to_string();
        self.insert(spec)?;
        Ok(name)
    }

    /// Load every `*.json` spec in a directory.
    ///
    /// Files that fail to decode, or whose `loadSpec` chain cannot be
    /// resolved, are skipped with a warning.
    ///
    /// # Returns
    /// * `Result<usize>` - Number of specs loaded
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Subcommand>(&content) {
                Ok(spec) if spec.name.is_empty() => {
                    warn!("Skipping spec {}: spec has no name", path.display());
                }
                Ok(spec) => {
                    loaded.push(spec.primary_name().to_string());
                    self.insert_raw(spec)?;
                }
                Err(e) => warn!("Skipping spec {}: {}", path.display(), e),
            }
        }

        let failed = self.rebuild();
        if !failed.is_empty() {
            for (name, _) in &failed {
                self.raw.remove(name);
            }
            loaded.retain(|name| !failed.iter().any(|(failed_name, _)| failed_name == name));
            self.rebuild();
        }

        debug!("Loaded {} specs from {}", loaded.len(), dir.display());
        Ok(loaded.len())
    }

    /// Look a spec up by any of its root names
    pub fn get(&self, name: &str) -> Option<Arc<Subcommand>> {
        self.resolved.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolved.contains_key(name)
    }

    /// Every root name, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolved.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Store a spec as loaded, returning the one it replaces
    fn insert_raw(&mut self, spec: Subcommand) -> Result<Option<Subcommand>> {
        if spec.name.is_empty() {
            return Err(SpecError::InvalidFormat("spec has no name".to_string()).into());
        }
        Ok(self.raw.insert(spec.primary_name().to_string(), spec))
    }

    /// Rebuild the resolved view. Specs that fail to resolve are left out
    /// and returned with their error.
    fn rebuild(&mut self) -> Vec<(String, ArgsenseError)> {
        let mut resolved = HashMap::new();
        let mut failed = Vec::new();
        for (key, spec) in &self.raw {
            let mut spec = spec.clone();
            if let Err(e) = self.resolve_named(&mut spec, 0) {
                warn!("Skipping spec '{}': {}", key, e);
                failed.push((key.clone(), e));
                continue;
            }
            let spec = Arc::new(spec);
            for name in &spec.name {
                resolved.insert(name.clone(), Arc::clone(&spec));
            }
        }
        self.resolved = resolved;
        failed
    }

    /// Replace every `LoadSpec::Named` in the tree by the named spec's contents
    fn resolve_named(&self, node: &mut Subcommand, depth: usize) -> Result<()> {
        if let Some(LoadSpec::Named(name)) = &node.load_spec {
            if depth >= MAX_LOAD_DEPTH {
                return Err(SpecError::RecursionLimit(name.clone()).into());
            }
            match self.find_raw(name) {
                Some(target) => {
                    let mut loaded = target.clone();
                    self.resolve_named(&mut loaded, depth + 1)?;
                    node.absorb(loaded);
                }
                None => {
                    warn!("loadSpec '{}' not found for '{}'", name, node.primary_name());
                    node.load_spec = None;
                }
            }
        }

        for sub in &mut node.subcommands {
            self.resolve_named(sub, depth)?;
        }
        Ok(())
    }

    fn find_raw(&self, name: &str) -> Option<&Subcommand> {
        self.raw
            .get(name)
            .or_else(|| self.raw.values().find(|s| s.matches(name)))
    }
}

/// Resolve `LoadSpec::Dynamic` callbacks along the subcommand path of `tokens`.
///
/// Only the subcommands a token names are visited. When no dynamic spec lies
/// on the path the spec is returned borrowed.
///
/// # Arguments
/// * `spec` - Root spec
/// * `tokens` - Token texts, the command name first
pub fn resolve_dynamic<'a>(spec: &'a Subcommand, tokens: &[String]) -> Cow<'a, Subcommand> {
    let mut path = Vec::new();
    let mut any_dynamic = matches!(spec.load_spec, Some(LoadSpec::Dynamic(_)));
    let mut node = spec;
    for token in tokens.iter().skip(1) {
        let Some(index) = node.subcommand_index(token) else {
            continue;
        };
        node = &node.subcommands[index];
        any_dynamic |= matches!(node.load_spec, Some(LoadSpec::Dynamic(_)));
        path.push(index);
    }

    if !any_dynamic {
        return Cow::Borrowed(spec);
    }

    let mut owned = spec.clone();
    let mut node = &mut owned;
    apply_dynamic(node, tokens);
    for index in path {
        node = &mut node.subcommands[index];
        apply_dynamic(node, tokens);
    }
    Cow::Owned(owned)
}

fn apply_dynamic(node: &mut Subcommand, tokens: &[String]) {
    if let Some(LoadSpec::Dynamic(generate)) = node.load_spec.clone() {
        match (generate.0)(tokens) {
            Some(loaded) => node.absorb(loaded),
            None => node.load_spec = None,
        }
    }
}
