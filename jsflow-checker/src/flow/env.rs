use std::collections::BTreeMap;

use crate::types::{Lattice, Type};

/// Types of locals and refined property paths at one program point.
///
/// Keys are local names (`x`) or dotted paths rooted at a local or `this`
/// (`x.p`, `this.p`). A dead environment belongs to code that cannot be
/// reached; it is still walked for diagnostics but vanishes in joins.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlowEnv {
    values: BTreeMap<String, Type>,
    live: bool,
}

impl FlowEnv {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            live: true,
        }
    }

    pub fn dead() -> Self {
        Self {
            values: BTreeMap::new(),
            live: false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn kill(&mut self) {
        self.live = false;
    }

    pub fn revive(&mut self) {
        self.live = true;
    }

    pub fn get(&self, path: &str) -> Option<&Type> {
        self.values.get(path)
    }

    /// Binds `path`, forgetting refinements of anything below it.
    pub fn set(&mut self, path: &str, ty: Type) {
        self.forget_below(path);
        self.values.insert(path.to_string(), ty);
    }

    /// Narrows `path` without touching paths below it.
    pub fn refine(&mut self, path: &str, ty: Type) {
        self.values.insert(path.to_string(), ty);
    }

    pub fn forget_below(&mut self, path: &str) {
        let prefix = format!("{path}.");
        self.values.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn join(&self, other: &FlowEnv, lattice: &Lattice<'_>) -> FlowEnv {
        match (self.live, other.live) {
            (false, false) => return self.clone(),
            (true, false) => return self.clone(),
            (false, true) => return other.clone(),
            (true, true) => {}
        }
        let mut values = BTreeMap::new();
        for (key, left) in &self.values {
            match other.values.get(key) {
                Some(right) => {
                    values.insert(key.clone(), lattice.join(left, right));
                }
                // A refinement proven on one side only does not survive.
                None if key.contains('.') => {}
                None => {
                    values.insert(key.clone(), left.clone());
                }
            }
        }
        for (key, right) in &other.values {
            if !key.contains('.') && !values.contains_key(key) {
                values.insert(key.clone(), right.clone());
            }
        }
        FlowEnv { values, live: true }
    }

    pub fn join_all<'e>(envs: impl IntoIterator<Item = &'e FlowEnv>, lattice: &Lattice<'_>) -> FlowEnv {
        envs.into_iter()
            .fold(FlowEnv::dead(), |acc, env| acc.join(env, lattice))
    }
}
