//! # Application descriptor table.
//!
//! [`Registry`] is the explicit replacement for a link-time table of apps: it is
//! built once at startup, then shared (`Arc<Registry>`) with the orchestrator and
//! every consumer that needs to enumerate apps. Tests build their own local registries.
//!
//! ## Rules
//! - Names are unique; a duplicate is a boot-fatal [`RegistryError::Duplicate`].
//! - Declaration order is stable and is the order of every listing.
//! - Dependencies may name apps registered later; resolution happens at launch time.
//! - Conflicts are symmetric: A conflicts with B if either one lists the other.
//!
//! ## Start order
//! ```text
//! start_order("launcher")
//!   launcher ─requires─► gui ─requires─► storage
//!   DFS post-order  ───►  [storage, gui, launcher]
//!
//! a ─requires─► b ─requires─► a   ───►  LaunchError::Cycle { members: [a, b] }
//! ```

use std::collections::HashMap;

use crate::app::AppDescriptor;
use crate::error::{LaunchError, RegistryError, UnknownApplication};

/// Static table of application descriptors.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    apps: Vec<AppDescriptor>,
    index: HashMap<String, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Done,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from descriptors in declaration order.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = AppDescriptor>,
    {
        let mut reg = Self::new();
        for desc in descriptors {
            reg.register(desc)?;
        }
        Ok(reg)
    }

    /// Adds one descriptor.
    pub fn register(&mut self, desc: AppDescriptor) -> Result<(), RegistryError> {
        let name = desc.name();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.index.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        if desc.depends_on(name) || desc.lists_conflict(name) {
            return Err(RegistryError::SelfReference {
                name: name.to_string(),
            });
        }

        self.index.insert(name.to_string(), self.apps.len());
        self.apps.push(desc);
        Ok(())
    }

    /// Number of registered apps.
    pub fn len(&self) -> usize {
        self.apps.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Descriptor by name.
    pub fn get(&self, name: &str) -> Option<&AppDescriptor> {
        self.index.get(name).map(|&i| &self.apps[i])
    }

    /// Declaration index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Declaration index by name, or [`UnknownApplication`].
    pub fn require(&self, name: &str) -> Result<usize, UnknownApplication> {
        self.index_of(name)
            .ok_or_else(|| UnknownApplication::new(name))
    }

    /// Descriptor by declaration index.
    ///
    /// # Panics
    /// If `idx` is out of range; indices come from this registry.
    pub fn at(&self, idx: usize) -> &AppDescriptor {
        &self.apps[idx]
    }

    /// All descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.apps.iter()
    }

    /// Non-service apps in declaration order (launcher listing).
    pub fn applications(&self) -> impl Iterator<Item = &AppDescriptor> {
        self.apps.iter().filter(|a| a.is_foreground())
    }

    /// True if the two apps are mutually exclusive (declared on either side).
    pub fn conflicts_between(&self, a: usize, b: usize) -> bool {
        let (da, db) = (&self.apps[a], &self.apps[b]);
        da.lists_conflict(db.name()) || db.lists_conflict(da.name())
    }

    /// Direct dependents of `idx`, in declaration order.
    pub fn dependents(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let name = self.apps[idx].name();
        self.apps
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.depends_on(name))
            .map(|(i, _)| i)
    }

    /// Dependency references that name no registered app, as `(app, missing)`.
    pub fn unresolved(&self) -> Vec<(String, String)> {
        self.apps
            .iter()
            .flat_map(|a| {
                a.dependencies()
                    .filter(|d| !self.index.contains_key(*d))
                    .map(|d| (a.name().to_string(), d.to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Transitive dependency closure of `idx` in strict topological order,
    /// ending with `idx` itself.
    ///
    /// Fails with [`LaunchError::Cycle`] if the closure is cyclic, or with
    /// [`LaunchError::Dependency`] wrapping [`LaunchError::Unknown`] if a dependency
    /// names no registered app.
    pub fn start_order(&self, idx: usize) -> Result<Vec<usize>, LaunchError> {
        let mut marks = vec![Mark::New; self.apps.len()];
        let mut path = Vec::new();
        let mut out = Vec::new();
        self.visit(idx, &mut marks, &mut path, &mut out)?;
        Ok(out)
    }

    fn visit(
        &self,
        idx: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        out: &mut Vec<usize>,
    ) -> Result<(), LaunchError> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::Visiting => {
                let from = path.iter().position(|&p| p == idx).unwrap_or(0);
                let members = path[from..]
                    .iter()
                    .map(|&i| self.apps[i].name().to_string())
                    .collect();
                return Err(LaunchError::Cycle { members });
            }
            Mark::New => {}
        }

        marks[idx] = Mark::Visiting;
        path.push(idx);

        let desc = &self.apps[idx];
        for dep in desc.dependencies() {
            let Some(d) = self.index_of(dep) else {
                return Err(LaunchError::Dependency {
                    app: desc.name().to_string(),
                    dependency: dep.to_string(),
                    source: Box::new(UnknownApplication::new(dep).into()),
                });
            };
            self.visit(d, marks, path, out)?;
        }

        path.pop();
        marks[idx] = Mark::Done;
        out.push(idx);
        Ok(())
    }
}
