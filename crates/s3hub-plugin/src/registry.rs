//! Plugin registry: the authoritative set of plugins plus the derived
//! per-operation and per-capability lists.
//!
//! The registry itself is not synchronised; [`PluginManager`](crate::PluginManager)
//! owns it behind a single `RwLock` so that every structure is mutated in
//! the same exclusive section.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use s3hub_core::types::S3Operation;

use crate::capabilities::Priority;
use crate::descriptor::{Capability, PluginDescriptor};

/// A plugin as stored in the registry.
#[derive(Debug, Clone)]
pub struct RegisteredPlugin {
    /// The descriptor handed to `register_plugin`.
    descriptor: Arc<PluginDescriptor>,
    /// Priority resolved at registration.
    priority: Priority,
    /// Registration sequence number, the tie-break for equal priorities.
    sequence: u64,
}

impl RegisteredPlugin {
    /// Returns the plugin name.
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Returns the descriptor.
    pub fn descriptor(&self) -> &Arc<PluginDescriptor> {
        &self.descriptor
    }

    /// Returns the resolved priority.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the registration sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn dispatch_key(&self) -> (Reverse<Priority>, u64) {
        (Reverse(self.priority), self.sequence)
    }
}

/// Registry state copied for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchSnapshot {
    /// Plugins for the operation, in dispatch order.
    pub plugins: Vec<RegisteredPlugin>,
    /// Pre-processors, in registration order.
    pub pre_processors: Vec<RegisteredPlugin>,
    /// Post-processors, in registration order.
    pub post_processors: Vec<RegisteredPlugin>,
}

/// Registry of plugins organised by name, operation, and capability.
#[derive(Debug, Default)]
pub struct Registry {
    /// Plugin name → plugin.
    plugins: HashMap<String, RegisteredPlugin>,
    /// Operation → plugins sorted by descending priority, then sequence.
    by_operation: HashMap<S3Operation, Vec<RegisteredPlugin>>,
    /// Listed capability → holders in registration order.
    by_capability: HashMap<Capability, Vec<RegisteredPlugin>>,
    /// Next registration sequence number.
    next_sequence: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a plugin, returning the entry it displaced if the name was
    /// already taken.
    ///
    /// A displaced entry is removed from every list before the new one is
    /// added, so a name never appears twice.
    pub fn insert(&mut self, descriptor: PluginDescriptor) -> Option<RegisteredPlugin> {
        let displaced = self.remove(descriptor.name());

        let entry = RegisteredPlugin {
            priority: descriptor.priority(),
            descriptor: Arc::new(descriptor),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        for operation in entry.descriptor.operations() {
            let list = self.by_operation.entry(*operation).or_default();
            list.push(entry.clone());
            list.sort_by_key(RegisteredPlugin::dispatch_key);
        }

        for capability in entry.descriptor.capabilities() {
            if capability.is_listed() {
                self.by_capability
                    .entry(capability)
                    .or_default()
                    .push(entry.clone());
            }
        }

        self.plugins.insert(entry.name().to_string(), entry);
        displaced
    }

    /// Removes a plugin from every structure.
    pub fn remove(&mut self, name: &str) -> Option<RegisteredPlugin> {
        let entry = self.plugins.remove(name)?;

        for operation in entry.descriptor.operations() {
            if let Some(list) = self.by_operation.get_mut(operation) {
                list.retain(|p| p.name() != name);
                if list.is_empty() {
                    self.by_operation.remove(operation);
                }
            }
        }

        let listed = entry.descriptor.capabilities().into_iter().filter(Capability::is_listed);
        for capability in listed {
            if let Some(list) = self.by_capability.get_mut(&capability) {
                list.retain(|p| p.name() != name);
                if list.is_empty() {
                    self.by_capability.remove(&capability);
                }
            }
        }

        Some(entry)
    }

    /// Removes and returns every plugin, in registration order.
    pub fn drain(&mut self) -> Vec<RegisteredPlugin> {
        let mut entries: Vec<RegisteredPlugin> = self.plugins.drain().map(|(_, e)| e).collect();
        entries.sort_by_key(RegisteredPlugin::sequence);
        self.by_operation.clear();
        self.by_capability.clear();
        entries
    }

    /// Gets a plugin by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredPlugin> {
        self.plugins.get(name)
    }

    /// Checks whether a plugin is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Returns the plugin count.
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Iterates over all plugins in arbitrary order.
    pub fn plugins(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.plugins.values()
    }

    /// Returns the plugins for an operation, in dispatch order.
    pub fn for_operation(&self, operation: S3Operation) -> &[RegisteredPlugin] {
        self.by_operation
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the holders of a listed capability, in registration order.
    ///
    /// Unlisted capabilities (conditional, prioritized) always yield an
    /// empty slice.
    pub fn with_capability(&self, capability: Capability) -> &[RegisteredPlugin] {
        self.by_capability
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Copies what one dispatch of `operation` needs.
    pub fn snapshot(&self, operation: S3Operation) -> DispatchSnapshot {
        DispatchSnapshot {
            plugins: self.for_operation(operation).to_vec(),
            pre_processors: self.with_capability(Capability::PreProcessor).to_vec(),
            post_processors: self.with_capability(Capability::PostProcessor).to_vec(),
        }
    }

    /// Checks that every list mirrors the `plugins` map exactly.
    pub fn is_consistent(&self) -> bool {
        let same = |a: &RegisteredPlugin, b: &RegisteredPlugin| {
            Arc::ptr_eq(&a.descriptor, &b.descriptor)
        };

        for entry in self.plugins.values() {
            for operation in S3Operation::ALL {
                let hits = self
                    .for_operation(operation)
                    .iter()
                    .filter(|p| same(p, entry))
                    .count();
                let expected = usize::from(entry.descriptor.operations().contains(&operation));
                if hits != expected {
                    return false;
                }
            }
            for capability in Capability::LISTED {
                let hits = self
                    .with_capability(capability)
                    .iter()
                    .filter(|p| same(p, entry))
                    .count();
                if hits != usize::from(entry.descriptor.has(capability)) {
                    return false;
                }
            }
        }

        let known = |p: &RegisteredPlugin| {
            self.plugins
                .get(p.name())
                .is_some_and(|entry| same(entry, p))
        };
        let lists_known = self.by_operation.values().flatten().all(known)
            && self.by_capability.values().flatten().all(known);

        let sorted = self.by_operation.values().all(|list| {
            list.windows(2)
                .all(|w| w[0].dispatch_key() < w[1].dispatch_key())
        });

        lists_known && sorted
    }
}
