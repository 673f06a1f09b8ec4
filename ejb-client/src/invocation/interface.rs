//! Client-side interface descriptors.
//!
//! Bean descriptors name their interfaces by class name only. The methods an
//! interface offers (and which of them run asynchronously) are registered on
//! the client once and resolved when a proxy is built.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use ejb_core::{EjbError, MethodSignature, Result};

/// Error convention of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceStyle {
    /// Legacy remote/home interface: failures surface as remote exceptions.
    Legacy,
    /// Business interface: failures surface as container exceptions.
    Business,
}

impl fmt::Display for InterfaceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceStyle::Legacy => f.write_str("legacy"),
            InterfaceStyle::Business => f.write_str("business"),
        }
    }
}

/// One method of an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    parameter_types: Vec<String>,
    asynchronous: bool,
}

impl MethodDescriptor {
    /// Creates a synchronous method.
    pub fn new<I, S>(name: impl Into<String>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
            asynchronous: false,
        }
    }

    /// Marks the method as asynchronous.
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Returns the method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameter types.
    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Returns true if the method is declared asynchronous on the client.
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }
}

/// A named interface with its methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    name: String,
    style: InterfaceStyle,
    methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    /// Creates a legacy remote or home interface.
    pub fn legacy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: InterfaceStyle::Legacy,
            methods: Vec::new(),
        }
    }

    /// Creates a business interface.
    pub fn business(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            style: InterfaceStyle::Business,
            methods: Vec::new(),
        }
    }

    /// Adds a method.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Returns the interface class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the error convention.
    pub fn style(&self) -> InterfaceStyle {
        self.style
    }

    /// Returns the declared methods.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Finds a method by name and arity.
    pub fn method(&self, name: &str, arity: usize) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameter_types.len() == arity)
    }

    /// Builds the wire signature of one of this interface's methods.
    pub fn signature(&self, method: &MethodDescriptor) -> MethodSignature {
        MethodSignature::new(
            self.name.as_str(),
            method.name.as_str(),
            method.parameter_types.iter().map(String::as_str),
        )
    }
}

/// Interfaces known to a client, by class name.
///
/// Clones share the same table.
#[derive(Clone, Default)]
pub struct InterfaceRegistry {
    interfaces: Arc<DashMap<String, Arc<InterfaceDescriptor>>>,
}

impl InterfaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an interface, replacing any previous one of the same name.
    pub fn register(&self, interface: InterfaceDescriptor) {
        self.interfaces
            .insert(interface.name.clone(), Arc::new(interface));
    }

    /// Returns true if the interface is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Resolves an interface.
    pub fn get(&self, name: &str) -> Result<Arc<InterfaceDescriptor>> {
        self.interfaces
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EjbError::ClassNotFound(name.to_string()))
    }
}

impl fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.interfaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("InterfaceRegistry")
            .field("interfaces", &names)
            .finish()
    }
}
