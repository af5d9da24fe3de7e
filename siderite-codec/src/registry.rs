//! Runtime registry of described-type decode hooks
//!
//! The decoder front door consults the registry whenever a described value is
//! read: a registered hook may validate or reshape the body, an unregistered
//! descriptor is passed through opaque. Engines register the transport and
//! messaging descriptors at construction; applications may add their own.

use std::collections::HashMap;

use crate::error::Error;
use crate::primitives::Symbol;
use crate::value::{Descriptor, Value};

type Hook = Box<dyn Fn(&Descriptor, Value) -> Result<Value, Error> + Send + Sync>;

/// Maps descriptor codes and names to decode hooks
#[derive(Default)]
pub struct Registry {
    by_code: HashMap<u64, Hook>,
    by_name: HashMap<Symbol, Hook>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("codes", &self.by_code.keys().collect::<Vec<_>>())
            .field("names", &self.by_name.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_code<F>(&mut self, code: u64, hook: F)
    where
        F: Fn(&Descriptor, Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.by_code.insert(code, Box::new(hook));
    }

    pub fn register_name<F>(&mut self, name: impl Into<Symbol>, hook: F)
    where
        F: Fn(&Descriptor, Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.by_name.insert(name.into(), Box::new(hook));
    }

    /// Registers the same hook under both identities of a descriptor, the
    /// usual case for standardized types
    pub fn register<F>(&mut self, code: u64, name: &str, hook: F)
    where
        F: Fn(&Descriptor, Value) -> Result<Value, Error> + Send + Sync + Clone + 'static,
    {
        self.register_code(code, hook.clone());
        self.register_name(name, hook);
    }

    /// Applies the hook registered for `descriptor`, or wraps the body opaque
    /// when nothing is registered
    pub fn decode(&self, descriptor: Descriptor, body: Value) -> Result<Value, Error> {
        let hook = match &descriptor {
            Descriptor::Code(code) => self.by_code.get(code),
            Descriptor::Name(name) => self.by_name.get(name),
        };
        match hook {
            Some(hook) => hook(&descriptor, body),
            None => Ok(Value::described(descriptor, body)),
        }
    }

    /// A hook that only checks the body is a list, the shape every composite
    /// record shares
    pub fn expect_list(descriptor: &Descriptor, body: Value) -> Result<Value, Error> {
        match &body {
            Value::List(_) | Value::Null => Ok(Value::described(descriptor.clone(), body)),
            other => Err(Error::TypeMismatch {
                expected: "list",
                found: other.kind(),
            }),
        }
    }

    /// A hook that only checks the body is a map
    pub fn expect_map(descriptor: &Descriptor, body: Value) -> Result<Value, Error> {
        match &body {
            Value::Map(_) | Value::Null => Ok(Value::described(descriptor.clone(), body)),
            other => Err(Error::TypeMismatch {
                expected: "map",
                found: other.kind(),
            }),
        }
    }
}
