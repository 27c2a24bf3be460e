//! Generalised constructor registry for selecting a polymorphic
//! implementation by configuration name at startup: a name→constructor
//! lookup table built once, queried by a config string, where an unknown
//! name is a configuration error.

use std::collections::HashMap;

use crate::error::CoreError;

type Constructor<T> = Box<dyn Fn() -> Result<Box<T>, CoreError> + Send + Sync>;

/// A name-keyed table of constructors for implementations of `T`.
///
/// Populated once at process start with every known implementation, then
/// queried by a single configuration value (e.g. `GROUPING_STRATEGY`,
/// `DEPLOYMENT_PLATFORM`).
pub struct Registry<T: ?Sized> {
    constructors: HashMap<&'static str, Constructor<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    pub fn register<F>(&mut self, name: &'static str, constructor: F)
    where
        F: Fn() -> Result<Box<T>, CoreError> + Send + Sync + 'static,
    {
        self.constructors.insert(name, Box::new(constructor));
    }

    /// Builds the implementation registered under `name`, or a
    /// configuration error naming the unknown value and the known choices.
    pub fn build(&self, name: &str) -> Result<Box<T>, CoreError> {
        match self.constructors.get(name) {
            Some(ctor) => ctor(),
            None => {
                let mut known: Vec<&str> = self.constructors.keys().copied().collect();
                known.sort_unstable();
                Err(CoreError::configuration(format!(
                    "unknown plugin '{name}', expected one of: {}",
                    known.join(", ")
                )))
            }
        }
    }
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
