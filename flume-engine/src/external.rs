// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! External component libraries.
//!
//! A component library is an OS dynamic library exposing one well-known
//! entry point:
//!
//! ```c
//! void flume_register_contents(ComponentFactory*, NodeFactory*);
//! ```
//!
//! The loader opens the library, resolves the entry point and passes the
//! two factory handles so the library can self-register its component and
//! node types. Loaded libraries stay open for the lifetime of the loader;
//! unloading is deliberately not offered, since leaking registered keys is
//! harmless while dangling creator functions are not.

use std::path::Path;

use libloading::{Library, Symbol};

use crate::factory::ClassFactory;
use crate::node::NodeFactory;
use crate::sim_error;
use crate::types::SimResult;

/// The component-creator registry (see [`crate::component::BoxedModel`]).
pub type ComponentFactory = ClassFactory<fn() -> crate::component::BoxedModel>;

/// Name of the entry point every external library must export.
pub const REGISTER_ENTRY_POINT: &[u8] = b"flume_register_contents";

type RegisterContents = unsafe extern "C" fn(*const ComponentFactory, *const NodeFactory);

/// Opens external libraries and keeps them alive.
#[derive(Default)]
pub struct ExternalLoader {
    libraries: Vec<Library>,
}

impl ExternalLoader {
    /// Create a loader with no libraries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the library at `path` and let it register into the given
    /// factories.
    ///
    /// # Safety-related behaviour
    ///
    /// Loading runs arbitrary initialization code from the library, which
    /// is inherent to dynamic loading; the caller vouches for the library.
    pub fn load(
        &mut self,
        path: &Path,
        component_factory: &ComponentFactory,
        node_factory: &NodeFactory,
    ) -> SimResult {
        // SAFETY: opening a library executes its initializers; this is the
        // documented contract of loading an external component library.
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(e) => return sim_error!("Could not open external library '{}': {e}", path.display()),
        };
        // SAFETY: the entry point has the documented C signature; a library
        // exporting something else under this name is in breach of the
        // loading contract.
        let register: Symbol<RegisterContents> =
            match unsafe { library.get(REGISTER_ENTRY_POINT) } {
                Ok(symbol) => symbol,
                Err(e) => {
                    return sim_error!(
                        "Library '{}' has no '{}' entry point: {e}",
                        path.display(),
                        String::from_utf8_lossy(REGISTER_ENTRY_POINT)
                    );
                }
            };
        unsafe {
            register(
                std::ptr::from_ref(component_factory),
                std::ptr::from_ref(node_factory),
            );
        }
        self.libraries.push(library);
        Ok(())
    }

    /// Number of libraries currently held open.
    #[must_use]
    pub fn num_loaded(&self) -> usize {
        self.libraries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_reported() {
        let mut loader = ExternalLoader::new();
        let components = ComponentFactory::new();
        let nodes = NodeFactory::new();
        let result = loader.load(
            Path::new("/nonexistent/libflume_parts.so"),
            &components,
            &nodes,
        );
        assert!(result.is_err());
        assert_eq!(loader.num_loaded(), 0);
    }
}
