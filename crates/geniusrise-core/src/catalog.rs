//! Registry of component types known to this binary.
//!
//! Types become known either through an explicit [`Catalog::register`] call or
//! by being submitted with `inventory::submit!` from any linked crate, in which
//! case [`Catalog::linked`] picks them up.

use indexmap::IndexMap;

use crate::backend;
use crate::schema::{Signature, TypeRef};
use crate::spout::{MethodInfo, SpoutFactory};

pub const SPOUT_BASE: &str = "Spout";
pub const OUTPUT_BASE: &str = "Output";
pub const STATE_BASE: &str = "State";

/// Catalog entry describing one registered type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    /// Direct base type, if any.
    pub extends: Option<&'static str>,
    pub is_abstract: bool,
    pub signature: fn() -> Option<Signature>,
    /// Present for instantiable spouts only.
    pub factory: Option<SpoutFactory>,
    pub methods: &'static [MethodInfo],
}

inventory::collect!(TypeInfo);

impl TypeInfo {
    /// Abstract base with no constructor of its own beyond `signature`.
    pub const fn base(name: &'static str, signature: fn() -> Option<Signature>) -> Self {
        Self {
            name,
            extends: None,
            is_abstract: true,
            signature,
            factory: None,
            methods: &[],
        }
    }

    /// Concrete type that is built by the backend registry, not by a factory.
    pub const fn backend(
        name: &'static str,
        extends: &'static str,
        signature: fn() -> Option<Signature>,
    ) -> Self {
        Self {
            name,
            extends: Some(extends),
            is_abstract: false,
            signature,
            factory: None,
            methods: &[],
        }
    }

    pub fn method(&self, name: &str) -> Option<&'static MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.to_string()).collect()
    }
}

fn spout_signature() -> Option<Signature> {
    Some(
        Signature::new()
            .receiver()
            .required("output", TypeRef::Named(OUTPUT_BASE))
            .required("state", TypeRef::Named(STATE_BASE))
            .var_kwargs("kwargs"),
    )
}

fn receiver_signature() -> Option<Signature> {
    Some(Signature::receiver_only())
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: IndexMap<&'static str, TypeInfo>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The abstract bases and every output and state backend.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(TypeInfo::base(SPOUT_BASE, spout_signature));
        catalog.register(TypeInfo::base(OUTPUT_BASE, receiver_signature));
        catalog.register(TypeInfo::base(STATE_BASE, receiver_signature));
        for info in backend::builtin_types() {
            catalog.register(info);
        }
        catalog
    }

    /// Builtin types plus everything submitted through `inventory` in the linked binary.
    pub fn linked() -> Self {
        let mut catalog = Self::builtin();
        for info in inventory::iter::<TypeInfo> {
            if let Some(previous) = catalog.register(*info) {
                tracing::debug!(name = previous.name, "linked type replaces an earlier registration");
            }
        }
        catalog
    }

    /// Register a type, returning the entry it replaced.
    pub fn register(&mut self, info: TypeInfo) -> Option<TypeInfo> {
        self.types.insert(info.name, info)
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Whether `name` is `base` or inherits from it through `extends`.
    pub fn is_subtype(&self, name: &str, base: &str) -> bool {
        let mut current = name;
        // A chain longer than the catalog must contain a cycle.
        for _ in 0..=self.types.len() {
            if current == base {
                return true;
            }
            match self.types.get(current).and_then(|info| info.extends) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &'static str, extends: &'static str) -> TypeInfo {
        TypeInfo {
            name,
            extends: Some(extends),
            is_abstract: false,
            signature: receiver_signature,
            factory: None,
            methods: &[],
        }
    }

    #[test]
    fn test_builtin_registers_bases_and_backends() {
        let catalog = Catalog::builtin();
        for name in [SPOUT_BASE, OUTPUT_BASE, STATE_BASE, "BatchOutput", "RedisState", "NoState"] {
            assert!(catalog.contains(name), "missing {name}");
        }
        assert!(catalog.get(SPOUT_BASE).unwrap().is_abstract);
        assert!(catalog.is_subtype("RedisState", STATE_BASE));
        assert!(!catalog.is_subtype("RedisState", OUTPUT_BASE));
    }

    #[test]
    fn test_is_subtype_walks_chain() {
        let mut catalog = Catalog::builtin();
        catalog.register(leaf("FileSpout", SPOUT_BASE));
        catalog.register(leaf("CsvSpout", "FileSpout"));

        assert!(catalog.is_subtype("CsvSpout", SPOUT_BASE));
        assert!(catalog.is_subtype("CsvSpout", "CsvSpout"));
        assert!(!catalog.is_subtype("FileSpout", "CsvSpout"));
        assert!(!catalog.is_subtype("Unknown", SPOUT_BASE));
    }

    #[test]
    fn test_is_subtype_terminates_on_cycles() {
        let mut catalog = Catalog::new();
        catalog.register(leaf("A", "B"));
        catalog.register(leaf("B", "A"));
        assert!(!catalog.is_subtype("A", SPOUT_BASE));
    }

    #[test]
    fn test_register_replaces_and_keeps_order() {
        let mut catalog = Catalog::new();
        assert!(catalog.register(leaf("A", SPOUT_BASE)).is_none());
        catalog.register(leaf("B", SPOUT_BASE));
        let previous = catalog.register(leaf("A", OUTPUT_BASE)).unwrap();

        assert_eq!(previous.extends, Some(SPOUT_BASE));
        assert_eq!(catalog.get("A").unwrap().extends, Some(OUTPUT_BASE));
        let names: Vec<&str> = catalog.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
