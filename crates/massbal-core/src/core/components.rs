use super::elements;
use super::error::DefinitionError;
use std::collections::HashMap;

/// A molecular species with a fixed atomic composition.
///
/// Components are immutable once defined; the molar mass is derived from the
/// composition at definition time and never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    atoms: Vec<&'static str>,
    counts: Vec<u32>,
    molar_mass: f64,
}

impl Component {
    /// Creates a component from parallel atom-symbol and count lists.
    ///
    /// Repeated symbols are merged into a single entry, keeping the position of
    /// their first occurrence.
    ///
    /// # Arguments
    ///
    /// * `name` - The component name.
    /// * `atoms` - Element symbols, e.g. `["C", "H"]`.
    /// * `counts` - Number of atoms of each element, matching `atoms` in length.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the lists differ in length, are empty,
    /// or name an element not found in the periodic table.
    pub fn new(name: &str, atoms: &[&str], counts: &[u32]) -> Result<Self, DefinitionError> {
        if atoms.len() != counts.len() {
            return Err(DefinitionError::LengthMismatch {
                context: format!("atom counts of component '{}'", name),
                expected: atoms.len(),
                actual: counts.len(),
            });
        }
        if atoms.is_empty() || counts.iter().all(|&c| c == 0) {
            return Err(DefinitionError::EmptyComposition(name.to_string()));
        }

        let mut merged_atoms: Vec<&'static str> = Vec::with_capacity(atoms.len());
        let mut merged_counts: Vec<u32> = Vec::with_capacity(atoms.len());
        for (symbol, &count) in atoms.iter().zip(counts) {
            let canonical =
                elements::canonical_symbol(symbol).ok_or_else(|| DefinitionError::UnknownAtom {
                    component: name.to_string(),
                    symbol: symbol.to_string(),
                })?;
            match merged_atoms.iter().position(|&a| a == canonical) {
                Some(idx) => merged_counts[idx] += count,
                None => {
                    merged_atoms.push(canonical);
                    merged_counts.push(count);
                }
            }
        }

        let molar_mass = merged_atoms
            .iter()
            .zip(&merged_counts)
            .map(|(symbol, &count)| {
                // Symbols were validated above.
                elements::atomic_weight(symbol).unwrap_or_default() * count as f64
            })
            .sum();

        Ok(Self {
            name: name.to_string(),
            atoms: merged_atoms,
            counts: merged_counts,
            molar_mass,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atoms(&self) -> &[&'static str] {
        &self.atoms
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Molar mass in g/mol.
    pub fn molar_mass(&self) -> f64 {
        self.molar_mass
    }

    /// Number of atoms of `symbol` in one molecule, zero if absent.
    pub fn atom_count(&self, symbol: &str) -> u32 {
        self.atoms
            .iter()
            .position(|&a| a == symbol)
            .map(|idx| self.counts[idx])
            .unwrap_or(0)
    }

    /// Iterates over `(symbol, count)` pairs in definition order.
    pub fn composition(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.atoms.iter().copied().zip(self.counts.iter().copied())
    }
}

/// Insertion-ordered set of components shared by every stream built from it.
///
/// Streams hold the registry behind an `Arc`; two streams belong to the same
/// registry only when they point at the same allocation. Growing a registry
/// therefore means building a new one and refreshing every stream onto it.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<Component>,
    index: HashMap<String, usize>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a new component and returns a reference to it.
    ///
    /// # Errors
    ///
    /// Fails if the name is already taken or the composition is invalid.
    pub fn define(
        &mut self,
        name: &str,
        atoms: &[&str],
        counts: &[u32],
    ) -> Result<&Component, DefinitionError> {
        if self.index.contains_key(name) {
            return Err(DefinitionError::DuplicateComponent(name.to_string()));
        }
        let component = Component::new(name, atoms, counts)?;
        let idx = self.components.len();
        self.components.push(component);
        self.index.insert(name.to_string(), idx);
        Ok(&self.components[idx])
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.index.get(name).map(|&idx| &self.components[idx])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns a copy of this registry with `name` removed, preserving the
    /// order of the remaining components.
    pub fn without(&self, name: &str) -> Result<Self, DefinitionError> {
        if !self.contains(name) {
            return Err(DefinitionError::UnknownComponent(name.to_string()));
        }
        let mut registry = Self::new();
        for component in self.components.iter().filter(|c| c.name != name) {
            registry
                .index
                .insert(component.name.clone(), registry.components.len());
            registry.components.push(component.clone());
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c2_registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.define("Hydrogen", &["H"], &[2]).unwrap();
        registry.define("Ethane", &["C", "H"], &[2, 6]).unwrap();
        registry.define("Ethylene", &["C", "H"], &[2, 4]).unwrap();
        registry
    }

    #[test]
    fn molar_mass_is_derived_from_composition() {
        let registry = c2_registry();
        let ethylene = registry.get("Ethylene").unwrap();
        assert!((ethylene.molar_mass() - 28.0530).abs() < 1e-9);
        let hydrogen = registry.get("Hydrogen").unwrap();
        assert!((hydrogen.molar_mass() - 2.0158).abs() < 1e-9);
    }

    #[test]
    fn define_rejects_unknown_atom_symbol() {
        let mut registry = ComponentRegistry::new();
        let err = registry.define("Mystery", &["Xq"], &[1]).unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownAtom { ref symbol, .. } if symbol == "Xq"));
        assert!(registry.is_empty());
    }

    #[test]
    fn define_rejects_mismatched_lengths() {
        let mut registry = ComponentRegistry::new();
        let err = registry.define("Water", &["H", "O"], &[2]).unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::LengthMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn define_rejects_duplicate_names() {
        let mut registry = c2_registry();
        let err = registry.define("Ethane", &["C", "H"], &[2, 6]).unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateComponent("Ethane".to_string()));
    }

    #[test]
    fn repeated_atoms_are_merged() {
        let component = Component::new("Ethanol", &["C", "H", "O", "H"], &[2, 5, 1, 1]).unwrap();
        assert_eq!(component.atoms(), &["C", "H", "O"]);
        assert_eq!(component.atom_count("H"), 6);
        assert_eq!(component.atom_count("N"), 0);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let registry = c2_registry();
        let names: Vec<&str> = registry.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Hydrogen", "Ethane", "Ethylene"]);
        assert_eq!(registry.index_of("Ethylene"), Some(2));
    }

    #[test]
    fn without_removes_component_and_reindexes() {
        let registry = c2_registry();
        let reduced = registry.without("Ethane").unwrap();
        assert_eq!(reduced.len(), 2);
        assert!(!reduced.contains("Ethane"));
        assert_eq!(reduced.index_of("Ethylene"), Some(1));
        assert!(registry.without("Propane").is_err());
    }
}
