use super::components::ComponentRegistry;
use super::error::DefinitionError;
use std::collections::BTreeMap;

const BALANCE_RELATIVE_TOLERANCE: f64 = 1e-9;

/// A balanced stoichiometric reaction with a target conversion of its key
/// reactant.
///
/// Construction verifies that every element is conserved: the sum over
/// reactants of `coefficient * atom count` equals the same sum over products.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    reactants: Vec<(String, f64)>,
    products: Vec<(String, f64)>,
    key: String,
    conversion: f64,
}

impl Reaction {
    /// Creates and validates a reaction.
    ///
    /// # Arguments
    ///
    /// * `registry` - Registry used to resolve component compositions.
    /// * `reactants` - `(component, coefficient)` pairs consumed by the reaction.
    /// * `products` - `(component, coefficient)` pairs formed by the reaction.
    /// * `key` - The reactant whose conversion drives the extent of reaction.
    /// * `conversion` - Fraction of the key reactant's inflow converted, in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::UnbalancedReaction`] if any element is not
    /// conserved, or another [`DefinitionError`] for unknown components,
    /// non-positive coefficients, a key that is not a reactant, or a conversion
    /// outside `[0, 1]`.
    pub fn new(
        registry: &ComponentRegistry,
        reactants: &[(&str, f64)],
        products: &[(&str, f64)],
        key: &str,
        conversion: f64,
    ) -> Result<Self, DefinitionError> {
        for &(component, coefficient) in reactants.iter().chain(products) {
            if !registry.contains(component) {
                return Err(DefinitionError::UnknownComponent(component.to_string()));
            }
            if !(coefficient.is_finite() && coefficient > 0.0) {
                return Err(DefinitionError::InvalidCoefficient {
                    component: component.to_string(),
                    value: coefficient,
                });
            }
        }
        if !reactants.iter().any(|&(c, _)| c == key) {
            return Err(DefinitionError::KeyNotReactant(key.to_string()));
        }
        if !(0.0..=1.0).contains(&conversion) {
            return Err(DefinitionError::InvalidConversion(conversion));
        }

        let reactant_atoms = atom_totals(registry, reactants);
        let product_atoms = atom_totals(registry, products);
        let atoms: Vec<&str> = reactant_atoms
            .keys()
            .chain(product_atoms.keys())
            .copied()
            .collect();
        for atom in atoms {
            let r = reactant_atoms.get(atom).copied().unwrap_or(0.0);
            let p = product_atoms.get(atom).copied().unwrap_or(0.0);
            let scale = r.abs().max(p.abs()).max(1.0);
            if (r - p).abs() > BALANCE_RELATIVE_TOLERANCE * scale {
                return Err(DefinitionError::UnbalancedReaction {
                    atom: atom.to_string(),
                    reactants: r,
                    products: p,
                });
            }
        }

        let owned = |pairs: &[(&str, f64)]| {
            pairs
                .iter()
                .map(|&(c, v)| (c.to_string(), v))
                .collect::<Vec<_>>()
        };
        Ok(Self {
            reactants: owned(reactants),
            products: owned(products),
            key: key.to_string(),
            conversion,
        })
    }

    pub fn reactants(&self) -> &[(String, f64)] {
        &self.reactants
    }

    pub fn products(&self) -> &[(String, f64)] {
        &self.products
    }

    /// The key (target) reactant.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn conversion(&self) -> f64 {
        self.conversion
    }

    /// Stoichiometric coefficient of the key reactant (positive).
    pub fn key_coefficient(&self) -> f64 {
        self.reactants
            .iter()
            .find(|(c, _)| *c == self.key)
            .map(|&(_, v)| v)
            .unwrap_or(1.0)
    }

    /// Signed coefficients: negative for reactants, positive for products.
    ///
    /// A component on both sides yields two entries.
    pub fn stoichiometry(&self) -> impl Iterator<Item = (&str, f64)> {
        self.reactants
            .iter()
            .map(|(c, v)| (c.as_str(), -v))
            .chain(self.products.iter().map(|(c, v)| (c.as_str(), *v)))
    }
}

fn atom_totals(
    registry: &ComponentRegistry,
    side: &[(&str, f64)],
) -> BTreeMap<&'static str, f64> {
    let mut totals = BTreeMap::new();
    for &(name, coefficient) in side {
        if let Some(component) = registry.get(name) {
            for (symbol, count) in component.composition() {
                *totals.entry(symbol).or_insert(0.0) += coefficient * count as f64;
            }
        }
    }
    totals
}
