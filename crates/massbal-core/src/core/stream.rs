use super::components::ComponentRegistry;
use super::error::{ConsistencyError, DefinitionError};
use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Selects which flow series a stream is constructed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowBasis {
    /// Flows are mass flows; mole flows are derived as `mass / Mr`.
    Mass,
    /// Flows are mole flows; mass flows are derived as `mole * Mr`.
    #[default]
    Mole,
}

/// The sample axis shared by all flows of a stream.
///
/// A steady stream carries a single sample. A stream history carries one
/// sample per timestamp; two histories can only be combined when their
/// timestamp vectors are identical.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SampleAxis {
    #[default]
    Steady,
    Timestamps(Arc<[NaiveDateTime]>),
}

impl SampleAxis {
    /// Number of samples (columns) along this axis.
    pub fn len(&self) -> usize {
        match self {
            SampleAxis::Steady => 1,
            SampleAxis::Timestamps(ts) => ts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn timestamps(&self) -> Option<&[NaiveDateTime]> {
        match self {
            SampleAxis::Steady => None,
            SampleAxis::Timestamps(ts) => Some(ts),
        }
    }
}

/// A time-indexed stream. Histories share the stream representation and differ
/// only in their [`SampleAxis`].
pub type StreamHistory = Stream;

/// A named set of per-component flows bound to a component registry.
///
/// Only the components present in the stream are stored (the stream is sparse
/// with respect to its registry). Flows are held as matrices with one row per
/// present component and one column per sample. Mass flows, total mass flow and
/// atom flows are derived once at construction; every operation that changes
/// flows builds a new stream.
///
/// # Invariants
///
/// - `mass_flows[i] == mole_flows[i] * Mr[i]` for every present component.
/// - Atom flows are the mole flows aggregated through each component's atom counts.
/// - The component list holds no duplicates and only names known to the registry.
#[derive(Debug, Clone)]
pub struct Stream {
    name: String,
    registry: Arc<ComponentRegistry>,
    axis: SampleAxis,
    components: Vec<String>,
    mole_flows: DMatrix<f64>,
    mass_flows: DMatrix<f64>,
    total_mass_flow: DVector<f64>,
    atom_flows: BTreeMap<&'static str, DVector<f64>>,
}

impl Stream {
    /// Creates a steady stream from per-component flows.
    ///
    /// # Arguments
    ///
    /// * `name` - The stream name.
    /// * `registry` - The registry every component must belong to.
    /// * `components` - Present component names, in display order.
    /// * `flows` - One flow per component, interpreted according to `basis`.
    /// * `basis` - Whether `flows` are mass or mole flows.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] for unknown or duplicated components,
    /// mismatched lengths, or non-finite flows.
    pub fn new(
        name: &str,
        registry: &Arc<ComponentRegistry>,
        components: &[&str],
        flows: &[f64],
        basis: FlowBasis,
    ) -> Result<Self, DefinitionError> {
        if components.len() != flows.len() {
            return Err(DefinitionError::LengthMismatch {
                context: format!("flows of stream '{}'", name),
                expected: components.len(),
                actual: flows.len(),
            });
        }
        let given = DMatrix::from_column_slice(components.len(), 1, flows);
        Self::from_given(name, registry, SampleAxis::Steady, components, given, basis)
    }

    /// Creates a steady stream from `(component, flow)` pairs.
    pub fn from_pairs(
        name: &str,
        registry: &Arc<ComponentRegistry>,
        pairs: &[(&str, f64)],
        basis: FlowBasis,
    ) -> Result<Self, DefinitionError> {
        let (components, flows): (Vec<&str>, Vec<f64>) = pairs.iter().copied().unzip();
        Self::new(name, registry, &components, &flows, basis)
    }

    /// Creates a stream history.
    ///
    /// `flows` uses the ingestion layout: one row per timestamp and one column
    /// per component.
    pub fn history(
        name: &str,
        registry: &Arc<ComponentRegistry>,
        timestamps: Vec<NaiveDateTime>,
        components: &[&str],
        flows: &DMatrix<f64>,
        basis: FlowBasis,
    ) -> Result<Self, DefinitionError> {
        if timestamps.is_empty() {
            return Err(DefinitionError::EmptyAxis(name.to_string()));
        }
        if flows.nrows() != timestamps.len() || flows.ncols() != components.len() {
            return Err(DefinitionError::ShapeMismatch {
                stream: name.to_string(),
                rows: flows.nrows(),
                cols: flows.ncols(),
                expected_rows: timestamps.len(),
                expected_cols: components.len(),
            });
        }
        let axis = SampleAxis::Timestamps(timestamps.into());
        Self::from_given(name, registry, axis, components, flows.transpose(), basis)
    }

    /// Creates a stream with no present components and zero flow.
    pub fn empty(name: &str, registry: &Arc<ComponentRegistry>, axis: SampleAxis) -> Self {
        let n = axis.len();
        Self::from_matrices(
            name.to_string(),
            Arc::clone(registry),
            axis,
            Vec::new(),
            DMatrix::zeros(0, n),
            DMatrix::zeros(0, n),
        )
    }

    fn from_given(
        name: &str,
        registry: &Arc<ComponentRegistry>,
        axis: SampleAxis,
        components: &[&str],
        given: DMatrix<f64>,
        basis: FlowBasis,
    ) -> Result<Self, DefinitionError> {
        let components: Vec<String> = components.iter().map(|c| c.to_string()).collect();
        validate_components(name, registry, &components)?;
        for (i, component) in components.iter().enumerate() {
            if given.row(i).iter().any(|v| !v.is_finite()) {
                return Err(DefinitionError::NonFiniteFlow {
                    stream: name.to_string(),
                    component: component.clone(),
                });
            }
        }

        let molar_masses = molar_masses(registry, &components);
        let (mole_flows, mass_flows) = match basis {
            FlowBasis::Mole => {
                let mass = scale_rows(&given, &molar_masses, |flow, mr| flow * mr);
                (given, mass)
            }
            FlowBasis::Mass => {
                let mole = scale_rows(&given, &molar_masses, |flow, mr| flow / mr);
                (mole, given)
            }
        };

        Ok(Self::from_matrices(
            name.to_string(),
            Arc::clone(registry),
            axis,
            components,
            mole_flows,
            mass_flows,
        ))
    }

    /// Builds a stream from already validated mole-flow rows, deriving the
    /// mass flows from the registry.
    pub(crate) fn from_mole_rows(
        name: &str,
        registry: &Arc<ComponentRegistry>,
        axis: SampleAxis,
        rows: Vec<(String, DVector<f64>)>,
    ) -> Result<Self, DefinitionError> {
        let n = axis.len();
        let components: Vec<String> = rows.iter().map(|(c, _)| c.clone()).collect();
        validate_components(name, registry, &components)?;
        if let Some((component, row)) = rows.iter().find(|(_, row)| row.len() != n) {
            return Err(DefinitionError::LengthMismatch {
                context: format!("samples of '{}' in stream '{}'", component, name),
                expected: n,
                actual: row.len(),
            });
        }
        let mole_flows = DMatrix::from_fn(rows.len(), n, |i, j| rows[i].1[j]);
        let mass_flows = scale_rows(&mole_flows, &molar_masses(registry, &components), |f, mr| {
            f * mr
        });
        Ok(Self::from_matrices(
            name.to_string(),
            Arc::clone(registry),
            axis,
            components,
            mole_flows,
            mass_flows,
        ))
    }

    fn from_matrices(
        name: String,
        registry: Arc<ComponentRegistry>,
        axis: SampleAxis,
        components: Vec<String>,
        mole_flows: DMatrix<f64>,
        mass_flows: DMatrix<f64>,
    ) -> Self {
        let n = axis.len();
        let total_mass_flow = DVector::from_fn(n, |j, _| mass_flows.column(j).sum());

        let mut atom_flows: BTreeMap<&'static str, DVector<f64>> = BTreeMap::new();
        for (i, name) in components.iter().enumerate() {
            let Some(component) = registry.get(name) else {
                continue;
            };
            let row = mole_flows.row(i).transpose();
            for (symbol, count) in component.composition() {
                let entry = atom_flows
                    .entry(symbol)
                    .or_insert_with(|| DVector::zeros(n));
                *entry += &row * count as f64;
            }
        }

        Self {
            name,
            registry,
            axis,
            components,
            mole_flows,
            mass_flows,
            total_mass_flow,
            atom_flows,
        }
    }

    /// Sums two streams into a new one.
    ///
    /// The component order of `a` is kept, followed by any component only
    /// present in `b`. Shared components have their flows summed. The result is
    /// named `"{a}+{b}"`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConsistencyError`] if the streams are bound to different
    /// registries or have different sample axes.
    pub fn mix(a: &Stream, b: &Stream) -> Result<Stream, ConsistencyError> {
        a.check_compatible(b)?;

        let mut components = a.components.clone();
        for component in &b.components {
            if !a.contains(component) {
                components.push(component.clone());
            }
        }

        let n = a.n_samples();
        let mut mole_flows = DMatrix::zeros(components.len(), n);
        let mut mass_flows = DMatrix::zeros(components.len(), n);
        for (i, component) in components.iter().enumerate() {
            for source in [a, b] {
                if let Some(idx) = source.position(component) {
                    let mut mole_row = mole_flows.row_mut(i);
                    mole_row += source.mole_flows.row(idx);
                    let mut mass_row = mass_flows.row_mut(i);
                    mass_row += source.mass_flows.row(idx);
                }
            }
        }

        Ok(Self::from_matrices(
            format!("{}+{}", a.name, b.name),
            Arc::clone(&a.registry),
            a.axis.clone(),
            components,
            mole_flows,
            mass_flows,
        ))
    }

    /// Returns a new stream with every flow multiplied by `factor`.
    pub fn scale(&self, factor: f64) -> Stream {
        Self {
            name: self.name.clone(),
            registry: Arc::clone(&self.registry),
            axis: self.axis.clone(),
            components: self.components.clone(),
            mole_flows: &self.mole_flows * factor,
            mass_flows: &self.mass_flows * factor,
            total_mass_flow: &self.total_mass_flow * factor,
            atom_flows: self
                .atom_flows
                .iter()
                .map(|(&symbol, flows)| (symbol, flows * factor))
                .collect(),
        }
    }

    pub fn rename(&self, new_name: &str) -> Stream {
        let mut renamed = self.clone();
        renamed.name = new_name.to_string();
        renamed
    }

    /// Returns a renamed copy with every flow multiplied by `factor`.
    pub fn copy(&self, new_name: &str, factor: f64) -> Stream {
        let mut copied = self.scale(factor);
        copied.name = new_name.to_string();
        copied
    }

    /// Strict identity: same name, registry, axis, component order and flows.
    pub fn flows_equal(a: &Stream, b: &Stream) -> bool {
        a.name == b.name
            && Arc::ptr_eq(&a.registry, &b.registry)
            && a.axis == b.axis
            && a.components == b.components
            && a.mole_flows == b.mole_flows
            && a.mass_flows == b.mass_flows
    }

    /// Flow equivalence within `tolerance`, ignoring names and component order.
    ///
    /// Components absent from one stream are treated as zero flow in it.
    pub fn flows_approx(a: &Stream, b: &Stream, tolerance: f64) -> bool {
        if a.axis != b.axis {
            return false;
        }
        let union: HashSet<&str> = a
            .components
            .iter()
            .chain(&b.components)
            .map(String::as_str)
            .collect();
        union.into_iter().all(|component| {
            let left = a.mole_flow_series(component);
            let right = b.mole_flow_series(component);
            (left - right).amax() <= tolerance
        })
    }

    /// Rebinds the stream onto a new registry.
    ///
    /// Components known to `registry` but not to the current registry are
    /// added with zero flow. Fails if a present component is missing from
    /// `registry`.
    pub fn refresh(&self, registry: &Arc<ComponentRegistry>) -> Result<Stream, DefinitionError> {
        validate_components(&self.name, registry, &self.components)?;

        let added: Vec<String> = registry
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| !self.registry.contains(name) && !self.contains(name))
            .collect();

        let rows = self.components.len() + added.len();
        let n = self.n_samples();
        let mut mole_flows = DMatrix::zeros(rows, n);
        let mut mass_flows = DMatrix::zeros(rows, n);
        mole_flows
            .rows_mut(0, self.components.len())
            .copy_from(&self.mole_flows);
        mass_flows
            .rows_mut(0, self.components.len())
            .copy_from(&self.mass_flows);

        let mut components = self.components.clone();
        components.extend(added);

        Ok(Self::from_matrices(
            self.name.clone(),
            Arc::clone(registry),
            self.axis.clone(),
            components,
            mole_flows,
            mass_flows,
        ))
    }

    pub(crate) fn check_compatible(&self, other: &Stream) -> Result<(), ConsistencyError> {
        if !Arc::ptr_eq(&self.registry, &other.registry) {
            return Err(ConsistencyError::RegistryMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        if self.axis != other.axis {
            return Err(ConsistencyError::AxisMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        Ok(())
    }

    fn position(&self, component: &str) -> Option<usize> {
        self.components.iter().position(|c| c == component)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn axis(&self) -> &SampleAxis {
        &self.axis
    }

    pub fn is_history(&self) -> bool {
        matches!(self.axis, SampleAxis::Timestamps(_))
    }

    pub fn timestamps(&self) -> Option<&[NaiveDateTime]> {
        self.axis.timestamps()
    }

    pub fn n_samples(&self) -> usize {
        self.axis.len()
    }

    /// Names of the components present in this stream.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn contains(&self, component: &str) -> bool {
        self.position(component).is_some()
    }

    /// Mole flows, one row per present component and one column per sample.
    pub fn mole_flows(&self) -> &DMatrix<f64> {
        &self.mole_flows
    }

    /// Mass flows, one row per present component and one column per sample.
    pub fn mass_flows(&self) -> &DMatrix<f64> {
        &self.mass_flows
    }

    /// Mole flow of `component` summed over samples; zero if absent.
    pub fn mole_flow(&self, component: &str) -> f64 {
        self.position(component)
            .map(|idx| self.mole_flows.row(idx).sum())
            .unwrap_or(0.0)
    }

    /// Per-sample mole flow of `component`; zeros if absent.
    pub fn mole_flow_series(&self, component: &str) -> DVector<f64> {
        self.position(component)
            .map(|idx| self.mole_flows.row(idx).transpose())
            .unwrap_or_else(|| DVector::zeros(self.n_samples()))
    }

    /// Mass flow of `component` summed over samples; zero if absent.
    pub fn mass_flow(&self, component: &str) -> f64 {
        self.position(component)
            .map(|idx| self.mass_flows.row(idx).sum())
            .unwrap_or(0.0)
    }

    /// Per-sample mass flow of `component`; zeros if absent.
    pub fn mass_flow_series(&self, component: &str) -> DVector<f64> {
        self.position(component)
            .map(|idx| self.mass_flows.row(idx).transpose())
            .unwrap_or_else(|| DVector::zeros(self.n_samples()))
    }

    /// Total mass flow summed over samples.
    pub fn total_mass_flow(&self) -> f64 {
        self.total_mass_flow.sum()
    }

    pub fn total_mass_flow_series(&self) -> &DVector<f64> {
        &self.total_mass_flow
    }

    /// Total mole flow summed over components and samples.
    pub fn total_mole_flow(&self) -> f64 {
        self.mole_flows.sum()
    }

    /// Molar flow of an element summed over samples; zero if absent.
    pub fn atom_flow(&self, symbol: &str) -> f64 {
        self.atom_flows.get(symbol).map(|f| f.sum()).unwrap_or(0.0)
    }

    pub fn atom_flow_series(&self, symbol: &str) -> Option<&DVector<f64>> {
        self.atom_flows.get(symbol)
    }

    /// Elements carried by this stream, in symbol order.
    pub fn atoms(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.atom_flows.keys().copied()
    }
}

fn validate_components(
    stream: &str,
    registry: &ComponentRegistry,
    components: &[String],
) -> Result<(), DefinitionError> {
    let mut seen = HashSet::with_capacity(components.len());
    for component in components {
        if !registry.contains(component) {
            return Err(DefinitionError::UnknownComponent(component.clone()));
        }
        if !seen.insert(component.as_str()) {
            return Err(DefinitionError::DuplicateStreamComponent {
                stream: stream.to_string(),
                component: component.clone(),
            });
        }
    }
    Ok(())
}

fn molar_masses(registry: &ComponentRegistry, components: &[String]) -> Vec<f64> {
    components
        .iter()
        .map(|c| registry.get(c).map(|c| c.molar_mass()).unwrap_or(0.0))
        .collect()
}

fn scale_rows(
    matrix: &DMatrix<f64>,
    factors: &[f64],
    op: impl Fn(f64, f64) -> f64,
) -> DMatrix<f64> {
    DMatrix::from_fn(matrix.nrows(), matrix.ncols(), |i, j| {
        op(matrix[(i, j)], factors[i])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn registry() -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::new();
        registry.define("Hydrogen", &["H"], &[2]).unwrap();
        registry.define("Ethane", &["C", "H"], &[2, 6]).unwrap();
        registry.define("Ethylene", &["C", "H"], &[2, 4]).unwrap();
        registry.define("Water", &["H", "O"], &[2, 1]).unwrap();
        Arc::new(registry)
    }

    fn timestamps(n: u32) -> Vec<NaiveDateTime> {
        (0..n)
            .map(|h| {
                NaiveDate::from_ymd_opt(2024, 3, 1)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn mole_basis_derives_mass_and_atom_flows() {
        let reg = registry();
        let feed = Stream::from_pairs(
            "Feed",
            &reg,
            &[("Ethylene", 1.0), ("Hydrogen", 2.0)],
            FlowBasis::Mole,
        )
        .unwrap();

        assert!((feed.total_mass_flow() - 32.0846).abs() < 1e-9);
        assert!((feed.mass_flow("Ethylene") - 28.0530).abs() < 1e-9);
        assert!((feed.atom_flow("C") - 2.0).abs() < 1e-12);
        assert!((feed.atom_flow("H") - 8.0).abs() < 1e-12);
        assert_eq!(feed.atom_flow("O"), 0.0);
        assert_eq!(feed.atoms().collect::<Vec<_>>(), vec!["C", "H"]);
    }

    #[test]
    fn mass_basis_derives_mole_flows() {
        let reg = registry();
        let stream =
            Stream::from_pairs("S", &reg, &[("Hydrogen", 2.0158)], FlowBasis::Mass).unwrap();
        assert!((stream.mole_flow("Hydrogen") - 1.0).abs() < 1e-12);
        assert_eq!(stream.mass_flow("Hydrogen"), 2.0158);
    }

    #[test]
    fn construction_rejects_bad_input() {
        let reg = registry();
        assert!(matches!(
            Stream::from_pairs("S", &reg, &[("Propane", 1.0)], FlowBasis::Mole),
            Err(DefinitionError::UnknownComponent(_))
        ));
        assert!(matches!(
            Stream::new("S", &reg, &["Ethane"], &[1.0, 2.0], FlowBasis::Mole),
            Err(DefinitionError::LengthMismatch { .. })
        ));
        assert!(matches!(
            Stream::from_pairs("S", &reg, &[("Ethane", 1.0), ("Ethane", 2.0)], FlowBasis::Mole),
            Err(DefinitionError::DuplicateStreamComponent { .. })
        ));
        assert!(matches!(
            Stream::from_pairs("S", &reg, &[("Ethane", f64::NAN)], FlowBasis::Mole),
            Err(DefinitionError::NonFiniteFlow { .. })
        ));
    }

    #[test]
    fn mix_unions_components_in_order_and_sums_shared_flows() {
        let reg = registry();
        let a = Stream::from_pairs(
            "A",
            &reg,
            &[("Ethane", 1.0), ("Hydrogen", 0.5)],
            FlowBasis::Mole,
        )
        .unwrap();
        let b = Stream::from_pairs("B", &reg, &[("Water", 3.0), ("Ethane", 2.0)], FlowBasis::Mole)
            .unwrap();

        let mixed = Stream::mix(&a, &b).unwrap();

        assert_eq!(mixed.name(), "A+B");
        assert_eq!(mixed.components(), &["Ethane", "Hydrogen", "Water"]);
        assert!((mixed.mole_flow("Ethane") - 3.0).abs() < 1e-12);
        assert!((mixed.mole_flow("Water") - 3.0).abs() < 1e-12);
    }

    #[test]
    fn mix_is_additive_in_atom_flows() {
        let reg = registry();
        let a = Stream::from_pairs("A", &reg, &[("Ethane", 0.7), ("Water", 1.3)], FlowBasis::Mole)
            .unwrap();
        let b = Stream::from_pairs(
            "B",
            &reg,
            &[("Ethylene", 2.1), ("Hydrogen", 0.4)],
            FlowBasis::Mole,
        )
        .unwrap();
        let mixed = Stream::mix(&a, &b).unwrap();

        for atom in ["C", "H", "O"] {
            let expected = a.atom_flow(atom) + b.atom_flow(atom);
            assert!((mixed.atom_flow(atom) - expected).abs() < 1e-12, "atom {}", atom);
        }
        assert!(
            (mixed.total_mass_flow() - a.total_mass_flow() - b.total_mass_flow()).abs() < 1e-9
        );
    }

    #[test]
    fn mix_rejects_streams_from_different_registries() {
        let a = Stream::from_pairs("A", &registry(), &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();
        let b = Stream::from_pairs("B", &registry(), &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();
        assert!(matches!(
            Stream::mix(&a, &b),
            Err(ConsistencyError::RegistryMismatch { .. })
        ));
    }

    #[test]
    fn scale_is_linear_in_every_flow() {
        let reg = registry();
        let a = Stream::from_pairs("A", &reg, &[("Ethane", 0.9), ("Water", 1.5)], FlowBasis::Mole)
            .unwrap();
        let k = 1.37;
        let scaled = a.scale(k);

        assert_eq!(scaled.name(), "A");
        for component in a.components() {
            assert_eq!(scaled.mass_flow(component), k * a.mass_flow(component));
        }
        assert!((scaled.atom_flow("H") - k * a.atom_flow("H")).abs() < 1e-12);
        assert!((scaled.total_mass_flow() - k * a.total_mass_flow()).abs() < 1e-9);
    }

    #[test]
    fn strict_and_approximate_equality_differ_on_names() {
        let reg = registry();
        let a = Stream::from_pairs("A", &reg, &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();
        let renamed = a.rename("B");
        let copied = a.copy("A", 1.0);

        assert!(Stream::flows_equal(&a, &copied));
        assert!(!Stream::flows_equal(&a, &renamed));
        assert!(Stream::flows_approx(&a, &renamed, 1e-12));
        assert!(!Stream::flows_approx(&a, &a.scale(1.01), 1e-6));
    }

    #[test]
    fn flows_approx_treats_absent_components_as_zero() {
        let reg = registry();
        let a = Stream::from_pairs("A", &reg, &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();
        let b = Stream::from_pairs("B", &reg, &[("Ethane", 1.0), ("Water", 0.0)], FlowBasis::Mole)
            .unwrap();
        assert!(Stream::flows_approx(&a, &b, 1e-12));
    }

    #[test]
    fn history_arithmetic_is_applied_per_sample() {
        let reg = registry();
        let flows = DMatrix::from_row_slice(3, 2, &[1.0, 0.5, 2.0, 0.5, 3.0, 1.0]);
        let a = Stream::history(
            "A",
            &reg,
            timestamps(3),
            &["Ethane", "Hydrogen"],
            &flows,
            FlowBasis::Mole,
        )
        .unwrap();
        let b = a.rename("B").scale(2.0);

        let mixed = Stream::mix(&a, &b).unwrap();

        assert!(mixed.is_history());
        assert_eq!(mixed.n_samples(), 3);
        let ethane = mixed.mole_flow_series("Ethane");
        assert!((ethane[0] - 3.0).abs() < 1e-12);
        assert!((ethane[2] - 9.0).abs() < 1e-12);
        assert!((mixed.atom_flow_series("C").unwrap()[1] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn history_arithmetic_requires_identical_timestamps() {
        let reg = registry();
        let flows = DMatrix::from_element(2, 1, 1.0);
        let a = Stream::history("A", &reg, timestamps(2), &["Ethane"], &flows, FlowBasis::Mole)
            .unwrap();
        let mut shifted = timestamps(3);
        shifted.remove(0);
        let b = Stream::history("B", &reg, shifted, &["Ethane"], &flows, FlowBasis::Mole).unwrap();
        let steady = Stream::from_pairs("C", &reg, &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();

        assert!(matches!(
            Stream::mix(&a, &b),
            Err(ConsistencyError::AxisMismatch { .. })
        ));
        assert!(matches!(
            Stream::mix(&a, &steady),
            Err(ConsistencyError::AxisMismatch { .. })
        ));
    }

    #[test]
    fn history_rejects_bad_shape_and_empty_axis() {
        let reg = registry();
        let flows = DMatrix::from_element(2, 2, 1.0);
        assert!(matches!(
            Stream::history(
                "A",
                &reg,
                timestamps(3),
                &["Ethane", "Water"],
                &flows,
                FlowBasis::Mole
            ),
            Err(DefinitionError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Stream::history("A", &reg, Vec::new(), &[], &DMatrix::zeros(0, 0), FlowBasis::Mole),
            Err(DefinitionError::EmptyAxis(_))
        ));
    }

    #[test]
    fn refresh_adds_zero_rows_for_new_components() {
        let reg = registry();
        let stream = Stream::from_pairs("S", &reg, &[("Ethane", 1.0)], FlowBasis::Mole).unwrap();

        let mut grown = (*reg).clone();
        grown.define("Methane", &["C", "H"], &[1, 4]).unwrap();
        let grown = Arc::new(grown);

        let refreshed = stream.refresh(&grown).unwrap();
        assert!(Arc::ptr_eq(refreshed.registry(), &grown));
        assert_eq!(refreshed.components(), &["Ethane", "Methane"]);
        assert_eq!(refreshed.mole_flow("Methane"), 0.0);
        assert!((refreshed.total_mass_flow() - stream.total_mass_flow()).abs() < 1e-12);
    }

    #[test]
    fn refresh_fails_when_present_component_is_missing() {
        let reg = registry();
        let stream = Stream::from_pairs("S", &reg, &[("Water", 1.0)], FlowBasis::Mole).unwrap();
        let reduced = Arc::new(reg.without("Water").unwrap());
        assert!(stream.refresh(&reduced).is_err());
    }

    #[test]
    fn empty_stream_has_zero_totals() {
        let reg = registry();
        let stream = Stream::empty("E", &reg, SampleAxis::Steady);
        assert_eq!(stream.total_mass_flow(), 0.0);
        assert!(stream.components().is_empty());
        assert_eq!(stream.atoms().count(), 0);
    }
}
