use super::error::{BoundaryError, EngineError};
use super::unit_op::UnitOp;
use crate::core::stream::Stream;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A stream referenced by a set of unit operations, with the members of the
/// set that produce and consume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutStream {
    pub name: String,
    pub producers: Vec<String>,
    pub consumers: Vec<String>,
}

/// Classification of the streams referenced by a set of unit operations.
///
/// Feeds are consumed but not produced inside the set, products are produced
/// but not consumed, and internal streams are both. Each list keeps the order
/// in which streams first appear when walking the set (inlets before outlets).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutSet {
    pub feeds: Vec<CutStream>,
    pub products: Vec<CutStream>,
    pub internal: Vec<CutStream>,
}

impl CutSet {
    pub fn feed_names(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().map(|s| s.name.as_str())
    }

    pub fn product_names(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|s| s.name.as_str())
    }

    pub fn internal_names(&self) -> impl Iterator<Item = &str> {
        self.internal.iter().map(|s| s.name.as_str())
    }
}

/// Computes the cut-set of a group of unit operations.
///
/// This is a pure topology query; stream values are never read.
pub fn cut_set<'a>(unit_ops: impl IntoIterator<Item = &'a UnitOp>) -> CutSet {
    let mut order: Vec<CutStream> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut entry = |name: &str| -> usize {
        *index.entry(name.to_string()).or_insert_with(|| {
            order.push(CutStream {
                name: name.to_string(),
                producers: Vec::new(),
                consumers: Vec::new(),
            });
            order.len() - 1
        })
    };

    let mut links: Vec<(usize, bool, String)> = Vec::new();
    for unit_op in unit_ops {
        for inlet in unit_op.inlets() {
            links.push((entry(inlet), false, unit_op.name().to_string()));
        }
        for outlet in unit_op.outlets() {
            links.push((entry(outlet), true, unit_op.name().to_string()));
        }
    }
    for (idx, produced, unit_op) in links {
        let stream = &mut order[idx];
        let list = if produced {
            &mut stream.producers
        } else {
            &mut stream.consumers
        };
        if !list.contains(&unit_op) {
            list.push(unit_op);
        }
    }

    let mut cut = CutSet::default();
    for stream in order {
        match (stream.producers.is_empty(), stream.consumers.is_empty()) {
            (true, false) => cut.feeds.push(stream),
            (false, true) => cut.products.push(stream),
            _ => cut.internal.push(stream),
        }
    }
    cut
}

/// Mass and element closures of a boundary.
///
/// Per-sample ratios are `None` where the corresponding inflow is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    mass: Vec<Option<f64>>,
    mass_totals: (f64, f64),
    atoms: BTreeMap<&'static str, Vec<Option<f64>>>,
    atom_totals: BTreeMap<&'static str, (f64, f64)>,
}

fn ratio(outflow: f64, inflow: f64) -> Option<f64> {
    (inflow != 0.0).then(|| outflow / inflow)
}

impl Closure {
    fn compute(total_in: &Stream, total_out: &Stream) -> Self {
        let mass_in = total_in.total_mass_flow_series();
        let mass_out = total_out.total_mass_flow_series();
        let mass = mass_in
            .iter()
            .zip(mass_out.iter())
            .map(|(&i, &o)| ratio(o, i))
            .collect();

        let symbols: BTreeSet<&'static str> = total_in.atoms().chain(total_out.atoms()).collect();
        let mut atoms = BTreeMap::new();
        let mut atom_totals = BTreeMap::new();
        for symbol in symbols {
            let series: Vec<Option<f64>> = (0..total_in.n_samples())
                .map(|j| {
                    let inflow = total_in.atom_flow_series(symbol).map_or(0.0, |s| s[j]);
                    let outflow = total_out.atom_flow_series(symbol).map_or(0.0, |s| s[j]);
                    ratio(outflow, inflow)
                })
                .collect();
            atoms.insert(symbol, series);
            atom_totals.insert(
                symbol,
                (total_in.atom_flow(symbol), total_out.atom_flow(symbol)),
            );
        }

        Self {
            mass,
            mass_totals: (total_in.total_mass_flow(), total_out.total_mass_flow()),
            atoms,
            atom_totals,
        }
    }

    /// Total outflow over total inflow, summed over samples.
    pub fn mass_closure(&self) -> Option<f64> {
        ratio(self.mass_totals.1, self.mass_totals.0)
    }

    pub fn mass_series(&self) -> &[Option<f64>] {
        &self.mass
    }

    /// Element outflow over inflow, summed over samples.
    ///
    /// `None` when the element does not enter the boundary.
    pub fn atom_closure(&self, symbol: &str) -> Option<f64> {
        self.atom_totals
            .get(symbol)
            .and_then(|&(inflow, outflow)| ratio(outflow, inflow))
    }

    pub fn atom_series(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.atoms.get(symbol).map(Vec::as_slice)
    }

    /// Elements seen on either side of the boundary.
    pub fn atoms(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.atoms.keys().copied()
    }
}

/// A mass-balance envelope drawn around a group of unit operations.
///
/// A boundary snapshots the feed and product streams at build time. It is
/// never patched: when the underlying streams change, build it again.
#[derive(Debug, Clone)]
pub struct Boundary {
    name: String,
    unit_ops: Vec<String>,
    cut_set: CutSet,
    feeds: Vec<Stream>,
    products: Vec<Stream>,
    total_in: Stream,
    total_out: Stream,
}

impl Boundary {
    /// Builds a boundary from its unit operations and a stream lookup.
    ///
    /// # Errors
    ///
    /// - [`BoundaryError::EmptyBoundary`] if `unit_ops` is empty.
    /// - [`BoundaryError::NoFeeds`] / [`BoundaryError::NoProducts`] if either
    ///   side of the cut-set is empty.
    /// - [`EngineError::UnknownStream`] if a cut stream cannot be resolved.
    /// - A consistency error if the cut streams cannot be summed.
    pub fn build<'s>(
        name: &str,
        unit_ops: &[&UnitOp],
        lookup: impl Fn(&str) -> Option<&'s Stream>,
    ) -> Result<Self, EngineError> {
        if unit_ops.is_empty() {
            return Err(BoundaryError::EmptyBoundary(name.to_string()).into());
        }
        let cut_set = cut_set(unit_ops.iter().copied());
        if cut_set.feeds.is_empty() {
            return Err(BoundaryError::NoFeeds(name.to_string()).into());
        }
        if cut_set.products.is_empty() {
            return Err(BoundaryError::NoProducts(name.to_string()).into());
        }

        let resolve = |names: Vec<&str>| -> Result<Vec<Stream>, EngineError> {
            names
                .into_iter()
                .map(|n| {
                    lookup(n)
                        .cloned()
                        .ok_or_else(|| EngineError::UnknownStream(n.to_string()))
                })
                .collect()
        };
        let feeds = resolve(cut_set.feed_names().collect())?;
        let products = resolve(cut_set.product_names().collect())?;

        let total_in = sum_streams(&feeds)?.rename(&format!("{name} in"));
        let total_out = sum_streams(&products)?.rename(&format!("{name} out"));
        total_in.check_compatible(&total_out)?;

        if total_in
            .total_mass_flow_series()
            .iter()
            .any(|&m| m == 0.0)
        {
            warn!(boundary = name, "Boundary has samples with zero total inflow.");
        }
        debug!(
            boundary = name,
            feeds = feeds.len(),
            products = products.len(),
            internal = cut_set.internal.len(),
            "Built boundary."
        );

        Ok(Self {
            name: name.to_string(),
            unit_ops: unit_ops.iter().map(|u| u.name().to_string()).collect(),
            cut_set,
            feeds,
            products,
            total_in,
            total_out,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_ops(&self) -> &[String] {
        &self.unit_ops
    }

    pub fn cut_set(&self) -> &CutSet {
        &self.cut_set
    }

    pub fn feeds(&self) -> &[Stream] {
        &self.feeds
    }

    pub fn products(&self) -> &[Stream] {
        &self.products
    }

    pub fn total_in(&self) -> &Stream {
        &self.total_in
    }

    pub fn total_out(&self) -> &Stream {
        &self.total_out
    }

    /// Names of the feed streams followed by the product streams.
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.feeds.iter().chain(&self.products).map(Stream::name)
    }

    pub fn closure(&self) -> Closure {
        Closure::compute(&self.total_in, &self.total_out)
    }

    /// Fraction of a component's inflow that does not leave the boundary.
    ///
    /// Returns `0.0` when the component does not enter the boundary.
    pub fn conversion(&self, component: &str) -> f64 {
        let inflow = self.total_in.mole_flow(component);
        if inflow == 0.0 {
            return 0.0;
        }
        (inflow - self.total_out.mole_flow(component)) / inflow
    }

    /// Moles of `product` formed per mole of `reactant` consumed.
    ///
    /// Returns `None` when no reactant is consumed.
    pub fn selectivity(&self, reactant: &str, product: &str) -> Option<f64> {
        let consumed = self.total_in.mole_flow(reactant) - self.total_out.mole_flow(reactant);
        if consumed <= 0.0 {
            return None;
        }
        let formed = self.total_out.mole_flow(product) - self.total_in.mole_flow(product);
        Some(formed / consumed)
    }
}

fn sum_streams(streams: &[Stream]) -> Result<Stream, EngineError> {
    let (first, rest) = streams
        .split_first()
        .ok_or(EngineError::NoStreamsToReconcile)?;
    rest.iter().try_fold(first.clone(), |acc, stream| {
        Stream::mix(&acc, stream).map_err(EngineError::from)
    })
}
