use super::boundary::Boundary;
use super::error::{BoundaryError, EngineError};
use super::operations;
use super::progress::{Progress, ProgressReporter, Stage};
use super::reconcile::Corrections;
use super::unit_op::UnitOp;
use crate::core::components::ComponentRegistry;
use crate::core::error::ConsistencyError;
use crate::core::ids::{StreamId, UnitOpId};
use crate::core::stream::{SampleAxis, Stream};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Everything removed by a cascading deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub streams: Vec<String>,
    pub unit_ops: Vec<String>,
    pub boundaries: Vec<String>,
}

impl Invalidation {
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.unit_ops.is_empty() && self.boundaries.is_empty()
    }
}

#[derive(Debug, Clone)]
struct BoundaryDefinition {
    name: String,
    unit_ops: Vec<String>,
}

/// The owning container of a process model: the component registry, the
/// named streams, the unit operations connecting them, and the boundary
/// definitions drawn around groups of unit operations.
///
/// Streams are the only mutable state. Unit-op execution overwrites outlet
/// streams and applying corrections rescales measured ones; boundaries are
/// rebuilt from the current streams on every query.
#[derive(Debug, Clone)]
pub struct Flowsheet {
    registry: Arc<ComponentRegistry>,
    streams: SlotMap<StreamId, Stream>,
    unit_ops: SlotMap<UnitOpId, UnitOp>,
    stream_id_map: HashMap<String, StreamId>,
    unit_op_id_map: HashMap<String, UnitOpId>,
    boundaries: Vec<BoundaryDefinition>,
    execution_order: Vec<UnitOpId>,
}

impl Flowsheet {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    /// Creates a flowsheet around an already shared registry, so that
    /// streams built against `registry` can be added.
    pub fn with_registry(registry: Arc<ComponentRegistry>) -> Self {
        Self {
            registry,
            streams: SlotMap::with_key(),
            unit_ops: SlotMap::with_key(),
            stream_id_map: HashMap::new(),
            unit_op_id_map: HashMap::new(),
            boundaries: Vec::new(),
            execution_order: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Defines a new component and rebinds every stream onto the grown
    /// registry with a zero flow for it.
    pub fn define_component(
        &mut self,
        name: &str,
        atoms: &[&str],
        counts: &[u32],
    ) -> Result<(), EngineError> {
        let mut grown = (*self.registry).clone();
        grown.define(name, atoms, counts)?;
        self.rebind(Arc::new(grown), &HashSet::new())?;
        debug!(component = name, "Defined component.");
        Ok(())
    }

    /// Removes a component.
    ///
    /// Every stream carrying the component is deleted, together with the unit
    /// operations and boundaries that depend on it.
    pub fn remove_component(&mut self, name: &str) -> Result<Invalidation, EngineError> {
        let shrunk = Arc::new(self.registry.without(name)?);
        let doomed: HashSet<StreamId> = self
            .streams
            .iter()
            .filter(|(_, s)| s.contains(name))
            .map(|(id, _)| id)
            .collect();
        self.rebind(shrunk, &doomed)?;
        let invalidation = self.cascade_streams(doomed);
        info!(
            component = name,
            streams = invalidation.streams.len(),
            unit_ops = invalidation.unit_ops.len(),
            boundaries = invalidation.boundaries.len(),
            "Removed component."
        );
        Ok(invalidation)
    }

    /// Swaps in `registry`, refreshing every stream not in `skip`.
    ///
    /// Nothing changes unless every refresh succeeds.
    fn rebind(
        &mut self,
        registry: Arc<ComponentRegistry>,
        skip: &HashSet<StreamId>,
    ) -> Result<(), EngineError> {
        let refreshed = self
            .streams
            .iter()
            .filter(|(id, _)| !skip.contains(id))
            .map(|(id, s)| Ok((id, s.refresh(&registry)?)))
            .collect::<Result<Vec<_>, EngineError>>()?;
        for (id, stream) in refreshed {
            self.streams[id] = stream;
        }
        self.registry = registry;
        Ok(())
    }

    /// Adds a stream bound to this flowsheet's registry.
    ///
    /// # Errors
    ///
    /// - [`ConsistencyError::RegistryMismatch`] if the stream was built against
    ///   a different registry allocation.
    /// - [`EngineError::DuplicateStream`] if the name is taken.
    pub fn add_stream(&mut self, stream: Stream) -> Result<StreamId, EngineError> {
        if !Arc::ptr_eq(stream.registry(), &self.registry) {
            return Err(ConsistencyError::RegistryMismatch {
                left: stream.name().to_string(),
                right: "flowsheet".to_string(),
            }
            .into());
        }
        if self.stream_id_map.contains_key(stream.name()) {
            return Err(EngineError::DuplicateStream(stream.name().to_string()));
        }
        let name = stream.name().to_string();
        let id = self.streams.insert(stream);
        self.stream_id_map.insert(name, id);
        Ok(id)
    }

    pub fn stream(&self, name: &str) -> Option<&Stream> {
        self.stream_id_map.get(name).and_then(|&id| self.streams.get(id))
    }

    pub fn stream_id(&self, name: &str) -> Option<StreamId> {
        self.stream_id_map.get(name).copied()
    }

    pub fn stream_by_id(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(id)
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    /// Removes a stream and every unit operation and boundary that depends on
    /// it.
    pub fn remove_stream(&mut self, name: &str) -> Result<Invalidation, EngineError> {
        let id = self
            .stream_id(name)
            .ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        Ok(self.cascade_streams(HashSet::from([id])))
    }

    fn cascade_streams(&mut self, doomed: HashSet<StreamId>) -> Invalidation {
        let mut invalidation = Invalidation::default();
        for id in doomed {
            if let Some(stream) = self.streams.remove(id) {
                self.stream_id_map.remove(stream.name());
                invalidation.streams.push(stream.name().to_string());
            }
        }
        invalidation.streams.sort();

        let dependent: Vec<UnitOpId> = self
            .unit_ops
            .iter()
            .filter(|(_, u)| invalidation.streams.iter().any(|s| u.references(s)))
            .map(|(id, _)| id)
            .collect();
        let removed = self.cascade_unit_ops(dependent);
        invalidation.unit_ops = removed.unit_ops;
        invalidation.boundaries = removed.boundaries;
        invalidation
    }

    /// Adds a unit operation and appends it to the execution order.
    ///
    /// Every inlet must already exist. Outlets that do not exist yet are
    /// registered as empty placeholder streams.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DuplicateUnitOp`] if the name is taken.
    /// - [`EngineError::UnknownStream`] for a missing inlet.
    /// - [`EngineError::Definition`] when a route or reaction names a
    ///   component the registry does not define.
    pub fn define_unit_op(&mut self, unit_op: UnitOp) -> Result<UnitOpId, EngineError> {
        if self.unit_op_id_map.contains_key(unit_op.name()) {
            return Err(EngineError::DuplicateUnitOp(unit_op.name().to_string()));
        }
        operations::check_components(&unit_op, &self.registry)?;
        let inlets = unit_op
            .inlets()
            .iter()
            .map(|name| {
                self.stream(name)
                    .ok_or_else(|| EngineError::UnknownStream(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let axis = inlets
            .first()
            .map_or(SampleAxis::Steady, |s| s.axis().clone());

        let placeholders: Vec<Stream> = unit_op
            .outlets()
            .iter()
            .filter(|name| !self.stream_id_map.contains_key(name.as_str()))
            .map(|name| Stream::empty(name, &self.registry, axis.clone()))
            .collect();
        for placeholder in placeholders {
            debug!(
                unit_op = unit_op.name(),
                stream = placeholder.name(),
                "Registered placeholder outlet."
            );
            self.add_stream(placeholder)?;
        }

        let name = unit_op.name().to_string();
        let id = self.unit_ops.insert(unit_op);
        self.unit_op_id_map.insert(name, id);
        self.execution_order.push(id);
        Ok(id)
    }

    pub fn unit_op(&self, name: &str) -> Option<&UnitOp> {
        self.unit_op_id_map
            .get(name)
            .and_then(|&id| self.unit_ops.get(id))
    }

    pub fn unit_ops(&self) -> impl Iterator<Item = &UnitOp> {
        self.execution_order
            .iter()
            .filter_map(|&id| self.unit_ops.get(id))
    }

    /// Removes a unit operation and every boundary that contains it.
    ///
    /// Its streams are kept.
    pub fn remove_unit_op(&mut self, name: &str) -> Result<Invalidation, EngineError> {
        let id = *self
            .unit_op_id_map
            .get(name)
            .ok_or_else(|| EngineError::UnknownUnitOp(name.to_string()))?;
        Ok(self.cascade_unit_ops(vec![id]))
    }

    fn cascade_unit_ops(&mut self, doomed: Vec<UnitOpId>) -> Invalidation {
        let mut invalidation = Invalidation::default();
        for id in doomed {
            if let Some(unit_op) = self.unit_ops.remove(id) {
                self.unit_op_id_map.remove(unit_op.name());
                invalidation.unit_ops.push(unit_op.name().to_string());
            }
        }
        self.execution_order
            .retain(|id| self.unit_ops.contains_key(*id));

        let removed = &invalidation.unit_ops;
        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.boundaries)
            .into_iter()
            .partition(|b| b.unit_ops.iter().any(|u| removed.contains(u)));
        self.boundaries = kept;
        invalidation.boundaries = dropped.into_iter().map(|b| b.name).collect();
        invalidation
    }

    /// Defines a named boundary around `unit_ops`.
    ///
    /// The boundary is built once to validate it; later queries rebuild it
    /// from the current streams.
    pub fn define_boundary(&mut self, name: &str, unit_ops: &[&str]) -> Result<(), EngineError> {
        if self.boundaries.iter().any(|b| b.name == name) {
            return Err(EngineError::DuplicateBoundary(name.to_string()));
        }
        let definition = BoundaryDefinition {
            name: name.to_string(),
            unit_ops: unit_ops.iter().map(|u| u.to_string()).collect(),
        };
        self.build_boundary(&definition)?;
        self.boundaries.push(definition);
        Ok(())
    }

    /// Builds the named boundary from the current streams.
    pub fn boundary(&self, name: &str) -> Result<Boundary, EngineError> {
        let definition = self
            .boundaries
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| EngineError::UnknownBoundary(name.to_string()))?;
        self.build_boundary(definition)
    }

    /// Builds every defined boundary, in definition order.
    pub fn boundaries(&self) -> Result<Vec<Boundary>, EngineError> {
        self.boundaries
            .iter()
            .map(|b| self.build_boundary(b))
            .collect()
    }

    pub fn boundary_names(&self) -> impl Iterator<Item = &str> {
        self.boundaries.iter().map(|b| b.name.as_str())
    }

    pub fn remove_boundary(&mut self, name: &str) -> Result<(), EngineError> {
        let before = self.boundaries.len();
        self.boundaries.retain(|b| b.name != name);
        if self.boundaries.len() == before {
            return Err(EngineError::UnknownBoundary(name.to_string()));
        }
        Ok(())
    }

    fn build_boundary(&self, definition: &BoundaryDefinition) -> Result<Boundary, EngineError> {
        let unit_ops = definition
            .unit_ops
            .iter()
            .map(|name| {
                self.unit_op(name).ok_or_else(|| BoundaryError::UnknownUnitOp {
                    boundary: definition.name.clone(),
                    unit_op: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Boundary::build(&definition.name, &unit_ops, |n| self.stream(n))
    }

    pub fn execution_order(&self) -> Vec<&str> {
        self.unit_ops().map(UnitOp::name).collect()
    }

    /// Replaces the stored execution order.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidExecutionOrder`] unless `names` is a permutation
    /// of the defined unit operations.
    pub fn set_execution_order(&mut self, names: &[&str]) -> Result<(), EngineError> {
        if names.len() != self.unit_ops.len() {
            return Err(EngineError::InvalidExecutionOrder(format!(
                "expected {} unit operations, got {}",
                self.unit_ops.len(),
                names.len()
            )));
        }
        let mut seen = HashSet::new();
        let order = names
            .iter()
            .map(|&name| {
                let id = self.unit_op_id_map.get(name).ok_or_else(|| {
                    EngineError::InvalidExecutionOrder(format!("unknown unit operation '{name}'"))
                })?;
                if !seen.insert(*id) {
                    return Err(EngineError::InvalidExecutionOrder(format!(
                        "unit operation '{name}' is listed more than once"
                    )));
                }
                Ok(*id)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.execution_order = order;
        Ok(())
    }

    /// Executes every unit operation once, in the stored order.
    pub fn execute(&mut self) -> Result<(), EngineError> {
        self.execute_with_progress(&ProgressReporter::silent())
    }

    pub fn execute_with_progress(
        &mut self,
        reporter: &ProgressReporter,
    ) -> Result<(), EngineError> {
        let order = self.execution_order.clone();
        self.run(&order, reporter)
    }

    /// Executes the named unit operations once, in the given order, without
    /// changing the stored order.
    pub fn execute_in_order(&mut self, names: &[&str]) -> Result<(), EngineError> {
        let order = names
            .iter()
            .map(|&name| {
                self.unit_op_id_map
                    .get(name)
                    .copied()
                    .ok_or_else(|| EngineError::UnknownUnitOp(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.run(&order, &ProgressReporter::silent())
    }

    #[instrument(skip_all, name = "flowsheet_execution", fields(unit_ops = order.len()))]
    fn run(&mut self, order: &[UnitOpId], reporter: &ProgressReporter) -> Result<(), EngineError> {
        reporter.stage(Stage::Execution, || {
            for (index, &id) in order.iter().enumerate() {
                let name = self.unit_ops.get(id).map(|u| u.name().to_string());
                self.execute_id(id)?;
                reporter.emit(Progress::UnitOpExecuted {
                    name: name.unwrap_or_default(),
                    index: index + 1,
                    total: order.len(),
                });
            }
            info!("Flowsheet execution finished.");
            Ok(())
        })
    }

    /// Computes one unit operation and overwrites its outlet streams.
    ///
    /// Passive unit operations leave every stream untouched.
    pub fn execute_unit_op(&mut self, name: &str) -> Result<(), EngineError> {
        let id = *self
            .unit_op_id_map
            .get(name)
            .ok_or_else(|| EngineError::UnknownUnitOp(name.to_string()))?;
        self.execute_id(id)
    }

    fn execute_id(&mut self, id: UnitOpId) -> Result<(), EngineError> {
        let unit_op = self
            .unit_ops
            .get(id)
            .ok_or_else(|| EngineError::UnknownUnitOp(format!("{id:?}")))?;
        let inlets = unit_op
            .inlets()
            .iter()
            .map(|name| {
                self.stream(name)
                    .ok_or_else(|| EngineError::UnknownStream(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let Some(outlets) = unit_op.compute(&inlets)? else {
            debug!(unit_op = unit_op.name(), "Skipping passive unit operation.");
            return Ok(());
        };
        if let Some(foreign) = outlets
            .iter()
            .find(|s| !Arc::ptr_eq(s.registry(), &self.registry))
        {
            return Err(ConsistencyError::RegistryMismatch {
                left: foreign.name().to_string(),
                right: "flowsheet".to_string(),
            }
            .into());
        }
        debug!(
            unit_op = unit_op.name(),
            kind = unit_op.calculation().kind(),
            outlets = outlets.len(),
            "Executed unit operation."
        );

        for stream in outlets {
            match self.stream_id_map.get(stream.name()) {
                Some(&slot) => self.streams[slot] = stream,
                None => {
                    self.add_stream(stream)?;
                }
            }
        }
        Ok(())
    }

    /// Scales every corrected stream in place by its factor.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownStream`] if any corrected stream is missing; no
    /// stream is modified in that case.
    pub fn apply_corrections(&mut self, corrections: &Corrections) -> Result<(), EngineError> {
        let targets = corrections
            .factors
            .iter()
            .map(|(name, &factor)| {
                self.stream_id(name)
                    .map(|id| (id, factor))
                    .ok_or_else(|| EngineError::UnknownStream(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (id, factor) in targets {
            let scaled = self.streams[id].scale(factor);
            self.streams[id] = scaled;
        }
        info!(streams = corrections.factors.len(), "Applied corrections.");
        Ok(())
    }
}
