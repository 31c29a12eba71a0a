use super::error::EngineError;
use super::unit_op::{Calculation, ComponentRoutes, UnitOp};
use crate::core::components::ComponentRegistry;
use crate::core::error::DefinitionError;
use crate::core::reaction::Reaction;
use crate::core::stream::Stream;
use nalgebra::DVector;
use std::collections::{BTreeMap, HashMap};
use std::iter;
use tracing::trace;

const FRACTION_SLACK: f64 = 1e-9;
const CONVERSION_SLACK: f64 = 1e-9;
const NEGATIVE_FLOW_TOLERANCE: f64 = 1e-9;

fn invalid(unit_op: &UnitOp, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidUnitOp {
        unit_op: unit_op.name().to_string(),
        reason: reason.into(),
    }
}

/// Checks the static constraints of a unit operation's calculation.
pub(crate) fn validate(unit_op: &UnitOp) -> Result<(), EngineError> {
    let n_in = unit_op.inlets().len();
    let n_out = unit_op.outlets().len();
    let needs_inlet = |kind: &str| {
        if n_in == 0 {
            Err(invalid(unit_op, format!("a {kind} needs at least one inlet")))
        } else {
            Ok(())
        }
    };

    match unit_op.calculation() {
        Calculation::Passive | Calculation::Custom(_) => Ok(()),
        Calculation::Mixer => {
            needs_inlet("mixer")?;
            if n_out != 1 {
                return Err(invalid(
                    unit_op,
                    format!("a mixer needs exactly one outlet, got {n_out}"),
                ));
            }
            Ok(())
        }
        Calculation::FlowSplitter { fractions } => {
            needs_inlet("flow splitter")?;
            if n_out == 0 || fractions.len() != n_out - 1 {
                return Err(invalid(
                    unit_op,
                    format!(
                        "{} fractions given for {} outlets, expected one fewer than the outlets",
                        fractions.len(),
                        n_out
                    ),
                ));
            }
            check_fractions(unit_op, "split", fractions.iter().copied())
        }
        Calculation::ComponentSplitter { routes } => {
            needs_inlet("component splitter")?;
            if n_out == 0 {
                return Err(invalid(unit_op, "a component splitter needs outlets"));
            }
            for (component, targets) in routes {
                if targets.len() >= n_out {
                    return Err(invalid(
                        unit_op,
                        format!(
                            "{} fractions given for '{component}', at most {} allowed",
                            targets.len(),
                            n_out - 1
                        ),
                    ));
                }
                if let Some(target) = targets.keys().find(|t| !unit_op.outlets().contains(*t)) {
                    return Err(invalid(
                        unit_op,
                        format!("fraction of '{component}' targets unknown outlet '{target}'"),
                    ));
                }
                check_fractions(unit_op, component, targets.values().copied())?;
            }
            Ok(())
        }
        Calculation::StoichiometricReactor { reactions } => {
            needs_inlet("reactor")?;
            if n_out != 1 {
                return Err(invalid(
                    unit_op,
                    format!("a reactor needs exactly one outlet, got {n_out}"),
                ));
            }
            if reactions.is_empty() {
                return Err(invalid(unit_op, "a reactor needs at least one reaction"));
            }
            check_conversions(unit_op, reactions)
        }
    }
}

fn check_fractions(
    unit_op: &UnitOp,
    what: &str,
    fractions: impl Iterator<Item = f64>,
) -> Result<(), EngineError> {
    let mut sum = 0.0;
    for fraction in fractions {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(invalid(
                unit_op,
                format!("{what} fraction {fraction} is outside [0, 1]"),
            ));
        }
        sum += fraction;
    }
    if sum > 1.0 + FRACTION_SLACK {
        return Err(invalid(
            unit_op,
            format!("{what} fractions sum to {sum}, which exceeds 1"),
        ));
    }
    Ok(())
}

/// Sums conversions per key component; the total must not exceed one.
fn check_conversions(unit_op: &UnitOp, reactions: &[Reaction]) -> Result<(), EngineError> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for reaction in reactions {
        *totals.entry(reaction.key()).or_insert(0.0) += reaction.conversion();
    }
    match totals.into_iter().find(|&(_, total)| total > 1.0 + CONVERSION_SLACK) {
        Some((component, total)) => Err(EngineError::Overconversion {
            unit_op: unit_op.name().to_string(),
            component: component.to_string(),
            total,
        }),
        None => Ok(()),
    }
}

fn sum_inlets(unit_op: &UnitOp, inlets: &[&Stream]) -> Result<Stream, EngineError> {
    let (first, rest) = inlets
        .split_first()
        .ok_or_else(|| invalid(unit_op, "no inlet streams to process"))?;
    rest.iter().try_fold((*first).clone(), |acc, inlet| {
        Stream::mix(&acc, inlet).map_err(EngineError::from)
    })
}

fn single_outlet(unit_op: &UnitOp) -> Result<&str, EngineError> {
    match unit_op.outlets() {
        [outlet] => Ok(outlet.as_str()),
        _ => Err(invalid(unit_op, "expected exactly one outlet")),
    }
}

pub(crate) fn mixer(unit_op: &UnitOp, inlets: &[&Stream]) -> Result<Stream, EngineError> {
    let outlet = single_outlet(unit_op)?;
    Ok(sum_inlets(unit_op, inlets)?.rename(outlet))
}

pub(crate) fn flow_splitter(
    unit_op: &UnitOp,
    inlets: &[&Stream],
    fractions: &[f64],
) -> Result<Vec<Stream>, EngineError> {
    let feed = sum_inlets(unit_op, inlets)?;
    let remainder = (1.0 - fractions.iter().sum::<f64>()).max(0.0);
    Ok(unit_op
        .outlets()
        .iter()
        .zip(fractions.iter().copied().chain(iter::once(remainder)))
        .map(|(outlet, fraction)| feed.copy(outlet, fraction))
        .collect())
}

/// Fraction of one component sent to each outlet, in outlet order.
fn route_fractions(outlets: &[String], route: Option<&BTreeMap<String, f64>>) -> Vec<f64> {
    let mut fractions = vec![0.0; outlets.len()];
    match route {
        None => {
            if let Some(last) = fractions.last_mut() {
                *last = 1.0;
            }
        }
        Some(targets) => {
            for (idx, outlet) in outlets.iter().enumerate() {
                fractions[idx] = targets.get(outlet).copied().unwrap_or(0.0);
            }
            let remainder = (1.0 - targets.values().sum::<f64>()).max(0.0);
            if let Some(idx) = outlets.iter().rposition(|o| !targets.contains_key(o)) {
                fractions[idx] += remainder;
            }
        }
    }
    fractions
}

/// Every component a route or reaction names must be defined in `registry`.
pub(crate) fn check_components(
    unit_op: &UnitOp,
    registry: &ComponentRegistry,
) -> Result<(), EngineError> {
    let unknown = match unit_op.calculation() {
        Calculation::ComponentSplitter { routes } => routes
            .keys()
            .map(String::as_str)
            .find(|c| !registry.contains(c)),
        Calculation::StoichiometricReactor { reactions } => reactions
            .iter()
            .flat_map(Reaction::stoichiometry)
            .map(|(c, _)| c)
            .find(|c| !registry.contains(c)),
        _ => None,
    };
    match unknown {
        Some(component) => Err(DefinitionError::UnknownComponent(component.to_string()).into()),
        None => Ok(()),
    }
}

pub(crate) fn component_splitter(
    unit_op: &UnitOp,
    inlets: &[&Stream],
    routes: &ComponentRoutes,
) -> Result<Vec<Stream>, EngineError> {
    let feed = sum_inlets(unit_op, inlets)?;
    check_components(unit_op, feed.registry())?;
    let outlets = unit_op.outlets();

    let mut rows: Vec<Vec<(String, DVector<f64>)>> = vec![Vec::new(); outlets.len()];
    for component in feed.components() {
        let flow = feed.mole_flow_series(component);
        let fractions = route_fractions(outlets, routes.get(component));
        for (outlet_rows, fraction) in rows.iter_mut().zip(fractions) {
            if fraction > 0.0 {
                outlet_rows.push((component.clone(), &flow * fraction));
            }
        }
    }

    outlets
        .iter()
        .zip(rows)
        .map(|(outlet, rows)| {
            Stream::from_mole_rows(outlet, feed.registry(), feed.axis().clone(), rows)
                .map_err(EngineError::from)
        })
        .collect()
}

pub(crate) fn stoichiometric_reactor(
    unit_op: &UnitOp,
    inlets: &[&Stream],
    reactions: &[Reaction],
) -> Result<Stream, EngineError> {
    check_conversions(unit_op, reactions)?;
    let outlet = single_outlet(unit_op)?;
    let feed = sum_inlets(unit_op, inlets)?;
    check_components(unit_op, feed.registry())?;
    let n = feed.n_samples();

    let mut rows: Vec<(String, DVector<f64>)> = feed
        .components()
        .iter()
        .map(|c| (c.clone(), feed.mole_flow_series(c)))
        .collect();
    let mut position: HashMap<String, usize> = rows
        .iter()
        .enumerate()
        .map(|(idx, (c, _))| (c.clone(), idx))
        .collect();
    for reaction in reactions {
        for (component, _) in reaction.stoichiometry() {
            if !position.contains_key(component) {
                position.insert(component.to_string(), rows.len());
                rows.push((component.to_string(), DVector::zeros(n)));
            }
        }
    }

    // All extents come from the inlet, so reactions do not see each other's deltas.
    let mut deltas = vec![DVector::<f64>::zeros(n); rows.len()];
    for reaction in reactions {
        let extent = feed.mole_flow_series(reaction.key())
            * (reaction.conversion() / reaction.key_coefficient());
        trace!(
            unit_op = unit_op.name(),
            key = reaction.key(),
            extent = extent.sum(),
            "Computed extent of reaction."
        );
        for (component, coefficient) in reaction.stoichiometry() {
            if let Some(&idx) = position.get(component) {
                deltas[idx] += &extent * coefficient;
            }
        }
    }

    for ((component, row), delta) in rows.iter_mut().zip(&deltas) {
        let scale = row.amax().max(1.0);
        for (value, &change) in row.iter_mut().zip(delta.iter()) {
            let updated = *value + change;
            if updated < 0.0 && change < 0.0 {
                if updated < -NEGATIVE_FLOW_TOLERANCE * scale {
                    return Err(EngineError::NegativeFlow {
                        unit_op: unit_op.name().to_string(),
                        component: component.clone(),
                        value: updated,
                    });
                }
                *value = 0.0;
            } else {
                *value = updated;
            }
        }
    }

    Ok(Stream::from_mole_rows(
        outlet,
        feed.registry(),
        feed.axis().clone(),
        rows,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::FlowBasis;
    use crate::engine::unit_op::UnitOperation;
    use chrono::NaiveDate;
    use nalgebra::DMatrix;
    use std::sync::Arc;

    fn registry() -> Arc<ComponentRegistry> {
        let mut registry = ComponentRegistry::new();
        registry.define("Hydrogen", &["H"], &[2]).unwrap();
        registry.define("Ethane", &["C", "H"], &[2, 6]).unwrap();
        registry.define("Ethylene", &["C", "H"], &[2, 4]).unwrap();
        Arc::new(registry)
    }

    fn feed(reg: &Arc<ComponentRegistry>) -> Stream {
        Stream::from_pairs(
            "Feed",
            reg,
            &[("Ethylene", 1.0), ("Hydrogen", 2.0)],
            FlowBasis::Mole,
        )
        .unwrap()
    }

    fn hydrogenation(reg: &ComponentRegistry, conversion: f64) -> Reaction {
        Reaction::new(
            reg,
            &[("Ethylene", 1.0), ("Hydrogen", 1.0)],
            &[("Ethane", 1.0)],
            "Ethylene",
            conversion,
        )
        .unwrap()
    }

    fn run(unit_op: &UnitOp, inlets: &[&Stream]) -> Vec<Stream> {
        unit_op.compute(inlets).unwrap().unwrap()
    }

    mod mixer {
        use super::*;

        #[test]
        fn sums_all_inlets_into_the_named_outlet() {
            let reg = registry();
            let a = feed(&reg);
            let b = Stream::from_pairs("B", &reg, &[("Ethane", 0.5)], FlowBasis::Mole).unwrap();
            let unit_op = UnitOp::new("M", &["Feed", "B"], &["Out"], Calculation::Mixer).unwrap();

            let out = run(&unit_op, &[&a, &b]);

            assert_eq!(out.len(), 1);
            assert_eq!(out[0].name(), "Out");
            assert_eq!(out[0].components(), &["Ethylene", "Hydrogen", "Ethane"]);
            assert!((out[0].mole_flow("Ethane") - 0.5).abs() < 1e-12);
        }

        #[test]
        fn rejects_more_than_one_outlet() {
            let result = UnitOp::new("M", &["A"], &["X", "Y"], Calculation::Mixer);
            assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
        }

        #[test]
        fn rejects_missing_inlets() {
            let result = UnitOp::new("M", &[], &["X"], Calculation::Mixer);
            assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
        }
    }

    mod flow_splitter {
        use super::*;

        #[test]
        fn split_and_remix_reproduces_the_inlet() {
            let reg = registry();
            let inlet = feed(&reg);
            let splitter = UnitOp::new(
                "S",
                &["Feed"],
                &["A", "B"],
                Calculation::FlowSplitter {
                    fractions: vec![0.37],
                },
            )
            .unwrap();

            let out = run(&splitter, &[&inlet]);
            assert!((out[0].total_mass_flow() - 0.37 * inlet.total_mass_flow()).abs() < 1e-9);
            assert!((out[1].total_mass_flow() - 0.63 * inlet.total_mass_flow()).abs() < 1e-9);

            let remixed = Stream::mix(&out[0], &out[1]).unwrap();
            assert!(Stream::flows_approx(&remixed, &inlet, 1e-12));
        }

        #[test]
        fn rejects_wrong_fraction_count() {
            let result = UnitOp::new(
                "S",
                &["F"],
                &["A", "B", "C"],
                Calculation::FlowSplitter {
                    fractions: vec![0.5],
                },
            );
            assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
        }

        #[test]
        fn rejects_fractions_out_of_range() {
            for fractions in [vec![0.7, 0.6], vec![-0.1, 0.5], vec![1.2, 0.0]] {
                let result = UnitOp::new(
                    "S",
                    &["F"],
                    &["A", "B", "C"],
                    Calculation::FlowSplitter { fractions },
                );
                assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
            }
        }
    }

    mod component_splitter {
        use super::*;

        fn routes(entries: &[(&str, Vec<(&str, f64)>)]) -> ComponentRoutes {
            entries
                .iter()
                .map(|(component, targets)| {
                    (
                        component.to_string(),
                        targets.iter().map(|(o, f)| (o.to_string(), *f)).collect(),
                    )
                })
                .collect()
        }

        #[test]
        fn unmentioned_components_go_to_the_last_outlet() {
            let reg = registry();
            let product = Stream::from_pairs(
                "Product",
                &reg,
                &[("Ethylene", 0.1), ("Ethane", 0.9), ("Hydrogen", 1.1)],
                FlowBasis::Mole,
            )
            .unwrap();
            let membrane = UnitOp::new(
                "Membrane",
                &["Product"],
                &["C2", "H2"],
                Calculation::ComponentSplitter {
                    routes: routes(&[
                        ("Ethylene", vec![("C2", 1.0)]),
                        ("Ethane", vec![("C2", 1.0)]),
                    ]),
                },
            )
            .unwrap();

            let out = run(&membrane, &[&product]);

            assert_eq!(out[0].name(), "C2");
            assert_eq!(out[0].components(), &["Ethylene", "Ethane"]);
            assert_eq!(out[1].components(), &["Hydrogen"]);
            assert!((out[1].mole_flow("Hydrogen") - 1.1).abs() < 1e-12);
            let remixed = Stream::mix(&out[0], &out[1]).unwrap();
            assert!(Stream::flows_approx(&remixed, &product, 1e-12));
        }

        #[test]
        fn partial_routes_send_remainder_to_unrouted_outlet() {
            let reg = registry();
            let inlet = feed(&reg);
            let splitter = UnitOp::new(
                "S",
                &["Feed"],
                &["A", "B", "C"],
                Calculation::ComponentSplitter {
                    routes: routes(&[("Hydrogen", vec![("A", 0.25), ("C", 0.5)])]),
                },
            )
            .unwrap();

            let out = run(&splitter, &[&inlet]);

            assert!((out[0].mole_flow("Hydrogen") - 0.5).abs() < 1e-12);
            assert!((out[1].mole_flow("Hydrogen") - 0.5).abs() < 1e-12);
            assert!((out[2].mole_flow("Hydrogen") - 1.0).abs() < 1e-12);
            assert!((out[2].mole_flow("Ethylene") - 1.0).abs() < 1e-12);
            assert_eq!(out[0].mole_flow("Ethylene"), 0.0);
        }

        #[test]
        fn rejects_unknown_target_outlet() {
            let result = UnitOp::new(
                "S",
                &["F"],
                &["A", "B"],
                Calculation::ComponentSplitter {
                    routes: routes(&[("Hydrogen", vec![("Z", 0.5)])]),
                },
            );
            assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
        }

        #[test]
        fn rejects_a_fraction_for_every_outlet() {
            let result = UnitOp::new(
                "S",
                &["F"],
                &["A", "B"],
                Calculation::ComponentSplitter {
                    routes: routes(&[("Hydrogen", vec![("A", 0.5), ("B", 0.5)])]),
                },
            );
            assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
        }

        #[test]
        fn routes_naming_unknown_components_are_rejected() {
            let reg = registry();
            let splitter = UnitOp::new(
                "S",
                &["Feed"],
                &["A", "B"],
                Calculation::ComponentSplitter {
                    routes: routes(&[
                        ("Hydrogen", vec![("A", 1.0)]),
                        ("Propane", vec![("A", 1.0)]),
                    ]),
                },
            )
            .unwrap();

            let result = splitter.compute(&[&feed(&reg)]);

            assert!(matches!(
                result,
                Err(EngineError::Definition {
                    source: DefinitionError::UnknownComponent(ref name)
                }) if name == "Propane"
            ));
        }
    }

    mod reactor {
        use super::*;

        #[test]
        fn reaction_components_missing_from_the_feed_registry_are_rejected() {
            let full = registry();
            let mut partial = ComponentRegistry::new();
            partial.define("Hydrogen", &["H"], &[2]).unwrap();
            partial.define("Ethylene", &["C", "H"], &[2, 4]).unwrap();
            let partial = Arc::new(partial);
            let reactor = UnitOp::new(
                "Reactor",
                &["Feed"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&full, 0.5)],
                },
            )
            .unwrap();

            let result = reactor.compute(&[&feed(&partial)]);

            assert!(matches!(
                result,
                Err(EngineError::Definition {
                    source: DefinitionError::UnknownComponent(ref name)
                }) if name == "Ethane"
            ));
        }

        #[test]
        fn hydrogenation_produces_expected_outlet() {
            let reg = registry();
            let inlet = feed(&reg);
            let reactor = UnitOp::new(
                "Reactor",
                &["Feed"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&reg, 0.9)],
                },
            )
            .unwrap();

            let out = run(&reactor, &[&inlet]);
            let product = &out[0];

            assert_eq!(product.name(), "Product");
            assert_eq!(product.components(), &["Ethylene", "Hydrogen", "Ethane"]);
            assert!((product.mole_flow("Ethylene") - 0.1).abs() < 1e-12);
            assert!((product.mole_flow("Ethane") - 0.9).abs() < 1e-12);
            assert!((product.mole_flow("Hydrogen") - 1.1).abs() < 1e-12);
            assert!((product.total_mass_flow() - inlet.total_mass_flow()).abs() < 1e-9);
            assert!((product.atom_flow("C") - inlet.atom_flow("C")).abs() < 1e-12);
        }

        #[test]
        fn overconversion_is_rejected_at_definition() {
            let reg = registry();
            let result = UnitOp::new(
                "Reactor",
                &["Feed"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&reg, 0.6), hydrogenation(&reg, 0.5)],
                },
            );
            match result {
                Err(EngineError::Overconversion {
                    component, total, ..
                }) => {
                    assert_eq!(component, "Ethylene");
                    assert!((total - 1.1).abs() < 1e-12);
                }
                other => panic!("expected overconversion, got {other:?}"),
            }
        }

        #[test]
        fn conversions_summing_to_one_are_accepted() {
            let reg = registry();
            let reactor = UnitOp::new(
                "Reactor",
                &["Feed"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&reg, 0.5), hydrogenation(&reg, 0.5)],
                },
            )
            .unwrap();
            let out = run(&reactor, &[&feed(&reg)]);
            assert!(out[0].mole_flow("Ethylene").abs() < 1e-12);
            assert!((out[0].mole_flow("Ethane") - 1.0).abs() < 1e-12);
        }

        #[test]
        fn overconsumed_non_key_reactant_is_reported() {
            let reg = registry();
            let lean = Stream::from_pairs(
                "Lean",
                &reg,
                &[("Ethylene", 2.0), ("Hydrogen", 1.0)],
                FlowBasis::Mole,
            )
            .unwrap();
            let reactor = UnitOp::new(
                "Reactor",
                &["Lean"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&reg, 1.0)],
                },
            )
            .unwrap();

            let result = reactor.compute(&[&lean]);
            assert!(matches!(
                result,
                Err(EngineError::NegativeFlow { ref component, .. }) if component == "Hydrogen"
            ));
        }

        #[test]
        fn history_inlet_reacts_per_sample() {
            let reg = registry();
            let timestamps: Vec<_> = (0..2)
                .map(|h| {
                    NaiveDate::from_ymd_opt(2024, 1, 1)
                        .unwrap()
                        .and_hms_opt(h, 0, 0)
                        .unwrap()
                })
                .collect();
            let flows = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
            let inlet = Stream::history(
                "Feed",
                &reg,
                timestamps,
                &["Ethylene", "Hydrogen"],
                &flows,
                FlowBasis::Mole,
            )
            .unwrap();
            let reactor = UnitOp::new(
                "Reactor",
                &["Feed"],
                &["Product"],
                Calculation::StoichiometricReactor {
                    reactions: vec![hydrogenation(&reg, 0.5)],
                },
            )
            .unwrap();

            let out = run(&reactor, &[&inlet]);
            let ethane = out[0].mole_flow_series("Ethane");
            assert!((ethane[0] - 0.5).abs() < 1e-12);
            assert!((ethane[1] - 1.0).abs() < 1e-12);
        }
    }

    #[derive(Debug)]
    struct Duplicator;

    impl UnitOperation for Duplicator {
        fn name(&self) -> &str {
            "duplicator"
        }

        fn compute(
            &self,
            inlets: &[&Stream],
            outlets: &[String],
        ) -> Result<Vec<Stream>, EngineError> {
            Ok(outlets.iter().map(|_| inlets[0].clone()).collect())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl UnitOperation for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn compute(&self, _: &[&Stream], _: &[String]) -> Result<Vec<Stream>, EngineError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn custom_operation_outputs_are_renamed_to_outlets() {
        let reg = registry();
        let inlet = feed(&reg);
        let unit_op = UnitOp::new(
            "Dup",
            &["Feed"],
            &["A", "B"],
            Calculation::Custom(Arc::new(Duplicator)),
        )
        .unwrap();

        let out = run(&unit_op, &[&inlet]);
        assert_eq!(unit_op.calculation().kind(), "duplicator");
        assert_eq!(out[0].name(), "A");
        assert_eq!(out[1].name(), "B");
        assert!(Stream::flows_approx(&out[1], &inlet, 0.0));
    }

    #[test]
    fn custom_operation_must_return_one_stream_per_outlet() {
        let reg = registry();
        let unit_op =
            UnitOp::new("X", &["Feed"], &["A"], Calculation::Custom(Arc::new(Broken))).unwrap();
        assert!(matches!(
            unit_op.compute(&[&feed(&reg)]),
            Err(EngineError::CustomOperation { .. })
        ));
    }

    #[test]
    fn passive_unit_op_computes_nothing() {
        let reg = registry();
        let unit_op = UnitOp::passive("P", &["Feed"], &["Out"]).unwrap();
        assert!(unit_op.compute(&[&feed(&reg)]).unwrap().is_none());
    }

    #[test]
    fn stream_cannot_be_inlet_and_outlet_of_the_same_unit_op() {
        let result = UnitOp::passive("P", &["S"], &["S"]);
        assert!(matches!(result, Err(EngineError::InvalidUnitOp { .. })));
    }
}
