//! Dependency graph analysis and iteration-step insertion
//!
//! An array output wired straight into an input that expects one element is
//! a cardinality mismatch. Each mismatched `(source step, output)` pair gets
//! one FOREACH step placed after the source; every scalar consumer of that
//! output is rewired to the FOREACH step's `item`. The plan is then renumbered
//! in dependency order.

use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use planguard_core::{
    DataType, InputBinding, OutputSpec, Plan, Step, StepInput, StepNumber, StepOutput,
    PARENT_CONTEXT_STEP,
};
use planguard_plugins::{
    is_iteration_verb, PluginCatalog, ARRAY_INPUT, FOREACH_VERB, INDEX_OUTPUT, ITEM_OUTPUT,
};
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use tracing::{debug, info, warn};

/// Why one step must run after another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dependency {
    /// An input references an output of the earlier step.
    Data,
    /// Listed in the step's `dependencies` hint.
    Hint,
}

/// An array output feeding an input that takes a single element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardinalityMismatch {
    pub source_step: StepNumber,
    pub output_name: String,
    pub consumer_step: StepNumber,
    pub input_name: String,
}

/// Edge `i -> j` for every step `j` that depends on step `i`.
///
/// References to the parent context, to missing steps, and to the step
/// itself add no edge.
pub fn dependency_graph(plan: &Plan) -> DiGraphMap<StepNumber, Dependency> {
    let mut graph = DiGraphMap::new();
    for step in plan.iter() {
        graph.add_node(step.number);
    }
    for step in plan.iter() {
        let data = step
            .inputs
            .values()
            .filter_map(|input| input.binding().and_then(InputBinding::source_step))
            .map(|source| (source, Dependency::Data));
        let hints = step
            .dependency_steps()
            .into_iter()
            .map(|source| (source, Dependency::Hint));

        for (source, kind) in data.chain(hints) {
            if source == PARENT_CONTEXT_STEP || source == step.number || !graph.contains_node(source) {
                continue;
            }
            // a data edge is never downgraded to a hint
            if graph.edge_weight(source, step.number) != Some(&Dependency::Data) {
                graph.add_edge(source, step.number, kind);
            }
        }
    }
    graph
}

/// Declared type of `output` on `step`: the step's own declaration first,
/// then its plugin definition.
fn output_type(step: &Step, output: &str, catalog: &PluginCatalog) -> Option<DataType> {
    step.outputs.get(output).and_then(StepOutput::data_type).or_else(|| {
        catalog
            .lookup(&step.action_verb)
            .and_then(|def| def.output(output))
            .map(|def| def.data_type)
    })
}

/// Every cardinality mismatch in the plan, in step order then input order.
///
/// Consumers whose verb or input is unknown to the registry are skipped:
/// without a declared input type there is nothing to compare against.
pub fn find_mismatches(plan: &Plan, catalog: &PluginCatalog) -> Vec<CardinalityMismatch> {
    let mut found = Vec::new();
    for step in plan.iter() {
        if is_iteration_verb(&step.action_verb) {
            continue;
        }
        let Some(def) = catalog.lookup(&step.action_verb) else {
            continue;
        };
        for (name, input) in &step.inputs {
            let Some(InputBinding::Reference {
                source_step: Some(source),
                output_name,
                ..
            }) = input.binding()
            else {
                continue;
            };
            if *source == PARENT_CONTEXT_STEP || *source == step.number {
                continue;
            }
            let Some(expected) = def.input(name).map(|d| d.data_type) else {
                continue;
            };
            let Some(source_step) = plan.step(*source) else {
                continue;
            };
            let produced = output_type(source_step, output_name, catalog);
            if produced == Some(DataType::Array) && expected.is_scalar() {
                found.push(CardinalityMismatch {
                    source_step: *source,
                    output_name: output_name.clone(),
                    consumer_step: step.number,
                    input_name: name.clone(),
                });
            }
        }
    }
    found
}

/// Insert iteration steps for every cardinality mismatch and renumber.
///
/// Runs to a fixpoint, so an iteration step whose declared `item` is itself an
/// array gets an inner iteration step. Inserted steps declare `item` as `any`,
/// which keeps a second run from rewiring anything. A plan with no mismatch,
/// or with duplicate or zero step numbers, comes back unchanged.
pub fn resolve_iteration(mut plan: Plan, catalog: &PluginCatalog) -> Plan {
    if !plan.duplicate_numbers().is_empty() || plan.step(PARENT_CONTEXT_STEP).is_some() {
        debug!("invalid step numbering, skipping iteration analysis");
        return plan;
    }

    let max_passes = plan
        .iter()
        .map(|s| s.inputs.len())
        .sum::<usize>()
        .max(1);

    for pass in 0..=max_passes {
        let mismatches = find_mismatches(&plan, catalog);
        if mismatches.is_empty() {
            return plan;
        }
        if pass == max_passes {
            warn!(
                remaining = mismatches.len(),
                "iteration analysis did not converge"
            );
            break;
        }
        plan = insert_iterations(plan, &mismatches);
    }
    plan
}

fn foreach_step(number: StepNumber, source: StepNumber, output: &str) -> Step {
    Step::new(number, FOREACH_VERB)
        .with_description(format!("Iterate over '{}' from step {}", output, source))
        .with_input(ARRAY_INPUT, InputBinding::reference(source, output))
        .with_output(
            ITEM_OUTPUT,
            OutputSpec::new(format!("Current element of '{}'", output), DataType::Any),
        )
        .with_output(
            INDEX_OUTPUT,
            OutputSpec::new("Position of the current element", DataType::Number),
        )
}

/// Existing iteration step already walking `(source, output)`.
fn existing_iteration(plan: &Plan, source: StepNumber, output: &str) -> Option<StepNumber> {
    plan.iter()
        .filter(|s| is_iteration_verb(&s.action_verb))
        .find(|s| {
            s.inputs
                .get(ARRAY_INPUT)
                .and_then(StepInput::binding)
                .is_some_and(|b| b.source_step() == Some(source) && b.output_name() == Some(output))
        })
        .map(|s| s.number)
}

/// Every step number `step` points at: input references, including a raw
/// `sourceStep` on a malformed input, and the `dependencies` hint.
fn referenced_steps(step: &Step) -> Vec<StepNumber> {
    let mut found: Vec<StepNumber> = step
        .inputs
        .values()
        .filter_map(|input| match input {
            StepInput::Bound(binding) => binding.source_step(),
            StepInput::Malformed { raw, .. } => raw
                .get("sourceStep")
                .and_then(Value::as_u64)
                .and_then(|n| StepNumber::try_from(n).ok()),
        })
        .collect();
    found.extend(step.dependency_steps());
    found
}

fn insert_iterations(mut plan: Plan, mismatches: &[CardinalityMismatch]) -> Plan {
    // fresh numbers must not collide with a dangling reference either
    let mut next_number = plan
        .iter()
        .flat_map(|s| referenced_steps(s).into_iter().chain([s.number]))
        .max()
        .unwrap_or(0);
    let mut iterators: HashMap<(StepNumber, String), StepNumber> = HashMap::new();
    let mut inserted: Vec<Step> = Vec::new();

    for m in mismatches {
        let key = (m.source_step, m.output_name.clone());
        let iterator = match iterators.get(&key) {
            Some(&number) => number,
            None => {
                let number = match existing_iteration(&plan, m.source_step, &m.output_name) {
                    Some(number) => number,
                    None => {
                        next_number += 1;
                        inserted.push(foreach_step(next_number, m.source_step, &m.output_name));
                        next_number
                    }
                };
                iterators.insert(key, number);
                number
            }
        };

        if let Some(consumer) = plan.steps.iter_mut().find(|s| s.number == m.consumer_step) {
            if let Some(StepInput::Bound(InputBinding::Reference {
                source_step,
                output_name,
                ..
            })) = consumer.inputs.get_mut(&m.input_name)
            {
                *source_step = Some(iterator);
                *output_name = ITEM_OUTPUT.to_string();
            }
        }
        info!(
            source = m.source_step,
            output = %m.output_name,
            consumer = m.consumer_step,
            input = %m.input_name,
            iterator,
            "iteration step wired"
        );
    }

    // each inserted step goes right after its source
    let mut steps = Vec::with_capacity(plan.len() + inserted.len());
    for step in plan.steps {
        let number = step.number;
        steps.push(step);
        let (after, rest): (Vec<Step>, Vec<Step>) = inserted.into_iter().partition(|s| {
            s.inputs
                .get(ARRAY_INPUT)
                .and_then(StepInput::binding)
                .and_then(InputBinding::source_step)
                == Some(number)
        });
        steps.extend(after);
        inserted = rest;
    }
    steps.extend(inserted);

    renumber(Plan::new(steps))
}

/// Positions of `plan.steps` in execution order.
///
/// Topological over [`dependency_graph`], ties going to the earlier position.
/// A cyclic graph keeps the current order.
pub fn execution_order(plan: &Plan) -> Vec<usize> {
    let graph = dependency_graph(plan);
    let stable: Vec<usize> = (0..plan.len()).collect();
    if petgraph::algo::is_cyclic_directed(&graph) {
        warn!("dependency cycle, keeping step order");
        return stable;
    }

    let rank: HashMap<StepNumber, usize> = plan
        .iter()
        .enumerate()
        .map(|(i, s)| (s.number, i))
        .collect();
    let mut indegree: HashMap<StepNumber, usize> = plan
        .iter()
        .map(|s| {
            let n = graph.neighbors_directed(s.number, Direction::Incoming).count();
            (s.number, n)
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = plan
        .iter()
        .enumerate()
        .filter(|(_, s)| indegree.get(&s.number) == Some(&0))
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(plan.len());
    while let Some(Reverse(position)) = ready.pop() {
        order.push(position);
        let number = plan.steps[position].number;
        for next in graph.neighbors_directed(number, Direction::Outgoing) {
            if let Some(degree) = indegree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    if let Some(&r) = rank.get(&next) {
                        ready.push(Reverse(r));
                    }
                }
            }
        }
    }

    if order.len() == plan.len() {
        order
    } else {
        stable
    }
}

/// Reorder into execution order and number the steps `1..=n`, rewriting every
/// `sourceStep` and dependency hint to match.
///
/// A reference to a step that does not exist is moved above `n` when its old
/// number would land on a renumbered step, so it stays unresolved.
pub fn renumber(plan: Plan) -> Plan {
    let order = execution_order(&plan);
    let mut mapping: HashMap<StepNumber, StepNumber> = order
        .iter()
        .enumerate()
        .map(|(new_index, &position)| (plan.steps[position].number, new_index as StepNumber + 1))
        .collect();

    let size = plan.len() as StepNumber;
    let dangling: BTreeSet<StepNumber> = plan
        .iter()
        .flat_map(referenced_steps)
        .filter(|n| *n != PARENT_CONTEXT_STEP && !mapping.contains_key(n))
        .collect();
    let mut next_free = dangling.iter().copied().max().unwrap_or(0).max(size);
    for number in dangling {
        let target = if number > size {
            number
        } else {
            next_free += 1;
            next_free
        };
        if target != number {
            debug!(from = number, to = target, "dangling reference moved out of range");
        }
        mapping.insert(number, target);
    }

    let mut slots: Vec<Option<Step>> = plan.steps.into_iter().map(Some).collect();
    let steps = order
        .iter()
        .filter_map(|&position| slots[position].take())
        .map(|mut step| {
            remap_step(&mut step, &mapping);
            step
        })
        .collect();
    Plan::new(steps)
}

fn remap_step(step: &mut Step, mapping: &HashMap<StepNumber, StepNumber>) {
    if let Some(&number) = mapping.get(&step.number) {
        step.number = number;
    }
    for input in step.inputs.values_mut() {
        match input {
            StepInput::Bound(InputBinding::Reference {
                source_step: Some(source),
                ..
            }) if *source != PARENT_CONTEXT_STEP => {
                if let Some(&mapped) = mapping.get(&*source) {
                    *source = mapped;
                }
            }
            StepInput::Malformed {
                raw: Value::Object(map),
                ..
            } => {
                let mapped = map
                    .get("sourceStep")
                    .and_then(Value::as_u64)
                    .and_then(|n| StepNumber::try_from(n).ok())
                    .filter(|n| *n != PARENT_CONTEXT_STEP)
                    .and_then(|n| mapping.get(&n).copied());
                if let Some(mapped) = mapped {
                    map.insert("sourceStep".into(), Value::from(mapped));
                }
            }
            _ => {}
        }
    }
    step.remap_dependencies(|n| mapping.get(&n).copied());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: StepNumber, verb: &str) -> Step {
        Step::new(number, verb).with_output("out", OutputSpec::new("", DataType::String))
    }

    #[test]
    fn renumber_follows_references_over_position() {
        // step 5 is listed first but consumes step 7
        let plan = Plan::new(vec![
            step(5, "B").with_input("x", InputBinding::reference(7, "out")),
            step(7, "A"),
        ]);
        let plan = renumber(plan);
        assert_eq!(plan.steps[0].action_verb, "A");
        assert_eq!(plan.steps[0].number, 1);
        assert_eq!(plan.steps[1].number, 2);
        assert_eq!(plan.steps[1].inputs["x"].binding().unwrap().source_step(), Some(1));
    }

    #[test]
    fn renumber_remaps_dependency_hints() {
        let mut later = step(20, "B");
        later.dependencies = Some(serde_json::json!([10]));
        let plan = renumber(Plan::new(vec![step(10, "A"), later]));
        assert_eq!(plan.steps[1].dependencies, Some(serde_json::json!([1])));
    }

    #[test]
    fn cycle_keeps_stable_order() {
        let plan = Plan::new(vec![
            step(1, "A").with_input("x", InputBinding::reference(2, "out")),
            step(2, "B").with_input("x", InputBinding::reference(1, "out")),
        ]);
        assert_eq!(execution_order(&plan), vec![0, 1]);
    }

    #[test]
    fn parent_context_adds_no_edge() {
        let plan = Plan::new(vec![step(1, "A").with_input("x", InputBinding::reference(0, "goal"))]);
        assert_eq!(dependency_graph(&plan).edge_count(), 0);
    }
}
