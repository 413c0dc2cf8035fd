//! Worklist fixpoint over the whole program.
//!
//! Field, class and type immutability depend on each other through declared
//! field types, and type graphs may be cyclic (`Node { final Node next; }`).
//! The solver computes the greatest fixpoint:
//!
//! 1. Classify every field reference (no dependencies, computed once)
//! 2. Start every field/class/type node at `TransitivelyImmutable`; pinned
//!    types start at their assumed value and are never re-evaluated
//! 3. Evaluate the worklist batch against a snapshot of the current values
//! 4. Apply updates in node order; each must be at least as weak as the value
//!    it replaces. Dependents of changed nodes form the next batch
//! 5. Stop when a batch changes nothing
//!
//! ```text
//!   Type(C) ──► Field(X.c : C) ──► Class(X) ──► Type(X)
//!                                     ▲
//!                    Class(super X) ──┘
//! ```
//!
//! Values only weaken and every lattice has finite height, so the result does
//! not depend on evaluation order. A node can be weakened at most
//! `STEPS_PER_NODE` times plus once per generic parameter in the model (a
//! dependent value grows its parameter set). Every round but the last weakens
//! something, which bounds the number of rounds by the model size.

use crate::class::classify_class;
use crate::config::SolverConfig;
use crate::field::classify_field;
use crate::results::{ClassificationResults, Downgrade, SolverStats};
use crate::type_immutability::classify_type;
use crate::variant::PrecisionStrategy;
use immutability_lattice_types::{
    AnalysisError, AnalysisResult, ClassImmutability, ErrorCode, ErrorContext, FieldId,
    FieldImmutability, FieldReferenceMutability, ProgramModel, TypeId, TypeImmutability,
};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, trace};

/// Weakening steps from `TransitivelyImmutable` down to `Mutable`.
const STEPS_PER_NODE: usize = 3;

/// One classified entity of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Field(FieldId),
    Class(TypeId),
    Type(TypeId),
}

/// A freshly computed node value.
#[derive(Debug, Clone)]
enum Update {
    Field(FieldId, FieldImmutability),
    Class(TypeId, ClassImmutability),
    Type(TypeId, TypeImmutability),
}

/// Tentative values during a run.
#[derive(Debug, Clone)]
struct Snapshot {
    fields: Vec<FieldImmutability>,
    classes: Vec<ClassImmutability>,
    types: Vec<TypeImmutability>,
}

/// Reverse dependency graph: for every node, the nodes that read it.
struct DependencyGraph {
    field_count: usize,
    type_count: usize,
    dependents: Vec<SmallVec<[usize; 4]>>,
    edges: usize,
}

impl DependencyGraph {
    fn build(model: &ProgramModel) -> Self {
        let field_count = model.field_count();
        let type_count = model.type_count();
        let mut graph = Self {
            field_count,
            type_count,
            dependents: vec![SmallVec::new(); field_count + 2 * type_count],
            edges: 0,
        };

        for field in model.fields() {
            let reader = graph.index(Node::Field(field.id));
            for referenced in field.declared_type.referenced_types() {
                graph.add_edge(graph.index(Node::Type(referenced)), reader);
            }
        }
        for ty in model.types() {
            let class = graph.index(Node::Class(ty.id));
            for field in &ty.fields {
                graph.add_edge(graph.index(Node::Field(*field)), class);
            }
            if let Some(superclass) = ty.superclass {
                graph.add_edge(graph.index(Node::Class(superclass)), class);
            }
            graph.add_edge(class, graph.index(Node::Type(ty.id)));
        }
        graph
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if !self.dependents[from].contains(&to) {
            self.dependents[from].push(to);
            self.edges += 1;
        }
    }

    fn node_count(&self) -> usize {
        self.dependents.len()
    }

    fn index(&self, node: Node) -> usize {
        match node {
            Node::Field(id) => id.index(),
            Node::Class(id) => self.field_count + id.index(),
            Node::Type(id) => self.field_count + self.type_count + id.index(),
        }
    }

    fn node(&self, index: usize) -> Node {
        if index < self.field_count {
            Node::Field(FieldId(index as u32))
        } else if index < self.field_count + self.type_count {
            Node::Class(TypeId((index - self.field_count) as u32))
        } else {
            Node::Type(TypeId((index - self.field_count - self.type_count) as u32))
        }
    }
}

/// Fixpoint solver for one precision variant.
pub struct FixpointSolver<'a> {
    model: &'a ProgramModel,
    strategy: &'a dyn PrecisionStrategy,
    config: &'a SolverConfig,
    graph: DependencyGraph,
    /// Maximum number of times one node may be weakened
    weakening_budget: usize,
}

impl<'a> FixpointSolver<'a> {
    pub fn new(
        model: &'a ProgramModel,
        strategy: &'a dyn PrecisionStrategy,
        config: &'a SolverConfig,
    ) -> Self {
        let params: usize = model.types().map(|ty| ty.generic_params.len()).sum();
        Self {
            model,
            strategy,
            config,
            graph: DependencyGraph::build(model),
            weakening_budget: STEPS_PER_NODE + params,
        }
    }

    /// Configured round cap, or the bound implied by the weakening budget.
    fn round_bound(&self) -> usize {
        self.config
            .max_iterations
            .unwrap_or_else(|| self.graph.node_count() * self.weakening_budget + 1)
    }

    /// Run from the optimistic start.
    pub fn solve(&self) -> AnalysisResult<ClassificationResults> {
        let snapshot = Snapshot {
            fields: vec![FieldImmutability::TransitivelyImmutable; self.model.field_count()],
            classes: vec![ClassImmutability::TransitivelyImmutable; self.model.type_count()],
            types: self
                .model
                .types()
                .map(|ty| {
                    self.model
                        .assumption(ty.id)
                        .cloned()
                        .unwrap_or(TypeImmutability::TransitivelyImmutable)
                })
                .collect(),
        };
        self.run(snapshot)
    }

    /// Run again from previously converged results of the same model and variant.
    ///
    /// Every node is re-evaluated once; on a converged input nothing changes.
    pub fn resume(&self, prior: &ClassificationResults) -> AnalysisResult<ClassificationResults> {
        let compatible = prior.variant == self.strategy.id()
            && prior.fields.len() == self.model.field_count()
            && prior.types.len() == self.model.type_count();
        if !compatible {
            return Err(self.error(
                ErrorCode::MonotonicityViolation,
                "prior results were computed for a different model or variant".to_string(),
                0,
            ));
        }
        self.run(Snapshot {
            fields: prior.fields.clone(),
            classes: prior.classes.clone(),
            types: prior.types.clone(),
        })
    }

    fn run(&self, mut snapshot: Snapshot) -> AnalysisResult<ClassificationResults> {
        let variant = self.strategy.id();
        let (references, downgrades) = self.classify_references();

        let pinned: Vec<bool> = (0..self.graph.node_count())
            .map(|index| match self.graph.node(index) {
                Node::Type(id) => self.model.assumption(id).is_some(),
                _ => false,
            })
            .collect();
        let mut stats = SolverStats {
            nodes: self.graph.node_count(),
            dependency_edges: self.graph.edges,
            pinned_types: pinned.iter().filter(|p| **p).count(),
            ..SolverStats::default()
        };

        let round_bound = self.round_bound();
        let mut weakenings = vec![0usize; self.graph.node_count()];
        let mut worklist: BTreeSet<usize> =
            (0..self.graph.node_count()).filter(|i| !pinned[*i]).collect();
        while !worklist.is_empty() {
            if stats.rounds >= round_bound {
                return Err(self.error(
                    ErrorCode::NonConvergence,
                    format!(
                        "no fixpoint after {} rounds ({} nodes pending)",
                        stats.rounds,
                        worklist.len()
                    ),
                    stats.rounds,
                ));
            }
            stats.rounds += 1;

            let batch: Vec<usize> = std::mem::take(&mut worklist).into_iter().collect();
            let updates: Vec<Update> = if self.config.parallel {
                batch
                    .par_iter()
                    .map(|index| self.evaluate(*index, &snapshot, &references))
                    .collect()
            } else {
                batch
                    .iter()
                    .map(|index| self.evaluate(*index, &snapshot, &references))
                    .collect()
            };
            stats.evaluations += batch.len();

            let mut changed = 0;
            for (index, update) in batch.iter().zip(updates) {
                if !self.apply(&mut snapshot, update, stats.rounds)? {
                    continue;
                }
                changed += 1;
                weakenings[*index] += 1;
                if weakenings[*index] > self.weakening_budget {
                    let node = self.graph.node(*index);
                    return Err(self
                        .error(
                            ErrorCode::NonConvergence,
                            format!("weakened more than {} times", self.weakening_budget),
                            stats.rounds,
                        )
                        .for_entity(self.entity_name(node)));
                }
                worklist.extend(self.graph.dependents[*index].iter().filter(|d| !pinned[**d]));
            }
            stats.changes += changed;
            debug!(
                variant = %variant,
                round = stats.rounds,
                evaluated = batch.len(),
                changed = changed,
                "fixpoint round"
            );
        }

        debug!(
            variant = %variant,
            rounds = stats.rounds,
            evaluations = stats.evaluations,
            changes = stats.changes,
            "fixpoint converged"
        );

        Ok(ClassificationResults {
            variant,
            references,
            fields: snapshot.fields,
            classes: snapshot.classes,
            types: snapshot.types,
            downgrades,
            stats,
        })
    }

    fn classify_references(&self) -> (Vec<FieldReferenceMutability>, Vec<Downgrade>) {
        let mut references = Vec::with_capacity(self.model.field_count());
        let mut downgrades = Vec::new();
        for field in self.model.fields() {
            let outcome = self.strategy.classify_reference(field);
            if let Some(reason) = outcome.downgrade {
                let path = self.model.field_path(field.id);
                debug!(
                    variant = %self.strategy.id(),
                    field = %path,
                    reason = %reason,
                    "lazy initialization downgraded"
                );
                downgrades.push(Downgrade {
                    field: field.id,
                    path,
                    reason,
                });
            }
            references.push(outcome.value);
        }
        (references, downgrades)
    }

    fn evaluate(
        &self,
        index: usize,
        snapshot: &Snapshot,
        references: &[FieldReferenceMutability],
    ) -> Update {
        match self.graph.node(index) {
            Node::Field(id) => {
                let value = classify_field(
                    self.model,
                    self.model.field(id),
                    references[id.index()],
                    self.strategy,
                    |ty| snapshot.types[ty.index()].clone(),
                );
                Update::Field(id, value)
            }
            Node::Class(id) => {
                let decl = self.model.type_decl(id);
                let fields = decl.fields.iter().map(|f| &snapshot.fields[f.index()]);
                let superclass = decl.superclass.map(|s| &snapshot.classes[s.index()]);
                Update::Class(id, classify_class(fields, superclass))
            }
            Node::Type(id) => Update::Type(
                id,
                classify_type(
                    self.model.type_decl(id),
                    &snapshot.classes[id.index()],
                    self.model.assumption(id),
                ),
            ),
        }
    }

    /// Store an update; `Ok(true)` when the value changed.
    fn apply(&self, snapshot: &mut Snapshot, update: Update, round: usize) -> AnalysisResult<bool> {
        let (node, stored) = match update {
            Update::Field(id, value) => (
                Node::Field(id),
                store(&mut snapshot.fields[id.index()], value, |new, old| {
                    new.is_at_least_as_weak_as(old)
                }),
            ),
            Update::Class(id, value) => (
                Node::Class(id),
                store(&mut snapshot.classes[id.index()], value, |new, old| {
                    new.is_at_least_as_weak_as(old)
                }),
            ),
            Update::Type(id, value) => (
                Node::Type(id),
                store(&mut snapshot.types[id.index()], value, |new, old| {
                    new.is_at_least_as_weak_as(old)
                }),
            ),
        };

        match stored {
            Stored::Unchanged => Ok(false),
            Stored::Weakened { from, to } => {
                trace!(
                    variant = %self.strategy.id(),
                    entity = %self.entity_name(node),
                    from = %from,
                    to = %to,
                    "weakened"
                );
                Ok(true)
            }
            Stored::Strengthened { from, to } => Err(self
                .error(
                    ErrorCode::MonotonicityViolation,
                    format!("value moved from {} to {}", from, to),
                    round,
                )
                .for_entity(self.entity_name(node))),
        }
    }

    fn entity_name(&self, node: Node) -> String {
        match node {
            Node::Field(id) => self.model.field_path(id),
            Node::Class(id) => format!("class {}", self.model.type_decl(id).name),
            Node::Type(id) => format!("type {}", self.model.type_decl(id).name),
        }
    }

    fn error(&self, code: ErrorCode, message: String, rounds: usize) -> AnalysisError {
        AnalysisError::with_context(
            code,
            message,
            ErrorContext {
                entity: None,
                variant: Some(self.strategy.id().to_string()),
                rounds: Some(rounds),
            },
        )
    }
}

enum Stored {
    Unchanged,
    Weakened { from: String, to: String },
    Strengthened { from: String, to: String },
}

fn store<T, W>(slot: &mut T, value: T, is_weaker: W) -> Stored
where
    T: PartialEq + fmt::Display,
    W: Fn(&T, &T) -> bool,
{
    if *slot == value {
        return Stored::Unchanged;
    }
    let from = slot.to_string();
    let to = value.to_string();
    if !is_weaker(&value, slot) {
        return Stored::Strengthened { from, to };
    }
    *slot = value;
    Stored::Weakened { from, to }
}

/// Solve `model` with `strategy` under `config`.
pub fn solve(
    model: &ProgramModel,
    strategy: &dyn PrecisionStrategy,
    config: &SolverConfig,
) -> AnalysisResult<ClassificationResults> {
    FixpointSolver::new(model, strategy, config).solve()
}
