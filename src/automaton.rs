//! Building the decision automaton.
//!
//! A match expression is an ordered list of arms, each lowered by the
//! binder into a bound pattern over interned temporaries. The automaton
//! turns that list into a graph of shared work. Each node holds the arms
//! that can still match at that point, in priority order, and performs
//! exactly one *action*:
//!
//! - If there are no arms left, the match has failed.
//! - If the first arm's pattern is `True`, that arm has matched and its
//!   result runs.
//! - Otherwise the node performs the leftmost leaf of the first arm's
//!   pattern. A fetch has a single successor in which every arm knows the
//!   fetched temporary is available. A test has two successors: one where
//!   the test held and one where it did not, each computed by rewriting
//!   every arm under that knowledge (see [`simplify`]).
//!
//! Rewriting is what deduplicates: when the first arm checks a length and
//! the third arm checks the same length, deciding the test once decides
//! it everywhere, so the third arm never re-checks it. Arms whose pattern
//! collapses to `False` drop out of the successor, and an arm whose
//! pattern becomes irrefutable cuts off everything behind it.
//!
//! Nodes are interned by their arm list, so two paths that arrive at the
//! same set of remaining obligations arrive at the *same* node and the
//! graph is a DAG from the start. Construction is a simple worklist over
//! nodes whose action has not been chosen yet; it terminates because the
//! first arm of every successor is strictly smaller than the first arm of
//! its parent. Along the way the builder records which arms ever appear
//! as a success action; the ones that never do are unreachable and get a
//! warning.

use id_arena::{Arena, Id};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ast::{Expr, Location};
use crate::bind::pattern::{Bindings, BoundPattern};
use crate::bind::BoundArm;
use crate::error::Warning;
use crate::type_::TypeOracle;

pub mod minimize;
pub mod simplify;


/// One arm at some point of the match: the work that remains before it
/// matches, the variables it will bind, and the result to run. Equality
/// and hashing cover the index, pattern and bindings; the hash is computed
/// once, since every node interning touches it.
#[derive(Debug, Clone)]
pub struct PartialArm {
    pub index: usize,
    pub location: Location,
    pub pattern: BoundPattern,
    pub bindings: Bindings,
    pub body: Arc<Expr>,
    hash: u64,
}

impl PartialArm {
    pub fn new(
        index: usize,
        location: Location,
        pattern: BoundPattern,
        bindings: Bindings,
        body: Arc<Expr>,
    ) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        index.hash(&mut hasher);
        pattern.hash(&mut hasher);
        bindings.hash(&mut hasher);
        let hash = hasher.finish();
        Self {
            index,
            location,
            pattern,
            bindings,
            body,
            hash,
        }
    }

    pub fn from_bound(arm: BoundArm) -> Self {
        Self::new(
            arm.index,
            arm.location,
            arm.pattern,
            arm.bindings,
            Arc::new(arm.body),
        )
    }

    /// The same arm with its pattern rewritten.
    pub fn with_pattern(&self, pattern: BoundPattern) -> Self {
        Self::new(
            self.index,
            self.location.clone(),
            pattern,
            self.bindings.clone(),
            self.body.clone(),
        )
    }
}

impl PartialEq for PartialArm {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.index == other.index
            && self.pattern == other.pattern
            && self.bindings == other.bindings
    }
}

impl Eq for PartialArm {}

impl Hash for PartialArm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

pub type NodeId = Id<Node>;

/// A node of the automaton under construction. The action is `None` until
/// the worklist reaches the node and is set exactly once.
#[derive(Debug)]
pub struct Node {
    pub arms: Vec<PartialArm>,
    pub action: Option<Action>,
}

#[derive(Debug, Clone)]
pub enum Action {
    /// The first arm has matched. `otherwise` is the node to continue
    /// from should the arm's body invoke `match_fail`, present only when
    /// the body contains the marker.
    Success {
        arm: PartialArm,
        otherwise: Option<NodeId>,
    },
    /// Perform a fetch and continue.
    Fetch {
        fetch: BoundPattern,
        next: NodeId,
    },
    /// Decide a test and branch.
    Test {
        test: BoundPattern,
        if_true: NodeId,
        if_false: NodeId,
    },
    /// No arm matched.
    Fail,
}

#[derive(Debug)]
pub struct Automaton {
    pub nodes: Arena<Node>,
    pub entry: NodeId,
    pub warnings: Vec<Warning>,
}

#[derive(Debug)]
pub struct Builder<'oracle> {
    oracle: &'oracle dyn TypeOracle,
    nodes: Arena<Node>,
    interned: HashMap<Vec<PartialArm>, NodeId>,
    pending: Vec<NodeId>,
}

impl<'oracle> Builder<'oracle> {
    pub fn new(oracle: &'oracle dyn TypeOracle) -> Self {
        Self {
            oracle,
            nodes: Arena::new(),
            interned: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn build(mut self, arms: Vec<PartialArm>) -> Automaton {
        let originals: Vec<(usize, Location)> = arms
            .iter()
            .map(|arm| (arm.index, arm.location.clone()))
            .collect();

        let entry = self.intern(normalise(arms));
        let mut reached = HashSet::new();
        while let Some(id) = self.pending.pop() {
            if self.nodes[id].action.is_some() {
                continue;
            }
            let action = self.select_action(id, &mut reached);
            if let Some(node) = self.nodes.get_mut(id) {
                node.action = Some(action);
            }
        }

        let warnings = originals
            .into_iter()
            .filter(|(index, _)| !reached.contains(index))
            .map(|(index, location)| Warning::UnreachableArm {
                location,
                arm: index + 1,
            })
            .collect();

        tracing::debug!(nodes = self.nodes.len(), "built decision automaton");
        Automaton {
            nodes: self.nodes,
            entry,
            warnings,
        }
    }

    fn intern(&mut self, arms: Vec<PartialArm>) -> NodeId {
        if let Some(&id) = self.interned.get(&arms) {
            return id;
        }
        let id = self.nodes.alloc(Node {
            arms: arms.clone(),
            action: None,
        });
        _ = self.interned.insert(arms, id);
        self.pending.push(id);
        id
    }

    fn select_action(&mut self, id: NodeId, reached: &mut HashSet<usize>) -> Action {
        let arms = self.nodes[id].arms.clone();
        let Some(first) = arms.first() else {
            return Action::Fail;
        };

        if matches!(first.pattern, BoundPattern::True { .. }) {
            _ = reached.insert(first.index);
            let otherwise = first
                .body
                .contains_match_fail()
                .then(|| self.intern(arms[1..].to_vec()));
            return Action::Success {
                arm: first.clone(),
                otherwise,
            };
        }

        let action = leftmost_leaf(&first.pattern).clone();
        if action.is_fetch() {
            let next = arms
                .iter()
                .map(|arm| arm.with_pattern(simplify::remove_fetch(&arm.pattern, &action)))
                .collect();
            Action::Fetch {
                next: self.intern(normalise(next)),
                fetch: action,
            }
        } else {
            let if_true = arms
                .iter()
                .map(|arm| {
                    arm.with_pattern(simplify::apply_test(&arm.pattern, &action, true, self.oracle))
                })
                .collect();
            let if_false = arms
                .iter()
                .map(|arm| {
                    arm.with_pattern(simplify::apply_test(
                        &arm.pattern,
                        &action,
                        false,
                        self.oracle,
                    ))
                })
                .collect();
            Action::Test {
                if_true: self.intern(normalise(if_true)),
                if_false: self.intern(normalise(if_false)),
                test: action,
            }
        }
    }
}

/// Keep the arm list in its canonical form: no arm that can no longer
/// match, nothing behind an arm that always will. An irrefutable arm
/// whose body can still bail out with `match_fail` keeps the arms behind
/// it, since they remain reachable through the bail-out.
fn normalise(arms: Vec<PartialArm>) -> Vec<PartialArm> {
    let mut result = Vec::with_capacity(arms.len());
    for arm in arms {
        if matches!(arm.pattern, BoundPattern::False { .. }) {
            continue;
        }
        let cuts_off_rest = arm.pattern.is_irrefutable() && !arm.body.contains_match_fail();
        result.push(arm);
        if cuts_off_rest {
            break;
        }
    }
    result
}

/// The next piece of work a pattern requires: conjunctions and
/// disjunctions are entered through their first subpattern.
fn leftmost_leaf(pattern: &BoundPattern) -> &BoundPattern {
    match pattern {
        BoundPattern::And { subpatterns, .. } | BoundPattern::Or { subpatterns, .. } => {
            leftmost_leaf(subpatterns.first())
        }
        _ => pattern,
    }
}
