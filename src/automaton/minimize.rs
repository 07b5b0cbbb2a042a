//! Bottom-up deduplication of the automaton.
//!
//! Interning by arm list already shares nodes whose remaining obligations
//! are identical, but distinct arm lists can still behave identically:
//! different arms converging on the same tail of work. The minimizer
//! walks the automaton in post order, replaces every node by an interned
//! `(action, successors)` pair, and so merges any two subgraphs with the
//! same behaviour. A node discovered by a second predecessor can no
//! longer be reached purely by fall-through, so it is marked as needing a
//! label when the code is laid out.

use std::collections::HashMap;

use crate::automaton::{Action, Automaton, NodeId, PartialArm};
use crate::bind::pattern::BoundPattern;

/// A node of the minimized automaton. Successors are indices into
/// [`Minimized::nodes`]; the graph is immutable from here on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MinAction {
    Success {
        arm: PartialArm,
        otherwise: Option<usize>,
    },
    Fetch {
        fetch: BoundPattern,
        next: usize,
    },
    Test {
        test: BoundPattern,
        if_true: usize,
        if_false: usize,
    },
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinNode {
    pub action: MinAction,
    /// Reached by two or more predecessors.
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimized {
    pub nodes: Vec<MinNode>,
    pub entry: usize,
}

pub fn minimize(automaton: &Automaton) -> Minimized {
    let mut minimizer = Minimizer {
        automaton,
        nodes: Vec::new(),
        visited: HashMap::new(),
        interned: HashMap::new(),
    };
    let entry = minimizer.node(automaton.entry);
    tracing::debug!(
        before = automaton.nodes.len(),
        after = minimizer.nodes.len(),
        "minimized decision automaton"
    );
    Minimized {
        nodes: minimizer.nodes,
        entry,
    }
}

struct Minimizer<'automaton> {
    automaton: &'automaton Automaton,
    nodes: Vec<MinNode>,
    visited: HashMap<NodeId, usize>,
    interned: HashMap<MinAction, usize>,
}

impl Minimizer<'_> {
    fn node(&mut self, id: NodeId) -> usize {
        if let Some(&index) = self.visited.get(&id) {
            self.nodes[index].shared = true;
            return index;
        }

        let action = self.automaton.nodes[id]
            .action
            .clone()
            .expect("automaton node with its action computed");
        let action = match action {
            Action::Fail => MinAction::Fail,
            Action::Success { arm, otherwise } => MinAction::Success {
                arm,
                otherwise: otherwise.map(|otherwise| self.node(otherwise)),
            },
            Action::Fetch { fetch, next } => MinAction::Fetch {
                fetch,
                next: self.node(next),
            },
            Action::Test {
                test,
                if_true,
                if_false,
            } => {
                let if_true = self.node(if_true);
                let if_false = self.node(if_false);
                MinAction::Test {
                    test,
                    if_true,
                    if_false,
                }
            }
        };

        let index = match self.interned.get(&action) {
            Some(&index) => {
                self.nodes[index].shared = true;
                index
            }
            None => {
                let index = self.nodes.len();
                self.nodes.push(MinNode {
                    action: action.clone(),
                    shared: false,
                });
                _ = self.interned.insert(action, index);
                index
            }
        };
        _ = self.visited.insert(id, index);
        index
    }
}
