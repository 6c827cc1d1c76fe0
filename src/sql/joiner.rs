use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Alias-keyed binding of items, the unit the join produces and
/// expressions are evaluated against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple {
    entries: HashMap<String, Value>,
}

impl Tuple {
    pub fn new() -> Self {
        Tuple {
            entries: HashMap::new(),
        }
    }

    pub fn bind(&mut self, alias: impl Into<String>, value: Value) {
        self.entries.insert(alias.into(), value);
    }

    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.entries.get(alias)
    }

    /// Overlay another tuple; its entries win on alias collisions.
    fn absorb(&mut self, other: &Tuple) {
        for (alias, value) in &other.entries {
            self.entries.insert(alias.clone(), value.clone());
        }
    }

    /// Make an outer (correlated) binding visible underneath this one:
    /// aliases already bound here keep their value, so the inner FROM
    /// clause shadows the outer query.
    pub fn merge_under(&mut self, outer: &Tuple) {
        for (alias, value) in &outer.entries {
            self.entries
                .entry(alias.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

/// Restartable tuple source.
///
/// `has_next` is idempotent and side-effect free. `next_tuple` may only
/// be called after `has_next` returned true at least once for the first
/// element; when the source is exhausted it wraps around and yields the
/// first element again, which is what lets an inner join loop restart
/// its fast-varying children.
pub trait TupleIter {
    fn has_next(&self) -> bool;
    fn next_tuple(&mut self) -> Tuple;
}

/// Iterates one resource list, binding each item under a fixed alias.
pub struct ListIter {
    alias: String,
    items: Arc<Vec<Value>>,
    idx: usize,
}

impl ListIter {
    pub fn new(alias: impl Into<String>, items: Arc<Vec<Value>>) -> Self {
        ListIter {
            alias: alias.into(),
            items,
            idx: 0,
        }
    }
}

impl TupleIter for ListIter {
    fn has_next(&self) -> bool {
        self.idx < self.items.len()
    }

    fn next_tuple(&mut self) -> Tuple {
        if self.idx == self.items.len() {
            self.idx = 0;
        }

        let mut tuple = Tuple::new();
        tuple.bind(self.alias.clone(), self.items[self.idx].clone());
        self.idx += 1;

        tuple
    }
}

/// Nested-loop product over the children, in FROM order: the first
/// child is the outermost loop (slowest varying), the last varies
/// fastest. A child that runs out is restarted and the one before it
/// advances; the join is drained when no child can advance.
///
/// The join moves through three states: uninitialized (`current` unset),
/// running, and drained (`has_next` false). It neither filters nor
/// deduplicates.
pub struct InnerJoin {
    children: Vec<ListIter>,
    current: Option<Vec<Tuple>>,
}

impl InnerJoin {
    pub fn new(children: Vec<ListIter>) -> Self {
        InnerJoin {
            children,
            current: None,
        }
    }
}

impl TupleIter for InnerJoin {
    fn has_next(&self) -> bool {
        match &self.current {
            // before the first element: every child must have one, or
            // the product is empty
            None => !self.children.is_empty() && self.children.iter().all(|c| c.has_next()),
            Some(_) => self.children.iter().any(|c| c.has_next()),
        }
    }

    fn next_tuple(&mut self) -> Tuple {
        match &mut self.current {
            None => {
                let first: Vec<Tuple> = self
                    .children
                    .iter_mut()
                    .map(|child| child.next_tuple())
                    .collect();
                self.current = Some(first);
            }
            Some(current) => {
                for idx in (0..self.children.len()).rev() {
                    let advanced = self.children[idx].has_next();
                    current[idx] = self.children[idx].next_tuple();
                    if advanced {
                        break;
                    }
                    // this child wrapped around; carry into the next
                    // slower one
                }
            }
        }

        let mut tuple = Tuple::new();
        if let Some(current) = &self.current {
            for part in current {
                tuple.absorb(part);
            }
        }
        tuple
    }
}

impl Iterator for InnerJoin {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        if self.has_next() {
            Some(self.next_tuple())
        } else {
            None
        }
    }
}
