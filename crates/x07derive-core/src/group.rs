//! Recursion and grouping: strongly connected components of the reference
//! graph, emitted dependencies-first in a deterministic order.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::shape::DeriveRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationGroup {
    /// Member names in declaration order.
    pub members: Vec<String>,
    /// More than one member, or a member that refers to itself.
    pub recursive: bool,
}

impl DerivationGroup {
    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

/// Groups every definition of `req`.
///
/// Guarantees: a definition only refers to definitions of its own or an earlier
/// group; groups are strongly connected components; among groups whose
/// dependencies are all emitted, the one holding the earliest-declared member
/// goes first.
pub fn resolve_groups(req: &DeriveRequest) -> Vec<DerivationGroup> {
    let defs = req.defs();
    let edges: Vec<Vec<usize>> = defs.iter().map(|d| req.dependencies(d)).collect();

    let comps = Tarjan::run(&edges);

    let mut comp_of = vec![0usize; defs.len()];
    for (ci, comp) in comps.iter().enumerate() {
        for &v in comp {
            comp_of[v] = ci;
        }
    }

    // comp -> comps it depends on (excluding itself)
    let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); comps.len()];
    let mut users: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); comps.len()];
    for (v, outs) in edges.iter().enumerate() {
        for &w in outs {
            let (cv, cw) = (comp_of[v], comp_of[w]);
            if cv != cw {
                deps[cv].insert(cw);
                users[cw].insert(cv);
            }
        }
    }

    // Kahn's algorithm keyed by the earliest declaration index of each component.
    let first_decl: Vec<usize> = comps
        .iter()
        .map(|c| c.iter().copied().min().unwrap_or(usize::MAX))
        .collect();
    let mut pending: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeMap<usize, usize> = BTreeMap::new();
    for (ci, n) in pending.iter().enumerate() {
        if *n == 0 {
            ready.insert(first_decl[ci], ci);
        }
    }

    let mut out = Vec::with_capacity(comps.len());
    while let Some((_, ci)) = ready.pop_first() {
        let mut members = comps[ci].clone();
        members.sort_unstable();
        let recursive = members.len() > 1 || edges[members[0]].contains(&members[0]);
        out.push(DerivationGroup {
            members: members.iter().map(|&i| defs[i].name().to_string()).collect(),
            recursive,
        });
        for &user in &users[ci] {
            pending[user] -= 1;
            if pending[user] == 0 {
                ready.insert(first_decl[user], user);
            }
        }
    }
    out
}

struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    comps: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn run(edges: &'a [Vec<usize>]) -> Vec<Vec<usize>> {
        let n = edges.len();
        let mut t = Tarjan {
            edges,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next: 0,
            comps: Vec::new(),
        };
        for v in 0..n {
            if t.index[v].is_none() {
                t.visit(v);
            }
        }
        t.comps
    }

    fn visit(&mut self, v: usize) {
        self.index[v] = Some(self.next);
        self.lowlink[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for &w in &self.edges[v] {
            match self.index[w] {
                None => {
                    self.visit(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(iw) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(iw);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.index[v] {
            let mut comp = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                comp.push(w);
                if w == v {
                    break;
                }
            }
            self.comps.push(comp);
        }
    }
}
