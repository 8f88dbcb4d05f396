//! Include cycle reporting.
//!
//! Cycles are legal (two headers may include each other behind guards) and
//! never block planning. They are surfaced in the plan summary so users can
//! spot them.

use petgraph::algo::tarjan_scc;

use super::DependencyGraph;

impl DependencyGraph {
    /// Find every include cycle currently present.
    ///
    /// Each entry is the sorted list of file ids in one strongly connected
    /// component with more than one member. Self-edges are never stored, so
    /// single-node components are never cycles.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(self.inner())
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut ids: Vec<String> = component
                    .into_iter()
                    .map(|idx| self.id(idx).to_string())
                    .collect();
                ids.sort_unstable();
                ids
            })
            .collect();

        cycles.sort_unstable();
        cycles
    }
}
