//! NUMA-aware CPU pinning support.
//!
//! Parses `numactl --show` and `numactl --hardware` the way the original
//! Python `NumaCtl` does: line-prefix matching, no regex. `take` drains
//! CPU ids from a single NUMA node when that node has enough free CPUs,
//! else falls back to draining nodes in enumeration order. Taken CPUs are
//! consumed — callers that `take` twice never see the same id twice.
//!
//! Not thread-safe; the engine is single-threaded by design (spec.md §5),
//! so no synchronization is provided here.

use infra_errors::{Error, Result};

/// CPU-id pool discovered from the host's NUMA control utility.
#[derive(Debug, Default, Clone)]
pub struct NumaCtl {
    /// NUMA-node id -> free CPU ids on that node, in discovery order.
    by_node: Vec<(u32, Vec<u32>)>,
}

impl NumaCtl {
    /// Parses `numactl --show` (for the bound node list) and
    /// `numactl --hardware` (for the per-node CPU lists) into a `NumaCtl`.
    /// Returns `Error::Internal` if the output cannot be parsed.
    pub fn discover() -> Result<Self> {
        let show = infra_cmd::run("numactl --show")?;
        let hardware = infra_cmd::run("numactl --hardware")?;
        Self::parse(&show, &hardware)
    }

    /// True iff `numactl` is present on `PATH`. The orchestrator only
    /// attempts NUMA pinning when this holds (spec.md §3 invariants).
    pub fn available() -> bool {
        infra_cmd::which("numactl").is_ok()
    }

    fn parse(show: &str, hardware: &str) -> Result<Self> {
        let mut node_ids: Vec<u32> = Vec::new();
        for line in show.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("nodebind:") {
                node_ids = rest
                    .split_whitespace()
                    .map(|x| x.parse::<u32>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| Error::Internal(format!("corrupt numactl --show output: {e}")))?;
            }
        }

        if node_ids.is_empty() {
            return Err(Error::Internal(
                "numactl --show produced no nodebind line".to_string(),
            ));
        }

        let mut by_node = Vec::with_capacity(node_ids.len());
        for node in node_ids {
            let prefix = format!("node {node} cpus:");
            let cpus = hardware
                .lines()
                .map(str::trim)
                .find_map(|line| line.strip_prefix(prefix.as_str()))
                .map(|rest| {
                    rest.split_whitespace()
                        .map(|x| x.parse::<u32>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                })
                .transpose()
                .map_err(|e| Error::Internal(format!("corrupt numactl --hardware output: {e}")))?
                .unwrap_or_default();
            by_node.push((node, cpus));
        }

        Ok(Self { by_node })
    }

    /// Returns up to `n` CPU ids, preferring a single NUMA node whose free
    /// list already has `n` or more entries; otherwise drains nodes in
    /// enumeration order until `n` ids have been collected or the pool is
    /// exhausted. Matches the original's `list.pop()` (LIFO) order.
    pub fn take(&mut self, n: usize) -> Vec<u32> {
        if let Some((_, cpus)) = self.by_node.iter_mut().find(|(_, cpus)| cpus.len() >= n) {
            return (0..n).filter_map(|_| cpus.pop()).collect();
        }

        let mut taken = Vec::with_capacity(n);
        'outer: for (_, cpus) in self.by_node.iter_mut() {
            while let Some(cpu) = cpus.pop() {
                taken.push(cpu);
                if taken.len() == n {
                    break 'outer;
                }
            }
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW: &str = "policy: default\nphyscpubind: 0 1 2 3 4 5 6 7\ncpubind: 0 1\nnodebind: 0 1\nmembind: 0 1\n";
    const HARDWARE: &str = "available: 2 nodes (0-1)\nnode 0 cpus: 0 1 2 3\nnode 0 size: 16000 MB\nnode 1 cpus: 4 5 6 7\nnode 1 size: 16000 MB\n";

    #[test]
    fn parses_node_cpu_lists() {
        let numa = NumaCtl::parse(SHOW, HARDWARE).unwrap();
        assert_eq!(numa.by_node.len(), 2);
        assert_eq!(numa.by_node[0], (0, vec![0, 1, 2, 3]));
        assert_eq!(numa.by_node[1], (1, vec![4, 5, 6, 7]));
    }

    #[test]
    fn take_prefers_single_node_when_sufficient() {
        let mut numa = NumaCtl::parse(SHOW, HARDWARE).unwrap();
        let taken = numa.take(2);
        // LIFO pop from node 0's list [0,1,2,3] -> 3, 2
        assert_eq!(taken, vec![3, 2]);
    }

    #[test]
    fn take_drains_across_nodes_when_no_single_node_suffices() {
        let mut numa = NumaCtl::parse(SHOW, HARDWARE).unwrap();
        let taken = numa.take(6);
        assert_eq!(taken.len(), 6);
        // node 0 drained fully (3,2,1,0), then node 1 (7,6)
        assert_eq!(taken, vec![3, 2, 1, 0, 7, 6]);
    }

    #[test]
    fn take_caps_at_total_available() {
        let mut numa = NumaCtl::parse(SHOW, HARDWARE).unwrap();
        let taken = numa.take(100);
        assert_eq!(taken.len(), 8);
    }

    #[test]
    fn parse_rejects_missing_nodebind() {
        let err = NumaCtl::parse("policy: default\n", HARDWARE).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
