use std::collections::BTreeMap;

/// Disjoint set union over `0..n` with path compression and union by size
#[derive(Clone, Debug)]
pub struct Dsu {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl Dsu {
    #[inline]
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), size: vec![1; n] }
    }

    #[inline]
    pub fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while root != self.parent[root] {
            root = self.parent[root];
        }
        while x != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    #[inline]
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }

    /// Components with more than one member, each ascending, ordered by smallest member
    pub fn groups(mut self) -> Vec<Vec<usize>> {
        let mut buckets: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            buckets.entry(root).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> = buckets.into_values().filter(|g| g.len() > 1).collect();
        groups.sort_by_key(|g| g[0]);
        groups
    }
}

/// Directed acyclic graph over vertex indices `0..n`
#[derive(Clone, Debug)]
pub struct Dag {
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl Dag {
    pub fn new(n: usize) -> Self {
        Dag { successors: vec![Vec::new(); n], in_degree: vec![0; n] }
    }

    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.successors[from].push(to);
        self.in_degree[to] += 1;
    }

    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Weakly connected components containing at least one edge
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut dsu = Dsu::new(self.successors.len());
        for (from, targets) in self.successors.iter().enumerate() {
            for &to in targets {
                dsu.union(from, to);
            }
        }
        dsu.groups()
    }

    /// All root to leaf paths within a component, at most `limit` of them
    ///
    /// Roots have no incoming edge and leaves no outgoing edge. Edges must point from lower to
    /// higher vertex index so the traversal terminates.
    pub fn root_leaf_paths(&self, component: &[usize], limit: usize) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        for &root in component.iter().filter(|&&v| self.in_degree[v] == 0) {
            let mut stack = vec![root];
            self.walk(&mut stack, &mut paths, limit);
            if paths.len() >= limit {
                break;
            }
        }
        paths
    }

    fn walk(&self, stack: &mut Vec<usize>, paths: &mut Vec<Vec<usize>>, limit: usize) {
        if paths.len() >= limit {
            return;
        }
        let Some(&current) = stack.last() else { return };
        let next = &self.successors[current];
        if next.is_empty() {
            paths.push(stack.clone());
            return;
        }
        for &vertex in next {
            stack.push(vertex);
            self.walk(stack, paths, limit);
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsu_groups() {
        let mut dsu = Dsu::new(6);
        assert!(dsu.union(0, 2));
        assert!(dsu.union(2, 4));
        assert!(!dsu.union(0, 4));
        assert!(dsu.union(3, 5));
        assert_eq!(dsu.groups(), vec![vec![0, 2, 4], vec![3, 5]]);
    }

    #[test]
    fn test_root_leaf_paths() {
        let mut dag = Dag::new(5);
        dag.add_edge(0, 1);
        dag.add_edge(1, 2);
        dag.add_edge(0, 3);
        dag.add_edge(3, 2);
        let components = dag.components();
        assert_eq!(components, vec![vec![0, 1, 2, 3]]);
        let paths = dag.root_leaf_paths(&components[0], 50);
        assert_eq!(paths, vec![vec![0, 1, 2], vec![0, 3, 2]]);
        assert_eq!(dag.root_leaf_paths(&components[0], 1).len(), 1);
        assert_eq!(dag.edge_count(), 4);
    }
}
