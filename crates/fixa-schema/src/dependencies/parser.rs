//! Table dependency graph built from foreign keys

use fixa_core::{FixaError, Result, SchemaIntrospection};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet, VecDeque};
use unicase::UniCase;

type TableKey = UniCase<String>;

fn key(name: &str) -> TableKey {
    UniCase::new(name.to_string())
}

/// A table and its direct foreign-key neighbours
#[derive(Debug, Clone, Default)]
pub struct TableNode {
    /// Tables this table references
    parents: IndexSet<TableKey>,
    /// Tables referencing this table
    children: IndexSet<TableKey>,
}

impl TableNode {
    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.parents.iter().map(|p| p.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.as_str())
    }

    /// No parents, or only itself as a parent
    fn is_root(&self, own: &TableKey) -> bool {
        self.parents.iter().all(|p| p == own)
    }
}

/// Parent/child graph of the tables in a schema.
///
/// Only tables that take part in at least one foreign key are registered;
/// callers treat unknown tables as roots.
#[derive(Debug, Clone, Default)]
pub struct DependencyParser {
    nodes: IndexMap<TableKey, TableNode>,
}

impl DependencyParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the graph from every table's imported foreign keys
    #[tracing::instrument(skip(self, meta))]
    pub async fn parse(&mut self, meta: &dyn SchemaIntrospection, schema: &str) -> Result<()> {
        self.nodes.clear();
        let schema = meta.normalize_identifier(schema);
        let schema = (!schema.is_empty()).then_some(schema.as_str());

        let tables = meta.list_tables(schema).await?;
        for table in &tables {
            let foreign_keys = meta
                .get_foreign_keys(schema, &table.name)
                .await
                .map_err(|e| FixaError::metadata(&table.name, "can't get imported keys.", e))?;
            for fk in foreign_keys {
                self.associate(&fk.referenced_table, &table.name);
            }
        }

        tracing::debug!(
            tables = tables.len(),
            related = self.nodes.len(),
            "dependency graph parsed"
        );
        Ok(())
    }

    /// Record that `child` references `parent`
    pub fn associate(&mut self, parent: &str, child: &str) {
        let parent_key = key(parent);
        let child_key = key(child);
        self.nodes
            .entry(parent_key.clone())
            .or_default()
            .children
            .insert(child_key.clone());
        self.nodes
            .entry(child_key)
            .or_default()
            .parents
            .insert(parent_key);
    }

    pub fn node(&self, table: &str) -> Option<&TableNode> {
        self.nodes.get(&key(table))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every registered table, roots first and most dependent last.
    ///
    /// Tables of equal depth keep registration order.
    pub fn table_list(&self) -> Result<Vec<String>> {
        let ranks = self.ranks()?;
        let mut tables: Vec<(String, usize)> = ranks.into_iter().collect();
        tables.sort_by_key(|(_, depth)| *depth);
        Ok(tables.into_iter().map(|(name, _)| name).collect())
    }

    /// Depth of every registered table below the roots.
    ///
    /// A table's depth is the longest foreign-key path leading to it from a
    /// root, so every parent ranks strictly above its children. Self
    /// references are ignored. Fails when tables exist but none is a root.
    pub fn ranks(&self) -> Result<IndexMap<String, usize>> {
        if self.nodes.is_empty() {
            return Ok(IndexMap::new());
        }

        let roots: Vec<&TableKey> = self
            .nodes
            .iter()
            .filter(|(name, node)| node.is_root(name))
            .map(|(name, _)| name)
            .collect();
        if roots.is_empty() {
            let names: Vec<&str> = self.nodes.keys().map(|k| k.as_str()).collect();
            return Err(FixaError::Cycle(format!(
                "no root table found; foreign keys between [{}] reference each other",
                names.join(", ")
            )));
        }

        // Kahn's algorithm, relaxing the depth of each child as its parents finish
        let mut pending: HashMap<&TableKey, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name, node.parents.iter().filter(|p| *p != name).count()))
            .collect();
        let mut depth: HashMap<&TableKey, usize> = roots.iter().map(|r| (*r, 0)).collect();
        let mut queue: VecDeque<&TableKey> = roots.into_iter().collect();

        while let Some(current) = queue.pop_front() {
            let current_depth = depth.get(current).copied().unwrap_or(0);
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for child in node.children.iter().filter(|c| *c != current) {
                let child_depth = depth.entry(child).or_insert(0);
                *child_depth = (*child_depth).max(current_depth + 1);
                if let Some(remaining) = pending.get_mut(child) {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }

        if pending.values().any(|remaining| *remaining > 0) {
            self.rank_cycle_members(&pending, &mut depth);
        }

        Ok(self
            .nodes
            .keys()
            .map(|name| (name.to_string(), depth.get(name).copied().unwrap_or(0)))
            .collect())
    }

    /// Rank the tables Kahn's pass left behind: cycles and everything
    /// below them.
    ///
    /// A table is ranked once all of its parents are, one level below the
    /// deepest. When no table qualifies, a cycle is entered at a member
    /// whose unranked parents all lie on that same cycle, using only its
    /// ranked parents.
    fn rank_cycle_members<'a>(
        &'a self,
        pending: &HashMap<&'a TableKey, usize>,
        depth: &mut HashMap<&'a TableKey, usize>,
    ) {
        let mut unresolved: IndexSet<&TableKey> = self
            .nodes
            .keys()
            .filter(|name| pending.get(name).copied().unwrap_or(0) > 0)
            .collect();
        tracing::warn!(
            tables = ?unresolved.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            "foreign keys form a cycle below a root table"
        );

        while !unresolved.is_empty() {
            let ready: Vec<&TableKey> = unresolved
                .iter()
                .copied()
                .filter(|name| self.unranked_parents(name, &unresolved).is_empty())
                .collect();
            let next = if ready.is_empty() {
                let entry = unresolved.iter().copied().find(|name| {
                    self.unranked_parents(name, &unresolved)
                        .into_iter()
                        .all(|parent| self.reaches(name, parent, &unresolved))
                });
                match entry {
                    Some(entry) => vec![entry],
                    None => break,
                }
            } else {
                ready
            };

            for name in next {
                let ranked = self
                    .nodes
                    .get(name)
                    .and_then(|node| {
                        node.parents
                            .iter()
                            .filter(|p| *p != name && !unresolved.contains(*p))
                            .filter_map(|p| depth.get(p))
                            .map(|d| d + 1)
                            .max()
                    })
                    .unwrap_or(0);
                depth.insert(name, ranked);
                unresolved.shift_remove(name);
            }
        }
    }

    /// Parents of `table`, other than itself, still waiting for a rank
    fn unranked_parents<'a>(
        &'a self,
        table: &TableKey,
        unresolved: &IndexSet<&'a TableKey>,
    ) -> Vec<&'a TableKey> {
        self.nodes
            .get(table)
            .map(|node| {
                node.parents
                    .iter()
                    .filter(|p| *p != table && unresolved.contains(*p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `target` is a descendant of `from` through unranked tables
    fn reaches(&self, from: &TableKey, target: &TableKey, unresolved: &IndexSet<&TableKey>) -> bool {
        let mut seen: HashSet<&TableKey> = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for child in &node.children {
                if child == target {
                    return true;
                }
                if unresolved.contains(child) && seen.insert(child) {
                    stack.push(child);
                }
            }
        }
        false
    }
}
