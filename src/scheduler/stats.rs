//! Per-group and grouped statistics (component M): today's three-queue
//! counts broken down by group, plus a synthesized tree that rolls child
//! groups' counts up into their `::`-named ancestors. Grounded in the
//! teacher's `GroupByInsertion` helper, reused here to keep the tree in
//! first-seen order rather than alphabetical.

use crate::model::GroupId;
use crate::store::Store;
use crate::Error;
use indexmap::IndexMap;
use std::collections::HashMap;

use super::{QueueCounts, Scheduler};

/// One row of `group_count_tree`: `group_id` is `None` for a synthesized
/// parent that has no group of its own (e.g. `"a"` when only `"a::b"`
/// exists), and counts are the sum over the node itself and every
/// descendant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupCount {
    pub group_id: Option<GroupId>,
    pub name: String,
    pub new: u32,
    pub learn: u32,
    pub review: u32,
}

impl<S: Store> Scheduler<S> {
    /// `(new, learn, review)` counts for each group, not including
    /// subgroups.
    pub fn group_counts(&self) -> Result<Vec<(GroupId, QueueCounts)>, Error> {
        let groups = self.store.groups()?;
        let mut out = Vec::with_capacity(groups.len());
        for g in groups {
            out.push((g.id, self.counts_for(&[g.id])?));
        }
        Ok(out)
    }

    /// Flattened tree: every group's counts, plus a synthesized row for
    /// every `::`-prefix of any group name, each row summing its own
    /// group's counts (if one exists) and all of its descendants'.
    pub fn group_count_tree(&self) -> Result<Vec<GroupCount>, Error> {
        let groups = self.store.groups()?;
        let mut by_name: IndexMap<String, (u32, u32, u32)> = IndexMap::new();
        for g in &groups {
            let counts = self.counts_for(&[g.id])?;
            let mut prefix = String::new();
            for (i, part) in g.name.split("::").enumerate() {
                if i > 0 {
                    prefix.push_str("::");
                }
                prefix.push_str(part);
                let entry = by_name.entry(prefix.clone()).or_insert((0, 0, 0));
                entry.0 += counts.0;
                entry.1 += counts.1;
                entry.2 += counts.2;
            }
        }
        let name_to_id: HashMap<&str, GroupId> =
            groups.iter().map(|g| (g.name.as_str(), g.id)).collect();
        Ok(by_name
            .into_iter()
            .map(|(name, (new, learn, review))| GroupCount {
                group_id: name_to_id.get(name.as_str()).copied(),
                name,
                new,
                learn,
                review,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigResolver, Configuration};
    use crate::model::{Card, Group};
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn scheduler() -> Scheduler<InMemoryStore> {
        let store = InMemoryStore::new(ConfigResolver::new(Configuration::default()));
        Scheduler::new(store, Utc::now(), vec![])
    }

    #[test]
    fn tree_rolls_child_counts_up_into_synthesized_parents_matching_scenario_8() {
        let mut sched = scheduler();
        sched.store_mut().insert_group(Group {
            id: 1,
            name: "lang::spanish".to_string(),
        });
        sched.store_mut().insert_group(Group {
            id: 2,
            name: "lang::french".to_string(),
        });
        sched
            .store_mut()
            .insert_card(Card::new_new(1, 1, 1, 0, 0));
        sched
            .store_mut()
            .insert_card(Card::new_new(2, 2, 2, 0, 0));

        let tree = sched.group_count_tree().unwrap();
        let lang = tree.iter().find(|g| g.name == "lang").unwrap();
        assert_eq!(lang.group_id, None);
        assert_eq!(lang.new, 2);

        let spanish = tree.iter().find(|g| g.name == "lang::spanish").unwrap();
        assert_eq!(spanish.group_id, Some(1));
        assert_eq!(spanish.new, 1);
    }
}
