//! Depth resolution for affiliate trees.
//!
//! The backend hands out a flat node list where every node points at its
//! parent by wallet id. Levels are never stored: the root sits on level 1 and
//! every other node one level below its parent.

use crate::{api::AffiliateNode, prelude::*};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeLevels {
  levels: HashMap<i64, u32>,
  orphans: Vec<i64>,
}

impl TreeLevels {
  pub fn level(&self, wallet_id: i64) -> Option<u32> {
    self.levels.get(&wallet_id).copied()
  }

  /// Wallets grouped by level, each group sorted by wallet id.
  pub fn by_level(&self) -> BTreeMap<u32, Vec<i64>> {
    let mut grouped: BTreeMap<u32, Vec<i64>> = BTreeMap::new();
    for (&wallet, &level) in &self.levels {
      grouped.entry(level).or_default().push(wallet);
    }
    for wallets in grouped.values_mut() {
      wallets.sort_unstable();
    }
    grouped
  }

  pub fn depth(&self) -> u32 {
    self.levels.values().copied().max().unwrap_or(0)
  }

  /// Wallets whose parent was missing from the node list. They are placed on
  /// level 1.
  pub fn orphans(&self) -> &[i64] {
    &self.orphans
  }

  pub fn len(&self) -> usize {
    self.levels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.levels.is_empty()
  }
}

/// Assigns a level to every node of one tree.
///
/// Parent lookups go through a `wallet_id` index built once, and resolved
/// levels are memoized, so each node is walked at most once per call. A node
/// whose parent is absent from `nodes` is treated as a root. Cyclic parent
/// links fail with [`Error::CycleDetected`].
pub fn resolve_levels(nodes: &[AffiliateNode]) -> Result<TreeLevels> {
  let index: HashMap<i64, &AffiliateNode> =
    nodes.iter().map(|node| (node.wallet_id, node)).collect();

  let mut levels: HashMap<i64, u32> = HashMap::with_capacity(index.len());
  let mut orphans = Vec::new();
  let mut path = Vec::new();
  let mut on_path = HashSet::new();

  for node in nodes {
    if levels.contains_key(&node.wallet_id) {
      continue;
    }

    path.clear();
    on_path.clear();
    let mut current = node;

    // level of the first already-resolved ancestor, 0 above a root
    let base = loop {
      if let Some(&level) = levels.get(&current.wallet_id) {
        break level;
      }
      if !on_path.insert(current.wallet_id) {
        return Err(Error::CycleDetected(current.wallet_id));
      }
      path.push(current.wallet_id);

      let Some(parent_id) = current.parent_wallet_id else {
        break 0;
      };
      match index.get(&parent_id) {
        Some(parent) => current = *parent,
        None => {
          warn!(
            "wallet {} references missing parent {}, placing it on level 1",
            current.wallet_id, parent_id
          );
          orphans.push(current.wallet_id);
          break 0;
        }
      }
    };

    for (offset, wallet) in path.iter().rev().enumerate() {
      levels.insert(*wallet, base + offset as u32 + 1);
    }
  }

  orphans.sort_unstable();
  Ok(TreeLevels { levels, orphans })
}
