use std::time::Instant;

use serde::Serialize;

use crate::{
  api::{AffiliateNode, AffiliateTreeSummary, Backend},
  prelude::*,
  sv::tree::{self, TreeLevels},
};

/// A node together with its derived level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeveledNode {
  #[serde(flatten)]
  pub node: AffiliateNode,
  pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeView {
  pub root_id: i64,
  pub name: Option<String>,
  pub depth: u32,
  /// Wallets whose parent is missing from the tree, shown on level 1.
  pub orphans: Vec<i64>,
  /// Member count per level.
  pub level_sizes: BTreeMap<u32, usize>,
  pub nodes: Vec<LeveledNode>,
}

impl TreeView {
  fn build(
    root_id: i64,
    name: Option<String>,
    nodes: Vec<AffiliateNode>,
  ) -> Result<Self> {
    let levels: TreeLevels = tree::resolve_levels(&nodes)?;
    let level_sizes = levels
      .by_level()
      .into_iter()
      .map(|(level, wallets)| (level, wallets.len()))
      .collect();

    let mut nodes: Vec<LeveledNode> = nodes
      .into_iter()
      .map(|node| {
        let level = levels.level(node.wallet_id).unwrap_or(1);
        LeveledNode { node, level }
      })
      .collect();
    nodes.sort_by_key(|n| (n.level, n.node.wallet_id));

    Ok(Self {
      root_id,
      name,
      depth: levels.depth(),
      orphans: levels.orphans().to_vec(),
      level_sizes,
      nodes,
    })
  }

  pub fn at_level(&self, level: u32) -> Vec<LeveledNode> {
    self.nodes.iter().filter(|n| n.level == level).cloned().collect()
  }
}

/// Resolved trees keyed by root id. Nodes only change through the backend, so
/// entries simply expire after the configured TTL.
pub struct TreeCache {
  ttl: Duration,
  trees: DashMap<i64, (Instant, Arc<TreeView>)>,
}

impl TreeCache {
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, trees: DashMap::new() }
  }

  fn get(&self, root_id: i64) -> Option<Arc<TreeView>> {
    let entry = self.trees.get(&root_id)?;
    let (fetched_at, view) = entry.value();
    (fetched_at.elapsed() < self.ttl).then(|| view.clone())
  }

  fn insert(&self, view: Arc<TreeView>) {
    self.trees.insert(view.root_id, (Instant::now(), view));
  }

  pub fn gc(&self) {
    self.trees.retain(|_, (fetched_at, _)| fetched_at.elapsed() < self.ttl);
  }
}

pub struct Affiliate<'a> {
  backend: &'a dyn Backend,
  cache: &'a TreeCache,
}

impl<'a> Affiliate<'a> {
  pub fn new(backend: &'a dyn Backend, cache: &'a TreeCache) -> Self {
    Self { backend, cache }
  }

  pub async fn trees(&self) -> Result<Vec<AffiliateTreeSummary>> {
    self.backend.list_affiliate_trees().await
  }

  pub async fn tree(&self, root_id: i64) -> Result<Arc<TreeView>> {
    if let Some(view) = self.cache.get(root_id) {
      return Ok(view);
    }

    let detail =
      self.backend.fetch_affiliate_tree_detail(root_id).await.map_err(
        |e| match e {
          Error::Api(msg) if msg.starts_with("404") => {
            Error::TreeNotFound(root_id)
          }
          other => other,
        },
      )?;

    let view = Arc::new(TreeView::build(root_id, detail.name, detail.nodes)?);
    if !view.orphans.is_empty() {
      warn!(
        "tree {} has {} node(s) with missing parents",
        root_id,
        view.orphans.len()
      );
    }
    debug!(
      "tree {} resolved: {} nodes, depth {}",
      root_id,
      view.nodes.len(),
      view.depth
    );

    self.cache.insert(view.clone());
    Ok(view)
  }

  pub async fn members_at(
    &self,
    root_id: i64,
    level: u32,
  ) -> Result<Vec<LeveledNode>> {
    if level == 0 {
      return Err(Error::InvalidArgs("Levels start at 1".into()));
    }
    Ok(self.tree(root_id).await?.at_level(level))
  }
}
