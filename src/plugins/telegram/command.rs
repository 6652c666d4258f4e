use std::sync::Arc;

use teloxide::{
  prelude::*,
  utils::{command::BotCommands, html},
};

use super::ReplyBot;
use crate::{
  api::{AffiliateTreeSummary, WithdrawalStatus},
  entity::audit_log,
  prelude::*,
  state::AppState,
  sv::{
    affiliate::{LeveledNode, TreeView},
    analytics::Snapshot,
    dashboard::Overview,
    referral::{Outcome, ReferralOverview},
  },
  utils::{self, format_percent},
};

const AUDIT_ENTRIES: u64 = 15;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Admin commands:")]
pub enum Command {
  #[command(description = "show this message")]
  Help,
  #[command(description = "referral reward levels")]
  Levels,
  #[command(description = "set a level percentage: /setlevel <level> <percent>")]
  SetLevel(String),
  #[command(description = "show or set the max level: /maxlevel [n]")]
  MaxLevel(String),
  #[command(description = "affiliate trees: /tree [root_id] [level]")]
  Tree(String),
  #[command(description = "platform overview")]
  Overview,
  #[command(description = "approve a withdrawal: /approve <id>")]
  Approve(String),
  #[command(description = "reject a withdrawal: /reject <id>")]
  Reject(String),
  #[command(description = "latest analytics snapshot")]
  Analytics,
  #[command(description = "recent admin actions")]
  Audit,
}

pub async fn handle(
  app: Arc<AppState>,
  bot: ReplyBot,
  cmd: Command,
) -> ResponseResult<()> {
  if !app.is_admin(bot.user_id) {
    debug!("ignoring {:?} from non-admin {}", cmd, bot.user_id);
    bot.reply_html("⛔ This bot is for administrators only.").await?;
    return Ok(());
  }

  let text = match run(&app, &bot, cmd).await {
    Ok(text) => text,
    Err(e) => {
      if !e.is_validation() {
        warn!("command from {} failed: {}", bot.user_id, e);
      }
      format!("❌ {}", html::escape(&e.user_message()))
    }
  };

  bot.reply_html_chunked(text).await?;
  Ok(())
}

async fn run(app: &AppState, bot: &ReplyBot, cmd: Command) -> Result<String> {
  let sv = app.sv();
  let actor = bot.actor();

  let text = match cmd {
    Command::Help => html::escape(&Command::descriptions().to_string()),
    Command::Levels => render_levels(&sv.referral.overview().await?),
    Command::SetLevel(args) => {
      let (level, percentage) = parse_set_level(&args)?;
      match sv
        .referral
        .set_level_percentage(&actor, level, percentage)
        .await?
      {
        Outcome::Unchanged(row) => format!(
          "ℹ️ Level {} already pays <b>{}</b>, nothing changed.",
          level,
          format_percent(row.percentage)
        ),
        Outcome::Updated(row) => format!(
          "✅ Level {} now pays <b>{}</b>.",
          level,
          format_percent(row.percentage)
        ),
      }
    }
    Command::MaxLevel(args) => match parse_max_level(&args)? {
      None => {
        let settings = sv.referral.settings().await?;
        format!("🔢 Max level: <b>{}</b>", settings.max_level)
      }
      Some(max_level) => {
        match sv.referral.set_max_level(&actor, max_level).await? {
          Outcome::Unchanged(settings) => format!(
            "ℹ️ Max level is already <b>{}</b>, nothing changed.",
            settings.max_level
          ),
          Outcome::Updated(settings) => {
            format!("✅ Max level set to <b>{}</b>.", settings.max_level)
          }
        }
      }
    },
    Command::Tree(args) => match parse_tree(&args)? {
      None => render_trees(&sv.affiliate.trees().await?),
      Some((root_id, None)) => {
        let view = sv.affiliate.tree(root_id).await?;
        render_tree(&view)
      }
      Some((root_id, Some(level))) => render_members(
        root_id,
        level,
        &sv.affiliate.members_at(root_id, level).await?,
      ),
    },
    Command::Overview => render_overview(&sv.dashboard.overview().await?),
    Command::Approve(args) => {
      let id = parse_id(&args, "/approve <id>")?;
      let withdrawal = sv
        .dashboard
        .set_withdrawal_status(&actor, id, WithdrawalStatus::Approved)
        .await?;
      format!(
        "✅ Withdrawal <code>{}</code> approved: {} {}",
        withdrawal.id,
        html::escape(&withdrawal.amount),
        html::escape(&withdrawal.asset)
      )
    }
    Command::Reject(args) => {
      let id = parse_id(&args, "/reject <id>")?;
      let withdrawal = sv
        .dashboard
        .set_withdrawal_status(&actor, id, WithdrawalStatus::Rejected)
        .await?;
      format!("🚫 Withdrawal <code>{}</code> rejected.", withdrawal.id)
    }
    Command::Analytics => match app.analytics.latest() {
      Some(snapshot) => render_snapshot(&snapshot),
      None => "📭 No analytics snapshot received yet.".into(),
    },
    Command::Audit => render_audit(&sv.audit.recent(AUDIT_ENTRIES).await?),
  };

  Ok(text)
}

fn parse_set_level(input: &str) -> Result<(u32, f64)> {
  let usage =
    || Error::InvalidArgs("Usage: /setlevel <level> <percent>".into());

  let mut parts = input.split_whitespace();
  let (Some(level), Some(percentage), None) =
    (parts.next(), parts.next(), parts.next())
  else {
    return Err(usage());
  };

  let level = level.parse().map_err(|_| usage())?;
  let percentage = percentage
    .trim_end_matches('%')
    .replace(',', ".")
    .parse()
    .map_err(|_| usage())?;

  Ok((level, percentage))
}

fn parse_max_level(input: &str) -> Result<Option<i64>> {
  let input = input.trim();
  if input.is_empty() {
    return Ok(None);
  }
  input
    .parse()
    .map(Some)
    .map_err(|_| Error::InvalidArgs("Usage: /maxlevel [n]".into()))
}

fn parse_tree(input: &str) -> Result<Option<(i64, Option<u32>)>> {
  let usage = || Error::InvalidArgs("Usage: /tree [root_id] [level]".into());

  let mut parts = input.split_whitespace();
  let Some(root_id) = parts.next() else {
    return Ok(None);
  };
  let root_id = root_id.parse().map_err(|_| usage())?;
  let level =
    parts.next().map(|l| l.parse()).transpose().map_err(|_| usage())?;

  if parts.next().is_some() {
    return Err(usage());
  }
  Ok(Some((root_id, level)))
}

fn parse_id(input: &str, usage: &str) -> Result<i64> {
  input
    .trim()
    .parse()
    .map_err(|_| Error::InvalidArgs(format!("Usage: {usage}")))
}

fn render_levels(overview: &ReferralOverview) -> String {
  let mut text = String::from("📊 <b>Referral Levels</b>\n\n");

  for reward in &overview.levels {
    let icon = if !reward.is_active {
      "⚪"
    } else if reward.level <= overview.max_level {
      "✅"
    } else {
      "⏸"
    };
    text.push_str(&format!(
      "{} Level {}: <b>{}</b>\n",
      icon,
      reward.level,
      format_percent(reward.percentage)
    ));
  }

  if overview.levels.is_empty() {
    text.push_str("<i>No reward levels configured</i>\n");
  }

  text.push_str(&format!(
    "\nMax level: <b>{}</b> of {} active",
    overview.max_level, overview.active_levels
  ));
  text
}

fn render_trees(trees: &[AffiliateTreeSummary]) -> String {
  if trees.is_empty() {
    return "📭 No affiliate trees.".into();
  }

  let mut text = format!("🌳 <b>Affiliate Trees ({})</b>\n\n", trees.len());
  for tree in trees {
    text.push_str(&format!(
      "<code>{}</code> {} (root <code>{}</code>, {} members)\n",
      tree.id,
      html::escape(tree.name.as_deref().unwrap_or("unnamed")),
      tree.root_wallet_id,
      tree.member_count
    ));
  }
  text
}

fn render_tree(view: &TreeView) -> String {
  let mut text = format!(
    "🌳 <b>{}</b> (<code>{}</code>)\n\nMembers: {}\nDepth: {}\n\n",
    html::escape(view.name.as_deref().unwrap_or("Affiliate tree")),
    view.root_id,
    view.nodes.len(),
    view.depth
  );

  for (level, size) in &view.level_sizes {
    text.push_str(&format!("Level {}: {} member(s)\n", level, size));
  }

  if !view.orphans.is_empty() {
    let wallets: Vec<_> = view.orphans.iter().map(|w| w.to_string()).collect();
    text.push_str(&format!(
      "\n⚠️ Missing parents, shown on level 1: <code>{}</code>",
      wallets.join(", ")
    ));
  }
  text
}

fn render_members(root_id: i64, level: u32, nodes: &[LeveledNode]) -> String {
  if nodes.is_empty() {
    return format!("📭 Tree <code>{root_id}</code> has no level {level}.");
  }

  let mut text = format!(
    "🌳 Tree <code>{}</code>, level {} ({} members)\n\n",
    root_id,
    level,
    nodes.len()
  );
  for n in nodes {
    text.push_str(&format!(
      "{} <code>{}</code> {} since {}\n",
      if n.node.is_active { "🟢" } else { "⚪" },
      n.node.wallet_id,
      format_percent(n.node.commission_percent),
      utils::format_utc(n.node.effective_from)
    ));
  }
  text
}

fn render_overview(overview: &Overview) -> String {
  let stats = &overview.stats;
  let mut text = format!(
    "📈 <b>Overview</b>\n\n\
    Users: {}\n\
    Wallets: {}\n\
    Affiliate trees: {}\n\
    Swap investors: {}\n\
    Token categories: {}\n\n\
    💸 <b>Pending withdrawals ({})</b>\n",
    stats.total_users,
    stats.total_wallets,
    stats.affiliate_trees,
    stats.swap_investors,
    stats.token_categories,
    overview.pending_withdrawals.len()
  );

  for w in &overview.pending_withdrawals {
    text.push_str(&format!(
      "<code>{}</code> wallet <code>{}</code>: {} {} ({})\n",
      w.id,
      w.wallet_id,
      html::escape(&w.amount),
      html::escape(&w.asset),
      utils::format_utc(w.requested_at)
    ));
  }
  text
}

fn render_snapshot(snapshot: &Snapshot) -> String {
  format!(
    "📡 <b>Analytics</b> ({})\n\n\
    Active users: {}\n\
    Wallets: {}\n\
    Swap volume 24h: {}\n\
    Pending withdrawals: {}",
    utils::format_utc(snapshot.timestamp),
    snapshot.active_users,
    snapshot.total_wallets,
    html::escape(snapshot.swap_volume_24h.as_deref().unwrap_or("n/a")),
    snapshot.pending_withdrawals
  )
}

fn render_audit(entries: &[audit_log::Model]) -> String {
  if entries.is_empty() {
    return "📭 No admin actions recorded.".into();
  }

  let mut text = String::from("🗒 <b>Recent actions</b>\n\n");
  for e in entries {
    text.push_str(&format!(
      "{} <code>{}</code> {}: {} → {}\n",
      utils::format_date(e.created_at),
      html::escape(&e.actor),
      html::escape(&e.subject),
      html::escape(e.old_value.as_deref().unwrap_or("-")),
      html::escape(&e.new_value)
    ));
  }
  text
}
