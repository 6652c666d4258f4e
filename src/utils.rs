use chrono::{DateTime as UtcDateTime, Utc};

use crate::prelude::*;

/// Telegram rejects messages longer than this.
pub const MESSAGE_LIMIT: usize = 4096;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

pub fn format_utc(date: UtcDateTime<Utc>) -> String {
  format_date(date.naive_utc())
}

/// Percentages without trailing zeros: `12.5%`, `30%`.
pub fn format_percent(value: f64) -> String {
  let text = format!("{:.4}", value);
  let text = text.trim_end_matches('0').trim_end_matches('.');
  format!("{text}%")
}

/// Splits `text` on line boundaries into pieces of at most `limit` chars.
/// A zero limit means [`MESSAGE_LIMIT`]. Never returns an empty vec.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
  let limit = if limit == 0 { MESSAGE_LIMIT } else { limit };
  let mut chunks = Vec::new();
  let mut current = String::new();
  let mut current_len = 0;

  for line in text.split('\n') {
    let line_len = line.chars().count();

    if current_len > 0 && current_len + 1 + line_len > limit {
      chunks.push(std::mem::take(&mut current));
      current_len = 0;
    }

    if line_len > limit {
      let chars: Vec<char> = line.chars().collect();
      for piece in chars.chunks(limit) {
        if current_len > 0 {
          chunks.push(std::mem::take(&mut current));
        }
        current = piece.iter().collect();
        current_len = piece.len();
      }
      continue;
    }

    if current_len > 0 {
      current.push('\n');
      current_len += 1;
    }
    current.push_str(line);
    current_len += line_len;
  }

  if current_len > 0 || chunks.is_empty() {
    chunks.push(current);
  }
  chunks
}
