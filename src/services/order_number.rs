//! Daily-sequential order number allocation.
//!
//! Numbers have the exact shape `RX` + `yymmdd` + zero-padded 3-digit
//! sequence (11 characters), e.g. `RX240315007`. The sequence restarts at 1
//! each calendar day and is derived by scanning the numbers already
//! persisted for that day. Races between concurrent creations are handled
//! with an optimistic collision re-check and a bounded retry loop; the
//! unique index on `orders.order_no` remains the actual correctness
//! backstop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use metrics::counter;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use regex::Regex;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use tracing::{instrument, warn};

use crate::cache::{CacheStats, SlotCache};
use crate::config::AppConfig;
use crate::entities::order;
use crate::errors::ServiceError;

pub const ORDER_NO_PREFIX: &str = "RX";
pub const ORDER_NO_LEN: usize = 11;
pub const DAILY_CAP: u32 = 999;
pub const TEMP_PREFIX: &str = "TEMP";

/// Compiled shape check for final order numbers, built once per process.
static ORDER_NO_PATTERN: SlotCache<Regex> = SlotCache::new();

pub fn order_no_pattern() -> Arc<Regex> {
    ORDER_NO_PATTERN.get_or_init(|| {
        Regex::new(r"^RX(\d{6})(\d{3})$").expect("order number pattern is a valid regex")
    })
}

/// Usage counters for the pattern slot (diagnostics endpoint).
pub fn pattern_cache_stats() -> CacheStats {
    ORDER_NO_PATTERN.stats()
}

/// Clear the pattern slot and its counters. Test isolation only.
pub fn reset_pattern_cache() {
    ORDER_NO_PATTERN.reset()
}

fn date_token(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Compute the next sequence for the day from the set of already-persisted
/// numbers matching the day's prefix.
///
/// Entries that are not exactly 11 characters, do not carry today's prefix,
/// or whose tail is not 3 digits are ignored (placeholder numbers and legacy
/// formats share the table).
pub fn next_sequence<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    date_token: &str,
) -> Result<u32, ServiceError> {
    let pattern = order_no_pattern();
    let prefix = format!("{ORDER_NO_PREFIX}{date_token}");

    let mut max_seq = 0u32;
    for number in existing {
        if number.len() != ORDER_NO_LEN || !number.starts_with(&prefix) {
            continue;
        }
        let Some(caps) = pattern.captures(number) else {
            continue;
        };
        if let Ok(seq) = caps[2].parse::<u32>() {
            max_seq = max_seq.max(seq);
        }
    }

    let next = max_seq + 1;
    if next > DAILY_CAP {
        return Err(ServiceError::AllocationExhausted(format!(
            "daily order volume limit of {DAILY_CAP} reached"
        )));
    }
    Ok(next)
}

pub fn format_order_no(date_token: &str, seq: u32) -> String {
    format!("{ORDER_NO_PREFIX}{date_token}{seq:03}")
}

/// Placeholder number assigned at row creation, before the final number is
/// allocated: `TEMP` + `yymmdd` + 3 random alphanumeric characters.
pub fn generate_temp_order_no(date: NaiveDate) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(3)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("{TEMP_PREFIX}{}{suffix}", date_token(date))
}

/// Source of "today" for the allocator; injectable so tests can pin a date.
pub type DateSource = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Clone)]
pub struct OrderNumberAllocator {
    max_retries: u32,
    backoff_unit: Duration,
    date_source: DateSource,
}

impl OrderNumberAllocator {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff_unit,
            date_source: Arc::new(|| Local::now().date_naive()),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.order_no_max_retries,
            Duration::from_millis(cfg.order_no_backoff_ms),
        )
    }

    /// Replace the wall-clock date with a fixed or scripted source.
    pub fn with_date_source(mut self, date_source: DateSource) -> Self {
        self.date_source = date_source;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.date_source)()
    }

    /// Produce a temporary placeholder number for today.
    pub fn temp_order_no(&self) -> String {
        generate_temp_order_no(self.today())
    }

    /// Allocate the next free order number for today.
    ///
    /// Scans the persisted numbers for the day, computes max + 1, and
    /// re-checks the candidate for an exact collision before handing it out.
    /// On collision the whole cycle is retried after a linearly growing
    /// pause. Runs on whatever connection the caller provides, so it can
    /// participate in the caller's transaction.
    #[instrument(skip(self, conn))]
    pub async fn allocate<C: ConnectionTrait>(&self, conn: &C) -> Result<String, ServiceError> {
        for attempt in 1..=self.max_retries {
            let token = date_token(self.today());
            let like_pattern = format!("{ORDER_NO_PREFIX}{token}%");

            let todays_numbers: Vec<String> = order::Entity::find()
                .filter(order::Column::OrderNo.like(like_pattern.as_str()))
                .select_only()
                .column(order::Column::OrderNo)
                .into_tuple::<String>()
                .all(conn)
                .await
                .map_err(ServiceError::from_db)?;

            // Daily-cap exhaustion is a hard ceiling; retrying cannot help.
            let seq = next_sequence(todays_numbers.iter().map(String::as_str), &token)?;
            let candidate = format_order_no(&token, seq);

            let collision = order::Entity::find()
                .filter(order::Column::OrderNo.eq(candidate.as_str()))
                .count(conn)
                .await
                .map_err(ServiceError::from_db)?;

            if collision == 0 {
                counter!("rfq_orders.number_allocated", 1);
                return Ok(candidate);
            }

            counter!("rfq_orders.number_collision", 1);
            warn!(
                candidate = %candidate,
                attempt,
                max_retries = self.max_retries,
                "order number collision, retrying scan"
            );

            if attempt < self.max_retries {
                tokio::time::sleep(self.backoff_unit * attempt).await;
            }
        }

        Err(ServiceError::AllocationExhausted(format!(
            "could not obtain a unique order number after {} attempts",
            self.max_retries
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    #[test]
    fn first_number_of_the_day_is_001() {
        let seq = next_sequence([], "240315").expect("sequence");
        assert_eq!(format_order_no("240315", seq), "RX240315001");
    }

    #[test]
    fn sequence_continues_from_max_not_count() {
        let existing = ["RX240315001", "RX240315007", "RX240315003"];
        assert_eq!(next_sequence(existing, "240315").expect("sequence"), 8);
    }

    #[test]
    fn malformed_and_foreign_numbers_are_ignored() {
        let existing = [
            "RX240314009",   // yesterday
            "TEMP240315AB1", // placeholder
            "RX2403150012",  // too long
            "RX24031500x",   // non-digit tail
            "RX240315002",
        ];
        assert_eq!(next_sequence(existing, "240315").expect("sequence"), 3);
    }

    #[test]
    fn cap_is_a_hard_ceiling() {
        let full = ["RX240315999"];
        let err = next_sequence(full, "240315").expect_err("expected cap error");
        assert!(matches!(err, ServiceError::AllocationExhausted(_)));
    }

    #[test]
    fn temp_number_has_expected_shape() {
        let temp = generate_temp_order_no(day());
        assert_eq!(temp.len(), 13);
        assert!(temp.starts_with("TEMP240315"));
        assert!(temp[10..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(temp[10..].chars().all(|c| !c.is_ascii_lowercase()));
    }

    #[test]
    fn pattern_cache_serves_one_compiled_regex() {
        reset_pattern_cache();
        let first = order_no_pattern();
        let second = order_no_pattern();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = pattern_cache_stats();
        assert!(stats.is_cached);
        assert_eq!(stats.misses, 1);
        assert!(stats.hits >= 1);

        reset_pattern_cache();
        assert!(!pattern_cache_stats().is_cached);
    }

    proptest! {
        #[test]
        fn formatted_numbers_always_satisfy_the_invariants(seq in 1u32..=999) {
            let number = format_order_no("240315", seq);
            prop_assert_eq!(number.len(), ORDER_NO_LEN);
            prop_assert!(number.starts_with("RX240315"));
            prop_assert!(number[8..].chars().all(|c| c.is_ascii_digit()));
            prop_assert_eq!(number[8..].parse::<u32>().unwrap(), seq);
        }

        #[test]
        fn next_sequence_is_strictly_above_all_valid_entries(seqs in proptest::collection::vec(1u32..=500, 0..20)) {
            let existing: Vec<String> = seqs.iter().map(|s| format_order_no("240315", *s)).collect();
            let next = next_sequence(existing.iter().map(String::as_str), "240315").unwrap();
            for s in &seqs {
                prop_assert!(next > *s);
            }
            prop_assert_eq!(next, seqs.iter().copied().max().unwrap_or(0) + 1);
        }
    }
}
