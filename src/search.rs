//! Contextual keyword search against the backend.
//!
//! Queries shorter than `search.min_query_len` characters never reach the
//! backend; the command prints a hint instead.

use anyhow::Result;

use crate::api::ApiClient;
use crate::config::Config;
use crate::models::SearchResult;
use crate::output::{print_json, truncate, OutputMode};

pub fn is_searchable(query: &str, min_len: usize) -> bool {
    query.trim().chars().count() >= min_len
}

pub async fn run_search(
    config: &Config,
    api: &ApiClient,
    query: &str,
    context_range: Option<u32>,
    mode: OutputMode,
) -> Result<()> {
    let query = query.trim();
    if !is_searchable(query, config.search.min_query_len) {
        if mode == OutputMode::Json {
            return print_json(&Vec::<SearchResult>::new());
        }
        println!(
            "Query too short: type at least {} characters.",
            config.search.min_query_len
        );
        return Ok(());
    }

    let range = context_range.or(config.search.context_range);
    let results = api.search(query, range).await?;
    tracing::debug!(count = results.len(), "search results");

    if mode == OutputMode::Json {
        return print_json(&results);
    }
    print!("{}", render_results(&results));
    Ok(())
}

pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results.\n".to_string();
    }

    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.2}] {}  ({})\n",
            i + 1,
            r.rank,
            r.filename,
            r.content_type
        ));
        out.push_str(&format!("    id: {}\n", r.file_id));
        if !r.categories.is_empty() {
            out.push_str(&format!("    categories: {}\n", r.categories.join(", ")));
        }
        out.push_str(&format!("    > {}\n\n", truncate(&r.content_preview, 200)));
    }
    out
}
