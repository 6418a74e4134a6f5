use tracing::error;

use crate::store::ActivityStore;

pub const QUICK_START_LIMIT: usize = 4;
pub const DEFAULT_QUICK_STARTS: [&str; 4] = ["Homework", "Scroll", "Code", "Eat"];

/// Most used titles (ties: most recently started), padded with `defaults`
/// when history has fewer than four distinct titles.
pub fn quick_start_titles(store: &ActivityStore, defaults: &[String]) -> Vec<String> {
    let mut titles: Vec<String> = match store.title_usage(QUICK_START_LIMIT) {
        Ok(usage) => usage.into_iter().map(|u| u.title).collect(),
        Err(err) => {
            error!("title_usage failed: {err}");
            Vec::new()
        }
    };

    for d in defaults {
        if titles.len() >= QUICK_START_LIMIT {
            break;
        }
        let d = d.trim();
        if d.is_empty() || titles.iter().any(|t| t == d) {
            continue;
        }
        titles.push(d.to_string());
    }
    titles
}
