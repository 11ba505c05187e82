use vnmarket_market_data::AssetCategory;

use super::cache::AcceleratorCache;

pub fn quote_key(symbol: &str, category: AssetCategory) -> String {
    format!("quote:{}:{}", symbol.trim().to_uppercase(), category)
}

pub fn search_key(query: &str) -> String {
    format!("search:{}", query.trim().to_uppercase())
}

pub fn category_key(symbol: &str) -> String {
    format!("category:{}", symbol.trim().to_uppercase())
}

/// Drop every category's quote entry for `symbol`. Returns how many went.
pub fn invalidate_symbol<V: Clone>(cache: &AcceleratorCache<V>, symbol: &str) -> usize {
    AssetCategory::ALL
        .iter()
        .filter(|category| cache.remove(&quote_key(symbol, **category)).is_some())
        .count()
}
