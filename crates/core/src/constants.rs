/// Data source recorded on every asset row.
pub const DATA_SOURCE: &str = "VN_MARKET";

/// Default quote currency.
pub const DEFAULT_CURRENCY: &str = "VND";

/// Symbols kept warm by the background refresh.
pub const POPULAR_SYMBOLS: [&str; 10] = [
    "VNM", "FPT", "MWG", "VCB", "HDB", "ACB", "CTG", "BID", "TCB", "VPB",
];

/// Index symbols recognized without a store lookup.
pub const INDEX_SYMBOLS: [&str; 7] = [
    "VNINDEX",
    "VN30",
    "HNX",
    "HNX30",
    "UPCOM",
    "HNXINDEX",
    "UPCOMINDEX",
];

/// Canonical symbol all gold aliases resolve to.
pub const GOLD_SYMBOL: &str = "VN.GOLD";

/// Source tag of quotes rebuilt from stored history.
pub const CACHE_SOURCE: &str = "CACHE";

/// Offset of the exchange time zone (Asia/Ho_Chi_Minh, no DST).
pub const MARKET_UTC_OFFSET_SECS: i32 = 7 * 3600;
