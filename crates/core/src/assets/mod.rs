//! Assets module - the asset registry discovered from the provider.

mod assets_model;
mod assets_traits;
mod category_detector;

pub use assets_model::AssetRecord;
pub use assets_traits::AssetStore;
pub use category_detector::{
    is_gold_symbol, is_index_symbol, normalize_symbol, CategoryDetector, Detection,
};
