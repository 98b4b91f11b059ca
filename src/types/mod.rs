mod assets;
mod config;
mod filter_set;
mod parameters;
mod value;

pub use assets::{AssetError, AssetProvider, Scripts, StaticAssets};
pub use config::EvaluatorConfig;
pub use filter_set::{FilterAction, FilterSet};
pub use parameters::Parameters;
pub use value::{Value, MAX_SAFE_INTEGER};
