mod settings;

pub use settings::{
    CacheSettings, FileConfig, ProviderConfig, ProviderKind, SearchSettings, Settings,
};
