mod load;
mod types;

pub use load::{
    load_build_tree, load_default, load_from_path, parse_build_tree_json, parse_build_tree_toml,
};
pub use types::{ExecutorConfig, LoggingConfig, ParallelismDefaults};
