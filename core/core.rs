pub mod assemble;
pub mod chunking;
pub mod config;
pub mod error;
pub mod folders;
pub mod gather;
pub mod ignore_rules;
pub mod truncate;

pub use assemble::{AssembleOptions, CommentStyle, assemble, comment_style_for};
pub use chunking::{TextChunk, parse_chunk_size, rejoin_chunks, split_text_into_chunks};
pub use config::{Config, DEFAULT_CONFIG_FILENAME};
pub use error::{AppError, Result};
pub use folders::{FolderDepth, FolderOutputUnit, partition_by_folder};
pub use gather::{
    GatherLimits, GatherOptions, GatherOutcome, GatheredFile, assemble_stream, gather,
    render_layout_from_paths,
};
pub use ignore_rules::{IgnoreOptions, IgnoreRules, default_ignore_patterns};
pub use truncate::{TruncateStrategy, estimate_tokens, truncate_to_budget};
