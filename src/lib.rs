mod dir;
mod error;
mod fs;
mod logging;
mod output;

pub mod carve;
pub mod chain;
pub mod extract;
pub mod fsck;
pub mod list;
pub mod mkfs;

pub use crate::dir::{find_by_name, is_free, DirEntry, DirectoryTable, FileKind, Permissions};
pub use crate::error::{exit_code_for, ChainError, FormatError, QfsError};
pub use crate::error::{
    EXIT_ALLOCATION, EXIT_BAD_FORMAT, EXIT_BLOCK_READ, EXIT_CHECK_FAILED, EXIT_METADATA_READ,
    EXIT_NOT_FOUND, EXIT_OPEN_IMAGE, EXIT_OUTPUT_WRITE, EXIT_USAGE,
};
pub use crate::fs::{
    ImageSource, QfsImage, Superblock, DATA_REGION_OFFSET, DIRECTORY_REGION_SIZE,
    DIRENTRY_COUNT, DIRENTRY_SIZE, LABEL_LEN, NAME_LEN, QFS_MAGIC, SUPERBLOCK_SIZE,
};
pub use crate::logging::init_tracing;
pub use crate::output::write_atomically;
