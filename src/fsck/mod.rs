pub mod checks;
pub mod fsck_types;

pub use checks::run_fsck;
pub use fsck_types::FsckReport;
