//! Git access: repository handles, commit extraction, remote probing.

pub mod commit;
pub mod error;
pub mod remote;
pub mod repository;

pub use commit::{ChangeType, CommitRecord, CommitSummary, DiffParsed, Identity, ModifiedFile};
pub use error::ExtractError;
pub use remote::{clone_to_temp, is_remote_reachable};
pub use repository::MinedRepository;
