//! Domain models: folders, messages, quota.

mod folder;
mod message;
mod quota;

pub use folder::{
    DefaultSlot, Folder, FolderDescription, FolderPermission, is_within, join_name, leaf_name,
    parent_name,
};
pub use message::{
    ColorLabel, EmailAddress, MessageData, MessageField, fetch_profile, parse_internal_date,
};
pub use quota::{QuotaInfo, QuotaUsage};
