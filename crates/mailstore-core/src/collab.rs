//! Collaborators the store consults but does not own.
//!
//! - [`FolderNaming`]: default folder names, configured fullnames and
//!   persistence of the fullnames the resolver discovers
//! - [`AclMapper`]: local users and groups to ACL identifiers and back
//! - [`SpamHandler`]: which spam folders the account needs
//!
//! In-memory implementations back tests and the command line tool.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::config::FolderNames;
use crate::model::DefaultSlot;

/// Names and fullnames of default folders.
pub trait FolderNaming: Send + Sync {
    /// Name used when the slot's folder has to be created.
    fn default_name(&self, slot: DefaultSlot) -> String;

    /// Fullname configured for the slot, if any.
    fn configured_fullname(&self, slot: DefaultSlot) -> Option<String>;

    /// Records the fullname resolved for the slot.
    fn persist_fullname(&self, slot: DefaultSlot, fullname: &str);
}

/// [`FolderNaming`] backed by configured names and a map.
#[derive(Debug, Default)]
pub struct InMemoryFolderNaming {
    names: FolderNames,
    fullnames: RwLock<HashMap<DefaultSlot, String>>,
}

impl InMemoryFolderNaming {
    /// Uses `names` for creation and starts without configured fullnames.
    #[must_use]
    pub fn new(names: FolderNames) -> Self {
        Self {
            names,
            fullnames: RwLock::default(),
        }
    }

    /// Pre-configures a fullname for a slot.
    #[must_use]
    pub fn with_fullname(self, slot: DefaultSlot, fullname: impl Into<String>) -> Self {
        self.fullnames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, fullname.into());
        self
    }
}

impl FolderNaming for InMemoryFolderNaming {
    fn default_name(&self, slot: DefaultSlot) -> String {
        self.names.get(slot).to_string()
    }

    fn configured_fullname(&self, slot: DefaultSlot) -> Option<String> {
        self.fullnames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot)
            .cloned()
    }

    fn persist_fullname(&self, slot: DefaultSlot, fullname: &str) {
        self.fullnames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, fullname.to_string());
    }
}

/// A local principal an ACL entry can name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    /// A user.
    User(u32),
    /// A group.
    Group(u32),
    /// Everybody (`anyone`).
    Anyone,
}

/// Maps local entities to ACL identifiers.
pub trait AclMapper: Send + Sync {
    /// Identifier for the entity, `None` if it has no IMAP counterpart.
    fn identifier(&self, entity: &Entity) -> Option<String>;

    /// Entity for an identifier, `None` if unknown.
    fn entity(&self, identifier: &str) -> Option<Entity>;
}

/// [`AclMapper`] over a fixed table. `anyone` is always known.
#[derive(Debug, Default)]
pub struct InMemoryAclMapper {
    identifiers: HashMap<Entity, String>,
}

impl InMemoryAclMapper {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping.
    #[must_use]
    pub fn with(mut self, entity: Entity, identifier: impl Into<String>) -> Self {
        self.identifiers.insert(entity, identifier.into());
        self
    }
}

impl AclMapper for InMemoryAclMapper {
    fn identifier(&self, entity: &Entity) -> Option<String> {
        match entity {
            Entity::Anyone => Some("anyone".to_string()),
            other => self.identifiers.get(other).cloned(),
        }
    }

    fn entity(&self, identifier: &str) -> Option<Entity> {
        if identifier.eq_ignore_ascii_case("anyone") {
            return Some(Entity::Anyone);
        }
        self.identifiers
            .iter()
            .find(|(_, id)| id.as_str() == identifier)
            .map(|(entity, _)| entity.clone())
    }
}

/// Decides which spam folders an account needs.
pub trait SpamHandler: Send + Sync {
    /// The Spam folder is needed.
    fn needs_spam_folder(&self) -> bool;

    /// The Confirmed Spam and Confirmed Ham folders are needed.
    fn needs_confirmed_folders(&self) -> bool;

    /// Whether the resolver should provision `slot`.
    fn needs(&self, slot: DefaultSlot) -> bool {
        match slot {
            DefaultSlot::Spam => self.needs_spam_folder(),
            DefaultSlot::ConfirmedSpam | DefaultSlot::ConfirmedHam => {
                self.needs_confirmed_folders()
            }
            _ => true,
        }
    }
}

/// [`SpamHandler`] with fixed answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSpamHandler {
    /// See [`SpamHandler::needs_spam_folder`].
    pub spam: bool,
    /// See [`SpamHandler::needs_confirmed_folders`].
    pub confirmed: bool,
}

impl Default for StaticSpamHandler {
    fn default() -> Self {
        Self {
            spam: true,
            confirmed: false,
        }
    }
}

impl SpamHandler for StaticSpamHandler {
    fn needs_spam_folder(&self) -> bool {
        self.spam
    }

    fn needs_confirmed_folders(&self) -> bool {
        self.confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_persists_resolved_fullnames() {
        let naming = InMemoryFolderNaming::new(FolderNames::default())
            .with_fullname(DefaultSlot::Sent, "INBOX.Sent");
        assert_eq!(
            naming.configured_fullname(DefaultSlot::Sent).as_deref(),
            Some("INBOX.Sent")
        );
        assert_eq!(naming.configured_fullname(DefaultSlot::Trash), None);

        naming.persist_fullname(DefaultSlot::Trash, "Deleted Items");
        assert_eq!(
            naming.configured_fullname(DefaultSlot::Trash).as_deref(),
            Some("Deleted Items")
        );
        assert_eq!(naming.default_name(DefaultSlot::Drafts), "Drafts");
    }

    #[test]
    fn acl_mapper_round_trip() {
        let mapper = InMemoryAclMapper::new().with(Entity::User(7), "bob");
        assert_eq!(mapper.identifier(&Entity::User(7)).as_deref(), Some("bob"));
        assert_eq!(mapper.entity("bob"), Some(Entity::User(7)));
        assert_eq!(mapper.entity("ANYONE"), Some(Entity::Anyone));
        assert_eq!(mapper.identifier(&Entity::Group(1)), None);
    }

    #[test]
    fn spam_slots_follow_handler() {
        let handler = StaticSpamHandler::default();
        assert!(handler.needs(DefaultSlot::Spam));
        assert!(!handler.needs(DefaultSlot::ConfirmedHam));
        assert!(handler.needs(DefaultSlot::Trash));
    }
}
