//! Authorization gate.
//!
//! Decides what a requester may do with a file. Ownership wins over any
//! grant; a grant yields the recipient's wrapped key; anything else is
//! denied.

use std::sync::Arc;

use tracing::debug;

use lockbox_core::{AccessGrant, File, FileId, UserId};
use lockbox_store::Store;

use crate::error::{AccessError, Result};

/// The outcome of an access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The requester owns the file. No grant is needed.
    Owner,
    /// The requester holds a grant; carries their wrapped key.
    Grantee { wrapped_key: String },
    /// No relationship to the file.
    Denied,
}

impl Access {
    /// Pure decision over already-loaded state.
    ///
    /// A missing file is `Denied`, so a grant that outlived its file never
    /// grants. A grant for a different file or recipient is ignored.
    pub fn decide(
        requester: &UserId,
        file: Option<&File>,
        grant: Option<&AccessGrant>,
    ) -> Access {
        let Some(file) = file else {
            return Access::Denied;
        };

        if file.is_owned_by(requester) {
            return Access::Owner;
        }

        match grant {
            Some(g) if g.file_id == file.id && g.recipient_id == *requester => Access::Grantee {
                wrapped_key: g.wrapped_key.clone(),
            },
            _ => Access::Denied,
        }
    }

    /// Whether this decision allows downloading.
    pub fn can_download(&self) -> bool {
        !matches!(self, Access::Denied)
    }

    /// Succeed only for the owner. Used by share, revoke, delete, list-shares
    /// and rotation.
    pub fn require_owner(&self) -> Result<()> {
        match self {
            Access::Owner => Ok(()),
            _ => Err(AccessError::Forbidden(
                "only the owner may manage this file".into(),
            )),
        }
    }

    /// Succeed for the owner or a grantee.
    pub fn require_download(&self) -> Result<()> {
        if self.can_download() {
            Ok(())
        } else {
            Err(AccessError::Forbidden("no access to this file".into()))
        }
    }
}

/// The gate: loads the file and grant, then decides.
pub struct Gate<S> {
    store: Arc<S>,
}

impl<S: Store> Gate<S> {
    /// Create a gate over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Decide `requester`'s access to `file_id`, returning the file with it.
    ///
    /// `NotFound` if the file does not exist.
    pub async fn decide(&self, requester: &UserId, file_id: &FileId) -> Result<(File, Access)> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("file {}", file_id)))?;

        let grant = if file.is_owned_by(requester) {
            None
        } else {
            self.store.get_grant(file_id, requester).await?
        };

        let access = Access::decide(requester, Some(&file), grant.as_ref());
        debug!(
            file_id = %file_id,
            requester = %requester,
            owner = matches!(access, Access::Owner),
            allowed = access.can_download(),
            "access decided"
        );
        Ok((file, access))
    }
}
