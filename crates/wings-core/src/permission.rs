// SPDX-License-Identifier: MIT

//! SFTP permission strings granted by the Panel on credential check.

use std::collections::HashSet;

/// The permission required to perform a given SFTP operation, per
/// spec.md §4.7.2's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SftpOp {
    Read,
    ReadContent,
    Create,
    Update,
    Delete,
}

impl SftpOp {
    pub fn permission(self) -> &'static str {
        match self {
            SftpOp::Read => "file.read",
            SftpOp::ReadContent => "file.read-content",
            SftpOp::Create => "file.create",
            SftpOp::Update => "file.update",
            SftpOp::Delete => "file.delete",
        }
    }

    /// True for ops that write to the filesystem; read-only mode rejects
    /// these with `op-unsupported` regardless of granted permissions.
    pub fn is_mutating(self) -> bool {
        matches!(self, SftpOp::Create | SftpOp::Update | SftpOp::Delete)
    }
}

/// The set of permission strings a session was granted by the Panel.
///
/// `"*"` grants every permission, matching spec.md §8's
/// `required-permission(Op) ∈ P ∪ {"*"}`.
#[derive(Debug, Clone, Default)]
pub struct Permissions(HashSet<String>);

impl Permissions {
    pub fn new(granted: impl IntoIterator<Item = String>) -> Self {
        Self(granted.into_iter().collect())
    }

    pub fn allows(&self, op: SftpOp) -> bool {
        self.0.contains("*") || self.0.contains(op.permission())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_grants_everything() {
        let perms = Permissions::new(["*".to_string()]);
        assert!(perms.allows(SftpOp::Delete));
        assert!(perms.allows(SftpOp::Read));
    }

    #[test]
    fn specific_grant_only_allows_that_op() {
        let perms = Permissions::new(["file.read".to_string()]);
        assert!(perms.allows(SftpOp::Read));
        assert!(!perms.allows(SftpOp::Delete));
    }

    #[test]
    fn mutating_ops_exclude_reads() {
        assert!(!SftpOp::Read.is_mutating());
        assert!(!SftpOp::ReadContent.is_mutating());
        for op in [SftpOp::Create, SftpOp::Update, SftpOp::Delete] {
            assert!(op.is_mutating());
        }
    }
}
