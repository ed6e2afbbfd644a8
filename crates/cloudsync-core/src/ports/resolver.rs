//! Resolver ports
//!
//! Callbacks the session consults when the backend rejects work in a way
//! only the application can settle.

use crate::domain::newtypes::ChangeToken;
use crate::domain::record::Record;

/// Decides what to save after records were rejected as stale
pub trait ConflictResolver: Send + Sync {
    /// Resolves a batch of conflicts
    ///
    /// `local` and `server` are index-aligned: `server[i]` is the server's
    /// current version of `local[i]`.
    ///
    /// # Returns
    /// The records to save instead of `local`, or `None` to leave the conflict
    /// unresolved (the session halts)
    fn resolve_conflict(&self, local: &[Record], server: &[Record]) -> Option<Vec<Record>>;
}

impl<F> ConflictResolver for F
where
    F: Fn(&[Record], &[Record]) -> Option<Vec<Record>> + Send + Sync,
{
    fn resolve_conflict(&self, local: &[Record], server: &[Record]) -> Option<Vec<Record>> {
        self(local, server)
    }
}

/// Supplies a change token when the backend rejects the stored one as expired
pub trait ChangeTokenResolver: Send + Sync {
    /// Returns the token to resume from, or `None` to fetch from scratch
    fn resolve_expired_change_token(&self) -> Option<ChangeToken>;
}

impl<F> ChangeTokenResolver for F
where
    F: Fn() -> Option<ChangeToken> + Send + Sync,
{
    fn resolve_expired_change_token(&self) -> Option<ChangeToken> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_conflict_resolver() {
        let keep_server = |_: &[Record], server: &[Record]| Some(server.to_vec());
        let server = vec![Record::new("a".parse().unwrap(), "Note").with_change_tag("t2")];
        let local = vec![Record::new("a".parse().unwrap(), "Note")];

        let resolved = keep_server.resolve_conflict(&local, &server);
        assert_eq!(resolved, Some(server));
    }

    #[test]
    fn test_closure_token_resolver() {
        let resolver = || Some(ChangeToken::new("saved".into()).unwrap());
        assert_eq!(
            resolver.resolve_expired_change_token().map(String::from),
            Some("saved".to_string())
        );

        let from_scratch = || -> Option<ChangeToken> { None };
        assert!(from_scratch.resolve_expired_change_token().is_none());
    }
}
