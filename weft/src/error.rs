use thiserror::Error;

/// Errors related to Mailbox operations.
///
/// The proxy reports a closed mailbox to its callers as `UnitStopped`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MailboxError {
    #[error("Mailbox is closed")]
    Closed,
}
