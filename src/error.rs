use thiserror::Error;

/// Everything that can go wrong while configuring a sender or sending a
/// message.
///
/// Per-host connectivity failures during direct delivery are not surfaced
/// here; they are logged and the next MX candidate is tried. Only the
/// terminal outcome of a send reaches the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The message recipient list is unusable. No DNS or network activity
    /// has taken place when this is returned.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// DNS lookup of the recipient domain itself failed (NXDOMAIN or a
    /// failed query). Distinct from "no MX records", which falls back to
    /// the domain per RFC 974.
    #[error("unable to resolve domain {domain}: {reason}")]
    Resolution { domain: String, reason: String },

    /// MX lookup succeeded but yielded no usable candidate hosts.
    #[error("no usable mail exchangers for domain {0}")]
    NoRoute(String),

    /// The outgoing message could not be DKIM-signed.
    #[error("unable to sign message: {0}")]
    Signing(String),

    /// The DKIM private key could not be loaded. Fatal at startup.
    #[error("unable to load private key: {0}")]
    KeyLoad(String),

    /// All MX candidates were tried and the last failure was a
    /// connectivity-class one.
    #[error("mx is not available: {host}: {detail}")]
    MxUnavailable { host: String, detail: String },

    /// A receiving server rejected the message at the protocol level.
    /// Rejections are never retried against further candidates.
    #[error("message rejected by {host}: {detail}")]
    Rejected { host: String, detail: String },

    /// Required configuration fields are missing. Every missing field is
    /// listed, not just the first one checked.
    #[error("incomplete configuration, missing: {}", .0.join(", "))]
    Config(Vec<String>),

    /// A configuration file could not be read or parsed.
    #[error("unable to load configuration: {0}")]
    ConfigLoad(String),

    /// Template rendering failed.
    #[error("unable to prepare message: {0}")]
    Render(String),

    /// The message could not be assembled into RFC 5322 form.
    #[error("unable to build message: {0}")]
    Message(String),

    /// The system DNS resolver could not be constructed.
    #[error("unable to initialize resolver: {0}")]
    Resolver(String),
}

impl From<lettre::error::Error> for Error {
    fn from(e: lettre::error::Error) -> Error {
        Error::Message(e.to_string())
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Error {
        Error::Render(e.to_string())
    }
}
