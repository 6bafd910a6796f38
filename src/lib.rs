//! Direct-to-MX email delivery with DKIM signing.
//!
//! Messages are handed straight to the recipient's mail exchangers, so no
//! local MTA or external relay is required. Every outgoing message is signed
//! with DKIM before the first delivery attempt.
//!
//! Features:
//!
//! * MX resolution with the implicit fallback to the bare domain when no MX
//!   records are published
//! * DKIM signatures (rsa-sha256, simple/relaxed canonicalization)
//! * Opportunistic STARTTLS on the direct path
//! * An authenticated SMTPS relay path for hosts that cannot send on port 25
//! * Template-driven sending backed by [minijinja](https://docs.rs/minijinja)
//!
//! # DNS setup
//!
//! Large providers reject or junk-folder unauthenticated mail, so publish the
//! usual records for your sending domain before going live:
//!
//! * SPF: `@ TXT "v=spf1 a -all"` (adjust to the hosts that actually send)
//! * DMARC: `_dmarc TXT "v=DMARC1; p=none; sp=none; aspf=r;"`
//! * DKIM: generate a key pair and publish the public half under your
//!   selector, e.g. for the selector `mail`:
//!
//! ```text
//! openssl genrsa -out dkim.pem 2048
//! openssl rsa -in dkim.pem -pubout -outform der | openssl base64 -A
//! ```
//!
//! then `mail._domainkey TXT "v=DKIM1; k=rsa; p=<that base64>"`. The private
//! key file is read as PEM, either PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
//! (`BEGIN RSA PRIVATE KEY`); to convert to PKCS#8:
//!
//! ```text
//! openssl pkcs8 -topk8 -nocrypt -in dkim.pem -out dkim-pkcs8.pem
//! ```
//!
//! Also make sure the sending host has matching forward and reverse DNS, or
//! many exchangers will refuse the connection outright.
//!
//! # Example
//!
//! ```no_run
//! use mxsend::{DirectConfig, DirectSender, MailSender, OutboundMessage};
//!
//! let config = DirectConfig {
//!     from_email: "noreply@example.com".to_string(),
//!     from_name: "Example".to_string(),
//!     signing_domain: "example.com".to_string(),
//!     dkim_selector: "mail".to_string(),
//!     dkim_private_key: "/etc/mxsend/dkim.pem".into(),
//!     ..Default::default()
//! };
//! let sender = DirectSender::new(config)?;
//!
//! let message = OutboundMessage::new("user@example.org", "Hello", "Hello from mxsend.");
//! sender.send(&message)?;
//! # Ok::<(), mxsend::Error>(())
//! ```

pub mod config;
mod direct;
mod dkim;
mod dns;
pub mod error;
mod key;
pub mod logging;
mod message;
mod mx;
mod relay;
mod smtp;
mod template;

pub use crate::config::{Config, DeliveryConfig, DirectConfig, RelayConfig, TemplateConfig};
pub use crate::direct::DirectSender;
pub use crate::dkim::Signer;
pub use crate::dns::{DnsClient, DnsError, SystemDns};
pub use crate::error::Error;
pub use crate::message::OutboundMessage;
pub use crate::mx::{resolve as resolve_mx, MxCandidate};
pub use crate::relay::RelaySender;
pub use crate::smtp::{AttemptError, AttemptErrorKind, SessionOptions, SmtpDelivery};
pub use crate::template::{MinijinjaRenderer, TemplateMailer, TemplateMessage, TemplateRenderer};

/// Anything that can deliver a single outbound message.
///
/// Implemented by [`DirectSender`] and [`RelaySender`]; [`TemplateMailer`]
/// takes one of these to hand off rendered messages.
pub trait MailSender: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<(), Error>;
}

/// Build the sender selected by `config.delivery`.
pub fn sender_for(config: &Config) -> Result<Box<dyn MailSender>, Error> {
    match &config.delivery {
        DeliveryConfig::Direct(direct) => Ok(Box::new(DirectSender::new(direct.clone())?)),
        DeliveryConfig::Relay(relay) => Ok(Box::new(RelaySender::new(relay.clone())?)),
    }
}
