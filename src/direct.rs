use std::time::Duration;

use lettre::address::Envelope;
use lettre::message::Mailbox;
use log::{debug, info};

use crate::config::DirectConfig;
use crate::dkim::Signer;
use crate::dns::{DnsClient, SystemDns};
use crate::error::Error;
use crate::message::{self, OutboundMessage};
use crate::smtp::{AttemptErrorKind, OpportunisticSmtp, SessionOptions, SmtpDelivery};
use crate::{key, mx, MailSender};

/// Sends messages straight to the recipient's own mail servers: resolves
/// the MX topology of the recipient domain, DKIM-signs the message once,
/// then works through the candidates in priority order, falling through to
/// the next one only on connectivity failures.
///
/// Construction is the fail-fast step: configuration is validated and the
/// signing key loaded before the first send. A constructed sender holds no
/// mutable state and is safe to share across threads.
pub struct DirectSender<D: DnsClient = SystemDns, T: SmtpDelivery = OpportunisticSmtp> {
    from: Mailbox,
    signer: Signer,
    signing_domain: String,
    options: SessionOptions,
    dns: D,
    delivery: T,
}

impl DirectSender {
    pub fn new(config: DirectConfig) -> Result<DirectSender, Error> {
        let dns = SystemDns::new()?;
        DirectSender::with_collaborators(config, dns, OpportunisticSmtp)
    }
}

impl<D: DnsClient, T: SmtpDelivery> DirectSender<D, T> {
    /// Construct with explicit DNS and transport collaborators.
    pub fn with_collaborators(
        config: DirectConfig,
        dns: D,
        delivery: T,
    ) -> Result<DirectSender<D, T>, Error> {
        config.validate()?;
        let from = message::sender_mailbox(&config.from_email, &config.from_name)?;
        let dkim_private_key = key::load_private_key(&config.dkim_private_key)?;
        let signer = Signer::new(
            &config.signing_domain,
            &config.dkim_selector,
            &config.from_email,
            dkim_private_key,
        );
        Ok(DirectSender {
            from,
            signer,
            options: SessionOptions {
                port: config.smtp_port,
                helo_name: config.signing_domain.clone(),
                timeout: Duration::from_secs(config.connection_timeout_secs),
            },
            signing_domain: config.signing_domain,
            dns,
            delivery,
        })
    }
}

impl<D: DnsClient, T: SmtpDelivery> MailSender for DirectSender<D, T> {
    fn send(&self, message: &OutboundMessage) -> Result<(), Error> {
        // Recipient preconditions come before any DNS or network activity
        let to = message::single_recipient(message)?;
        let domain = to.domain().to_owned();

        let candidates = mx::resolve(&self.dns, &domain)?;
        debug!("MX records detected: {:?}", candidates);
        if candidates.is_empty() {
            return Err(Error::NoRoute(domain));
        }

        let mime = message::build_mime(message, &self.from, to.clone(), &self.signing_domain)?;
        let envelope = Envelope::new(Some(self.from.email.clone()), vec![to])?;

        // Signed once; the same artifact is reused for every candidate
        let signed = self.signer.sign(&mime.formatted())?;

        let last = candidates.len() - 1;
        for (i, candidate) in candidates.iter().enumerate() {
            debug!(
                "attempting delivery to {} (priority {})",
                candidate.host, candidate.priority
            );
            match self
                .delivery
                .deliver(&candidate.host, &envelope, &signed, &self.options)
            {
                Ok(()) => {
                    info!("message delivered via {}", candidate.host);
                    return Ok(());
                }
                Err(e) if e.kind == AttemptErrorKind::Connectivity && i < last => {
                    info!("mx is not available: {}", candidate.host);
                }
                Err(e) => {
                    return Err(match e.kind {
                        AttemptErrorKind::Connectivity => Error::MxUnavailable {
                            host: candidate.host.clone(),
                            detail: e.detail,
                        },
                        AttemptErrorKind::Rejected => Error::Rejected {
                            host: candidate.host.clone(),
                            detail: e.detail,
                        },
                    });
                }
            }
        }

        Err(Error::NoRoute(domain))
    }
}
