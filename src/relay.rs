use std::time::Duration;

use lettre::address::Envelope;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{SmtpTransport, Transport};
use log::debug;

use crate::config::RelayConfig;
use crate::error::Error;
use crate::message::{self, OutboundMessage};
use crate::smtp;
use crate::MailSender;

/// Sends everything through one fixed SMTP relay over implicit TLS with
/// username/password authentication. No MX resolution, no DKIM signing:
/// the relay is expected to handle reputation and signing itself.
pub struct RelaySender {
    config: RelayConfig,
    from: Mailbox,
}

impl RelaySender {
    pub fn new(config: RelayConfig) -> Result<RelaySender, Error> {
        config.validate()?;
        let from = message::sender_mailbox(&config.from_email, &config.from_name)?;
        Ok(RelaySender { config, from })
    }
}

impl MailSender for RelaySender {
    fn send(&self, message: &OutboundMessage) -> Result<(), Error> {
        let to = message::single_recipient(message)?;

        let mime = message::build_mime(message, &self.from, to.clone(), to.domain())?;
        let envelope = Envelope::new(Some(self.from.email.clone()), vec![to])?;

        let tls = TlsParameters::builder(self.config.host.clone())
            .dangerous_accept_invalid_certs(true)
            .build()
            .map_err(|e| Error::Rejected {
                host: self.config.host.clone(),
                detail: format!("unable to build TLS parameters: {}", e),
            })?;

        let mailer = SmtpTransport::builder_dangerous(&self.config.host)
            .port(self.config.port)
            .timeout(Some(Duration::from_secs(self.config.connection_timeout_secs)))
            .tls(Tls::Wrapper(tls))
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        match mailer.send_raw(&envelope, &mime.formatted()) {
            Ok(response) => {
                debug!("relay response from {}: {:?}", self.config.host, response);
                Ok(())
            }
            Err(e) if smtp::has_io_cause(&e) => Err(Error::MxUnavailable {
                host: self.config.host.clone(),
                detail: e.to_string(),
            }),
            Err(e) => Err(Error::Rejected {
                host: self.config.host.clone(),
                detail: e.to_string(),
            }),
        }
    }
}
