use std::fmt;
use std::time::Duration;

use lettre::address::Envelope;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::{SmtpTransport, Transport};
use log::debug;

/// Per-attempt transport settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub port: u16,
    /// Name presented in EHLO/HELO.
    pub helo_name: String,
    /// Connection and read timeout.
    pub timeout: Duration,
}

/// How one delivery attempt failed, reduced to the distinction the
/// orchestrator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptErrorKind {
    /// Network-level failure (connection refused, timeout, unreachable).
    /// The next MX candidate may be tried.
    Connectivity,
    /// Anything else, protocol rejections included. Never retried.
    Rejected,
}

#[derive(Debug)]
pub struct AttemptError {
    pub kind: AttemptErrorKind,
    pub detail: String,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

/// Transmit one fully-formed message to one host. The only network-facing
/// dependency of the orchestrator besides DNS.
pub trait SmtpDelivery: Send + Sync {
    fn deliver(
        &self,
        host: &str,
        envelope: &Envelope,
        message: &[u8],
        options: &SessionOptions,
    ) -> Result<(), AttemptError>;
}

/// lettre-backed delivery: a fresh session per attempt, starting in
/// plaintext and upgrading via STARTTLS when the server offers it.
/// Certificate validation is disabled: direct delivery cannot assume a
/// CA-validated chain (or a matching name, since candidates are usually
/// bare addresses) on arbitrary receiving servers.
pub struct OpportunisticSmtp;

impl SmtpDelivery for OpportunisticSmtp {
    fn deliver(
        &self,
        host: &str,
        envelope: &Envelope,
        message: &[u8],
        options: &SessionOptions,
    ) -> Result<(), AttemptError> {
        let tls = TlsParameters::builder(host.to_owned())
            .dangerous_accept_invalid_certs(true)
            .dangerous_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| AttemptError {
                kind: AttemptErrorKind::Rejected,
                detail: format!("unable to build TLS parameters: {}", e),
            })?;

        let mailer = SmtpTransport::builder_dangerous(host)
            .port(options.port)
            .hello_name(ClientId::Domain(options.helo_name.clone()))
            .timeout(Some(options.timeout))
            .tls(Tls::Opportunistic(tls))
            .build();

        match mailer.send_raw(envelope, message) {
            Ok(response) => {
                debug!("delivery response from {}: {:?}", host, response);
                Ok(())
            }
            Err(e) => Err(classify(&e)),
        }
    }
}

/// Decide whether a lettre failure is connectivity-class: it is when the
/// error's cause chain bottoms out in a network I/O failure. Protocol
/// responses (permanent or transient SMTP codes) carry no I/O cause and
/// count as rejections.
fn classify(e: &lettre::transport::smtp::Error) -> AttemptError {
    let kind = if has_io_cause(e) {
        AttemptErrorKind::Connectivity
    } else {
        AttemptErrorKind::Rejected
    };
    AttemptError {
        kind,
        detail: e.to_string(),
    }
}

pub(crate) fn has_io_cause(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = e.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}
