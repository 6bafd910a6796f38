use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, Message};
use uuid::Uuid;

use crate::error::Error;

/// An outbound message as submitted by the caller. The sender address comes
/// from the sender's configuration, not from the message.
///
/// Exactly one "to" recipient is supported per send; the senders reject
/// anything else before touching the network.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Send the body as `text/html` instead of `text/plain`.
    pub html: bool,
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn new(to: &str, subject: &str, body: &str) -> OutboundMessage {
        OutboundMessage {
            to: vec![to.to_owned()],
            subject: subject.to_owned(),
            body: body.to_owned(),
            html: false,
            reply_to: None,
        }
    }
}

/// Parse the From mailbox out of configuration.
pub(crate) fn sender_mailbox(from_email: &str, from_name: &str) -> Result<Mailbox, Error> {
    let address = from_email
        .trim()
        .parse::<Address>()
        .map_err(|e| Error::Message(format!("invalid from address {}: {}", from_email, e)))?;
    let name = if from_name.is_empty() {
        None
    } else {
        Some(from_name.to_owned())
    };
    Ok(Mailbox::new(name, address))
}

/// Check the recipient preconditions: exactly one "to" entry, and it must be
/// a concrete mailbox address. Group syntax and anything else unparseable is
/// rejected here, before any DNS or network activity.
pub(crate) fn single_recipient(message: &OutboundMessage) -> Result<Address, Error> {
    match message.to.len() {
        0 => Err(Error::InvalidRecipient(
            "missing \"to\" recipient".to_owned(),
        )),
        1 => message.to[0]
            .trim()
            .parse::<Address>()
            .map_err(|e| Error::InvalidRecipient(format!("{}: {}", message.to[0], e))),
        _ => Err(Error::InvalidRecipient(
            "only a single \"to\" recipient is supported".to_owned(),
        )),
    }
}

/// Assemble the RFC 5322 message: submitted content plus From, Date and a
/// generated Message-ID. `id_domain` is the right-hand side of the
/// Message-ID.
pub(crate) fn build_mime(
    message: &OutboundMessage,
    from: &Mailbox,
    to: Address,
    id_domain: &str,
) -> Result<Message, Error> {
    let mut builder = Message::builder()
        .from(from.clone())
        .to(Mailbox::new(None, to))
        .subject(message.subject.clone())
        .date_now()
        .message_id(Some(format!("<{}@{}>", Uuid::new_v4(), id_domain)));

    if let Some(ref reply_to) = message.reply_to {
        let address = reply_to
            .trim()
            .parse::<Address>()
            .map_err(|e| Error::Message(format!("invalid reply-to address {}: {}", reply_to, e)))?;
        builder = builder.reply_to(Mailbox::new(None, address));
    }

    let content_type = if message.html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };

    Ok(builder.header(content_type).body(message.body.clone())?)
}
