use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Headers covered by the signature, in signing order, when present.
const SIGNED_HEADERS: &[&str] = &[
    "from",
    "reply-to",
    "to",
    "subject",
    "date",
    "message-id",
    "mime-version",
    "content-type",
    "content-transfer-encoding",
];

/// Produces DKIM-Signature headers (RFC 6376) for outgoing messages.
///
/// Signing policy is fixed: `rsa-sha256`, strict (`simple`) header
/// canonicalization, whitespace-tolerant (`relaxed`) body canonicalization,
/// a declared body length (`l=`), and the sender address as the identity
/// claim (`i=`). The key, domain and selector are set once at construction
/// and shared read-only across threads.
pub struct Signer {
    domain: String,
    selector: String,
    identity: String,
    signing_key: SigningKey<Sha256>,
}

impl Signer {
    pub fn new(domain: &str, selector: &str, identity: &str, key: RsaPrivateKey) -> Signer {
        Signer {
            domain: domain.to_owned(),
            selector: selector.to_owned(),
            identity: identity.to_owned(),
            signing_key: SigningKey::<Sha256>::new(key),
        }
    }

    /// Produce a signed copy of `message`: the DKIM-Signature header
    /// followed by the original bytes, which are never modified and may be
    /// re-signed later.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
        let header = self.signature_header(message, Utc::now().timestamp())?;
        let mut signed = Vec::with_capacity(header.len() + 2 + message.len());
        signed.extend_from_slice(header.as_bytes());
        signed.extend_from_slice(b"\r\n");
        signed.extend_from_slice(message);
        Ok(signed)
    }

    /// Compute the full `DKIM-Signature: ...` header for `message`.
    /// Deterministic for fixed content, key and timestamp.
    fn signature_header(&self, message: &[u8], timestamp: i64) -> Result<String, Error> {
        let (headers, body) = split_message(message)?;

        let canon_body = relaxed_body(&body);
        let body_hash = BASE64.encode(Sha256::digest(&canon_body));

        let selected: Vec<&RawHeader> = SIGNED_HEADERS
            .iter()
            .filter_map(|name| headers.iter().find(|h| h.name_lower == *name))
            .collect();

        let mut value = format!(
            "v=1; a=rsa-sha256; c=simple/relaxed; d={}; s={}; i={}; t={}; l={}; h={}; bh={}; b=",
            self.domain,
            self.selector,
            self.identity,
            timestamp,
            canon_body.len(),
            selected
                .iter()
                .map(|h| h.name.as_str())
                .collect::<Vec<&str>>()
                .join(":"),
            body_hash,
        );

        // Simple canonicalization: the signed headers byte for byte, then
        // this header itself with an empty b= and no trailing CRLF
        let mut data = String::new();
        for header in &selected {
            data.push_str(&header.raw);
            data.push_str("\r\n");
        }
        data.push_str("DKIM-Signature: ");
        data.push_str(&value);

        let signature = self.signing_key.sign(data.as_bytes());
        value.push_str(&BASE64.encode(signature.to_bytes()));

        Ok(format!("DKIM-Signature: {}", value))
    }
}

/// One header field exactly as it appears on the wire.
struct RawHeader {
    name: String,
    name_lower: String,
    /// The complete field including its name and any folded continuation
    /// lines, without the trailing CRLF.
    raw: String,
}

/// Split an RFC 5322 message into its header fields and body text.
fn split_message(message: &[u8]) -> Result<(Vec<RawHeader>, String), Error> {
    let text = String::from_utf8_lossy(message);

    let (header_section, body) = if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        return Err(Error::Signing(
            "no header/body separator in message".to_owned(),
        ));
    };

    let mut headers: Vec<RawHeader> = Vec::new();
    for line in header_section.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous field
            if let Some(last) = headers.last_mut() {
                last.raw.push_str("\r\n");
                last.raw.push_str(line);
            }
        } else if let Some(colon) = line.find(':') {
            let name = line[..colon].to_owned();
            headers.push(RawHeader {
                name_lower: name.to_lowercase(),
                name,
                raw: line.to_owned(),
            });
        }
    }

    Ok((headers, body.to_owned()))
}

/// Relaxed body canonicalization: collapse runs of whitespace to one space,
/// strip trailing whitespace per line and trailing empty lines, CRLF line
/// endings, exactly one final CRLF for a non-empty body.
fn relaxed_body(body: &str) -> Vec<u8> {
    let mut lines: Vec<String> = body
        .lines()
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            let mut in_wsp = false;
            for c in line.chars() {
                if c == ' ' || c == '\t' {
                    in_wsp = true;
                } else {
                    if in_wsp {
                        out.push(' ');
                    }
                    in_wsp = false;
                    out.push(c);
                }
            }
            out
        })
        .collect();

    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }

    let mut result = lines.join("\r\n");
    if !result.is_empty() {
        result.push_str("\r\n");
    }
    result.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::TEST_KEY_PKCS8;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;

    const MESSAGE: &[u8] = b"From: PostMaster <postmaster@example.com>\r\n\
To: admin@example.org\r\n\
Subject: This is test\r\n\
Date: Sat, 1 Mar 2025 12:00:00 +0000\r\n\
Message-ID: <abc123@example.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
This is test   body\r\n\
with  spaces\r\n\
\r\n\
\r\n";

    fn test_signer() -> Signer {
        let key = crate::key::parse_private_key(TEST_KEY_PKCS8).unwrap();
        Signer::new("example.com", "mail", "postmaster@example.com", key)
    }

    #[test]
    fn signature_is_deterministic_for_fixed_timestamp() {
        let signer = test_signer();
        let a = signer.signature_header(MESSAGE, 1_740_000_000).unwrap();
        let b = signer.signature_header(MESSAGE, 1_740_000_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_carries_fixed_policy_tags() {
        let signer = test_signer();
        let header = signer.signature_header(MESSAGE, 1_740_000_000).unwrap();
        assert!(header.starts_with("DKIM-Signature: v=1; a=rsa-sha256; c=simple/relaxed;"));
        assert!(header.contains("d=example.com;"));
        assert!(header.contains("s=mail;"));
        assert!(header.contains("i=postmaster@example.com;"));
        assert!(header.contains("t=1740000000;"));
        assert!(header.contains("h=From:To:Subject:Date:Message-ID:Content-Type;"));
    }

    #[test]
    fn declared_length_and_body_hash_match_canonical_body() {
        let signer = test_signer();
        let header = signer.signature_header(MESSAGE, 1_740_000_000).unwrap();

        let canon = relaxed_body("This is test   body\r\nwith  spaces\r\n\r\n\r\n");
        assert_eq!(
            canon,
            b"This is test body\r\nwith spaces\r\n".to_vec()
        );
        assert!(header.contains(&format!("l={};", canon.len())));
        let bh = BASE64.encode(Sha256::digest(&canon));
        assert!(header.contains(&format!("bh={};", bh)));
    }

    #[test]
    fn signature_verifies_against_the_public_key() {
        let signer = test_signer();
        let header = signer.signature_header(MESSAGE, 1_740_000_000).unwrap();

        // Reconstruct the signed data the way a verifier would
        let value = header.strip_prefix("DKIM-Signature: ").unwrap();
        let b_at = value.rfind("b=").unwrap();
        let (unsigned_value, sig_b64) = (&value[..b_at + 2], &value[b_at + 2..]);

        let (headers, _) = split_message(MESSAGE).unwrap();
        let mut data = String::new();
        for h in &headers {
            data.push_str(&h.raw);
            data.push_str("\r\n");
        }
        data.push_str("DKIM-Signature: ");
        data.push_str(unsigned_value);

        let key = crate::key::parse_private_key(TEST_KEY_PKCS8).unwrap();
        let verifying_key = VerifyingKey::<Sha256>::new(RsaPublicKey::from(&key));
        let signature = Signature::try_from(BASE64.decode(sig_b64).unwrap().as_slice()).unwrap();
        verifying_key.verify(data.as_bytes(), &signature).unwrap();
    }

    #[test]
    fn signing_does_not_modify_the_original() {
        let signer = test_signer();
        let original = MESSAGE.to_vec();
        let signed = signer.sign(MESSAGE).unwrap();
        assert_eq!(MESSAGE, &original[..]);
        assert!(signed.ends_with(MESSAGE));
        assert!(signed.starts_with(b"DKIM-Signature: "));
    }

    #[test]
    fn unsplittable_message_is_a_signing_error() {
        let signer = test_signer();
        assert!(matches!(
            signer.sign(b"no separator here"),
            Err(Error::Signing(_))
        ));
    }

    #[test]
    fn relaxed_body_of_empty_body_is_empty() {
        assert!(relaxed_body("").is_empty());
        assert!(relaxed_body("\r\n\r\n").is_empty());
    }

    #[test]
    fn folded_headers_keep_their_folds_for_simple_canonicalization() {
        let message = b"Subject: a folded\r\n subject line\r\nFrom: a@b.c\r\n\r\nbody\r\n";
        let (headers, _) = split_message(message).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].raw, "Subject: a folded\r\n subject line");
    }
}
