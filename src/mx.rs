use log::{debug, info};

use crate::dns::DnsClient;
use crate::error::Error;

/// One place we may try to deliver to, with its DNS-advertised preference
/// (lower is preferred). `host` is a resolved address for normal MX
/// records, or the bare domain for the RFC 974 fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxCandidate {
    pub priority: u16,
    pub host: String,
}

/// Determine the ordered list of hosts to attempt delivery to for `domain`.
///
/// A failed lookup of the domain itself is a hard error. A domain with no
/// MX records yields the domain itself as the sole candidate (RFC 974).
/// Malformed MX records and exchange hostnames that fail to resolve are
/// skipped and logged; if everything gets skipped the result is empty and
/// the caller must treat that as "no route".
pub fn resolve<D: DnsClient + ?Sized>(dns: &D, domain: &str) -> Result<Vec<MxCandidate>, Error> {
    let records = dns.query_mx(domain).map_err(|e| Error::Resolution {
        domain: domain.to_owned(),
        reason: e.to_string(),
    })?;

    // No MX records: mail routing falls back to the domain's own
    // A/AAAA record (RFC 974)
    if records.is_empty() {
        return Ok(vec![MxCandidate {
            priority: 0,
            host: domain.to_owned(),
        }]);
    }

    let mut candidates: Vec<MxCandidate> = Vec::new();
    for record in &records {
        let (priority, exchange) = match parse_record(record) {
            Some(parsed) => parsed,
            None => {
                debug!("invalid mx record: {}", record);
                continue;
            }
        };
        match dns.resolve_host(exchange) {
            Ok(addrs) => {
                for addr in addrs {
                    candidates.push(MxCandidate {
                        priority,
                        host: addr.to_string(),
                    });
                }
            }
            Err(e) => {
                info!("unable to resolve host: {} skipping: {}", exchange, e);
            }
        }
    }

    // Stable: candidates from equal-priority records keep resolution order
    candidates.sort_by_key(|c| c.priority);

    Ok(candidates)
}

/// Split a textual MX record into preference and exchange name, with the
/// trailing root dot trimmed. Returns `None` for records with no separating
/// space or a non-numeric preference.
fn parse_record(record: &str) -> Option<(u16, &str)> {
    let space = record.find(' ')?;
    let priority: u16 = record[..space].parse().ok()?;
    let exchange = record[space + 1..].trim_end_matches('.');
    if exchange.is_empty() {
        return None;
    }
    Some((priority, exchange))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DnsClient, DnsError};
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDns {
        mx: Result<Vec<String>, String>,
        hosts: HashMap<String, Vec<IpAddr>>,
        mx_queries: AtomicUsize,
    }

    impl FakeDns {
        fn new(mx: Result<Vec<&str>, &str>, hosts: &[(&str, &[&str])]) -> FakeDns {
            FakeDns {
                mx: mx
                    .map(|v| v.into_iter().map(str::to_owned).collect())
                    .map_err(str::to_owned),
                hosts: hosts
                    .iter()
                    .map(|(h, ips)| {
                        (
                            (*h).to_owned(),
                            ips.iter().map(|ip| ip.parse().unwrap()).collect(),
                        )
                    })
                    .collect(),
                mx_queries: AtomicUsize::new(0),
            }
        }
    }

    impl DnsClient for FakeDns {
        fn query_mx(&self, _domain: &str) -> Result<Vec<String>, DnsError> {
            self.mx_queries.fetch_add(1, Ordering::SeqCst);
            self.mx.clone().map_err(DnsError)
        }

        fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
            self.hosts
                .get(host)
                .cloned()
                .ok_or_else(|| DnsError(format!("unknown host {}", host)))
        }
    }

    #[test]
    fn candidates_sorted_by_priority() {
        let dns = FakeDns::new(
            Ok(vec![
                "20 backup.example.com.",
                "10 primary.example.com.",
                "30 last.example.com.",
            ]),
            &[
                ("backup.example.com", &["192.0.2.2"]),
                ("primary.example.com", &["192.0.2.1"]),
                ("last.example.com", &["192.0.2.3"]),
            ],
        );
        let candidates = resolve(&dns, "example.com").unwrap();
        let hosts: Vec<&str> = candidates.iter().map(|c| c.host.as_str()).collect();
        assert_eq!(hosts, vec!["192.0.2.1", "192.0.2.2", "192.0.2.3"]);
        assert_eq!(candidates[0].priority, 10);
    }

    #[test]
    fn equal_priorities_keep_resolution_order() {
        let dns = FakeDns::new(
            Ok(vec![
                "10 a.example.com.",
                "10 b.example.com.",
                "5 c.example.com.",
            ]),
            &[
                ("a.example.com", &["192.0.2.1"]),
                ("b.example.com", &["192.0.2.2"]),
                ("c.example.com", &["192.0.2.3"]),
            ],
        );
        let candidates = resolve(&dns, "example.com").unwrap();
        let hosts: Vec<&str> = candidates.iter().map(|c| c.host.as_str()).collect();
        assert_eq!(hosts, vec!["192.0.2.3", "192.0.2.1", "192.0.2.2"]);
    }

    #[test]
    fn multi_homed_exchange_yields_one_candidate_per_address() {
        let dns = FakeDns::new(
            Ok(vec!["10 mx.example.com."]),
            &[("mx.example.com", &["192.0.2.1", "192.0.2.2"])],
        );
        let candidates = resolve(&dns, "example.com").unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.priority == 10));
    }

    #[test]
    fn no_mx_records_falls_back_to_domain() {
        let dns = FakeDns::new(Ok(vec![]), &[]);
        let candidates = resolve(&dns, "example.com").unwrap();
        assert_eq!(
            candidates,
            vec![MxCandidate {
                priority: 0,
                host: "example.com".to_owned()
            }]
        );
    }

    #[test]
    fn failed_domain_lookup_is_an_error() {
        let dns = FakeDns::new(Err("NXDOMAIN"), &[]);
        match resolve(&dns, "no-such.example") {
            Err(Error::Resolution { domain, .. }) => assert_eq!(domain, "no-such.example"),
            other => panic!("expected Resolution error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_records_are_skipped() {
        let dns = FakeDns::new(
            Ok(vec![
                "garbage-without-space",
                "notanumber mx.example.com.",
                "10 mx.example.com.",
            ]),
            &[("mx.example.com", &["192.0.2.1"])],
        );
        let candidates = resolve(&dns, "example.com").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].host, "192.0.2.1");
    }

    #[test]
    fn unresolvable_exchanges_are_skipped() {
        let dns = FakeDns::new(
            Ok(vec!["10 dead.example.com.", "20 live.example.com."]),
            &[("live.example.com", &["192.0.2.9"])],
        );
        let candidates = resolve(&dns, "example.com").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].host, "192.0.2.9");
    }

    #[test]
    fn all_unresolvable_yields_empty_not_error() {
        let dns = FakeDns::new(Ok(vec!["10 dead.example.com."]), &[]);
        let candidates = resolve(&dns, "example.com").unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn trailing_dot_is_optional() {
        assert_eq!(parse_record("10 mx.example.com."), Some((10, "mx.example.com")));
        assert_eq!(parse_record("10 mx.example.com"), Some((10, "mx.example.com")));
        assert_eq!(parse_record("nospace"), None);
    }
}
