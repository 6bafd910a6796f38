use std::net::IpAddr;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::Resolver;

use crate::error::Error;

/// A failed DNS query. Whether this aborts the whole resolution or merely
/// skips one exchange host is the caller's decision.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DnsError(pub String);

/// The DNS questions the delivery engine needs answered.
///
/// `query_mx` returns records in their textual `"<preference> <exchange>"`
/// form. An `Ok` with an empty vector means the domain exists but publishes
/// no MX records; an `Err` means the lookup of the domain itself failed
/// (NXDOMAIN included).
pub trait DnsClient: Send + Sync {
    fn query_mx(&self, domain: &str) -> Result<Vec<String>, DnsError>;
    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError>;
}

/// `DnsClient` backed by trust-dns, using the operating system's resolver
/// configuration when available.
pub struct SystemDns {
    resolver: Resolver,
}

impl SystemDns {
    pub fn new() -> Result<SystemDns, Error> {
        let resolver = Resolver::from_system_conf()
            .or_else(|_| Resolver::new(ResolverConfig::default(), ResolverOpts::default()))
            .map_err(|e| Error::Resolver(e.to_string()))?;
        Ok(SystemDns { resolver })
    }
}

impl DnsClient for SystemDns {
    fn query_mx(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.mx_lookup(domain) {
            Ok(response) => Ok(response
                .iter()
                .map(|mx| format!("{} {}", mx.preference(), mx.exchange()))
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. }
                    if *response_code == ResponseCode::NoError =>
                {
                    // Domain exists, just no MX records published
                    Ok(Vec::new())
                }
                _ => Err(DnsError(e.to_string())),
            },
        }
    }

    fn resolve_host(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .map_err(|e| DnsError(e.to_string()))?;
        Ok(lookup.iter().collect())
    }
}
