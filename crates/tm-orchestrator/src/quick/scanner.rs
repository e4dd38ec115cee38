//! Provider URL detection in tunnel output
//!
//! `cloudflared` announces a quick tunnel with a banner somewhere in its log
//! output, e.g.
//!
//! ```text
//! 2024-01-15T10:00:00Z INF |  https://abc-def.trycloudflare.com  |
//! ```
//!
//! The first whitespace-delimited `https://<subdomain>.trycloudflare.com` on a
//! line is the public endpoint. The provider's own API host is not a tunnel.

/// Public domain under which quick tunnels are assigned
pub const PROVIDER_DOMAIN: &str = ".trycloudflare.com";

const SCHEME: &str = "https://";

/// Provider hosts that show up in error messages but never name a tunnel
const RESERVED_SUBDOMAINS: &[&str] = &["api"];

/// Extract the assigned tunnel URL from one line of output
pub fn extract_tunnel_url(line: &str) -> Option<String> {
    let mut rest = line;
    while let Some(start) = rest.find(SCHEME) {
        let candidate = &rest[start..];
        let end = candidate
            .find(char::is_whitespace)
            .unwrap_or(candidate.len());
        let token = &candidate[..end];

        if let Some(domain_at) = token.rfind(PROVIDER_DOMAIN) {
            let subdomain = &token[SCHEME.len()..domain_at.max(SCHEME.len())];
            if is_valid_subdomain(subdomain) {
                return Some(token[..domain_at + PROVIDER_DOMAIN.len()].to_string());
            }
        }

        rest = &candidate[SCHEME.len()..];
    }
    None
}

fn is_valid_subdomain(subdomain: &str) -> bool {
    !subdomain.is_empty()
        && !RESERVED_SUBDOMAINS.contains(&subdomain)
        && !subdomain.starts_with(['-', '.'])
        && subdomain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
