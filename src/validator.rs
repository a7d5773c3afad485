//! Network address checks used by option validation.

use std::net::IpAddr;

/// Splits `host:port`. IPv6 hosts must be bracketed (`[::1]:80`); the
/// brackets are stripped from the returned host.
pub fn split_host_port(addr: &str) -> Result<(&str, u16), String> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| format!("{addr:?} is not in a valid format (:port or ip:port): missing port"))?;
    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| format!("{addr:?} is not in a valid format: unbalanced brackets"))?,
        None if host.contains(':') => {
            return Err(format!("{addr:?} is not in a valid format: too many colons"))
        }
        None => host,
    };
    let port = port
        .parse::<u16>()
        .map_err(|_| format!("{port:?} is not a valid number"))?;
    Ok((host, port))
}

/// Accepts `:port` or `ip:port`. Hostnames are rejected.
pub fn validate_address(addr: &str) -> Result<(), String> {
    let (host, _) = split_host_port(addr)?;
    if !host.is_empty() && host.parse::<IpAddr>().is_err() {
        return Err(format!("{host:?} is not a valid IP address"));
    }
    Ok(())
}

/// Accepts `host:port` where the host is any non-empty name or IP.
pub fn validate_host_port(addr: &str) -> Result<(), String> {
    let (host, _) = split_host_port(addr)?;
    if host.is_empty() {
        return Err(format!("{addr:?} has an empty host"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ip_and_port_only_forms() {
        assert!(validate_address("0.0.0.0:5555").is_ok());
        assert!(validate_address(":8080").is_ok());
        assert!(validate_address("[::1]:443").is_ok());
    }

    #[test]
    fn rejects_hostnames_and_bad_ports() {
        assert!(validate_address("localhost:80")
            .unwrap_err()
            .contains("not a valid IP address"));
        assert!(validate_address("127.0.0.1:http")
            .unwrap_err()
            .contains("not a valid number"));
        assert!(validate_address("127.0.0.1").is_err());
        assert!(validate_address("::1:80").is_err());
    }

    #[test]
    fn host_port_allows_names() {
        assert_eq!(split_host_port("mysql:3306"), Ok(("mysql", 3306)));
        assert!(validate_host_port("mysql:3306").is_ok());
        assert!(validate_host_port(":3306").is_err());
    }
}
