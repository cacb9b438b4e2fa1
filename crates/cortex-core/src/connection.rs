/// Resolve the scheme used in the `cortexdb://` connection-string example
/// printed at bootstrap. `https` when the port is 443, when the host
/// contains `cortexdb.com`, or when the host is not a loopback literal;
/// `http` otherwise.
pub fn resolve_scheme(host: &str, port: u16) -> &'static str {
    let is_loopback = matches!(host, "localhost" | "127.0.0.1" | "::1");
    if port == 443 || host.contains("cortexdb.com") || !is_loopback {
        "https"
    } else {
        "http"
    }
}

/// Format the `cortexdb://[key@]host[:port]` connection string shown in
/// the bootstrap banner. The `cortexdb://` scheme is literal here; an SDK
/// resolving the actual transport for this string uses `resolve_scheme`
/// to decide between `http` and `https`.
pub fn format_connection_string(key: Option<&str>, host: &str, port: u16) -> String {
    match key {
        Some(k) => format!("cortexdb://{k}@{host}:{port}"),
        None => format!("cortexdb://{host}:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_http() {
        assert_eq!(resolve_scheme("localhost", 8000), "http");
        assert_eq!(resolve_scheme("127.0.0.1", 8000), "http");
    }

    #[test]
    fn non_loopback_is_https() {
        assert_eq!(resolve_scheme("db.example.com", 8000), "https");
    }

    #[test]
    fn port_443_is_https() {
        assert_eq!(resolve_scheme("localhost", 443), "https");
    }

    #[test]
    fn cortexdb_dot_com_is_https() {
        assert_eq!(resolve_scheme("gateway.cortexdb.com", 8000), "https");
    }

    #[test]
    fn connection_string_includes_key() {
        let s = format_connection_string(Some("cortexdb_admin_abc"), "localhost", 8000);
        assert_eq!(s, "cortexdb://cortexdb_admin_abc@localhost:8000");
    }
}
