//! URL-encoded form parsing for the config page POST handler.

use std::str::FromStr;

/// Reverses `application/x-www-form-urlencoded` escaping: `+` becomes a
/// space and `%XX` hex pairs decode to the raw byte. Malformed escapes
/// are passed through literally rather than rejected, so a stray `%` in
/// a password still round-trips.
pub fn url_decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => {
                        out.push(b);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Raw (still-encoded) value of `key` in a `k=v&k=v` body.
pub fn field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then_some(v)
    })
}

pub fn decoded_field(body: &str, key: &str) -> Option<String> {
    field(body, key).map(url_decode)
}

/// URL-decoded value of a field that must be present.
pub fn required_field(body: &str, key: &str) -> anyhow::Result<String> {
    decoded_field(body, key).ok_or_else(|| anyhow::anyhow!("Missing parameter: {}", key))
}

/// Numeric field, URL-decoded then parsed. Range errors surface as the
/// parse failure (e.g. priority 300 does not fit in u8).
pub fn numeric_field<T>(body: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required_field(body, key)?;
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e))
}

/// Dotted-decimal IPv4 address as four octets.
pub fn parse_ipv4(s: &str) -> anyhow::Result<[u8; 4]> {
    let addr: std::net::Ipv4Addr = s
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid IP address: {}", s))?;
    Ok(addr.octets())
}

pub fn ipv4_field(body: &str, key: &str) -> anyhow::Result<[u8; 4]> {
    parse_ipv4(&required_field(body, key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_and_percent_escapes() {
        assert_eq!(url_decode("my+home+net"), "my home net");
        assert_eq!(url_decode("p%40ss%26word"), "p@ss&word");
        assert_eq!(url_decode("100%25"), "100%");
    }

    #[test]
    fn malformed_escapes_pass_through() {
        assert_eq!(url_decode("50%"), "50%");
        assert_eq!(url_decode("a%zz"), "a%zz");
        assert_eq!(url_decode("%4"), "%4");
    }

    #[test]
    fn field_lookup_is_exact() {
        let body = "action=add&ssid=net&password=&port=8888";
        assert_eq!(field(body, "action"), Some("add"));
        assert_eq!(field(body, "password"), Some(""));
        assert_eq!(field(body, "port"), Some("8888"));
        // "ssid" must not match the tail of another key
        assert_eq!(field("xssid=no", "ssid"), None);
        assert_eq!(field(body, "index"), None);
    }

    #[test]
    fn decoded_field_applies_url_decoding() {
        let body = "ssid=caf%C3%A9+5G&password=a%2Bb";
        assert_eq!(decoded_field(body, "ssid").unwrap(), "café 5G");
        assert_eq!(decoded_field(body, "password").unwrap(), "a+b");
    }

    #[test]
    fn numeric_field_rejects_out_of_range() {
        assert_eq!(numeric_field::<u8>("priority=200", "priority").unwrap(), 200);
        assert!(numeric_field::<u8>("priority=300", "priority").is_err());
        assert!(numeric_field::<u16>("port=abc", "port").is_err());
        assert!(numeric_field::<u16>("other=1", "port").is_err());
    }

    #[test]
    fn parses_ipv4_octets() {
        assert_eq!(parse_ipv4("192.168.1.100").unwrap(), [192, 168, 1, 100]);
        assert_eq!(parse_ipv4("255.255.255.0").unwrap(), [255, 255, 255, 0]);
        assert!(parse_ipv4("192.168.1").is_err());
        assert!(parse_ipv4("192.168.1.256").is_err());
        assert!(parse_ipv4("not-an-ip").is_err());
    }
}
