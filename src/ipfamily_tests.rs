// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ipfamily.rs`

#[cfg(test)]
mod tests {
    use crate::ipfamily::{family, IpFamily};
    use std::net::IpAddr;

    #[test]
    fn test_ipv4_literals() {
        for literal in ["10.0.0.1", "0.0.0.0", "255.255.255.255", "192.168.1.10"] {
            assert_eq!(family(literal).unwrap(), IpFamily::Ipv4, "{literal}");
        }
    }

    #[test]
    fn test_ipv6_literals() {
        for literal in ["2001:db8::1", "::1", "::", "fe80::1", "2001:0db8:0000:0000:0000:0000:0000:0001"] {
            assert_eq!(family(literal).unwrap(), IpFamily::Ipv6, "{literal}");
        }
    }

    #[test]
    fn test_ipv4_mapped_ipv6_is_ipv6() {
        assert_eq!(family("::ffff:10.0.0.1").unwrap(), IpFamily::Ipv6);
        assert_eq!(family("::ffff:192.168.0.1").unwrap(), IpFamily::Ipv6);
    }

    #[test]
    fn test_rejects_non_literals() {
        for literal in ["", "10.0.0.1:443", "[2001:db8::1]", "host.example.com", "10.0.0.0/8"] {
            assert!(family(literal).is_err(), "{literal} should be rejected");
        }
    }

    /// Every literal the standard parser accepts is classified.
    #[test]
    fn test_classifier_is_total_over_parser() {
        let samples = [
            "1.2.3.4",
            "127.0.0.1",
            "::ffff:1.2.3.4",
            "64:ff9b::1.2.3.4",
            "2600:1f18::",
            "::",
        ];
        for literal in samples {
            assert!(literal.parse::<IpAddr>().is_ok());
            let classified = family(literal).unwrap();
            let expected = if literal.contains(':') {
                IpFamily::Ipv6
            } else {
                IpFamily::Ipv4
            };
            assert_eq!(classified, expected, "{literal}");
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("ipv4".parse::<IpFamily>().unwrap(), IpFamily::Ipv4);
        assert_eq!("IPv6".parse::<IpFamily>().unwrap(), IpFamily::Ipv6);
        assert_eq!("v6".parse::<IpFamily>().unwrap(), IpFamily::Ipv6);
        assert!("ipv5".parse::<IpFamily>().is_err());
        assert_eq!(IpFamily::Ipv4.to_string(), "ipv4");
    }
}
