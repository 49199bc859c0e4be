//! Column table parsing for `show clients wired` output.
//!
//! The device prints a human-readable table:
//!
//! ```text
//! Name  IP Address   MAC Address        OS      Network  Access Point       Role           Speed (mbps)
//! ----  ----------   -----------        --      -------  ------------       ----           ------------
//! pc-01  10.0.0.5  aa:bb:cc:dd:ee:ff  Win10  eth1  00:11:22:33:44:55  Mac-Auth  100
//! ```
//!
//! Columns are separated by at least two spaces. Rows are matched against a
//! fixed positional pattern; anything else (headers, separators, banners) is
//! counted as unparsed and skipped.

use super::ClientRecord;
use regex::Regex;
use std::sync::LazyLock;

/// Name, IP, MAC, OS, network (`eth` + digit), access point, role.
/// The trailing column (speed) is matched but not captured.
pub const WIRED_CLIENT_PATTERN: &str = r"(.+)\s{2}([.0-9]+)\s{2,}([:a-zA-Z0-9]+)\s{2}(.+)\s{2}(eth\d)\s+([:a-zA-Z0-9]+)\s{2}(.+?)\s{2}.*";

static WIRED_CLIENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(WIRED_CLIENT_PATTERN).expect("wired client pattern is valid"));

/// Result of parsing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    pub records: Vec<ClientRecord>,
    /// Non-blank lines that did not match the row pattern
    pub unparsed: usize,
}

/// Trait for client table parsers - regex by default, swappable for a
/// stricter tokenizer without touching callers.
pub trait TableParser: Send + Sync {
    fn parse(&self, text: &str) -> ParsedTable;
}

/// Regex-based positional parser (the default implementation).
#[derive(Debug, Clone)]
pub struct ColumnPatternParser {
    pattern: Regex,
}

impl ColumnPatternParser {
    /// Create a parser from a pattern with exactly seven capture groups.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(pattern)?;
        if pattern.captures_len() != 8 {
            return Err(regex::Error::Syntax(format!(
                "expected 7 capture groups, found {}",
                pattern.captures_len() - 1
            )));
        }
        Ok(Self { pattern })
    }

    fn parse_line(&self, line: &str) -> Option<ClientRecord> {
        let caps = self.pattern.captures(line)?;
        let field = |i: usize| {
            caps.get(i)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Some(ClientRecord {
            name: field(1),
            ip: field(2),
            mac: field(3),
            os: field(4),
            network: field(5),
            access_point: field(6),
            role: field(7),
        })
    }
}

impl Default for ColumnPatternParser {
    fn default() -> Self {
        Self {
            pattern: WIRED_CLIENT_REGEX.clone(),
        }
    }
}

impl TableParser for ColumnPatternParser {
    fn parse(&self, text: &str) -> ParsedTable {
        let mut table = ParsedTable::default();

        for line in text.lines() {
            match self.parse_line(line) {
                Some(record) => table.records.push(record),
                None if line.trim().is_empty() => {}
                None => table.unparsed += 1,
            }
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Wired Clients
-------------
Name      IP Address  MAC Address        OS     Network  Access Point       Role      Speed (mbps)
----      ----------  -----------        --     -------  ------------       ----      ------------
John Doe  10.0.0.5  aa:bb:cc:dd:ee:ff  Win10  eth1  00:11:22:33:44:55  Mac-Auth  54
printer-2  10.0.0.9  00:1b:a9:11:22:33     eth2  00:11:22:33:44:55  default  100

Number of Clients   :2
";

    #[test]
    fn test_parse_example_line() {
        let parser = ColumnPatternParser::default();
        let table = parser.parse(
            "John Doe  10.0.0.5  aa:bb:cc:dd:ee:ff  Win10  eth1  00:11:22:33:44:55  Mac-Auth  54",
        );

        assert_eq!(table.records.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.name, "John Doe");
        assert_eq!(record.ip, "10.0.0.5");
        assert_eq!(record.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(record.os, "Win10");
        assert_eq!(record.network, "eth1");
        assert_eq!(record.access_point, "00:11:22:33:44:55");
        assert_eq!(record.role, "Mac-Auth");
    }

    #[test]
    fn test_parse_skips_headers_and_counts_unparsed() {
        let parser = ColumnPatternParser::default();
        let table = parser.parse(SAMPLE);

        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[1].name, "printer-2");
        assert_eq!(table.records[1].os, "");
        assert_eq!(table.records[1].network, "eth2");
        // title, underline, header, separator, footer
        assert_eq!(table.unparsed, 5);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = ColumnPatternParser::default();
        assert_eq!(parser.parse(SAMPLE), parser.parse(SAMPLE));
    }

    #[test]
    fn test_padded_columns_are_trimmed() {
        let parser = ColumnPatternParser::default();
        let table = parser.parse(
            "  desk-7     10.1.2.3      a4:bb:6d:01:02:03  Win 7     eth0     00:0b:86:aa:bb:cc  guest      1000  \r",
        );

        assert_eq!(table.records.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.name, "desk-7");
        assert_eq!(record.os, "Win 7");
        assert_eq!(record.network, "eth0");
        assert_eq!(record.role, "guest");
    }

    #[test]
    fn test_non_ethernet_network_is_rejected() {
        let parser = ColumnPatternParser::default();
        let table = parser.parse(
            "phone  10.0.0.7  aa:bb:cc:dd:ee:01  iOS  wlan0  00:11:22:33:44:55  user  54",
        );
        assert!(table.records.is_empty());
        assert_eq!(table.unparsed, 1);
    }

    #[test]
    fn test_custom_pattern_needs_seven_groups() {
        assert!(ColumnPatternParser::new(r"(\S+)\s+(\S+)").is_err());
        assert!(ColumnPatternParser::new(WIRED_CLIENT_PATTERN).is_ok());
    }
}
