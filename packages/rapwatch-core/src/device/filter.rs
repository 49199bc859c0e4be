//! Personal-computer policy for wired client lists.
//!
//! Routers report printers, phones and cameras alongside desktops. When
//! `only_pc` is enabled a client is kept if it reports a Windows OS label, or
//! if its MAC vendor prefix is on the configured allow-list (for machines the
//! router cannot fingerprint).

use super::ClientRecord;

/// Number of MAC characters compared against the allow-list (`xx:xx:xx`).
const MAC_PREFIX_LEN: usize = 8;

/// Placeholder address reported for clients without a lease.
const UNASSIGNED_IP: &str = "0.0.0.0";

#[derive(Debug, Clone, Default)]
pub struct PcFilter {
    only_pc: bool,
    include_mac: Vec<String>,
}

impl PcFilter {
    pub fn new(only_pc: bool, include_mac: &[String]) -> Self {
        let include_mac = include_mac
            .iter()
            .map(|mac| mac_prefix(mac))
            .filter(|prefix| !prefix.is_empty())
            .collect();

        Self {
            only_pc,
            include_mac,
        }
    }

    /// Whether a client belongs in the stored snapshot.
    pub fn keep(&self, record: &ClientRecord) -> bool {
        if record.ip == UNASSIGNED_IP {
            return false;
        }
        if !self.only_pc {
            return true;
        }
        if record.os.starts_with("Win") {
            return true;
        }

        let prefix = mac_prefix(&record.mac);
        self.include_mac.iter().any(|allowed| prefix.starts_with(allowed.as_str()))
    }
}

/// First eight characters of a MAC address, lower-cased.
fn mac_prefix(mac: &str) -> String {
    mac.trim()
        .chars()
        .take(MAC_PREFIX_LEN)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(ip: &str, mac: &str, os: &str) -> ClientRecord {
        ClientRecord {
            name: "client".to_string(),
            ip: ip.to_string(),
            mac: mac.to_string(),
            os: os.to_string(),
            network: "eth1".to_string(),
            access_point: "00:0b:86:00:00:01".to_string(),
            role: "default".to_string(),
        }
    }

    #[test]
    fn test_allow_listed_mac_is_kept_without_os() {
        let filter = PcFilter::new(true, &["c0:3f:d5:7e".to_string()]);
        assert!(filter.keep(&client("10.0.0.5", "C0:3F:D5:7E:FD:EE:11:22", "")));
    }

    #[test]
    fn test_full_mac_allow_list_entries_are_truncated() {
        let filter = PcFilter::new(true, &["C0:3F:D5:7E:FD:EE".to_string()]);
        assert!(filter.keep(&client("10.0.0.5", "c0:3f:d5:7e:00:01", "")));
        assert!(filter.keep(&client("10.0.0.5", "c0:3f:d5:00:00:01", "")));
        assert!(!filter.keep(&client("10.0.0.5", "c0:3f:d6:7e:fd:ee", "")));
    }

    #[test]
    fn test_windows_clients_are_kept() {
        let filter = PcFilter::new(true, &[]);
        assert!(filter.keep(&client("10.0.0.5", "aa:bb:cc:dd:ee:ff", "Win10")));
        assert!(!filter.keep(&client("10.0.0.6", "aa:bb:cc:dd:ee:ff", "Linux")));
        assert!(!filter.keep(&client("10.0.0.7", "aa:bb:cc:dd:ee:ff", "")));
    }

    #[test]
    fn test_unassigned_ip_is_always_dropped() {
        let filter = PcFilter::new(true, &["aa:bb:cc:dd".to_string()]);
        assert!(!filter.keep(&client("0.0.0.0", "aa:bb:cc:dd:ee:ff", "Win10")));

        let open = PcFilter::new(false, &[]);
        assert!(!open.keep(&client("0.0.0.0", "aa:bb:cc:dd:ee:ff", "Win10")));
    }

    #[test]
    fn test_policy_disabled_keeps_everything_else() {
        let filter = PcFilter::new(false, &[]);
        assert!(filter.keep(&client("10.0.0.8", "00:1b:a9:11:22:33", "")));
    }
}
