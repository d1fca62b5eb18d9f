//! Capacity statistics from `df -mn`.
//!
//! `df` lists one mounted filesystem per line, first column being the device
//! path (`/dev/disk1s1`) or the remote share (`//user@host/share`). A volume
//! is considered mounted exactly when its identifier starts a line.

use regex::Regex;

/// Command producing the capacity table, sizes in 1M-blocks.
pub const DF_COMMAND: &str = "/bin/df -mn";

/// Capacity of one mounted filesystem, in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    pub megs_total: u64,
    pub megs_used: u64,
    pub megs_free: u64,
    pub percent_used: u64,
}

impl DiskStats {
    /// Complement of `percent_used`.
    pub fn percent_free(&self) -> u64 {
        100u64.saturating_sub(self.percent_used)
    }
}

/// Finds the `df` line for `identifier` and extracts its capacity columns.
///
/// Returns `None` if the identifier is empty or no line starts with it,
/// which callers treat as "not mounted".
pub fn find_stats(df_output: &str, identifier: &str) -> Option<DiskStats> {
    if identifier.is_empty() {
        return None;
    }

    let pattern = format!(
        r"(?m)^{} +(\d+) +(\d+) +(\d+) +(\d+)% .*$",
        regex::escape(identifier)
    );
    // An escaped literal followed by a fixed suffix always compiles.
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(df_output)?;

    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

    Some(DiskStats {
        megs_total: field(1)?,
        megs_used: field(2)?,
        megs_free: field(3)?,
        percent_used: field(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DF: &str = "\
Filesystem                 1M-blocks   Used Available Capacity   iused      ifree %iused  Mounted on
/dev/disk1s1                  476802 310412    160190    66% 1841255 4881010465    0%   /
devfs                              0      0         0   100%     618          0  100%   /dev
/dev/disk1s4                  476802   3073    160190     2%       3 4882851717    0%   /private/var/vm
/dev/disk2s2                 3815447 2048000   1767447    54%  421337 4294545942    0%   /Volumes/Backup Drive
//guest@nas.local/media      1907348 953674    953674    50%       0          0  100%   /Volumes/media
/dev/disk1s10                 476802     12    160190     1%     483 4882851237    0%   /System/Volumes/Update";

    #[test]
    fn test_finds_local_volume() {
        let stats = find_stats(SAMPLE_DF, "/dev/disk2s2").unwrap();
        assert_eq!(
            stats,
            DiskStats {
                megs_total: 3815447,
                megs_used: 2048000,
                megs_free: 1767447,
                percent_used: 54,
            }
        );
        assert_eq!(stats.percent_free(), 46);
    }

    #[test]
    fn test_finds_network_share() {
        let stats = find_stats(SAMPLE_DF, "//guest@nas.local/media").unwrap();
        assert_eq!(stats.megs_total, 1907348);
        assert_eq!(stats.percent_used + stats.percent_free(), 100);
    }

    #[test]
    fn test_identifier_must_be_the_whole_first_field() {
        // "/dev/disk1s1" is a prefix of "/dev/disk1s10" but must not match it.
        let stats = find_stats(SAMPLE_DF, "/dev/disk1s1").unwrap();
        assert_eq!(stats.megs_used, 310412);
        assert!(find_stats(SAMPLE_DF, "/dev/disk1").is_none());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(find_stats(SAMPLE_DF, "//guest@nas.local/med.a").is_none());
    }

    #[test]
    fn test_empty_identifier_never_matches() {
        assert!(find_stats(SAMPLE_DF, "").is_none());
        assert!(find_stats(" 476802 310412 160190 66% /", "").is_none());
    }

    #[test]
    fn test_missing_volume_is_unmounted() {
        assert!(find_stats(SAMPLE_DF, "/dev/disk9s1").is_none());
        assert!(find_stats("", "/dev/disk2s2").is_none());
    }

    #[test]
    fn test_full_volume_has_zero_free_percent() {
        let line = "/dev/disk3s1 100 100 0 100% 1 2 0% /Volumes/Full";
        let stats = find_stats(line, "/dev/disk3s1").unwrap();
        assert_eq!(stats.percent_free(), 0);
    }
}
