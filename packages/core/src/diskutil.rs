//! Volume discovery from `diskutil list`.
//!
//! `diskutil list` prints one table per disk. Partition rows look like:
//!
//! ```text
//!    #:                       TYPE NAME                    SIZE       IDENTIFIER
//!    2:          Apple_CoreStorage Data                    999.3 GB   disk0s2
//!    1:                APFS Volume Macintosh HD            15.3 GB    disk1s1
//! ```
//!
//! The type column is right-aligned to a fixed width and may itself contain
//! spaces, so it is cut by position rather than by whitespace.

use std::sync::LazyLock;

use regex::Regex;

/// Command listing all disks and partitions.
pub const DISKUTIL_LIST_COMMAND: &str = "/usr/sbin/diskutil list";

/// Partition types that wrap other volumes rather than hold a filesystem.
///
/// A volume inside a CoreStorage or APFS container shows up twice; the row
/// with the wrapper type must never be chosen.
pub const WRAPPER_TYPES: &[&str] = &["Apple_CoreStorage", "Apple_APFS"];

/// Width of the TYPE column, counted from just after `N:`.
const TYPE_WIDTH: usize = 27;

/// Directional isolates newer `diskutil` releases wrap volume names in.
const NAME_ISOLATES: &[char] = &['\u{2068}', '\u{2069}'];

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<slot>\d+):(?P<rest>.*?)\s+(?P<size>[*+]?(?:\d+(?:\.\d+)?|Zero)\s+[KMGTPE]?B)\s+(?P<ident>disk\d+(?:s\d+)*)\s*$",
    )
    .expect("partition row pattern is valid")
});

/// One partition row of `diskutil list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    /// Slot number within its disk (the `#` column).
    pub slot: u32,
    /// Partition or volume type (e.g., "Apple_HFS", "APFS Volume").
    pub partition_type: String,
    /// Volume name, empty if the row has none.
    pub name: String,
    /// Size as printed, including any `*`/`+` marker.
    pub size: String,
    /// BSD identifier without the `/dev/` prefix (e.g., "disk1s1").
    pub identifier: String,
}

impl PartitionEntry {
    /// Full device-file path for this partition.
    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.identifier)
    }

    /// Returns true if this row is a logical-volume container.
    pub fn is_wrapper(&self) -> bool {
        WRAPPER_TYPES.contains(&self.partition_type.as_str())
    }
}

/// The concrete device a configured volume name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVolume {
    /// Device-file path (e.g., "/dev/disk2s2").
    pub identifier: String,
    /// Partition type of the chosen row.
    pub disk_type: String,
}

/// Parses a single partition row. Header, disk and continuation lines yield `None`.
pub fn parse_row(line: &str) -> Option<PartitionEntry> {
    let caps = ROW_RE.captures(line)?;

    let rest = &caps["rest"];
    let type_part: String = rest.chars().take(TYPE_WIDTH).collect();
    let name_part: String = rest.chars().skip(TYPE_WIDTH).collect();

    Some(PartitionEntry {
        slot: caps["slot"].parse().ok()?,
        partition_type: type_part.trim().to_string(),
        name: name_part
            .trim()
            .trim_matches(|c| NAME_ISOLATES.contains(&c))
            .to_string(),
        size: caps["size"].to_string(),
        identifier: caps["ident"].to_string(),
    })
}

/// Parses every partition row in `diskutil list` output, in listing order.
pub fn parse_list(output: &str) -> Vec<PartitionEntry> {
    output.lines().filter_map(parse_row).collect()
}

/// Resolves a volume name to its concrete block device.
///
/// Containers are listed before the volumes they host, so rows are scanned
/// bottom-up and the first non-wrapper row named `volume_name` wins. Returns
/// `None` if no such row exists.
pub fn resolve_volume(output: &str, volume_name: &str) -> Option<ResolvedVolume> {
    if volume_name.is_empty() {
        return None;
    }

    parse_list(output)
        .into_iter()
        .rev()
        .filter(|entry| entry.name == volume_name)
        .find(|entry| !entry.is_wrapper())
        .map(|entry| ResolvedVolume {
            identifier: entry.device_path(),
            disk_type: entry.partition_type,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LIST: &str = "\
/dev/disk0 (internal, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:      GUID_partition_scheme                        *500.3 GB   disk0
   1:                        EFI EFI                     314.6 MB   disk0s1
   2:                 Apple_APFS Container disk1         500.0 GB   disk0s2

/dev/disk1 (synthesized):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:      APFS Container Scheme -                      +500.0 GB   disk1
                                 Physical Store disk0s2
   1:                APFS Volume Macintosh HD            15.3 GB    disk1s1
   2:                APFS Volume Preboot                 81.9 MB    disk1s2

/dev/disk2 (external, physical):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:      GUID_partition_scheme                        *4.0 TB     disk2
   1:                        EFI EFI                     209.7 MB   disk2s1
   2:          Apple_CoreStorage Data                    4.0 TB     disk2s2
   3:                 Apple_Boot Boot OS X               134.2 MB   disk2s3

/dev/disk3 (external, virtual):
   #:                       TYPE NAME                    SIZE       IDENTIFIER
   0:                       apfs Data                   +4.0 TB     disk3
";

    #[test]
    fn test_parse_row_keeps_multi_word_type() {
        let entry =
            parse_row("   1:                APFS Volume Macintosh HD            15.3 GB    disk1s1")
                .unwrap();
        assert_eq!(
            entry,
            PartitionEntry {
                slot: 1,
                partition_type: "APFS Volume".to_string(),
                name: "Macintosh HD".to_string(),
                size: "15.3 GB".to_string(),
                identifier: "disk1s1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_row_without_name() {
        let entry =
            parse_row("   0:      GUID_partition_scheme                        *500.3 GB   disk0")
                .unwrap();
        assert_eq!(entry.partition_type, "GUID_partition_scheme");
        assert_eq!(entry.name, "");
        assert_eq!(entry.size, "*500.3 GB");
    }

    #[test]
    fn test_parse_row_strips_name_isolates() {
        let entry = parse_row(
            "   1:                APFS Volume \u{2068}Backup\u{2069}                  1.2 TB     disk4s1",
        )
        .unwrap();
        assert_eq!(entry.name, "Backup");
    }

    #[test]
    fn test_parse_list_skips_headers_and_continuations() {
        let entries = parse_list(SAMPLE_LIST);
        assert_eq!(entries.len(), 11);
        assert!(entries.iter().all(|e| e.identifier.starts_with("disk")));
    }

    #[test]
    fn test_resolves_past_core_storage_wrapper() {
        let resolved = resolve_volume(SAMPLE_LIST, "Data").unwrap();
        assert_eq!(resolved.identifier, "/dev/disk3");
        assert_eq!(resolved.disk_type, "apfs");
    }

    #[test]
    fn test_resolves_plain_volume() {
        let resolved = resolve_volume(SAMPLE_LIST, "Macintosh HD").unwrap();
        assert_eq!(
            resolved,
            ResolvedVolume {
                identifier: "/dev/disk1s1".to_string(),
                disk_type: "APFS Volume".to_string(),
            }
        );
    }

    #[test]
    fn test_name_must_match_whole_field() {
        assert!(resolve_volume(SAMPLE_LIST, "Macintosh").is_none());
        assert!(resolve_volume(SAMPLE_LIST, "Boot").is_none());
        assert!(resolve_volume(SAMPLE_LIST, "Boot OS X").is_some());
    }

    #[test]
    fn test_wrapper_only_match_is_unresolved() {
        let locked = "   2:          Apple_CoreStorage Vault                   999.3 GB   disk0s2\n";
        assert!(resolve_volume(locked, "Vault").is_none());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(resolve_volume("", "Data").is_none());
        assert!(resolve_volume(SAMPLE_LIST, "").is_none());
    }
}
