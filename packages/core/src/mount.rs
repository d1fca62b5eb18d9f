//! Mount and unmount command templates.
//!
//! Commands are rendered to complete shell lines when a device's identifier
//! becomes known, not when they run: quoting and flags depend only on the
//! configuration and the identifier. A device without an identifier gets a
//! placeholder that prints why and fails, so a toggle surfaces as an error
//! instead of silently doing nothing.

use std::path::Path;

use crate::config::{DeviceConfig, VolumeKind};

/// Name of the keep-awake file written on mounted volumes.
pub const SENTINEL_FILE: &str = ".preventsleep";

/// Quotes a value for a POSIX shell.
///
/// Values made only of safe characters are returned as-is; anything else is
/// single-quoted with embedded quotes escaped.
pub fn quote(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    let safe = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Command that prints `message` and exits non-zero.
pub fn unavailable(message: &str) -> String {
    format!("echo {}; false", quote(message))
}

/// `diskutil mount <identifier>`.
pub fn local_mount(identifier: &str) -> String {
    format!("/usr/sbin/diskutil mount {}", quote(identifier))
}

/// `diskutil umount [force] <identifier>`.
pub fn local_unmount(identifier: &str, force: bool) -> String {
    if force {
        format!("/usr/sbin/diskutil umount force {}", quote(identifier))
    } else {
        format!("/usr/sbin/diskutil umount {}", quote(identifier))
    }
}

/// Creates the mount point, then mounts the share on it.
pub fn network_mount(url: &str, fstype: &str, mount_point: &Path) -> String {
    let mount_point = quote_path(mount_point);
    format!(
        "/bin/mkdir {mp} 2>/dev/null; /sbin/mount -t {fstype} {url} {mp}",
        mp = mount_point,
        fstype = quote(fstype),
        url = quote(url),
    )
}

/// Unmounts a share, optionally removing the mount point afterwards.
pub fn network_unmount(
    identifier: &str,
    mount_point: &Path,
    force: bool,
    remove_mount_point: bool,
) -> String {
    let mut command = String::from("/sbin/umount ");
    if force {
        command.push_str("-f ");
    }
    command.push_str(&quote(identifier));
    if remove_mount_point {
        command.push_str(&format!(
            "; /bin/rmdir {} 2>/dev/null",
            quote_path(mount_point)
        ));
    }
    command
}

/// Touches the keep-awake file on a mounted volume.
pub fn touch(mount_point: &Path) -> String {
    format!(
        "/usr/bin/touch {}",
        quote_path(&mount_point.join(SENTINEL_FILE))
    )
}

/// Mount and unmount command lines for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPair {
    pub mount: String,
    pub unmount: String,
}

impl CommandPair {
    /// Renders both commands for `config` given the current identifier.
    ///
    /// An empty identifier disables every command that needs one. A network
    /// mount only needs the URL, so it stays usable.
    pub fn build(config: &DeviceConfig, identifier: &str) -> Self {
        let missing = || unavailable(&format!("volume \"{}\" not available", config.volume_name));

        match &config.kind {
            VolumeKind::Local => {
                if identifier.is_empty() {
                    return Self {
                        mount: missing(),
                        unmount: missing(),
                    };
                }
                Self {
                    mount: local_mount(identifier),
                    unmount: local_unmount(identifier, config.force_unmount),
                }
            }
            VolumeKind::Network(url) => Self {
                mount: network_mount(&url.url, url.scheme.fstype(), &config.mount_point),
                unmount: if identifier.is_empty() {
                    missing()
                } else {
                    network_unmount(
                        identifier,
                        &config.mount_point,
                        config.force_unmount,
                        config.remove_mount_point,
                    )
                },
            },
        }
    }

    /// The command that moves the device to `on`.
    pub fn for_state(&self, on: bool) -> &str {
        if on {
            self.mount.as_str()
        } else {
            self.unmount.as_str()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceSettings;

    fn local(force: bool) -> DeviceConfig {
        DeviceSettings {
            volume_name: "Backup Drive".to_string(),
            force_unmount: force,
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    fn network(remove_mount_point: bool) -> DeviceConfig {
        DeviceSettings {
            volume_name: "media".to_string(),
            kind: crate::config::DeviceKind::Network,
            volume_url: Some("smb://guest@nas.local/media".to_string()),
            remove_mount_point,
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("/dev/disk2s2"), "/dev/disk2s2");
        assert_eq!(quote("//guest@nas.local/media"), "//guest@nas.local/media");
        assert_eq!(quote("/Volumes/Backup Drive"), "'/Volumes/Backup Drive'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("a;rm -rf /"), "'a;rm -rf /'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn test_local_commands() {
        let pair = CommandPair::build(&local(false), "/dev/disk2s2");
        assert_eq!(pair.mount, "/usr/sbin/diskutil mount /dev/disk2s2");
        assert_eq!(pair.unmount, "/usr/sbin/diskutil umount /dev/disk2s2");

        let forced = CommandPair::build(&local(true), "/dev/disk2s2");
        assert_eq!(forced.unmount, "/usr/sbin/diskutil umount force /dev/disk2s2");
    }

    #[test]
    fn test_local_commands_without_identifier_fail() {
        let pair = CommandPair::build(&local(false), "");
        let expected = r#"echo 'volume "Backup Drive" not available'; false"#;
        assert_eq!(pair.mount, expected);
        assert_eq!(pair.unmount, expected);
    }

    #[test]
    fn test_network_commands() {
        let pair = CommandPair::build(&network(true), "//guest@nas.local/media");
        assert_eq!(
            pair.mount,
            "/bin/mkdir /Volumes/media 2>/dev/null; \
             /sbin/mount -t smbfs smb://guest@nas.local/media /Volumes/media"
        );
        assert_eq!(
            pair.unmount,
            "/sbin/umount //guest@nas.local/media; /bin/rmdir /Volumes/media 2>/dev/null"
        );
    }

    #[test]
    fn test_network_unmount_can_keep_mount_point() {
        let pair = CommandPair::build(&network(false), "//guest@nas.local/media");
        assert_eq!(pair.unmount, "/sbin/umount //guest@nas.local/media");

        let forced = network_unmount("//h/s", Path::new("/Volumes/s"), true, false);
        assert_eq!(forced, "/sbin/umount -f //h/s");
    }

    #[test]
    fn test_network_mount_survives_missing_identifier() {
        let pair = CommandPair::build(&network(true), "");
        assert!(pair.mount.contains("/sbin/mount -t smbfs"));
        assert!(pair.unmount.ends_with("; false"));
    }

    #[test]
    fn test_touch_quotes_mount_point() {
        assert_eq!(
            touch(Path::new("/Volumes/Backup Drive")),
            "/usr/bin/touch '/Volumes/Backup Drive/.preventsleep'"
        );
    }

    #[test]
    fn test_for_state() {
        let pair = CommandPair::build(&local(false), "/dev/disk2s2");
        assert_eq!(pair.for_state(true), pair.mount);
        assert_eq!(pair.for_state(false), pair.unmount);
    }
}
