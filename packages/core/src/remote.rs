//! Network volume URLs.
//!
//! A network device is configured with a share URL such as
//! `smb://user@nas.local/media`. The URL decides the filesystem type passed to
//! `mount -t`, and the way the share shows up in `df` once mounted
//! (`//user@nas.local/media`), which becomes the device identifier.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://(?P<netloc>[^/?#]*)(?P<path>[^?#]*)")
        .expect("URL pattern is valid")
});

/// URL schemes that can be mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlScheme {
    Smb,
    Nfs,
    Afp,
    Ftp,
    Webdav,
}

impl UrlScheme {
    /// Scheme as written in the URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smb => "smb",
            Self::Nfs => "nfs",
            Self::Afp => "afp",
            Self::Ftp => "ftp",
            Self::Webdav => "webdav",
        }
    }

    /// Filesystem type for `mount -t`.
    pub fn fstype(&self) -> &'static str {
        match self {
            Self::Smb => "smbfs",
            Self::Nfs => "nfs",
            Self::Afp => "afp",
            Self::Ftp => "ftp",
            Self::Webdav => "webdav",
        }
    }
}

impl FromStr for UrlScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smb" => Ok(Self::Smb),
            "nfs" => Ok(Self::Nfs),
            "afp" => Ok(Self::Afp),
            "ftp" => Ok(Self::Ftp),
            "webdav" => Ok(Self::Webdav),
            _ => Err(format!(
                "unsupported scheme '{}' (expected smb, nfs, afp, ftp or webdav)",
                s
            )),
        }
    }
}

impl fmt::Display for UrlScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated network share URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeUrl {
    /// The URL exactly as configured, used for mounting.
    pub url: String,
    pub scheme: UrlScheme,
    pub username: Option<String>,
    /// Lowercased host name.
    pub host: String,
    pub port: Option<u16>,
    /// Path component, may be empty.
    pub path: String,
}

impl VolumeUrl {
    /// Parses and validates a share URL.
    ///
    /// The URL must have a scheme and a host, the scheme must be mountable and
    /// any port must be numeric. The error is a message suitable for showing
    /// next to the offending field.
    pub fn parse(url: &str) -> Result<Self, String> {
        let url = url.trim();
        let caps = URL_RE
            .captures(url)
            .ok_or_else(|| format!("'{}' is not a valid URL", url))?;

        let scheme: UrlScheme = caps["scheme"].parse()?;
        let netloc = &caps["netloc"];
        if netloc.is_empty() {
            return Err(format!("'{}' is not a valid URL (missing host)", url));
        }

        let (userinfo, hostport) = match netloc.rsplit_once('@') {
            Some((userinfo, hostport)) => (Some(userinfo), hostport),
            None => (None, netloc),
        };
        let username = userinfo
            .map(|info| info.split_once(':').map_or(info, |(user, _)| user))
            .filter(|user| !user.is_empty())
            .map(decode);

        let (host, port) = split_host_port(hostport)?;
        if host.is_empty() {
            return Err(format!("'{}' is not a valid URL (missing host)", url));
        }

        Ok(Self {
            url: url.to_string(),
            scheme,
            username,
            host: host.to_ascii_lowercase(),
            port,
            path: decode(&caps["path"]),
        })
    }

    /// The form `mount` reports for this share, e.g. `//user@host/share`.
    ///
    /// Credentials other than the user name are dropped and the user name and
    /// path are percent-encoded, matching the first column of `df`.
    pub fn identifier(&self) -> String {
        let mut identifier = String::from("//");
        if let Some(user) = &self.username {
            identifier.push_str(&urlencoding::encode(user));
            identifier.push('@');
        }
        if self.host.contains(':') {
            identifier.push_str(&format!("[{}]", self.host));
        } else {
            identifier.push_str(&self.host);
        }
        if let Some(port) = self.port {
            identifier.push_str(&format!(":{}", port));
        }
        identifier.push_str(&encode_path(&self.path));
        identifier
    }
}

fn split_host_port(hostport: &str) -> Result<(&str, Option<u16>), String> {
    // Bracketed IPv6 literal, e.g. "[fe80::1]:445".
    if let Some(rest) = hostport.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated IPv6 address in '{}'", hostport))?;
        let port = match after.strip_prefix(':') {
            Some(port) => Some(parse_port(port)?),
            None => None,
        };
        return Ok((host, port));
    }

    match hostport.rsplit_once(':') {
        Some((host, port)) => Ok((host, Some(parse_port(port)?))),
        None => Ok((hostport, None)),
    }
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse().map_err(|_| format!("invalid port '{}'", port))
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Percent-encodes each path segment, keeping the slashes.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
