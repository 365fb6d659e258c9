//! Mount table line parser for Linux systems.
//!
//! Parses lines in the `fstab(5)` layout shared by `/etc/mtab` and
//! `/proc/self/mounts`:
//!
//! ```text
//! /dev/sda1 / ext4 rw,relatime 0 0
//! ```
//!
//! Whitespace inside a field is escaped as a three-digit octal sequence, e.g. a
//! mount point `/mnt/my disk` is written as `/mnt/my\040disk`.

use std::borrow::Cow;

/// Represents a parsed mount table line.
#[derive(Debug, PartialEq, Eq)]
pub struct MountEntry<'a> {
    /// Mounted device or pseudo source (e.g. `/dev/sda1`, `proc`).
    pub device: Cow<'a, str>,
    /// Mount point with octal escapes decoded.
    pub mount_point: Cow<'a, str>,
    /// Filesystem type (e.g. `ext4`, `tmpfs`).
    pub fs_type: &'a str,
    /// Comma-separated mount options.
    pub options: &'a str,
}

/// Named fields in a mount table line.
#[derive(Debug)]
pub enum MountField {
    Device,
    MountPoint,
    FsType,
    Options,
}

impl std::fmt::Display for MountField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MountField::Device => "device",
            MountField::MountPoint => "mount_point",
            MountField::FsType => "fs_type",
            MountField::Options => "options",
        };
        write!(f, "{name}")
    }
}

/// Errors that may occur when parsing a mount table line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing `{field}` in line: `{line}`")]
    MissingField { field: MountField, line: String },
}

/// Returns `true` for lines that carry no entry: blank lines and `#` comments.
pub fn is_ignorable_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parses a single mount table line.
///
/// The trailing `dump` and `pass` columns are optional and ignored.
///
/// # Errors
///
/// Returns [`ParseError::MissingField`] if one of the first four columns is absent.
pub fn parse_mount_entry_line(line: &str) -> Result<MountEntry<'_>, ParseError> {
    let mut fields = line.split_whitespace();
    let mut next = |field: MountField| {
        fields.next().ok_or_else(|| ParseError::MissingField {
            field,
            line: line.to_owned(),
        })
    };

    let device = next(MountField::Device)?;
    let mount_point = next(MountField::MountPoint)?;
    let fs_type = next(MountField::FsType)?;
    let options = next(MountField::Options)?;

    Ok(MountEntry {
        device: unescape_octal(device),
        mount_point: unescape_octal(mount_point),
        fs_type,
        options,
    })
}

/// Decodes `\NNN` octal escapes. Malformed escapes are kept as written.
fn unescape_octal(field: &str) -> Cow<'_, str> {
    if !field.contains('\\') {
        return Cow::Borrowed(field);
    }

    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u16, |acc, d| acc * 8 + u16::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line_with_dump_and_pass() {
        let line = "/dev/sda1 / ext4 rw,relatime,errors=remount-ro 0 1";
        let result = parse_mount_entry_line(line).unwrap();

        assert_eq!(result.device, "/dev/sda1");
        assert_eq!(result.mount_point, "/");
        assert_eq!(result.fs_type, "ext4");
        assert_eq!(result.options, "rw,relatime,errors=remount-ro");
    }

    #[test]
    fn parses_valid_line_without_dump_and_pass() {
        let line = "tmpfs /run tmpfs rw,nosuid,nodev";
        let result = parse_mount_entry_line(line).unwrap();
        assert_eq!(result.fs_type, "tmpfs");
        assert_eq!(result.mount_point, "/run");
    }

    #[test]
    fn decodes_octal_escapes_in_mount_point() {
        let line = "/dev/sdb1 /media/usb\\040stick\\011two vfat rw 0 0";
        let result = parse_mount_entry_line(line).unwrap();
        assert_eq!(result.mount_point, "/media/usb stick\ttwo");
        assert!(matches!(result.mount_point, Cow::Owned(_)));
        assert!(matches!(result.device, Cow::Borrowed(_)));
    }

    #[test]
    fn keeps_malformed_escapes() {
        assert_eq!(unescape_octal("/a\\9xy"), "/a\\9xy");
        assert_eq!(unescape_octal("/a\\04"), "/a\\04");
        assert_eq!(unescape_octal("/a\\777b"), "/a\\777b");
        assert_eq!(unescape_octal("/back\\134slash"), "/back\\slash");
    }

    #[test]
    fn error_on_missing_fields() {
        let err = parse_mount_entry_line("/dev/sda1 / ext4").unwrap_err();
        match err {
            ParseError::MissingField { field, .. } => {
                assert_eq!(field.to_string(), "options");
            }
        }
    }

    #[test]
    fn error_on_empty_line() {
        let err = parse_mount_entry_line("").unwrap_err();
        match err {
            ParseError::MissingField { field, .. } => assert_eq!(field.to_string(), "device"),
        }
    }

    #[test]
    fn detects_ignorable_lines() {
        assert!(is_ignorable_line(""));
        assert!(is_ignorable_line("   "));
        assert!(is_ignorable_line("# static mounts"));
        assert!(!is_ignorable_line("proc /proc proc rw 0 0"));
    }
}
