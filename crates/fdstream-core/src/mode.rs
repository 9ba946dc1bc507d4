//! Portable open modes and permission masks, and their translation into
//! platform flags.
//!
//! The rest of the crate only ever deals with [`OpenMode`] and
//! [`Permissions`]; the three translation functions here are the only code
//! that knows the platform's flag values.

use bitflags::bitflags;
use libc::{c_int, mode_t};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// How a file should be probed or opened.
    ///
    /// When `EXISTING` is absent, opening creates the file if it is missing.
    pub struct OpenMode: u32 {
        /// The file must already exist.
        const EXISTING = 1 << 0;
        /// Probe for execute permission (access checks only).
        const EXECUTE = 1 << 1;
        const READ = 1 << 2;
        const WRITE = 1 << 3;
        /// Newline translation; a no-op on unix.
        const TEXT = 1 << 4;
        /// No newline translation; a no-op on unix.
        const BINARY = 1 << 5;
        /// Every write goes to the current end of the file.
        const APPEND = 1 << 6;
        /// Discard existing contents on open.
        const TRUNCATE = 1 << 7;
        /// Fail if the file already exists.
        const EXCLUSIVE = 1 << 8;
    }
}

impl OpenMode {
    pub fn is_readable(self) -> bool {
        self.contains(Self::READ)
    }

    pub fn is_writable(self) -> bool {
        self.contains(Self::WRITE)
    }
}

bitflags! {
    /// Permission bits applied when `open` creates a new file.
    pub struct Permissions: u32 {
        const OWNER_READ = 1 << 0;
        const OWNER_WRITE = 1 << 1;
        const OWNER_EXEC = 1 << 2;
        const GROUP_READ = 1 << 3;
        const GROUP_WRITE = 1 << 4;
        const GROUP_EXEC = 1 << 5;
        const OTHER_READ = 1 << 6;
        const OTHER_WRITE = 1 << 7;
        const OTHER_EXEC = 1 << 8;
    }
}

/// `rw-r--r--`, used when no permissions are configured.
pub const DEFAULT_PERMISSIONS: Permissions = Permissions::from_bits_truncate(
    Permissions::OWNER_READ.bits()
        | Permissions::OWNER_WRITE.bits()
        | Permissions::GROUP_READ.bits()
        | Permissions::OTHER_READ.bits(),
);

// (portable bit, octal digit value) in owner/group/other order
const OCTAL_TABLE: [(Permissions, u32); 9] = [
    (Permissions::OWNER_READ, 0o400),
    (Permissions::OWNER_WRITE, 0o200),
    (Permissions::OWNER_EXEC, 0o100),
    (Permissions::GROUP_READ, 0o040),
    (Permissions::GROUP_WRITE, 0o020),
    (Permissions::GROUP_EXEC, 0o010),
    (Permissions::OTHER_READ, 0o004),
    (Permissions::OTHER_WRITE, 0o002),
    (Permissions::OTHER_EXEC, 0o001),
];

impl Permissions {
    /// Build a mask from the conventional octal notation (`0o644`).
    /// Returns `None` for values with bits outside `0o777`.
    pub fn from_octal(value: u32) -> Option<Self> {
        if value & !0o777 != 0 {
            return None;
        }
        let mut perms = Self::empty();
        for (bit, octal) in OCTAL_TABLE {
            if value & octal != 0 {
                perms |= bit;
            }
        }
        Some(perms)
    }

    pub fn to_octal(self) -> u32 {
        OCTAL_TABLE
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .fold(0, |acc, (_, octal)| acc | octal)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03o}", self.to_octal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid permission mask {0:?}: expected octal digits no larger than 777")]
pub struct ParsePermissionsError(String);

impl FromStr for Permissions {
    type Err = ParsePermissionsError;

    /// Accepts `644`, `0644` and `0o644`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0o")
            .or_else(|| trimmed.strip_prefix("0O"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(ParsePermissionsError(s.to_string()));
        }
        u32::from_str_radix(digits, 8)
            .ok()
            .and_then(Self::from_octal)
            .ok_or_else(|| ParsePermissionsError(s.to_string()))
    }
}

// Unix has no text/binary distinction at the descriptor level.
const TEXT_FLAG: c_int = 0;
const BINARY_FLAG: c_int = 0;

/// Project a mode onto the flags understood by `access(2)`.
pub fn access_flags(mode: OpenMode) -> c_int {
    let mut flags = libc::F_OK;

    if mode.contains(OpenMode::EXECUTE) {
        flags |= libc::X_OK;
    }
    if mode.contains(OpenMode::READ) {
        flags |= libc::R_OK;
    }
    if mode.contains(OpenMode::WRITE) {
        flags |= libc::W_OK;
    }

    flags
}

/// Project a mode onto the flags understood by `open(2)`.
pub fn open_flags(mode: OpenMode) -> c_int {
    let mut flags = 0;

    if mode.contains(OpenMode::READ | OpenMode::WRITE) {
        flags |= libc::O_RDWR;
    } else if mode.contains(OpenMode::WRITE) {
        flags |= libc::O_WRONLY;
    } else {
        flags |= libc::O_RDONLY;
    }

    if mode.contains(OpenMode::TEXT) {
        flags |= TEXT_FLAG;
    } else if mode.contains(OpenMode::BINARY) {
        flags |= BINARY_FLAG;
    }

    if mode.contains(OpenMode::APPEND) {
        flags |= libc::O_APPEND;
    }
    if mode.contains(OpenMode::TRUNCATE) {
        flags |= libc::O_TRUNC;
    }
    if mode.contains(OpenMode::EXCLUSIVE) {
        flags |= libc::O_EXCL;
    }
    if !mode.contains(OpenMode::EXISTING) {
        flags |= libc::O_CREAT;
    }

    flags
}

/// Combine a permission mask into a single `mode_t`.
pub fn permission_flags(perms: Permissions) -> mode_t {
    let table: [(Permissions, mode_t); 9] = [
        (Permissions::OWNER_READ, libc::S_IRUSR),
        (Permissions::OWNER_WRITE, libc::S_IWUSR),
        (Permissions::OWNER_EXEC, libc::S_IXUSR),
        (Permissions::GROUP_READ, libc::S_IRGRP),
        (Permissions::GROUP_WRITE, libc::S_IWGRP),
        (Permissions::GROUP_EXEC, libc::S_IXGRP),
        (Permissions::OTHER_READ, libc::S_IROTH),
        (Permissions::OTHER_WRITE, libc::S_IWOTH),
        (Permissions::OTHER_EXEC, libc::S_IXOTH),
    ];

    table
        .iter()
        .filter(|(bit, _)| perms.contains(*bit))
        .fold(0, |acc, (_, flag)| acc | flag)
}
