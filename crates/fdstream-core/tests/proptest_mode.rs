//! Property-based tests for open-mode and permission translation.

use fdstream_core::mode::{access_flags, open_flags, permission_flags};
use fdstream_core::{OpenMode, Permissions};
use proptest::prelude::*;

fn arb_mode() -> impl Strategy<Value = OpenMode> {
    any::<u32>().prop_map(OpenMode::from_bits_truncate)
}

fn arb_permissions() -> impl Strategy<Value = Permissions> {
    (0u32..=0o777).prop_map(|bits| Permissions::from_octal(bits).unwrap())
}

const ACCMODE: libc::c_int = libc::O_RDONLY | libc::O_WRONLY | libc::O_RDWR;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn create_iff_not_existing(mode in arb_mode()) {
        let creates = open_flags(mode) & libc::O_CREAT != 0;
        prop_assert_eq!(creates, !mode.contains(OpenMode::EXISTING));
    }

    #[test]
    fn access_mode_follows_direction(mode in arb_mode()) {
        let expected = match (mode.is_readable(), mode.is_writable()) {
            (true, true) => libc::O_RDWR,
            (false, true) => libc::O_WRONLY,
            _ => libc::O_RDONLY,
        };
        prop_assert_eq!(open_flags(mode) & ACCMODE, expected);
    }

    #[test]
    fn open_only_bits_map_one_to_one(mode in arb_mode()) {
        let flags = open_flags(mode);
        prop_assert_eq!(flags & libc::O_APPEND != 0, mode.contains(OpenMode::APPEND));
        prop_assert_eq!(flags & libc::O_TRUNC != 0, mode.contains(OpenMode::TRUNCATE));
        prop_assert_eq!(flags & libc::O_EXCL != 0, mode.contains(OpenMode::EXCLUSIVE));
    }

    #[test]
    fn access_flags_ignore_open_only_bits(mode in arb_mode()) {
        let direction = mode & (OpenMode::READ | OpenMode::WRITE | OpenMode::EXECUTE);
        prop_assert_eq!(access_flags(mode), access_flags(direction));
    }

    #[test]
    fn access_flags_map_each_permission(mode in arb_mode()) {
        let flags = access_flags(mode);
        prop_assert_eq!(flags & libc::R_OK != 0, mode.contains(OpenMode::READ));
        prop_assert_eq!(flags & libc::W_OK != 0, mode.contains(OpenMode::WRITE));
        prop_assert_eq!(flags & libc::X_OK != 0, mode.contains(OpenMode::EXECUTE));
    }

    #[test]
    fn permission_flags_are_bitwise_or(a in arb_permissions(), b in arb_permissions()) {
        prop_assert_eq!(permission_flags(a | b), permission_flags(a) | permission_flags(b));
    }

    #[test]
    fn permission_text_round_trip(perms in arb_permissions()) {
        let text = perms.to_string();
        prop_assert_eq!(text.len(), 3);
        prop_assert_eq!(text.parse::<Permissions>().unwrap(), perms);
        prop_assert_eq!(Permissions::from_octal(perms.to_octal()), Some(perms));
    }
}
