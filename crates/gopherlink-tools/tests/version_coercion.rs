//! Property tests for loose version coercion

use gopherlink_tools::{coerce_version, parse_version_output, InstalledVersion};
use proptest::prelude::*;
use semver::Version;

proptest! {
    /// A `v`-prefixed release coerces to its numeric core
    #[test]
    fn prop_coerce_release(major in 0u64..100, minor in 0u64..100, patch in 0u64..100) {
        let raw = format!("v{}.{}.{}", major, minor, patch);
        prop_assert_eq!(coerce_version(&raw), Some(Version::new(major, minor, patch)));
    }

    /// Pre-release suffixes never affect the coerced version
    #[test]
    fn prop_coerce_drops_prerelease(major in 0u64..100, minor in 0u64..100, patch in 0u64..100, pre in "[a-z]{1,5}") {
        let raw = format!("v{}.{}.{}-{}.1", major, minor, patch, pre);
        prop_assert_eq!(coerce_version(&raw), Some(Version::new(major, minor, patch)));
    }

    /// Coerced ordering agrees with numeric ordering
    #[test]
    fn prop_coerced_order(a in (0u64..20, 0u64..20, 0u64..20), b in (0u64..20, 0u64..20, 0u64..20)) {
        let va = coerce_version(&format!("v{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let vb = coerce_version(&format!("v{}.{}.{}", b.0, b.1, b.2)).unwrap();
        prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
    }

    /// The version after `@` on the second line is reported verbatim
    #[test]
    fn prop_parse_two_line_output(version in "v[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}") {
        let out = format!(
            "golang.org/x/tools/gopls {v}\n    golang.org/x/tools/gopls@{v} h1:xyz=\n",
            v = version
        );
        prop_assert_eq!(parse_version_output(&out), Some(InstalledVersion::Release(version)));
    }

    /// Output of any other line count is ignored
    #[test]
    fn prop_wrong_line_count_ignored(lines in proptest::collection::vec("[a-z@.]{1,10}", 3..6)) {
        prop_assert_eq!(parse_version_output(&lines.join("\n")), None);
    }
}
