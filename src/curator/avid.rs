//! Canonical title identifier ("AVID") resolution.
//!
//! An AVID is the normalized `BRAND-NUMBER` token naming one title. Two
//! filenames differing only in case, separator style or zero padding
//! resolve to the identical value. Resolution is pure: no I/O, no panics,
//! `None` for anything unrecognizable.

use crate::config::AvidConfig;
use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

const MIN_BRAND_LENGTH: usize = 2;

static RE_FC2: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"FC2[^A-Z0-9]{0,5}(?:PPV[^A-Z0-9]{0,5})?(\d{5,7})").expect("valid regex")
});
static RE_HEYDOUGA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HEYDOUGA[-_]*(\d{4})[-_]0?(\d{3,5})").expect("valid regex"));
static RE_GETCHU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GETCHU[-_]*(\d+)").expect("valid regex"));
static RE_GYUTTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"GYUTTO-(\d+)").expect("valid regex"));
static RE_259LUXU: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"259LUXU-(\d+)").expect("valid regex"));
static RE_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w{3,10}\.(?:COM|NET|APP|XYZ)").expect("valid regex"));
// Abbreviated heydouga releases; three tokens, so it must run before the
// ordinary two-token patterns.
static RE_HEY_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HEY[-_]*(\d{4})[-_]0?(\d{3,5})").expect("valid regex"));
// MUGEN's MK3D2DBD family would otherwise be eaten by the ordinary pattern.
static RE_MUGEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(MKB?D)[-_]*(S\d{2,3})|(MK3D2DBD|S2M|S2MBD)[-_]*(\d{2,3})").expect("valid regex")
});
static RE_IBW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(IBW)[-_](\d{2,5}Z)").expect("valid regex"));
static RE_NORMAL_SEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]{2,10})[-_ ](\d{2,5})").expect("valid regex"));
// Discontinued no-separator series; narrow digit ranges to limit false hits.
static RE_TOHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(RED[01]\d\d|SKY[0-3]\d\d|EX00[01]\d)").expect("valid regex")
});
static RE_NORMAL_NOSEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]{2,})(\d{2,5})").expect("valid regex"));
static RE_TMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(T[23]8[-_]\d{3})").expect("valid regex"));
static RE_NK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([NK]\d{4})").expect("valid regex"));
static RE_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{6})[-_](\d{2,3})").expect("valid regex"));
static RE_ZERO_PAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]+-00\d{3,4}").expect("valid regex"));

/// Collapse the brand-specific `00` infix: `BRAND-00123` -> `BRAND-123`.
fn collapse_zero_pad(avid: &str) -> String {
    if RE_ZERO_PAD.is_match(avid) {
        avid.replacen("00", "", 1)
    } else {
        avid.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Avid(String);

impl Avid {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The brand component, `None` for dash-less identifiers. Purely
    /// numeric brands are truncated to their two-digit label.
    pub fn brand(&self) -> Option<String> {
        let (brand, _) = self.0.split_once('-')?;
        if brand.len() >= MIN_BRAND_LENGTH && brand.chars().all(|c| c.is_ascii_digit()) {
            return Some(brand[..MIN_BRAND_LENGTH].to_string());
        }
        Some(brand.to_string())
    }
}

impl fmt::Display for Avid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AvidResolver {
    exceptions: Vec<String>,
    ignored: Option<Regex>,
}

impl AvidResolver {
    pub fn new(cfg: &AvidConfig) -> Result<Self> {
        let ignored = if cfg.ignored_patterns.is_empty() {
            None
        } else {
            let joined = cfg.ignored_patterns.join("|");
            Some(Regex::new(&joined).context("invalid ignored_patterns regex")?)
        };
        Ok(Self {
            exceptions: cfg
                .id_exceptions
                .iter()
                .map(|s| s.to_uppercase())
                .collect(),
            ignored,
        })
    }

    pub fn resolve(&self, name: &str) -> Option<Avid> {
        let cleaned = name.replace('/', "");
        let upper = cleaned.to_uppercase();
        for exception in &self.exceptions {
            if upper.contains(exception.as_str()) {
                return Some(Avid(exception.clone()));
            }
        }

        let stem = Path::new(&cleaned)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&cleaned);
        let id = self.resolve_stem(&stem.to_uppercase())?;
        Some(Avid(collapse_zero_pad(&id.to_uppercase())))
    }

    fn resolve_stem(&self, raw: &str) -> Option<String> {
        let norm = match &self.ignored {
            Some(re) => re.replace_all(raw, "").into_owned(),
            None => raw.to_string(),
        };

        if let Some(id) = self.match_families(&norm) {
            return Some(id);
        }
        // TMA releases such as T28-557; their numbering is a mess.
        if let Some(c) = RE_TMA.captures(&norm) {
            return Some(c[1].replace('_', "-"));
        }
        if let Some(c) = RE_NK.captures(&norm) {
            return Some(c[1].to_string());
        }
        // Pure numeric identifiers, e.g. 010125-001.
        if let Some(c) = RE_NUMERIC.captures(&norm) {
            return Some(format!("{}-{}", &c[1], &c[2]));
        }
        // A few releases separate the two halves with ')('.
        if norm.contains(")(") {
            if let Some(id) = self.resolve_stem(&norm.replace(")(", "-")) {
                return Some(id);
            }
        }
        None
    }

    fn match_families(&self, norm: &str) -> Option<String> {
        if norm.contains("FC2") {
            // FC2 numbering is five to seven digits.
            return RE_FC2.captures(norm).map(|c| format!("FC2-{}", &c[1]));
        }
        if norm.contains("HEYDOUGA") {
            return RE_HEYDOUGA
                .captures(norm)
                .map(|c| format!("HEYDOUGA-{}-{}", &c[1], &c[2]));
        }
        if norm.contains("GETCHU") {
            return RE_GETCHU.captures(norm).map(|c| format!("GETCHU-{}", &c[1]));
        }
        if norm.contains("GYUTTO") {
            return RE_GYUTTO.captures(norm).map(|c| format!("GYUTTO-{}", &c[1]));
        }
        if norm.contains("259LUXU") {
            return RE_259LUXU
                .captures(norm)
                .map(|c| format!("259LUXU-{}", &c[1]));
        }

        // Strip suspicious release-site domains first; retry on the result.
        let no_domain = RE_DOMAIN.replace_all(norm, "");
        if no_domain != norm {
            if let Some(id) = self.resolve_stem(&no_domain) {
                return Some(id);
            }
        }
        if let Some(c) = RE_HEY_SHORT.captures(norm) {
            return Some(format!("HEYDOUGA-{}-{}", &c[1], &c[2]));
        }
        if let Some(c) = RE_MUGEN.captures(norm) {
            return Some(match c.get(1) {
                Some(first) => format!("{}-{}", first.as_str(), &c[2]),
                None => format!("{}-{}", &c[3], &c[4]),
            });
        }
        // IBW carries a trailing `z` on the number.
        if let Some(c) = RE_IBW.captures(norm) {
            return Some(format!("{}-{}", &c[1], &c[2]));
        }
        if let Some(c) = RE_NORMAL_SEP.captures(norm) {
            return Some(format!("{}-{}", &c[1], &c[2]));
        }
        if let Some(c) = RE_TOHO.captures(norm) {
            return Some(c[1].to_string());
        }
        // Treat the name as missing its separator.
        if let Some(c) = RE_NORMAL_NOSEP.captures(norm) {
            return Some(format!("{}-{}", &c[1], &c[2]));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvidConfig;

    fn resolver() -> AvidResolver {
        AvidResolver::new(&AvidConfig::default()).expect("resolver")
    }

    #[test]
    fn zero_padding_and_variant_tags_normalize_to_one_identifier() {
        let r = resolver();
        let a = r.resolve("ABC-00123.mp4").expect("resolves");
        let b = r.resolve("abc_123_4k.mkv").expect("resolves");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ABC-123");
    }

    #[test]
    fn separator_style_and_case_are_irrelevant() {
        let r = resolver();
        let dash = r.resolve("ABC-123.mp4").expect("resolves");
        let underscore = r.resolve("abc_123.mkv").expect("resolves");
        let space = r.resolve("Abc 123.avi").expect("resolves");
        assert_eq!(dash, underscore);
        assert_eq!(dash, space);
    }

    #[test]
    fn fc2_numbers_resolve_with_and_without_ppv() {
        let r = resolver();
        assert_eq!(
            r.resolve("FC2-PPV-1234567.mp4").expect("resolves").as_str(),
            "FC2-1234567"
        );
        assert_eq!(
            r.resolve("fc2 1234567.mp4").expect("resolves").as_str(),
            "FC2-1234567"
        );
    }

    #[test]
    fn heydouga_keeps_three_tokens() {
        let r = resolver();
        assert_eq!(
            r.resolve("heydouga-4017-257.mp4").expect("resolves").as_str(),
            "HEYDOUGA-4017-257"
        );
        assert_eq!(
            r.resolve("hey-4017-257.mp4").expect("resolves").as_str(),
            "HEYDOUGA-4017-257"
        );
    }

    #[test]
    fn missing_separator_is_recovered() {
        let r = resolver();
        assert_eq!(
            r.resolve("GHKQ090.mp4").expect("resolves").as_str(),
            "GHKQ-090"
        );
    }

    #[test]
    fn release_site_domain_is_stripped_before_matching() {
        let r = resolver();
        assert_eq!(
            r.resolve("example.com@ABC-123.mp4").expect("resolves").as_str(),
            "ABC-123"
        );
    }

    #[test]
    fn pure_numeric_identifier_resolves() {
        let r = resolver();
        assert_eq!(
            r.resolve("010125_001.mp4").expect("resolves").as_str(),
            "010125-001"
        );
    }

    #[test]
    fn unrecognizable_name_resolves_to_none() {
        let r = resolver();
        assert!(r.resolve("holiday footage.mp4").is_none());
        assert!(r.resolve("").is_none());
    }

    #[test]
    fn configured_exception_short_circuits() {
        let cfg = AvidConfig {
            id_exceptions: vec!["XYZ-SPECIAL".to_string()],
            ..AvidConfig::default()
        };
        let r = AvidResolver::new(&cfg).expect("resolver");
        assert_eq!(
            r.resolve("some xyz-special release.mp4")
                .expect("resolves")
                .as_str(),
            "XYZ-SPECIAL"
        );
    }

    #[test]
    fn part_markers_do_not_change_the_identifier() {
        let r = resolver();
        let one = r.resolve("FOO-001.part1.mp4").expect("resolves");
        let two = r.resolve("FOO-001.part2.mp4").expect("resolves");
        assert_eq!(one, two);
        assert_eq!(one.as_str(), "FOO-001");
    }

    #[test]
    fn numeric_brand_truncates_to_two_digits() {
        let r = resolver();
        let avid = r.resolve("010125_001.mp4").expect("resolves");
        assert_eq!(avid.brand().as_deref(), Some("01"));

        let luxu = r.resolve("259LUXU-1234.mp4").expect("resolves");
        assert_eq!(luxu.brand().as_deref(), Some("259LUXU"));
    }

    #[test]
    fn dashless_identifier_has_no_brand() {
        let r = resolver();
        let avid = r.resolve("N1234.mp4").expect("resolves");
        assert_eq!(avid.as_str(), "N1234");
        assert_eq!(avid.brand(), None);
    }
}
