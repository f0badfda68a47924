//! Canonical filename planning. Pure: computes a rename plan for one
//! identifier's files, never touches the filesystem.

use crate::config::CollisionPolicy;
use crate::curator::avid::Avid;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;

static RE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[-_ .](?:CD|PART|DISC)[-_ .]?(\d+)").expect("valid regex"));
static RE_PART_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([A-Da-d])\.[A-Za-z0-9]+$").expect("valid regex"));
static RE_RES_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[-_ .](4K|8K|2160P|UHD)").expect("valid regex"));
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static RE_LETTER_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[A-Z]").expect("valid regex"));

/// One file under consideration, with the attributes the planner needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
}

impl Candidate {
    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("mp4")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub from: PathBuf,
    pub to_name: String,
}

/// Part number from markers like `-cd1`, `.part2`, `disc 3` or a trailing
/// `-A`/`-B` disc letter.
pub fn detect_part_index(name: &str) -> Option<u32> {
    if let Some(c) = RE_PART.captures(name) {
        return c[1].parse::<u32>().ok();
    }
    if let Some(c) = RE_PART_LETTER.captures(name) {
        let letter = c[1].to_uppercase().chars().next()?;
        return Some(letter as u32 - 'A' as u32 + 1);
    }
    None
}

/// Resolution-variant tag (`4K`, `2160P`, ...), `None` for a base copy.
pub fn detect_resolution_tag(name: &str) -> Option<String> {
    RE_RES_TAG.captures(name).map(|c| c[1].to_uppercase())
}

/// Whether a set of same-identifier filenames plausibly forms one
/// multi-part title: the names differ only in digits, or only in a
/// trailing `-A`/`-B` style index.
pub fn is_multi_part_set(names: &[&str]) -> bool {
    if names.len() < 2 {
        return false;
    }
    let non_digit: BTreeSet<String> = names
        .iter()
        .map(|n| RE_DIGITS.replace_all(n, "").into_owned())
        .collect();
    if non_digit.len() == 1 {
        return true;
    }
    let non_index: BTreeSet<String> = names
        .iter()
        .map(|n| RE_LETTER_INDEX.replace_all(&n.to_uppercase(), "").into_owned())
        .collect();
    non_index.len() == 1
}

/// Whether a group of same-identifier files can be normalized at all:
/// either at most one base copy (variants are fine alongside it), or the
/// base copies form a plausible multi-part set.
pub fn is_plausible_group(files: &[Candidate]) -> bool {
    let bases: Vec<&str> = files
        .iter()
        .filter(|f| detect_resolution_tag(f.file_name()).is_none())
        .map(|f| f.file_name())
        .collect();
    bases.len() <= 1 || is_multi_part_set(&bases)
}

/// Compute the rename plan for one identifier's files. Multi-part titles
/// get `-cdN` suffixes ordered by the detected part index; resolution
/// variants keep a tagged name instead of being collapsed. Plans that
/// would not change a name are omitted.
pub fn plan(avid: &Avid, files: &[Candidate], policy: CollisionPolicy) -> Vec<RenamePlan> {
    let mut bases: Vec<&Candidate> = Vec::new();
    let mut variants: Vec<(&Candidate, String)> = Vec::new();
    for file in files {
        match detect_resolution_tag(file.file_name()) {
            Some(tag) => variants.push((file, tag)),
            None => bases.push(file),
        }
    }

    let mut plans = Vec::new();

    if bases.len() > 1 {
        // Multi-part: order by detected part index, then name; renumber
        // sequentially so gaps in the source numbering close up.
        bases.sort_by_key(|f| {
            (
                detect_part_index(f.file_name()).unwrap_or(u32::MAX),
                f.file_name().to_string(),
            )
        });
        for (i, file) in bases.iter().enumerate() {
            plans.push(RenamePlan {
                from: file.path.clone(),
                to_name: format!("{avid}-cd{}.{}", i + 1, file.extension()),
            });
        }
    } else if bases.len() == 1 {
        let base = bases[0];
        // On a plain-name collision with a variant, the configured policy
        // decides which file claims `AVID.ext`; the loser keeps a tag.
        variants.sort_by_key(|(f, _)| std::cmp::Reverse(f.size));
        let variant_claims_plain = match (variants.first(), policy) {
            (None, _) => false,
            (Some(_), CollisionPolicy::VariantWins) => true,
            (Some((v, _)), CollisionPolicy::LargerWins) => v.size > base.size,
        };
        if variant_claims_plain {
            let (winner, _) = variants.remove(0);
            // Demote the base first: if it currently holds the plain name,
            // the winner's rename would otherwise be blocked until the
            // next pass.
            plans.push(RenamePlan {
                from: base.path.clone(),
                to_name: format!("{avid}-SD.{}", base.extension()),
            });
            plans.push(RenamePlan {
                from: winner.path.clone(),
                to_name: format!("{avid}.{}", winner.extension()),
            });
        } else {
            plans.push(RenamePlan {
                from: base.path.clone(),
                to_name: format!("{avid}.{}", base.extension()),
            });
        }
    }

    // Remaining variants keep their tag; duplicates within one tag fall
    // back to part numbering.
    let mut seen_tags: BTreeSet<String> = BTreeSet::new();
    let mut tag_counts: std::collections::BTreeMap<String, u32> = std::collections::BTreeMap::new();
    for (file, tag) in &variants {
        let count = tag_counts.entry(tag.clone()).or_insert(0);
        *count += 1;
        let to_name = if seen_tags.contains(tag) {
            format!("{avid}-{tag}-cd{}.{}", count, file.extension())
        } else {
            format!("{avid}-{tag}.{}", file.extension())
        };
        seen_tags.insert(tag.clone());
        plans.push(RenamePlan {
            from: file.path.clone(),
            to_name,
        });
    }

    plans.retain(|p| {
        p.from
            .file_name()
            .and_then(|s| s.to_str())
            .is_none_or(|name| name != p.to_name)
    });
    plans
}
