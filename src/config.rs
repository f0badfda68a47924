use crate::error::CuratorError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvidConfig {
    /// Titles whose identifier cannot be derived by pattern matching;
    /// a filename containing one of these resolves to it verbatim.
    pub id_exceptions: Vec<String>,
    /// Regex fragments stripped from the (uppercased) stem before matching.
    pub ignored_patterns: Vec<String>,
}

impl Default for AvidConfig {
    fn default() -> Self {
        Self {
            id_exceptions: Vec::new(),
            ignored_patterns: vec![
                r"[-_ .]?(2160|1080|720|480)P".to_string(),
                r"[-_ .][48]K".to_string(),
                r"[-_ .]HEVC".to_string(),
                r"[-_ .][XH]26[45]".to_string(),
                r"[-_ .]BLURAY".to_string(),
                r"[-_ .]WEB-?DL".to_string(),
                r"[-_ .]WEBRIP".to_string(),
                r"[-_ .]UNCENSORED".to_string(),
                r"[-_ .]CD\d+".to_string(),
                r"[-_ .]PART\d+".to_string(),
                r"[-_ .]DISC?\d+".to_string(),
            ],
        }
    }
}

/// Which file claims the plain `AVID.ext` name when a resolution variant
/// and a base copy collide. The loser keeps a tagged name; nothing is
/// ever discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    #[default]
    LargerWins,
    VariantWins,
}

/// One intake route. The short TOML form `intake = "library"` names only
/// the destination subdirectory; the table form adds a size threshold
/// overriding the archive-wide `min_size_mb` for that route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteSpec {
    Dst(String),
    Detailed {
        dst: String,
        #[serde(default)]
        min_size_mb: Option<u64>,
    },
}

impl RouteSpec {
    pub fn dst(&self) -> &str {
        match self {
            Self::Dst(dst) => dst,
            Self::Detailed { dst, .. } => dst,
        }
    }

    /// Size floor for this route, falling back to the archive-wide value.
    pub fn min_size_mb(&self, default_mb: u64) -> u64 {
        match self {
            Self::Dst(_) => default_mb,
            Self::Detailed { min_size_mb, .. } => min_size_mb.unwrap_or(default_mb),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub src_dir: PathBuf,
    pub dst_dir: PathBuf,
    pub min_size_mb: u64,
    /// Intake subdirectory -> route, keyed by the intake subdir name.
    pub routes: BTreeMap<String, RouteSpec>,
    /// Destination group directory -> brands collected under it. Unlisted
    /// brands land in a directory named after the brand itself.
    pub brand_groups: BTreeMap<String, Vec<String>>,
    /// Directory for identifiers with no usable brand component.
    pub default_bucket: String,
    pub collision_policy: CollisionPolicy,
    /// Seconds an unresolvable subfolder stays muted before it is retried.
    pub cooldown_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::new(),
            dst_dir: PathBuf::new(),
            min_size_mb: 200,
            routes: BTreeMap::new(),
            brand_groups: BTreeMap::new(),
            default_bucket: "other".to_string(),
            collision_policy: CollisionPolicy::default(),
            cooldown_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub src_dir: PathBuf,
    pub dst_dir: PathBuf,
    pub debounce_secs: u64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::new(),
            dst_dir: PathBuf::new(),
            debounce_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub ffmpeg_bin: PathBuf,
    pub timeout_secs: Option<u64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            timeout_secs: Some(3_600),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Holds pass lock files. Empty means `~/.avcurator/state`.
    pub state_dir: PathBuf,
    pub avid: AvidConfig,
    pub archive: ArchiveConfig,
    pub mapping: MappingConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialCuratorConfig {
    state_dir: Option<PathBuf>,
    avid: Option<AvidConfig>,
    archive: Option<ArchiveConfig>,
    mapping: Option<MappingConfig>,
    merge: Option<MergeConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

fn env_or_collision_policy(var: &str, fallback: CollisionPolicy) -> CollisionPolicy {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "larger-wins" => CollisionPolicy::LargerWins,
            "variant-wins" => CollisionPolicy::VariantWins,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn validate(cfg: &CuratorConfig) -> Result<()> {
    for (src, route) in &cfg.archive.routes {
        if src.trim().is_empty() || route.dst().trim().is_empty() {
            return Err(anyhow!("invalid route: empty source or destination subdir"));
        }
    }
    for (group, brands) in &cfg.archive.brand_groups {
        if group.trim().is_empty() {
            return Err(anyhow!("invalid brand group: empty group name"));
        }
        if brands.iter().any(|b| b.trim().is_empty()) {
            return Err(anyhow!("invalid brand group {group}: empty brand entry"));
        }
    }
    if cfg.archive.default_bucket.trim().is_empty() {
        return Err(anyhow!("invalid default bucket: must not be empty"));
    }
    if cfg.mapping.debounce_secs == 0 {
        return Err(anyhow!("invalid mapping debounce: must be >= 1 second"));
    }
    if cfg.merge.timeout_secs == Some(0) {
        return Err(anyhow!("invalid merge timeout: must be >= 1 second"));
    }
    Ok(())
}

fn resolve_config_path(cli_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_override {
        return Some(path.to_path_buf());
    }
    if let Ok(custom) = env::var("AVC_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".avcurator").join("config.toml"))
}

fn merge_file_config(base: &mut CuratorConfig, cli_override: Option<&Path>) -> Result<()> {
    let Some(path) = resolve_config_path(cli_override) else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| CuratorError::InvalidConfig(format!("{}: {err}", path.display())))?;
    let parsed: PartialCuratorConfig = toml::from_str(&raw)
        .map_err(|err| CuratorError::InvalidConfig(format!("{}: {err}", path.display())))?;
    if let Some(state_dir) = parsed.state_dir {
        base.state_dir = state_dir;
    }
    if let Some(avid) = parsed.avid {
        base.avid = avid;
    }
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    if let Some(mapping) = parsed.mapping {
        base.mapping = mapping;
    }
    if let Some(merge) = parsed.merge {
        base.merge = merge;
    }
    Ok(())
}

pub fn load_config(cli_override: Option<&Path>) -> Result<CuratorConfig> {
    let mut cfg = CuratorConfig::default();
    merge_file_config(&mut cfg, cli_override)?;

    cfg.state_dir = env_or_path("AVC_STATE_DIR", cfg.state_dir);
    if cfg.state_dir.as_os_str().is_empty() {
        if let Some(home) = dirs::home_dir() {
            cfg.state_dir = home.join(".avcurator").join("state");
        }
    }
    cfg.archive.src_dir = env_or_path("AVC_ARCHIVE_SRC_DIR", cfg.archive.src_dir);
    cfg.archive.dst_dir = env_or_path("AVC_ARCHIVE_DST_DIR", cfg.archive.dst_dir);
    cfg.archive.min_size_mb = env_or_u64("AVC_MIN_SIZE_MB", cfg.archive.min_size_mb);
    cfg.archive.cooldown_secs = env_or_u64("AVC_COOLDOWN_SECS", cfg.archive.cooldown_secs);
    cfg.archive.collision_policy =
        env_or_collision_policy("AVC_COLLISION_POLICY", cfg.archive.collision_policy);
    cfg.mapping.src_dir = env_or_path("AVC_MAPPING_SRC_DIR", cfg.mapping.src_dir);
    cfg.mapping.dst_dir = env_or_path("AVC_MAPPING_DST_DIR", cfg.mapping.dst_dir);
    cfg.mapping.debounce_secs =
        env_or_u64("AVC_MAPPING_DEBOUNCE_SECS", cfg.mapping.debounce_secs);
    cfg.merge.ffmpeg_bin = env_or_path("AVC_FFMPEG_BIN", cfg.merge.ffmpeg_bin);

    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = CuratorConfig::default();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn rejects_empty_route_sides() {
        let mut cfg = CuratorConfig::default();
        cfg.archive
            .routes
            .insert("inbox".to_string(), RouteSpec::Dst("  ".to_string()));
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn routes_accept_short_and_table_forms() {
        let raw = r#"
            [archive.routes]
            inbox = "library"

            [archive.routes.small]
            dst = "shorts"
            min_size_mb = 10
        "#;
        let parsed: PartialCuratorConfig = toml::from_str(raw).unwrap();
        let archive = parsed.archive.unwrap();
        let inbox = &archive.routes["inbox"];
        let small = &archive.routes["small"];
        assert_eq!(inbox.dst(), "library");
        assert_eq!(inbox.min_size_mb(200), 200);
        assert_eq!(small.dst(), "shorts");
        assert_eq!(small.min_size_mb(200), 10);
    }

    #[test]
    fn rejects_zero_debounce() {
        let mut cfg = CuratorConfig::default();
        cfg.mapping.debounce_secs = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn partial_file_overrides_only_present_sections() {
        let raw = r#"
            [mapping]
            src_dir = "/library/strm"
            dst_dir = "/library/emby"
            debounce_secs = 7
        "#;
        let parsed: PartialCuratorConfig = toml::from_str(raw).unwrap();
        let mut cfg = CuratorConfig::default();
        if let Some(mapping) = parsed.mapping {
            cfg.mapping = mapping;
        }
        assert_eq!(cfg.mapping.debounce_secs, 7);
        assert_eq!(cfg.archive.min_size_mb, 200);
    }
}
