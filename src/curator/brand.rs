use crate::curator::avid::Avid;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Maps an identifier's brand to its destination subdirectory. Brands
/// listed in a configured group route to `GROUP/BRAND`; unlisted brands
/// land in a directory named after the brand itself; identifiers with no
/// usable brand fall back to the default bucket. Routing is total, so a
/// missing mapping never blocks a move.
#[derive(Debug, Clone, Default)]
pub struct BrandRouter {
    groups: Vec<(String, Vec<String>)>,
    default_bucket: String,
}

impl BrandRouter {
    pub fn new(brand_groups: &BTreeMap<String, Vec<String>>, default_bucket: &str) -> Self {
        let groups = brand_groups
            .iter()
            .map(|(group, brands)| {
                (
                    group.clone(),
                    brands.iter().map(|b| b.to_uppercase()).collect(),
                )
            })
            .collect();
        Self {
            groups,
            default_bucket: default_bucket.to_string(),
        }
    }

    /// Destination directory relative to the route's archive root.
    pub fn route(&self, avid: &Avid) -> PathBuf {
        let Some(brand) = avid.brand() else {
            return PathBuf::from(&self.default_bucket);
        };
        let needle = brand.to_uppercase();
        for (group, brands) in &self.groups {
            if brands.iter().any(|b| b == &needle) {
                return PathBuf::from(group).join(&brand);
            }
        }
        PathBuf::from(brand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AvidConfig;
    use crate::curator::avid::AvidResolver;
    use std::path::Path;

    fn avid(name: &str) -> Avid {
        AvidResolver::new(&AvidConfig::default())
            .expect("resolver")
            .resolve(name)
            .expect("resolves")
    }

    fn router(groups: BTreeMap<String, Vec<String>>) -> BrandRouter {
        BrandRouter::new(&groups, "other")
    }

    #[test]
    fn grouped_brand_nests_under_group_dir() {
        let mut groups = BTreeMap::new();
        groups.insert("prestige-group".to_string(), vec!["abc".to_string()]);

        let got = router(groups).route(&avid("ABC-123.mp4"));
        assert_eq!(got, Path::new("prestige-group/ABC"));
    }

    #[test]
    fn unlisted_brand_falls_back_to_brand_dir() {
        let got = router(BTreeMap::new()).route(&avid("FOO-001.mp4"));
        assert_eq!(got, Path::new("FOO"));
    }

    #[test]
    fn brand_comparison_is_case_insensitive() {
        let mut groups = BTreeMap::new();
        groups.insert("amateur".to_string(), vec!["FoO".to_string()]);

        let got = router(groups).route(&avid("foo_001.mp4"));
        assert_eq!(got, Path::new("amateur/FOO"));
    }

    #[test]
    fn brandless_identifier_lands_in_default_bucket() {
        let got = router(BTreeMap::new()).route(&avid("N1234.mp4"));
        assert_eq!(got, Path::new("other"));
    }
}
