//! Vendor identification from product URLs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sites with a hand-written parser. The set is fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorType {
    Lamoda,
    Kixbox,
    Oktyabr,
    Lime,
    Ridestep,
    Traektoria,
    Unknown,
}

/// Host substring → vendor. First match wins.
const HOST_MARKERS: [(&str, VendorType); 6] = [
    ("lamoda", VendorType::Lamoda),
    ("kixbox", VendorType::Kixbox),
    ("oktyabr", VendorType::Oktyabr),
    ("lime-shop", VendorType::Lime),
    ("ridestep", VendorType::Ridestep),
    ("traektoria", VendorType::Traektoria),
];

impl VendorType {
    pub const SUPPORTED: [Self; 6] = [
        Self::Lamoda,
        Self::Kixbox,
        Self::Oktyabr,
        Self::Lime,
        Self::Ridestep,
        Self::Traektoria,
    ];

    /// Resolve the vendor from the URL host. Unparsable URLs map to `Unknown`.
    pub fn from_url(raw: &str) -> Self {
        let Ok(parsed) = url::Url::parse(raw.trim()) else {
            return Self::Unknown;
        };
        let Some(host) = parsed.host_str() else {
            return Self::Unknown;
        };
        let host = host.to_ascii_lowercase();

        HOST_MARKERS
            .iter()
            .find(|(marker, _)| host.contains(marker))
            .map_or(Self::Unknown, |(_, vendor)| *vendor)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lamoda => "lamoda",
            Self::Kixbox => "kixbox",
            Self::Oktyabr => "oktyabr",
            Self::Lime => "lime",
            Self::Ridestep => "ridestep",
            Self::Traektoria => "traektoria",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VendorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::SUPPORTED
            .into_iter()
            .find(|vendor| vendor.as_str() == normalized)
            .ok_or_else(|| format!("unknown vendor type: {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.lamoda.ru/p/rtlacv500501/clothes-carhartt-wip-bryuki/", VendorType::Lamoda)]
    #[case("https://kixbox.ru/product/nike-air-force-1", VendorType::Kixbox)]
    #[case("https://oktyabrskate.ru/product/deck", VendorType::Oktyabr)]
    #[case("https://lime-shop.com/ru_ru/product/21261_0428_887-temno_seryi_melanz", VendorType::Lime)]
    #[case("https://ridestep.ru/product/vans-old-skool/", VendorType::Ridestep)]
    #[case("https://www.traektoria.ru/product/1639029_bryuki/?SKU=1645314", VendorType::Traektoria)]
    #[case("https://example.com/product/1", VendorType::Unknown)]
    #[case("not a url", VendorType::Unknown)]
    #[case("", VendorType::Unknown)]
    fn resolves_vendor_from_host(#[case] url: &str, #[case] expected: VendorType) {
        assert_eq!(VendorType::from_url(url), expected);
    }

    #[test]
    fn path_does_not_influence_vendor() {
        assert_eq!(
            VendorType::from_url("https://example.com/lamoda/product"),
            VendorType::Unknown
        );
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("Lamoda".parse::<VendorType>(), Ok(VendorType::Lamoda));
        assert_eq!(" lime ".parse::<VendorType>(), Ok(VendorType::Lime));
        assert!("unknown".parse::<VendorType>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&VendorType::Traektoria).unwrap();
        assert_eq!(json, "\"traektoria\"");
    }
}
