use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sensor source within a metocean buoy export that needs its own normalization rules.
///
/// The declaration order is the order the rules are applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Variant {
    SurfaceTemp,
    Gill,
    Currents,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::SurfaceTemp, Variant::Gill, Variant::Currents];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::SurfaceTemp => "surfacetemp",
            Variant::Gill => "gill",
            Variant::Currents => "currents",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lower = value.trim().to_ascii_lowercase();
        Variant::ALL
            .into_iter()
            .find(|variant| variant.as_str() == lower)
            .ok_or_else(|| format!("unknown variant '{}'", value.trim()))
    }
}

impl TryFrom<String> for Variant {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Any combination of [`Variant`]s; the tags are not mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSet(BTreeSet<Variant>);

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legacy selection: every variant whose tag occurs anywhere in `key`.
    /// `"morro_currents_2022.csv"` selects `currents`, but so would `"nocurrents.csv"`.
    pub fn infer_from_key(key: &str) -> Self {
        Variant::ALL
            .into_iter()
            .filter(|variant| key.contains(variant.as_str()))
            .collect()
    }

    pub fn with(mut self, variant: Variant) -> Self {
        self.0.insert(variant);
        self
    }

    pub fn contains(&self, variant: Variant) -> bool {
        self.0.contains(&variant)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Variants in application order.
    pub fn iter(&self) -> impl Iterator<Item = Variant> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Variant> for VariantSet {
    fn from_iter<I: IntoIterator<Item = Variant>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for VariantSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().map(|variant| variant.as_str()).collect();
        f.write_str(&tags.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_combined_tags_from_key() {
        let set = VariantSet::infer_from_key("buoy.z06.gill_currents.csv");
        assert!(set.contains(Variant::Gill));
        assert!(set.contains(Variant::Currents));
        assert!(!set.contains(Variant::SurfaceTemp));
        assert_eq!(set.to_string(), "gill,currents");
    }

    #[test]
    fn substring_inference_is_case_sensitive() {
        assert!(VariantSet::infer_from_key("CURRENTS.csv").is_empty());
    }

    #[test]
    fn explicit_tags_parse_exactly() {
        assert_eq!("Currents".parse::<Variant>(), Ok(Variant::Currents));
        assert!("current".parse::<Variant>().is_err());
    }

    #[test]
    fn config_tags_ignore_case() {
        let set: VariantSet = serde_yaml::from_str("[Gill, currents]").expect("yaml");
        assert_eq!(set.to_string(), "gill,currents");
        assert!(serde_yaml::from_str::<VariantSet>("[imu]").is_err());
    }

    #[test]
    fn applies_in_declaration_order() {
        let set = VariantSet::new()
            .with(Variant::Currents)
            .with(Variant::SurfaceTemp)
            .with(Variant::Gill);
        let order: Vec<Variant> = set.iter().collect();
        assert_eq!(order, Variant::ALL.to_vec());
    }
}
