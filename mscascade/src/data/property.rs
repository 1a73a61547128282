use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kinds of annotation a feature can carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Isotope,
    Adduct,
    Identity,
    Score,
}

/// Directed isotope relation: `position` is 0 for the monoisotopic "M", signed offset otherwise
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Isotope {
    pub label: String,
    pub position: i32,
    pub parent_id: usize,
    pub child_id: usize,
}

/// Directed adduct relation between a reference ion (parent) and an adduct ion (child)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Adduct {
    pub name: String,
    pub mass: f64,
    pub parent_id: usize,
    pub child_id: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub notation: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub name: String,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Isotope(Isotope),
    Adduct(Adduct),
    Identity(Identity),
    Score(Score),
}

impl Property {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Property::Isotope(_) => PropertyKind::Isotope,
            Property::Adduct(_) => PropertyKind::Adduct,
            Property::Identity(_) => PropertyKind::Identity,
            Property::Score(_) => PropertyKind::Score,
        }
    }

    pub fn isotope(label: impl Into<String>, position: i32, parent_id: usize, child_id: usize) -> Self {
        Property::Isotope(Isotope { label: label.into(), position, parent_id, child_id })
    }

    pub fn adduct(name: impl Into<String>, mass: f64, parent_id: usize, child_id: usize) -> Self {
        Property::Adduct(Adduct { name: name.into(), mass, parent_id, child_id })
    }

    pub fn score(name: impl Into<String>, score: f64) -> Self {
        Property::Score(Score { name: name.into(), score })
    }
}

/// Annotations of one feature, grouped by kind
///
/// Each kind holds an insertion ordered list without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag {
    properties: BTreeMap<PropertyKind, Vec<Property>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        PropertyBag { properties: BTreeMap::new() }
    }

    /// Appends a property unless an equal one is already present
    pub fn add(&mut self, property: Property) {
        let entry = self.properties.entry(property.kind()).or_default();
        if !entry.contains(&property) {
            entry.push(property);
        }
    }

    /// Replaces every property of the same kind
    pub fn set(&mut self, property: Property) {
        self.properties.insert(property.kind(), vec![property]);
    }

    pub fn get(&self, kind: PropertyKind) -> &[Property] {
        self.properties.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, kind: PropertyKind) -> bool {
        !self.get(kind).is_empty()
    }

    pub fn isotopes(&self) -> impl Iterator<Item = &Isotope> {
        self.get(PropertyKind::Isotope).iter().filter_map(|p| match p {
            Property::Isotope(isotope) => Some(isotope),
            _ => None,
        })
    }

    pub fn adducts(&self) -> impl Iterator<Item = &Adduct> {
        self.get(PropertyKind::Adduct).iter().filter_map(|p| match p {
            Property::Adduct(adduct) => Some(adduct),
            _ => None,
        })
    }

    pub fn scores(&self) -> impl Iterator<Item = &Score> {
        self.get(PropertyKind::Score).iter().filter_map(|p| match p {
            Property::Score(score) => Some(score),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.properties.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let mut bag = PropertyBag::new();
        bag.add(Property::isotope("M", 0, 1, 1));
        bag.add(Property::isotope("M", 0, 1, 1));
        bag.add(Property::isotope("M+1", 1, 1, 2));
        assert_eq!(bag.get(PropertyKind::Isotope).len(), 2);
        assert!(!bag.has(PropertyKind::Adduct));
    }

    #[test]
    fn test_set_replaces_kind() {
        let mut bag = PropertyBag::new();
        bag.add(Property::isotope("M", 0, 1, 1));
        bag.add(Property::score("dw", 1.2));
        bag.set(Property::isotope("M+1", 1, 3, 4));
        let labels: Vec<&str> = bag.isotopes().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["M+1"]);
        assert_eq!(bag.scores().count(), 1);
    }
}
