//! Fixed reference sets that row labels resolve against.
//!
//! Matching folds case, whitespace, punctuation and a trailing "District"
//! away, then looks the result up exactly. There is no fuzzy matching: a
//! name that is not a known spelling stays unresolved.

use crate::policy::GazetteerKind;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize)]
pub struct Place {
    pub name: &'static str,
    /// (latitude, longitude) of an approximate centroid
    pub coordinates: Option<(f64, f64)>,
    /// Enclosing area: province for districts, river basin for stations
    pub area: &'static str,
}

pub struct Gazetteer {
    kind: GazetteerKind,
    places: Vec<Place>,
    index: HashMap<String, usize>,
}

// (name, lat, lon, province, alternate spellings)
const DISTRICTS: &[(&str, f64, f64, &str, &[&str])] = &[
    ("Ampara", 7.2917, 81.6720, "Eastern", &["Amparai", "Digamadulla"]),
    ("Anuradhapura", 8.3350, 80.4108, "North Central", &["Anuradapura", "Anuradhapure"]),
    ("Badulla", 6.9934, 81.0550, "Uva", &[]),
    ("Batticaloa", 7.7310, 81.6747, "Eastern", &["Baticaloa", "Batticalo"]),
    ("Colombo", 6.9271, 79.8612, "Western", &["Colombo Municipal"]),
    ("Galle", 6.0535, 80.2210, "Southern", &[]),
    ("Gampaha", 7.0873, 80.0144, "Western", &[]),
    ("Hambantota", 6.1429, 81.1212, "Southern", &["Hambanthota"]),
    ("Jaffna", 9.6615, 80.0255, "Northern", &["Yalpanam"]),
    ("Kalutara", 6.5854, 79.9607, "Western", &["Kaluthara"]),
    ("Kandy", 7.2906, 80.6337, "Central", &["Mahanuwara"]),
    ("Kegalle", 7.2513, 80.3464, "Sabaragamuwa", &["Kegalla"]),
    ("Kilinochchi", 9.3803, 80.3770, "Northern", &["Killinochchi", "Kilinochi"]),
    ("Kurunegala", 7.4863, 80.3647, "North Western", &["Kurunagala"]),
    ("Mannar", 8.9810, 79.9044, "Northern", &["Manner"]),
    ("Matale", 7.4675, 80.6234, "Central", &[]),
    ("Matara", 5.9549, 80.5550, "Southern", &[]),
    ("Monaragala", 6.8728, 81.3507, "Uva", &["Moneragala"]),
    ("Mullaitivu", 9.2671, 80.8142, "Northern", &["Mullativu", "Mulativu", "Mullaithivu"]),
    ("Nuwara Eliya", 6.9497, 80.7891, "Central", &["NuwaraEliya", "N'Eliya", "N. Eliya"]),
    ("Polonnaruwa", 7.9403, 81.0188, "North Central", &["Pollonnaruwa", "Polonnaruva"]),
    ("Puttalam", 8.0362, 79.8283, "North Western", &["Puttlam", "Puttalum"]),
    ("Ratnapura", 6.6828, 80.3992, "Sabaragamuwa", &["Rathnapura"]),
    ("Trincomalee", 8.5874, 81.2152, "Eastern", &["Trinco", "Trincomale"]),
    ("Vavuniya", 8.7514, 80.4971, "Northern", &["Vavunia"]),
];

// (station, basin, alternate spellings)
const GAUGING_STATIONS: &[(&str, &str, &[&str])] = &[
    ("Nagalagam Street", "Kelani Ganga", &["Nagalagam St", "Nagalagam"]),
    ("Hanwella", "Kelani Ganga", &[]),
    ("Glencourse", "Kelani Ganga", &["Glencorse"]),
    ("Kitulgala", "Kelani Ganga", &["Kithulgala"]),
    ("Holombuwa", "Kelani Ganga", &[]),
    ("Deraniyagala", "Kelani Ganga", &[]),
    ("Norwood", "Kelani Ganga", &[]),
    ("Putupaula", "Kalu Ganga", &["Putupaula (Kalutara)"]),
    ("Ellagawa", "Kalu Ganga", &[]),
    ("Rathnapura", "Kalu Ganga", &["Ratnapura"]),
    ("Magura", "Kalu Ganga", &[]),
    ("Kalawellawa", "Kalu Ganga", &["Kalawellawa (Millakanda)", "Millakanda"]),
    ("Baddegama", "Gin Ganga", &[]),
    ("Thawalama", "Gin Ganga", &["Tawalama"]),
    ("Thalgahagoda", "Nilwala Ganga", &["Talgahagoda"]),
    ("Pitabeddara", "Nilwala Ganga", &[]),
    ("Urawa", "Nilwala Ganga", &[]),
    ("Panadugama", "Nilwala Ganga", &[]),
    ("Moraketiya", "Walawe Ganga", &[]),
    ("Dunamale", "Attanagalu Oya", &[]),
    ("Badalgama", "Maha Oya", &[]),
    ("Giriulla", "Maha Oya", &[]),
    ("Moragaswewa", "Deduru Oya", &[]),
    ("Manampitiya", "Mahaweli Ganga", &[]),
    ("Weraganthota", "Mahaweli Ganga", &["Weragantota"]),
    ("Peradeniya", "Mahaweli Ganga", &[]),
    ("Nawalapitiya", "Mahaweli Ganga", &[]),
    ("Thaldena", "Mahaweli Ganga", &["Taldena"]),
    ("Nawagiriya", "Mundeni Aru", &[]),
    ("Padiyathalawa", "Maduru Oya", &["Padiyatalawa"]),
];

static DISTRICT_GAZETTEER: LazyLock<Gazetteer> = LazyLock::new(|| {
    Gazetteer::new(
        GazetteerKind::Districts,
        DISTRICTS.iter().map(|(name, lat, lon, province, aliases)| {
            (
                Place {
                    name: *name,
                    coordinates: Some((*lat, *lon)),
                    area: *province,
                },
                *aliases,
            )
        }),
    )
});

static STATION_GAZETTEER: LazyLock<Gazetteer> = LazyLock::new(|| {
    Gazetteer::new(
        GazetteerKind::GaugingStations,
        GAUGING_STATIONS.iter().map(|(name, basin, aliases)| {
            (
                Place {
                    name: *name,
                    coordinates: None,
                    area: *basin,
                },
                *aliases,
            )
        }),
    )
});

/// Lowercased alphanumerics with "district"/"dist" words removed
pub fn fold(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| word != "district" && word != "dist")
        .collect()
}

impl Gazetteer {
    fn new(kind: GazetteerKind, entries: impl Iterator<Item = (Place, &'static [&'static str])>) -> Self {
        let mut places = Vec::new();
        let mut index = HashMap::new();
        for (place, aliases) in entries {
            let position = places.len();
            index.insert(fold(place.name), position);
            for alias in aliases {
                index.entry(fold(alias)).or_insert(position);
            }
            places.push(place);
        }
        Self {
            kind,
            places,
            index,
        }
    }

    pub fn for_kind(kind: GazetteerKind) -> &'static Gazetteer {
        match kind {
            GazetteerKind::Districts => &DISTRICT_GAZETTEER,
            GazetteerKind::GaugingStations => &STATION_GAZETTEER,
        }
    }

    pub fn kind(&self) -> GazetteerKind {
        self.kind
    }

    /// Canonical place for a raw label, if it is a known spelling
    pub fn resolve(&self, raw: &str) -> Option<&Place> {
        let folded = fold(raw);
        if folded.is_empty() {
            return None;
        }
        self.index.get(&folded).map(|&i| &self.places[i])
    }

    /// Place by canonical name
    pub fn place(&self, canonical: &str) -> Option<&Place> {
        self.places.iter().find(|p| p.name == canonical)
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_five_districts() {
        let districts = Gazetteer::for_kind(GazetteerKind::Districts);
        assert_eq!(districts.places().len(), 25);
        assert!(districts.places().iter().all(|p| p.coordinates.is_some()));
    }

    #[test]
    fn alternate_spellings_resolve_to_one_name() {
        let districts = Gazetteer::for_kind(GazetteerKind::Districts);
        for raw in ["Rathnapura", "RATNAPURA", "Ratnapura District"] {
            assert_eq!(districts.resolve(raw).unwrap().name, "Ratnapura");
        }
        for raw in ["NuwaraEliya", "Nuwara-Eliya", "nuwara  eliya", "N'Eliya"] {
            assert_eq!(districts.resolve(raw).unwrap().name, "Nuwara Eliya");
        }
        assert_eq!(districts.resolve("Moneragala").unwrap().name, "Monaragala");
        assert_eq!(districts.resolve("Trinco").unwrap().name, "Trincomalee");
    }

    #[test]
    fn every_canonical_name_and_alias_is_unambiguous() {
        for kind in [GazetteerKind::Districts, GazetteerKind::GaugingStations] {
            let gazetteer = Gazetteer::for_kind(kind);
            let mut seen = std::collections::HashSet::new();
            for place in gazetteer.places() {
                assert!(seen.insert(fold(place.name)), "duplicate {}", place.name);
                assert_eq!(gazetteer.resolve(place.name).unwrap().name, place.name);
            }
        }
    }

    /// Every spelling in a table, folded, paired with the place it names
    fn spellings<'a>(entries: impl Iterator<Item = (&'a str, &'a [&'a str])>) -> Vec<(String, &'a str)> {
        entries
            .flat_map(|(name, aliases)| {
                std::iter::once(name)
                    .chain(aliases.iter().copied())
                    .map(move |spelling| (fold(spelling), name))
            })
            .collect()
    }

    #[test]
    fn no_folded_spelling_names_two_places() {
        let tables = [
            (
                GazetteerKind::Districts,
                spellings(DISTRICTS.iter().map(|(name, _, _, _, aliases)| (*name, *aliases))),
            ),
            (
                GazetteerKind::GaugingStations,
                spellings(GAUGING_STATIONS.iter().map(|(name, _, aliases)| (*name, *aliases))),
            ),
        ];
        for (kind, spellings) in tables {
            let gazetteer = Gazetteer::for_kind(kind);
            let mut owners: HashMap<String, &str> = HashMap::new();
            for (folded, name) in spellings {
                assert!(!folded.is_empty(), "{name} has a spelling that folds to nothing");
                let owner = *owners.entry(folded.clone()).or_insert(name);
                assert_eq!(owner, name, "{folded:?} names both {owner} and {name}");
                assert_eq!(gazetteer.resolve(&folded).map(|p| p.name), Some(name));
            }
        }
    }

    #[test]
    fn unknown_names_never_resolve() {
        let districts = Gazetteer::for_kind(GazetteerKind::Districts);
        assert!(districts.resolve("Colombo North").is_none());
        assert!(districts.resolve("Kandi").is_none());
        assert!(districts.resolve("District").is_none());
        assert!(districts.resolve("").is_none());
    }

    #[test]
    fn stations_carry_their_basin() {
        let stations = Gazetteer::for_kind(GazetteerKind::GaugingStations);
        let station = stations.resolve("Nagalagam St").unwrap();
        assert_eq!(station.name, "Nagalagam Street");
        assert_eq!(station.area, "Kelani Ganga");
        assert!(station.coordinates.is_none());
    }
}
