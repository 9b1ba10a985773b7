//! Vehicle Classifier
//!
//! Decides from a Bluetooth device name whether the device is plausibly a car
//! head unit. Only likely vehicles are ever offered for registration, so a
//! name that matches nothing is treated as not a vehicle.

use serde::{Deserialize, Serialize};

/// Terms found in head unit, hands-free kit and manufacturer names
const VEHICLE_KEYWORDS: &[&str] = &[
    // Generic
    "car",
    "vehicle",
    "auto",
    "hands-free",
    "handsfree",
    "carkit",
    // Infotainment systems
    "sync",
    "uconnect",
    "carplay",
    "mylink",
    "entune",
    "intellilink",
    "idrive",
    "mbux",
    "mmi",
    "sensus",
    "starlink",
    "bluelink",
    // Manufacturers
    "acura",
    "audi",
    "bmw",
    "buick",
    "cadillac",
    "chevrolet",
    "chevy",
    "chrysler",
    "dodge",
    "fiat",
    "ford",
    "genesis",
    "gmc",
    "honda",
    "hyundai",
    "infiniti",
    "jaguar",
    "jeep",
    "kia",
    "land rover",
    "lexus",
    "lincoln",
    "mazda",
    "mercedes",
    "mitsubishi",
    "nissan",
    "peugeot",
    "porsche",
    "renault",
    "subaru",
    "tesla",
    "toyota",
    "volkswagen",
    "volvo",
];

/// Terms found in peripherals that are never a vehicle
const EXCLUDED_KEYWORDS: &[&str] = &[
    // Audio wearables
    "headphone",
    "headset",
    "earbud",
    "earphone",
    "airpods",
    "buds",
    "beats",
    // Wearables
    "watch",
    "fitbit",
    "garmin",
    // TVs and computers
    "television",
    "laptop",
    "macbook",
    "computer",
    "desktop",
    "keyboard",
    "mouse",
    // Game controllers
    "controller",
    "gamepad",
    "xbox",
    "playstation",
    "dualshock",
    "dualsense",
    "joy-con",
    // Speakers
    "speaker",
    "soundbar",
    "jbl",
    "bose",
    "sonos",
];

/// Exclusions short enough to hide inside ordinary words ("Husband"), so
/// they only match as a whole word
const EXCLUDED_WORDS: &[&str] = &["tv", "band"];

/// Result of classifying a device name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    LikelyVehicle,
    NotVehicle,
}

impl VehicleClass {
    pub fn is_vehicle(&self) -> bool {
        *self == VehicleClass::LikelyVehicle
    }
}

/// Classify a device by name.
///
/// Exclusion keywords are checked first, so "Car Speaker" is not a vehicle.
pub fn classify(device_name: &str) -> VehicleClass {
    let name = device_name.to_lowercase();

    if EXCLUDED_KEYWORDS.iter().any(|k| name.contains(k))
        || name
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| EXCLUDED_WORDS.contains(&word))
    {
        return VehicleClass::NotVehicle;
    }

    if VEHICLE_KEYWORDS.iter().any(|k| name.contains(k)) {
        VehicleClass::LikelyVehicle
    } else {
        VehicleClass::NotVehicle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_names() {
        for name in [
            "My Car",
            "SYNC",
            "Uconnect 4C",
            "TOYOTA Prius",
            "Mazda CX-5",
            "VW Volkswagen",
            "Honda HandsFreeLink",
        ] {
            assert_eq!(classify(name), VehicleClass::LikelyVehicle, "{}", name);
        }
    }

    #[test]
    fn test_excluded_names() {
        for name in ["AirPods Pro", "Galaxy Watch", "Living Room TV", "Xbox Wireless Controller"] {
            assert_eq!(classify(name), VehicleClass::NotVehicle, "{}", name);
        }
    }

    #[test]
    fn test_exclusion_takes_precedence() {
        // Both sets match
        assert_eq!(classify("Car Speaker"), VehicleClass::NotVehicle);
        assert_eq!(classify("Ford Headset"), VehicleClass::NotVehicle);
        assert_eq!(classify("Tesla Buds"), VehicleClass::NotVehicle);
        assert_eq!(classify("AUTO JBL"), VehicleClass::NotVehicle);
    }

    #[test]
    fn test_short_exclusions_match_whole_words() {
        assert_eq!(classify("Husband's Ford"), VehicleClass::LikelyVehicle);
        assert_eq!(classify("Bandit Jeep"), VehicleClass::LikelyVehicle);
        assert_eq!(classify("Samsung TV"), VehicleClass::NotVehicle);
        assert_eq!(classify("Mi Band 5"), VehicleClass::NotVehicle);
        assert_eq!(classify("Car-TV"), VehicleClass::NotVehicle);
    }

    #[test]
    fn test_unknown_is_not_vehicle() {
        assert_eq!(classify("XYZ-1234"), VehicleClass::NotVehicle);
        assert_eq!(classify(""), VehicleClass::NotVehicle);
    }

    #[test]
    fn test_case_insensitive() {
        assert!(classify("NISSAN CONNECT").is_vehicle());
        assert!(classify("nissan connect").is_vehicle());
        assert!(!classify("SONY HEADPHONES").is_vehicle());
    }
}
