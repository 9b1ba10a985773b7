//! Vehicle records
//!
//! A vehicle is a Bluetooth device the user has registered. Rental and
//! borrowed vehicles expire on their own after a fixed period.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

/// How long a rental registration lasts
pub const RENTAL_LIFETIME_MS: u64 = 7 * MS_PER_DAY;

/// How long a borrowed vehicle registration lasts
pub const BORROWED_LIFETIME_MS: u64 = 3 * MS_PER_DAY;

/// Ownership of a registered vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Personal,
    Business,
    Rental,
    Borrowed,
}

impl Default for VehicleType {
    fn default() -> Self {
        VehicleType::Personal
    }
}

impl VehicleType {
    /// Registration lifetime, or None if it never expires
    pub fn lifetime_ms(&self) -> Option<u64> {
        match self {
            VehicleType::Rental => Some(RENTAL_LIFETIME_MS),
            VehicleType::Borrowed => Some(BORROWED_LIFETIME_MS),
            VehicleType::Personal | VehicleType::Business => None,
        }
    }

    /// Expense category that trips in this vehicle default to
    pub fn suggested_category(&self) -> ExpenseCategory {
        match self {
            VehicleType::Business | VehicleType::Rental => ExpenseCategory::Business,
            VehicleType::Personal | VehicleType::Borrowed => ExpenseCategory::Personal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Personal => "PERSONAL",
            VehicleType::Business => "BUSINESS",
            VehicleType::Rental => "RENTAL",
            VehicleType::Borrowed => "BORROWED",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mileage expense category for a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseCategory {
    Business,
    Personal,
    Medical,
    Charity,
}

impl Default for ExpenseCategory {
    fn default() -> Self {
        ExpenseCategory::Business
    }
}

/// A registered vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    /// Bluetooth device address
    pub device_id: String,
    pub device_name: String,
    pub vehicle_type: VehicleType,
    /// Milliseconds since epoch
    pub registration_time: u64,
    /// Milliseconds since epoch, 0 means never
    pub expiration_time: u64,
    pub suggested_category: ExpenseCategory,
}

impl VehicleRecord {
    /// Create a record registered at `now_ms`. The expiration time is fixed here
    /// from the vehicle type and never changes afterwards.
    pub fn new(device_id: &str, device_name: &str, vehicle_type: VehicleType, now_ms: u64) -> Self {
        let expiration_time = vehicle_type
            .lifetime_ms()
            .map(|lifetime| now_ms + lifetime)
            .unwrap_or(0);

        VehicleRecord {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            vehicle_type,
            registration_time: now_ms,
            expiration_time,
            suggested_category: vehicle_type.suggested_category(),
        }
    }

    pub fn expires(&self) -> bool {
        self.expiration_time != 0
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires() && now_ms > self.expiration_time
    }
}
