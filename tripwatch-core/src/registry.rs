//! Vehicle Registry
//!
//! Durable mapping of Bluetooth device address to [`VehicleRecord`].
//!
//! The registry is loaded once when it is opened and written back in full
//! after every mutation. The persisted document is a JSON object keyed by
//! device address:
//!
//! ```json
//! {
//!   "00:11:22:33:44:55": {
//!     "deviceName": "SYNC",
//!     "vehicleType": "RENTAL",
//!     "registrationTime": 1700000000000,
//!     "expirationTime": 1700604800000,
//!     "suggestedCategory": "BUSINESS"
//!   }
//! }
//! ```
//!
//! Entries that fail to parse are skipped one at a time; the rest of the
//! registry stays usable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::vehicle::{ExpenseCategory, VehicleRecord, VehicleType};

/// Backing storage for the registry document.
///
/// The host decides where the document lives. `save` may hand the write off
/// to another thread; the registry does not wait for it.
pub trait RegistryStore {
    /// Read the persisted document, or None if nothing has been saved yet
    fn load(&mut self) -> Result<Option<String>>;

    /// Replace the persisted document
    fn save(&mut self, document: &str) -> Result<()>;
}

/// In-memory store that counts writes
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub document: Option<String>,
    pub saves: usize,
}

impl MemoryStore {
    pub fn with_document(document: &str) -> Self {
        MemoryStore {
            document: Some(document.to_string()),
            saves: 0,
        }
    }
}

impl RegistryStore for MemoryStore {
    fn load(&mut self) -> Result<Option<String>> {
        Ok(self.document.clone())
    }

    fn save(&mut self, document: &str) -> Result<()> {
        self.document = Some(document.to_string());
        self.saves += 1;
        Ok(())
    }
}

/// Persisted form of a record; the device address is the map key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVehicle {
    device_name: String,
    vehicle_type: VehicleType,
    registration_time: u64,
    #[serde(default)]
    expiration_time: u64,
    #[serde(default)]
    suggested_category: Option<ExpenseCategory>,
}

impl StoredVehicle {
    fn into_record(self, device_id: &str) -> VehicleRecord {
        VehicleRecord {
            device_id: device_id.to_string(),
            device_name: self.device_name,
            vehicle_type: self.vehicle_type,
            registration_time: self.registration_time,
            expiration_time: self.expiration_time,
            suggested_category: self
                .suggested_category
                .unwrap_or_else(|| self.vehicle_type.suggested_category()),
        }
    }
}

impl From<&VehicleRecord> for StoredVehicle {
    fn from(r: &VehicleRecord) -> Self {
        StoredVehicle {
            device_name: r.device_name.clone(),
            vehicle_type: r.vehicle_type,
            registration_time: r.registration_time,
            expiration_time: r.expiration_time,
            suggested_category: Some(r.suggested_category),
        }
    }
}

/// Registered vehicles keyed by device address
pub struct VehicleRegistry<S: RegistryStore> {
    store: S,
    vehicles: BTreeMap<String, VehicleRecord>,
}

impl<S: RegistryStore> VehicleRegistry<S> {
    /// Open the registry, loading whatever the store holds.
    ///
    /// A document that is not a JSON object at all yields an empty registry;
    /// only a failing store is an error.
    pub fn open(mut store: S) -> Result<Self> {
        let vehicles = match store.load()? {
            Some(document) => parse_document(&document),
            None => BTreeMap::new(),
        };
        log::debug!("Loaded {} registered vehicles", vehicles.len());

        Ok(VehicleRegistry { store, vehicles })
    }

    /// Register or re-register a device and persist the registry.
    pub fn register(
        &mut self,
        device_id: &str,
        device_name: &str,
        vehicle_type: VehicleType,
        now_ms: u64,
    ) -> Result<VehicleRecord> {
        let record = VehicleRecord::new(device_id, device_name, vehicle_type, now_ms);
        log::info!(
            "Registering {} '{}' as {} vehicle",
            device_id,
            device_name,
            vehicle_type
        );
        self.vehicles.insert(device_id.to_string(), record.clone());
        self.persist()?;
        Ok(record)
    }

    /// Remove a device. Persists only if it was registered.
    pub fn unregister(&mut self, device_id: &str) -> Result<Option<VehicleRecord>> {
        let removed = self.vehicles.remove(device_id);
        if removed.is_some() {
            log::info!("Unregistered vehicle {}", device_id);
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn lookup(&self, device_id: &str) -> Option<&VehicleRecord> {
        self.vehicles.get(device_id)
    }

    pub fn is_registered(&self, device_id: &str) -> bool {
        self.vehicles.contains_key(device_id)
    }

    /// Remove every expired record, persisting once if anything went.
    ///
    /// Returns the removed records.
    pub fn purge_expired(&mut self, now_ms: u64) -> Result<Vec<VehicleRecord>> {
        let expired: Vec<String> = self
            .vehicles
            .values()
            .filter(|v| v.is_expired(now_ms))
            .map(|v| v.device_id.clone())
            .collect();

        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let removed: Vec<VehicleRecord> = expired
            .iter()
            .filter_map(|id| self.vehicles.remove(id))
            .collect();
        for v in &removed {
            log::info!(
                "Vehicle {} '{}' registration expired",
                v.device_id,
                v.device_name
            );
        }
        self.persist()?;
        Ok(removed)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleRecord> {
        self.vehicles.values()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) -> Result<()> {
        let document: BTreeMap<&str, StoredVehicle> = self
            .vehicles
            .iter()
            .map(|(id, record)| (id.as_str(), StoredVehicle::from(record)))
            .collect();
        let json = serde_json::to_string(&document)?;
        self.store.save(&json)
    }
}

fn parse_document(document: &str) -> BTreeMap<String, VehicleRecord> {
    let entries: serde_json::Map<String, serde_json::Value> =
        match serde_json::from_str(document) {
            Ok(map) => map,
            Err(e) => {
                log::warn!("Vehicle registry is not a JSON object, starting empty: {}", e);
                return BTreeMap::new();
            }
        };

    let mut vehicles = BTreeMap::new();
    for (device_id, value) in entries {
        match serde_json::from_value::<StoredVehicle>(value) {
            Ok(stored) => {
                vehicles.insert(device_id.clone(), stored.into_record(&device_id));
            }
            Err(e) => {
                log::warn!("Skipping malformed registry entry {}: {}", device_id, e);
            }
        }
    }
    vehicles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::MS_PER_DAY;

    const T: u64 = 1_700_000_000_000;

    fn empty_registry() -> VehicleRegistry<MemoryStore> {
        VehicleRegistry::open(MemoryStore::default()).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = empty_registry();
        let record = registry
            .register("00:11:22:33:44:55", "SYNC", VehicleType::Business, T)
            .unwrap();

        assert_eq!(record.expiration_time, 0);
        assert_eq!(registry.lookup("00:11:22:33:44:55"), Some(&record));
        assert_eq!(registry.store().saves, 1);
    }

    #[test]
    fn test_register_overwrites() {
        let mut registry = empty_registry();
        registry
            .register("AA", "Old Name", VehicleType::Personal, T)
            .unwrap();
        registry
            .register("AA", "New Name", VehicleType::Rental, T + 1)
            .unwrap();

        let record = registry.lookup("AA").unwrap();
        assert_eq!(record.device_name, "New Name");
        assert_eq!(record.expiration_time, T + 1 + 7 * MS_PER_DAY);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = empty_registry();
        registry.register("AA", "Car", VehicleType::Personal, T).unwrap();

        assert!(registry.unregister("AA").unwrap().is_some());
        assert!(registry.lookup("AA").is_none());
        assert_eq!(registry.store().saves, 2);

        // Unknown device is not a write
        assert!(registry.unregister("AA").unwrap().is_none());
        assert_eq!(registry.store().saves, 2);
    }

    #[test]
    fn test_purge_expired_writes_once() {
        let mut registry = empty_registry();
        let rental = registry
            .register("RENT", "Hertz", VehicleType::Rental, T)
            .unwrap();
        registry.register("MINE", "My Car", VehicleType::Personal, T).unwrap();
        assert_eq!(rental.expiration_time, T + 7 * MS_PER_DAY);
        let saves_before = registry.store().saves;

        let removed = registry.purge_expired(T + 8 * MS_PER_DAY).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].device_id, "RENT");
        assert_eq!(registry.store().saves, saves_before + 1);

        // Second pass is a no-op and must not write
        let removed = registry.purge_expired(T + 8 * MS_PER_DAY).unwrap();
        assert!(removed.is_empty());
        assert_eq!(registry.store().saves, saves_before + 1);
        assert!(registry.is_registered("MINE"));
    }

    #[test]
    fn test_round_trip_through_store() {
        let mut registry = empty_registry();
        registry.register("AA", "Mazda", VehicleType::Borrowed, T).unwrap();
        let store = MemoryStore::with_document(registry.store().document.as_ref().unwrap());

        let reopened = VehicleRegistry::open(store).unwrap();
        let record = reopened.lookup("AA").unwrap();
        assert_eq!(record.device_name, "Mazda");
        assert_eq!(record.vehicle_type, VehicleType::Borrowed);
        assert_eq!(record.expiration_time, T + 3 * MS_PER_DAY);
        assert_eq!(record.suggested_category, ExpenseCategory::Personal);
    }

    #[test]
    fn test_persisted_field_names() {
        let mut registry = empty_registry();
        registry.register("AA", "Mazda", VehicleType::Rental, T).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(registry.store().document.as_ref().unwrap()).unwrap();

        let entry = &doc["AA"];
        assert_eq!(entry["deviceName"], "Mazda");
        assert_eq!(entry["vehicleType"], "RENTAL");
        assert_eq!(entry["registrationTime"], T);
        assert_eq!(entry["expirationTime"], T + 7 * MS_PER_DAY);
        assert_eq!(entry["suggestedCategory"], "BUSINESS");
    }

    #[test]
    fn test_malformed_entry_skipped() {
        let doc = r#"{
            "GOOD": {"deviceName": "Ford", "vehicleType": "PERSONAL",
                     "registrationTime": 1, "expirationTime": 0,
                     "suggestedCategory": "PERSONAL"},
            "BAD": {"deviceName": 42},
            "WORSE": "not an object"
        }"#;
        let registry = VehicleRegistry::open(MemoryStore::with_document(doc)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_registered("GOOD"));
    }

    #[test]
    fn test_garbage_document_is_empty() {
        let registry = VehicleRegistry::open(MemoryStore::with_document("[1, 2")).unwrap();
        assert!(registry.is_empty());
    }
}
