//! File persistence for the vehicle registry and the completed trip list.
//!
//! Both documents are rewritten in full. Writes are queued to a background
//! task so the engine never waits on the disk; reads happen once, at startup,
//! before the engine task begins.

use directories::ProjectDirs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use tripwatch_core::registry::RegistryStore;
use tripwatch_core::trip::CompletedTrip;

const VEHICLES_FILE: &str = "vehicles.json";
const TRIPS_FILE: &str = "trips.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no home directory to place data in, use --data-dir")]
    NoDataDir,

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage writer has stopped")]
    WriterClosed,
}

impl From<StorageError> for tripwatch_core::Error {
    fn from(e: StorageError) -> Self {
        tripwatch_core::Error::Persistence(e.to_string())
    }
}

/// Where the persisted documents live
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Use `dir` if given, otherwise the per-user data directory. The
    /// directory is created if it does not exist yet.
    pub fn resolve(dir: Option<PathBuf>) -> Result<DataDir, StorageError> {
        let root = match dir {
            Some(dir) => dir,
            None => ProjectDirs::from("org", "Tripwatch", "tripwatch")
                .ok_or(StorageError::NoDataDir)?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        log::debug!("Data directory {}", root.display());
        Ok(DataDir { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vehicles_path(&self) -> PathBuf {
        self.root.join(VEHICLES_FILE)
    }

    pub fn trips_path(&self) -> PathBuf {
        self.root.join(TRIPS_FILE)
    }
}

/// A complete replacement of one file
#[derive(Debug, Clone, PartialEq)]
pub struct WriteJob {
    pub path: PathBuf,
    pub contents: String,
}

/// Sending half of the write queue
#[derive(Debug, Clone)]
pub struct StorageWriter {
    tx: mpsc::UnboundedSender<WriteJob>,
}

/// Receiving half of the write queue, drained by the writer task
#[derive(Debug)]
pub struct WriteQueue {
    rx: mpsc::UnboundedReceiver<WriteJob>,
}

pub fn write_queue() -> (StorageWriter, WriteQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StorageWriter { tx }, WriteQueue { rx })
}

impl StorageWriter {
    pub fn submit(&self, path: &Path, contents: String) -> Result<(), StorageError> {
        self.tx
            .send(WriteJob {
                path: path.to_path_buf(),
                contents,
            })
            .map_err(|_| StorageError::WriterClosed)
    }
}

impl WriteQueue {
    /// Writer subsystem. Keeps going through a shutdown request until every
    /// sender is dropped, so the final saves of a stopping engine still land.
    pub async fn run(self, _subsys: SubsystemHandle) -> anyhow::Result<()> {
        let written = self.drain().await;
        log::debug!("Storage writer finished after {} writes", written);
        Ok(())
    }

    /// Write every queued job until all senders are gone
    pub async fn drain(mut self) -> usize {
        let mut written = 0;
        while let Some(job) = self.rx.recv().await {
            match write_atomic(&job.path, &job.contents).await {
                Ok(()) => {
                    written += 1;
                    log::trace!("Wrote {} bytes to {}", job.contents.len(), job.path.display());
                }
                Err(e) => log::error!("{}", e),
            }
        }
        written
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    let io_error = |source: io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, contents).await.map_err(io_error)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_error)
}

fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Registry document in `vehicles.json`
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    path: PathBuf,
    writer: StorageWriter,
}

impl FileRegistryStore {
    pub fn new(data_dir: &DataDir, writer: StorageWriter) -> Self {
        FileRegistryStore {
            path: data_dir.vehicles_path(),
            writer,
        }
    }
}

impl RegistryStore for FileRegistryStore {
    fn load(&mut self) -> tripwatch_core::Result<Option<String>> {
        Ok(read_optional(&self.path)?)
    }

    fn save(&mut self, document: &str) -> tripwatch_core::Result<()> {
        Ok(self.writer.submit(&self.path, document.to_string())?)
    }
}

/// Completed trips in `trips.json`, newest last
#[derive(Debug)]
pub struct TripLog {
    path: PathBuf,
    trips: Vec<CompletedTrip>,
    writer: StorageWriter,
}

impl TripLog {
    /// Load the existing list. An unreadable list is logged and replaced
    /// by an empty one rather than failing startup.
    pub fn open(data_dir: &DataDir, writer: StorageWriter) -> Result<TripLog, StorageError> {
        let path = data_dir.trips_path();
        let trips = match read_optional(&path)? {
            None => Vec::new(),
            Some(contents) => match serde_json::from_str::<Vec<CompletedTrip>>(&contents) {
                Ok(trips) => trips,
                Err(source) => {
                    log::warn!(
                        "{}",
                        StorageError::Json {
                            path: path.clone(),
                            source
                        }
                    );
                    Vec::new()
                }
            },
        };
        log::info!("Loaded {} trips from {}", trips.len(), path.display());
        Ok(TripLog {
            path,
            trips,
            writer,
        })
    }

    pub fn trips(&self) -> &[CompletedTrip] {
        &self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn append(&mut self, trip: CompletedTrip) -> Result<(), StorageError> {
        self.trips.push(trip);
        let contents =
            serde_json::to_string_pretty(&self.trips).map_err(|source| StorageError::Json {
                path: self.path.clone(),
                source,
            })?;
        self.writer.submit(&self.path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwatch_core::registry::VehicleRegistry;
    use tripwatch_core::trip::TripMethod;
    use tripwatch_core::vehicle::{ExpenseCategory, VehicleType};

    fn trip(id: u64) -> CompletedTrip {
        CompletedTrip {
            id,
            start_time: id,
            end_time: id + 600_000,
            start_latitude: 37.0,
            start_longitude: -122.0,
            end_latitude: 37.1,
            end_longitude: -122.0,
            distance: 6.9,
            duration: 600_000,
            method: TripMethod::BluetoothGps,
            category: ExpenseCategory::Business,
            vehicle_id: Some("00:11:22:33:44:55".to_string()),
        }
    }

    #[test]
    fn test_data_dir_created() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("nested").join("data");
        let dir = DataDir::resolve(Some(root.clone())).unwrap();

        assert!(root.is_dir());
        assert_eq!(dir.vehicles_path(), root.join("vehicles.json"));
        assert_eq!(dir.trips_path(), root.join("trips.json"));
    }

    #[tokio::test]
    async fn test_registry_round_trip_through_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path().to_path_buf())).unwrap();

        let (writer, queue) = write_queue();
        {
            let store = FileRegistryStore::new(&dir, writer);
            let mut registry = VehicleRegistry::open(store).unwrap();
            registry
                .register("00:11:22:33:44:55", "SYNC", VehicleType::Rental, 1_000)
                .unwrap();
        }
        assert_eq!(queue.drain().await, 1);

        let (writer, _queue) = write_queue();
        let registry = VehicleRegistry::open(FileRegistryStore::new(&dir, writer)).unwrap();
        let record = registry.lookup("00:11:22:33:44:55").unwrap();
        assert_eq!(record.device_name, "SYNC");
        assert_eq!(record.vehicle_type, VehicleType::Rental);
        assert!(!dir.root().join("vehicles.json.tmp").exists());
    }

    #[test]
    fn test_missing_registry_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, _queue) = write_queue();
        let registry = VehicleRegistry::open(FileRegistryStore::new(&dir, writer)).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_save_after_writer_stopped_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, queue) = write_queue();
        drop(queue);

        let mut store = FileRegistryStore::new(&dir, writer);
        assert!(matches!(
            store.save("{}"),
            Err(tripwatch_core::Error::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_trip_log_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path().to_path_buf())).unwrap();

        let (writer, queue) = write_queue();
        let mut log = TripLog::open(&dir, writer).unwrap();
        assert!(log.is_empty());
        log.append(trip(1)).unwrap();
        log.append(trip(2)).unwrap();
        drop(log);
        assert_eq!(queue.drain().await, 2);

        let (writer, _queue) = write_queue();
        let log = TripLog::open(&dir, writer).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.trips()[1], trip(2));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.trips_path()).unwrap()).unwrap();
        assert_eq!(json[0]["method"], "BLUETOOTH_GPS");
        assert_eq!(json[0]["vehicleId"], "00:11:22:33:44:55");
    }

    #[test]
    fn test_corrupt_trip_log_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path().to_path_buf())).unwrap();
        std::fs::write(dir.trips_path(), "not json").unwrap();

        let (writer, _queue) = write_queue();
        assert!(TripLog::open(&dir, writer).unwrap().is_empty());
    }
}
