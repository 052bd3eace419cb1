//! Factorio blueprint library decoder
//!
//! Reads the `blueprint-storage-2.dat` file Factorio keeps in its user data directory
//! and turns it into typed library objects.
//!
//! ```no_run
//! # async fn run() -> blueprint_storage::Result<()> {
//! let path = blueprint_storage::location::blueprint_storage_path(false).unwrap();
//! let file = tokio::fs::File::open(path).await?;
//! let session = blueprint_storage::decode(file).await?;
//! for entry in session.iter_entries() {
//!     println!("{:?} {}", entry.kind(), entry.label());
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotate;
pub mod codec;
pub mod error;
pub mod library;
pub mod location;
pub mod observer;
pub mod prototype;
pub mod session;

pub use annotate::AnnotationLog;
pub use codec::{SignalType, Version};
pub use error::{Error, ErrorKind, Result};
pub use library::{
    Blueprint, BlueprintBook, DeconstructionPlanner, FilterSet, LibraryEntry, LibraryKind,
    UpgradePlanner,
};
pub use observer::{DecodeObserver, NoopObserver, TracingObserver};
pub use prototype::{Category, PrototypeEntry, PrototypeIndex};
pub use session::{decode, decode_with_observer, DecodeOptions, DecodedSession, SessionDecoder};
