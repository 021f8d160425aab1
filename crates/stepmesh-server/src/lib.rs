//! stepmesh server: an HTTP service converting STEP uploads into meshes.
//!
//! # Endpoints
//!
//! | Method | Path | Result |
//! |---|---|---|
//! | GET | `/health` | liveness JSON |
//! | POST | `/convert[?format=stl\|glb]` | the mesh, streamed as an attachment |
//! | POST | `/convert-url[?format=stl\|glb]` | `{success, download_url, filename}` |
//! | GET | `/download/{filename}` | a deferred mesh, served once |
//!
//! Uploads arrive as the multipart field `file` and must be `.stp` or
//! `.step`. Every scratch file is owned by an [`store::ArtifactGuard`], so
//! uploads and inline outputs are gone by the time a request finishes,
//! whatever the outcome.
//!
//! # Usage
//!
//! ```no_run
//! use stepmesh_server::{ConversionService, ServiceConfig};
//!
//! # async fn run() -> Result<(), stepmesh_server::StartupError> {
//! let service = ConversionService::new(ServiceConfig::default())?;
//! service.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cors;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod reaper;
pub mod routes;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod validator;

pub use config::ServiceConfig;
pub use engine::{ConversionFailure, ConversionSummary, KernelConverter, MeshConverter};
pub use error::ServiceError;
pub use service::{ConversionService, StartupError};
pub use store::{ArtifactGuard, ArtifactStore};
