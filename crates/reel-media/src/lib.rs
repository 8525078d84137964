//! Media assembly and object storage for reelsmith.
//!
//! Both concerns are delegated to the media service:
//! - [`MediaAssembler`] concatenates scene videos and lays narration over them
//! - [`ObjectStorageClient`] uploads voice samples and images, returning public URLs

pub mod assembler;
pub mod config;
pub mod error;
pub mod storage;

pub use assembler::{MediaAssembler, SceneVideo};
pub use config::MediaServiceConfig;
pub use error::{MediaError, MediaResult};
pub use storage::{ObjectStorageClient, UploadedObject};
