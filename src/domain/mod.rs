// Domain layer - Device models, normalization and sensor descriptors
pub mod device;
pub mod entity;
pub mod error;
pub mod normalizer;
pub mod sensor;
pub mod snapshot;
