//! Device provisioning core for Flashwright.
//!
//! A test harness hands the crate a device, reached through a
//! [`ControlChannel`], and a [`BuildDescriptor`] naming the images to
//! install. [`ProvisionLifecycle::set_up`] then:
//!
//! 1. waits for a host-wide [`FlashPermits`] slot, so flashing never
//!    saturates the host;
//! 2. drives a [`DeviceFlasher`] (normally [`FastbootFlasher`]) through the
//!    bootloader, baseband, system, user-data, and cache stages, flashing
//!    only what differs from the build's requirement document;
//! 3. verifies the new build boots and runs the [`PostBootHook`];
//! 4. emits one [`FlashRecord`] to a [`TelemetrySink`] for every attempt that
//!    reached the system partition stage.
//!
//! Every failure is classified as a [`FailureKind`] so callers can tell a
//! bad build from an unusable device or an impossible request. Only
//! [`FailureKind::DeviceUnavailable`] is worth retrying on another device.
//!
//! Configuration comes from [`flashwright_config::ProvisionConfig`];
//! requirement documents are parsed by [`flashwright_manifest`]. A host
//! calls [`initialise`] once for logging and its flash-record sink, then
//! builds lifecycles with [`ProvisionLifecycle::from_config`].

mod channel;
mod descriptor;
mod failure;
mod flasher;
mod lifecycle;
mod permits;
mod query;
mod slot;
mod source;
mod telemetry;

pub use channel::{
    ChannelError, CommandOutput, CommandStatus, ControlChannel, DeviceMode, HostToolChannel,
    HostToolOptions, parse_variable,
};
pub use descriptor::{BuildDescriptor, VersionedArtifact};
pub use failure::{FailureKind, FailureSource, ProvisionFailure, SetupError};
pub use flasher::{
    DEFAULT_DATA_ROOT, DeviceFlasher, FastbootFlasher, FlashAttemptState, FlashOptions, FlashStage,
    SystemFlashStatus,
};
pub use lifecycle::{LifecycleOptions, PostBootHook, ProvisionLifecycle, StandardPostBootHook};
pub use permits::{FlashPermit, FlashPermits};
pub use query::{BoundedQuery, QueryError, Sleeper, ThreadSleeper};
pub use slot::{Slot, current_slot};
pub use source::{
    FileManifestSource, ImageBuilder, ManifestSource, PassthroughImageBuilder,
    REQUIREMENTS_FILE_NAME, StaticManifestSource,
};
pub use telemetry::{
    ConfiguredSink, FlashRecord, JsonLinesTelemetrySink, SinkError, TelemetryError,
    TelemetrySink, TracingTelemetrySink, initialise, open_record_sink,
};

#[cfg(test)]
mod tests;
