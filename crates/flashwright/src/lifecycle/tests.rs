//! Unit tests for the provisioning lifecycle.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::query::ThreadSleeper;
use crate::source::{PassthroughImageBuilder, StaticManifestSource};
use crate::tests::support::{Call, RecordingTelemetrySink, ScriptedChannel};

/// Flasher double that records a fixed system status and result.
#[derive(Debug)]
struct StubFlasher {
    status: SystemFlashStatus,
    failure: Mutex<Option<ProvisionFailure>>,
}

impl StubFlasher {
    fn succeeding(status: SystemFlashStatus) -> Self {
        Self {
            status,
            failure: Mutex::new(None),
        }
    }

    fn failing(status: SystemFlashStatus, failure: ProvisionFailure) -> Self {
        Self {
            status,
            failure: Mutex::new(Some(failure)),
        }
    }
}

impl DeviceFlasher for StubFlasher {
    fn flash(
        &self,
        _device: &dyn ControlChannel,
        _build: &BuildDescriptor,
        state: &mut FlashAttemptState,
    ) -> Result<(), ProvisionFailure> {
        thread::sleep(Duration::from_millis(5));
        state.record_system_flash(self.status);
        match self.failure.lock().expect("stub flasher mutex poisoned").take() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}

/// Hook double that always fails as an unavailable device.
#[derive(Debug)]
struct FailingHook;

impl PostBootHook for FailingHook {
    fn run(&self, _device: &dyn ControlChannel) -> Result<(), ProvisionFailure> {
        Err(ProvisionFailure::device_unavailable("keyguard would not dismiss"))
    }
}

fn options() -> LifecycleOptions {
    LifecycleOptions::default()
        .with_boot_timeouts(Duration::from_millis(10), Duration::from_millis(10))
}

fn lifecycle<F, H>(
    flasher: F,
    hook: H,
    sink: &Arc<RecordingTelemetrySink>,
) -> ProvisionLifecycle<F, H, Arc<RecordingTelemetrySink>>
where
    F: DeviceFlasher,
    H: PostBootHook,
{
    ProvisionLifecycle::new(
        options(),
        flasher,
        hook,
        Arc::clone(sink),
        FlashPermits::unlimited(),
    )
}

#[fixture]
fn build() -> BuildDescriptor {
    BuildDescriptor::new("NEW.2", "walleye-userdebug")
        .with_branch("main")
        .with_device_image("/images/walleye-img.zip")
}

#[fixture]
fn sink() -> Arc<RecordingTelemetrySink> {
    Arc::new(RecordingTelemetrySink::default())
}

#[rstest]
fn boot_timeout_is_build_defective_with_one_record(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let device = ScriptedChannel::new("HT1");
    device.set_boots(false);
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        &sink,
    );

    let error = subject.set_up(&device, &build).expect_err("boot should time out");

    assert_eq!(error.kind(), Some(FailureKind::BuildDefective));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = records.first().expect("one record");
    assert_eq!(record.system_flash_status, SystemFlashStatus::Success);
    assert_eq!(record.serial, "HT1");
    assert_eq!(record.branch, "main");
    assert!(record.flashing_time >= Duration::from_millis(5));
}

#[rstest]
fn slow_boot_completion_is_build_defective(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let device = ScriptedChannel::new("HT1");
    device.set_becomes_available(false);
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::new(true, true),
        &sink,
    );

    let error = subject.set_up(&device, &build).expect_err("boot should not complete");

    assert_eq!(error.kind(), Some(FailureKind::BuildDefective));
    assert_eq!(device.calls(), vec![Call::WaitOnline, Call::WaitAvailable]);
}

#[rstest]
fn unavailable_device_still_reports(build: BuildDescriptor, sink: Arc<RecordingTelemetrySink>) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::failing(
            SystemFlashStatus::Exception,
            ProvisionFailure::device_unavailable("usb reset"),
        ),
        StandardPostBootHook::default(),
        &sink,
    );

    let error = subject.set_up(&device, &build).expect_err("flash should fail");

    assert_eq!(error.kind(), Some(FailureKind::DeviceUnavailable));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records.first().map(|record| record.system_flash_status),
        Some(SystemFlashStatus::Exception)
    );
    assert!(!device.calls().contains(&Call::WaitOnline));
}

#[rstest]
fn skipped_system_flash_emits_no_record(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::NotAttempted),
        StandardPostBootHook::default(),
        &sink,
    );

    subject.set_up(&device, &build).expect("set-up should succeed");

    assert!(sink.records().is_empty());
    assert_eq!(device.calls(), vec![Call::WaitOnline, Call::WaitAvailable]);
}

#[rstest]
fn hook_failure_is_reclassified(build: BuildDescriptor, sink: Arc<RecordingTelemetrySink>) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        FailingHook,
        &sink,
    );

    let error = subject.set_up(&device, &build).expect_err("hook should fail");

    let failure = error.failure().expect("classified failure");
    assert_eq!(failure.kind(), FailureKind::BuildDefective);
    assert!(failure.message().contains("keyguard would not dismiss"));
}

#[rstest]
fn refused_root_is_build_defective(build: BuildDescriptor, sink: Arc<RecordingTelemetrySink>) {
    let device = ScriptedChannel::new("HT1");
    device.set_grants_root(false);
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::new(true, false),
        &sink,
    );

    let error = subject.set_up(&device, &build).expect_err("root should be refused");

    assert_eq!(error.kind(), Some(FailureKind::BuildDefective));
    assert!(device.calls().contains(&Call::EnableRoot));
}

#[rstest]
fn missing_device_image_is_invalid(sink: Arc<RecordingTelemetrySink>) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        &sink,
    );
    let build = BuildDescriptor::new("NEW.2", "walleye-userdebug");

    let error = subject.set_up(&device, &build).expect_err("descriptor is invalid");

    assert!(matches!(error, SetupError::InvalidDescriptor { ref build_id } if build_id == "NEW.2"));
    assert!(device.calls().is_empty());
    assert!(sink.records().is_empty());
}

#[rstest]
fn sink_errors_do_not_fail_set_up(build: BuildDescriptor) {
    let sink = Arc::new(RecordingTelemetrySink::failing());
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        &sink,
    );

    subject.set_up(&device, &build).expect("sink errors are swallowed");

    assert_eq!(sink.records().len(), 1);
}

#[rstest]
fn bounded_permits_are_released_after_flashing(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let permits = FlashPermits::bounded(1);
    let subject = ProvisionLifecycle::new(
        options(),
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        Arc::clone(&sink),
        permits.clone(),
    );

    subject
        .set_up(&ScriptedChannel::new("HT1"), &build)
        .expect("first set-up");
    subject
        .set_up(&ScriptedChannel::new("HT2"), &build)
        .expect("second set-up");

    assert_eq!(permits.in_use(), 0);
    assert_eq!(sink.records().len(), 2);
}

#[rstest]
#[case(FailureKind::DeviceUnavailable, false)]
#[case(FailureKind::BuildDefective, true)]
#[case(FailureKind::SetupImpossible, true)]
fn tear_down_wipes_unless_device_lost(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
    #[case] kind: FailureKind,
    #[case] wipes: bool,
) {
    let device = ScriptedChannel::new("HT1");
    let subject = ProvisionLifecycle::new(
        options().with_wipe_on_teardown(true),
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        Arc::clone(&sink),
        FlashPermits::unlimited(),
    );

    subject.tear_down(&device, &build, Some(&ProvisionFailure::new(kind, "run failed")));

    assert_eq!(device.bootloader_commands().contains(&String::from("-w")), wipes);
}

#[rstest]
fn tear_down_is_silent_without_wipe(build: BuildDescriptor, sink: Arc<RecordingTelemetrySink>) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::default(),
        &sink,
    );

    subject.tear_down(&device, &build, None);

    assert!(device.calls().is_empty());
}

#[rstest]
fn standard_hook_enables_root_and_dismisses_keyguard(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let device = ScriptedChannel::new("HT1");
    let subject = lifecycle(
        StubFlasher::succeeding(SystemFlashStatus::Success),
        StandardPostBootHook::new(true, true),
        &sink,
    );

    subject.set_up(&device, &build).expect("set-up should succeed");

    assert_eq!(
        device.calls(),
        vec![
            Call::WaitOnline,
            Call::WaitAvailable,
            Call::EnableRoot,
            Call::Shell(String::from("wm dismiss-keyguard")),
        ]
    );
}

#[rstest]
fn flashed_build_that_never_reboots_is_build_defective(
    build: BuildDescriptor,
    sink: Arc<RecordingTelemetrySink>,
) {
    let device = ScriptedChannel::new("HT1");
    device.set_returns_from_reboot(false);
    let flasher = FastbootFlasher::new(
        FlashOptions::default(),
        StaticManifestSource::new("require board=walleye\n"),
        PassthroughImageBuilder,
        ThreadSleeper,
    );
    let subject = lifecycle(flasher, StandardPostBootHook::default(), &sink);

    let error = subject.set_up(&device, &build).expect_err("device never returns");

    assert_eq!(error.kind(), Some(FailureKind::BuildDefective));
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = records.first().expect("one record");
    assert_eq!(record.system_flash_status, SystemFlashStatus::Success);
    assert!(!device.calls().contains(&Call::WaitOnline));
}

#[rstest]
fn configured_flash_limit_sizes_the_host_pool(sink: Arc<RecordingTelemetrySink>) {
    let config = ProvisionConfig {
        concurrent_flash_limit: Some(1),
        ..ProvisionConfig::default()
    };

    let subject = ProvisionLifecycle::from_config(&config, Arc::clone(&sink));
    let other = ProvisionLifecycle::from_config(&config, Arc::clone(&sink));

    assert_eq!(subject.permits().limit(), Some(1));
    let held = other.permits().acquire();
    assert_eq!(subject.permits().in_use(), 1);
    drop(held);
    assert_eq!(subject.permits().in_use(), 0);
}
