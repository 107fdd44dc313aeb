//! Scenario world shared by the flashing and lifecycle behaviour suites.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use flashwright_config::UserDataStrategy;

use crate::descriptor::BuildDescriptor;
use crate::failure::{ProvisionFailure, SetupError};
use crate::flasher::{DeviceFlasher, FastbootFlasher, FlashAttemptState, FlashOptions};
use crate::lifecycle::{LifecycleOptions, ProvisionLifecycle, StandardPostBootHook};
use crate::permits::FlashPermits;
use crate::query::BoundedQuery;
use crate::source::{PassthroughImageBuilder, StaticManifestSource};

use super::channel::ScriptedChannel;
use super::sink::RecordingTelemetrySink;
use super::sleeper::CountingSleeper;

type TestFlasher =
    FastbootFlasher<StaticManifestSource, PassthroughImageBuilder, Arc<CountingSleeper>>;

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    pub channel: ScriptedChannel,
    pub sleeper: Arc<CountingSleeper>,
    pub sink: Arc<RecordingTelemetrySink>,
    pub build: BuildDescriptor,
    pub requirements: String,
    pub strategy: UserDataStrategy,
    pub wipe_on_teardown: bool,
    state: Option<FlashAttemptState>,
    flash_result: Option<Result<(), ProvisionFailure>>,
    setup_result: Option<Result<(), SetupError>>,
}

impl TestWorld {
    /// Builds a world with a booted `walleye` device and a newer build.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: ScriptedChannel::new("HT7A0001"),
            sleeper: Arc::new(CountingSleeper::default()),
            sink: Arc::new(RecordingTelemetrySink::default()),
            build: BuildDescriptor::new("NEW.2", "walleye-userdebug")
                .with_branch("main")
                .with_device_image("/images/walleye-img-NEW.2.zip"),
            requirements: String::from("require board=walleye\n"),
            strategy: UserDataStrategy::Retain,
            wipe_on_teardown: false,
            state: None,
            flash_result: None,
            setup_result: None,
        }
    }

    fn flasher(&self) -> TestFlasher {
        let options = FlashOptions::default()
            .with_query(BoundedQuery::new(3, Duration::from_millis(1)));
        FastbootFlasher::new(
            options,
            StaticManifestSource::new(&self.requirements),
            PassthroughImageBuilder,
            Arc::clone(&self.sleeper),
        )
    }

    fn lifecycle(
        &self,
    ) -> ProvisionLifecycle<TestFlasher, StandardPostBootHook, Arc<RecordingTelemetrySink>> {
        let options = LifecycleOptions::default()
            .with_user_data_strategy(self.strategy)
            .with_boot_timeouts(Duration::from_millis(10), Duration::from_millis(10))
            .with_wipe_on_teardown(self.wipe_on_teardown);
        ProvisionLifecycle::new(
            options,
            self.flasher(),
            StandardPostBootHook::new(false, false),
            Arc::clone(&self.sink),
            FlashPermits::unlimited(),
        )
    }

    /// Runs the orchestrator directly.
    pub fn flash(&mut self) {
        let mut state = FlashAttemptState::new("HT7A0001", self.strategy);
        let result = self.flasher().flash(&self.channel, &self.build, &mut state);
        self.state = Some(state);
        self.flash_result = Some(result);
    }

    /// Runs the full set-up lifecycle.
    pub fn set_up(&mut self) {
        let result = self.lifecycle().set_up(&self.channel, &self.build);
        self.setup_result = Some(result);
    }

    /// Runs tear-down with an optional failure from the test run.
    pub fn tear_down(&self, prior: Option<&ProvisionFailure>) {
        self.lifecycle().tear_down(&self.channel, &self.build, prior);
    }

    #[must_use]
    pub fn flash_result(&self) -> Option<&Result<(), ProvisionFailure>> {
        self.flash_result.as_ref()
    }

    #[must_use]
    pub fn setup_result(&self) -> Option<&Result<(), SetupError>> {
        self.setup_result.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> Option<&FlashAttemptState> {
        self.state.as_ref()
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
