use crate::{
    config::{EnvironmentConfig, NavigationVolume},
    generate::Progress,
    module::{CosmeticChoice, ModuleId},
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Everything a host needs to realize one module instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub module: ModuleId,
    /// World position of the module's origin cell corner
    pub position: Point3<f64>,
    /// Clockwise rotation around the vertical axis, in degrees
    pub yaw_degrees: f64,
    /// The option chosen for each of the module's cosmetic groups
    pub cosmetics: Vec<CosmeticChoice>,
}

/// Opaque host-side identifier for a realized instance
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceHandle(pub u64);

/// An axis-aligned box in world space
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

/// The engine that generation runs inside of. The generator only ever talks
/// to the outside world through this trait, so it can be driven by a game
/// engine, a test harness, or nothing at all (see [HeadlessHost]).
///
/// All calls happen on the generating thread.
pub trait Host {
    /// Apply ambient/environment settings. Called once, before anything else.
    fn apply_environment(&mut self, environment: &EnvironmentConfig);

    /// Start realizing a module instance. The instance doesn't have to be
    /// finished when this returns; see [Self::is_resident].
    fn instantiate(
        &mut self,
        request: InstanceRequest,
    ) -> anyhow::Result<InstanceHandle>;

    /// Is this module's template fully loaded? Instances of a module are
    /// never started while an earlier one is still loading.
    fn is_resident(&mut self, module: &ModuleId) -> bool;

    /// Hand control back to the host for a frame. Called whenever generation
    /// runs over its frame budget, and while waiting on pending modules.
    fn yield_frame(&mut self);

    /// Rebuild navigation data for one volume over the given area. Called
    /// once per configured volume, after terrain stitching.
    fn rebuild_navigation(
        &mut self,
        volume: &NavigationVolume,
        bounds: WorldBounds,
    ) -> anyhow::Result<()>;

    /// Generation progress. Fractions never decrease.
    fn report_progress(&mut self, _progress: Progress) {}
}

/// A host that doesn't render anything. It records everything it's asked to
/// do, which makes it handy for tests and for the CLI.
#[derive(Clone, Debug, Default)]
pub struct HeadlessHost {
    pub environment: Option<EnvironmentConfig>,
    pub requests: Vec<InstanceRequest>,
    pub navigation: Vec<(String, WorldBounds)>,
    pub progress: Vec<Progress>,
    pub frames: usize,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Host for HeadlessHost {
    fn apply_environment(&mut self, environment: &EnvironmentConfig) {
        self.environment = Some(environment.clone());
    }

    fn instantiate(
        &mut self,
        request: InstanceRequest,
    ) -> anyhow::Result<InstanceHandle> {
        let handle = InstanceHandle(self.requests.len() as u64);
        self.requests.push(request);
        Ok(handle)
    }

    fn is_resident(&mut self, _module: &ModuleId) -> bool {
        true
    }

    fn yield_frame(&mut self) {
        self.frames += 1;
    }

    fn rebuild_navigation(
        &mut self,
        volume: &NavigationVolume,
        bounds: WorldBounds,
    ) -> anyhow::Result<()> {
        self.navigation.push((volume.name.clone(), bounds));
        Ok(())
    }

    fn report_progress(&mut self, progress: Progress) {
        self.progress.push(progress);
    }
}
