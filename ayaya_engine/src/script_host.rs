//! Loaded automation modules and the dispatch of their lifecycle hooks.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{info, warn};
use thiserror::Error;

use crate::cache::{CacheKey, StateCache};
use crate::display::DrawList;
use crate::input::{DeviceError, InputArbiter};
use crate::model::{Entity, Missile};
use crate::projection::Projector;
use crate::settings::Settings;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Setup,
    Tick,
    Draw,
    MoveCreate,
    MissileCreate,
}

impl Hook {
    pub fn name(self) -> &'static str {
        match self {
            Hook::Setup => "setup",
            Hook::Tick => "on_tick",
            Hook::Draw => "on_draw",
            Hook::MoveCreate => "on_move_create",
            Hook::MissileCreate => "on_missile_create",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The hooks a module implements. Read once at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub setup: bool,
    pub tick: bool,
    pub draw: bool,
    pub move_create: bool,
    pub missile_create: bool,
}

impl Capabilities {
    pub const fn none() -> Self {
        Self {
            setup: false,
            tick: false,
            draw: false,
            move_create: false,
            missile_create: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            setup: true,
            tick: true,
            draw: true,
            move_create: true,
            missile_create: true,
        }
    }

    pub fn supports(&self, hook: Hook) -> bool {
        match hook {
            Hook::Setup => self.setup,
            Hook::Tick => self.tick,
            Hook::Draw => self.draw,
            Hook::MoveCreate => self.move_create,
            Hook::MissileCreate => self.missile_create,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("{0}")]
    Message(String),
    #[error("state cache has no {0:?}")]
    MissingCache(CacheKey),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl ScriptError {
    pub fn msg(message: impl Into<String>) -> Self {
        ScriptError::Message(message.into())
    }
}

/// Read-only view of the current tick handed to every hook.
pub struct Manager<'a> {
    snapshot: &'a Snapshot,
    cache: &'a StateCache,
    input: &'a InputArbiter,
    projector: &'a dyn Projector,
    settings: &'a Settings,
}

impl<'a> Manager<'a> {
    pub fn new(
        snapshot: &'a Snapshot,
        cache: &'a StateCache,
        input: &'a InputArbiter,
        projector: &'a dyn Projector,
        settings: &'a Settings,
    ) -> Self {
        Self {
            snapshot,
            cache,
            input,
            projector,
            settings,
        }
    }

    pub fn me(&self) -> &'a Entity {
        &self.snapshot.me
    }

    pub fn enemies(&self) -> &'a [Entity] {
        &self.snapshot.enemies
    }

    pub fn missiles(&self) -> &'a [Missile] {
        &self.snapshot.missiles
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn cache(&self) -> &'a StateCache {
        self.cache
    }

    pub fn game_time(&self) -> Result<f32, ScriptError> {
        self.cache
            .game_time()
            .ok_or(ScriptError::MissingCache(CacheKey::GameTime))
    }

    pub fn input(&self) -> &'a InputArbiter {
        self.input
    }

    pub fn projector(&self) -> &'a dyn Projector {
        self.projector
    }

    pub fn setting_enabled(&self, module: &str, id: &str) -> Option<bool> {
        self.settings.toggle(module, id)
    }
}

/// A pluggable automation unit. Every hook is optional; `capabilities`
/// says which ones the host should call.
pub trait ScriptModule {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn setup(&mut self) -> Result<(), ScriptError> {
        Ok(())
    }

    fn on_tick(&mut self, _manager: &Manager<'_>, _tick: u64) -> Result<(), ScriptError> {
        Ok(())
    }

    fn on_draw(&mut self, _draw: &mut DrawList, _manager: &Manager<'_>) -> Result<(), ScriptError> {
        Ok(())
    }

    fn on_move_create(&mut self, _actor: &Entity, _manager: &Manager<'_>) -> Result<(), ScriptError> {
        Ok(())
    }

    fn on_missile_create(
        &mut self,
        _missile: &Missile,
        _manager: &Manager<'_>,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFault {
    pub module: String,
    pub hook: Hook,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub faults: Vec<HookFault>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

struct LoadedModule {
    module: Box<dyn ScriptModule>,
    capabilities: Capabilities,
    faults: u64,
}

/// Owns the modules in registration order and isolates their failures.
#[derive(Default)]
pub struct ScriptHost {
    modules: Vec<LoadedModule>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and run its `setup` exactly once.
    pub fn register(&mut self, module: Box<dyn ScriptModule>) -> DispatchReport {
        let capabilities = module.capabilities();
        let mut loaded = LoadedModule {
            module,
            capabilities,
            faults: 0,
        };
        let mut report = DispatchReport::default();
        invoke(&mut loaded, Hook::Setup, &mut report, |module| module.setup());
        info!(
            "[ayaya_engine::script_host] loaded {} ({:?})",
            loaded.module.name(),
            loaded.capabilities
        );
        self.modules.push(loaded);
        report
    }

    pub fn load<I>(&mut self, modules: I) -> DispatchReport
    where
        I: IntoIterator<Item = Box<dyn ScriptModule>>,
    {
        let mut report = DispatchReport::default();
        for module in modules {
            let single = self.register(module);
            report.invoked += single.invoked;
            report.faults.extend(single.faults);
        }
        report
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules
            .iter()
            .map(|entry| entry.module.name().to_string())
            .collect()
    }

    pub fn fault_count(&self, name: &str) -> Option<u64> {
        self.modules
            .iter()
            .find(|entry| entry.module.name() == name)
            .map(|entry| entry.faults)
    }

    pub fn dispatch_tick(&mut self, manager: &Manager<'_>, tick: u64) -> DispatchReport {
        self.dispatch(Hook::Tick, |module| module.on_tick(manager, tick))
    }

    pub fn dispatch_draw(&mut self, draw: &mut DrawList, manager: &Manager<'_>) -> DispatchReport {
        self.dispatch(Hook::Draw, |module| module.on_draw(draw, manager))
    }

    pub fn dispatch_move_create(&mut self, actor: &Entity, manager: &Manager<'_>) -> DispatchReport {
        self.dispatch(Hook::MoveCreate, |module| module.on_move_create(actor, manager))
    }

    pub fn dispatch_missile_create(
        &mut self,
        missile: &Missile,
        manager: &Manager<'_>,
    ) -> DispatchReport {
        self.dispatch(Hook::MissileCreate, |module| {
            module.on_missile_create(missile, manager)
        })
    }

    fn dispatch<F>(&mut self, hook: Hook, mut call: F) -> DispatchReport
    where
        F: FnMut(&mut dyn ScriptModule) -> Result<(), ScriptError>,
    {
        let mut report = DispatchReport::default();
        for entry in self.modules.iter_mut() {
            if !entry.capabilities.supports(hook) {
                continue;
            }
            invoke(entry, hook, &mut report, &mut call);
        }
        report
    }
}

fn invoke<F>(entry: &mut LoadedModule, hook: Hook, report: &mut DispatchReport, call: F)
where
    F: FnOnce(&mut dyn ScriptModule) -> Result<(), ScriptError>,
{
    if hook == Hook::Setup && !entry.capabilities.setup {
        return;
    }
    report.invoked += 1;
    let module = entry.module.as_mut();
    let message = match catch_unwind(AssertUnwindSafe(|| call(module))) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
    };
    entry.faults += 1;
    let name = entry.module.name().to_string();
    warn!("[ayaya_engine::script_host] {name}.{hook} failed: {message}");
    report.faults.push(HookFault {
        module: name,
        hook,
        message,
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
