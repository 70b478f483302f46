//! Public host-facing surface (§6): `System` owns resources and the single
//! engine allowed per system; `Engine` drives the scheduler and exposes
//! `feed_text`/`get_data`/`reset`.

use tracing::{info, trace};

use crate::arena::Arena;
use crate::config::SystemConfig;
use crate::diag::Diagnostics;
use crate::error::MurmurError;
use crate::pu::{ResetMode, StepResult};
use crate::resource::{ResourceManager, ResourceSource, Voice};
use crate::scheduler::Scheduler;

/// Size of the sub-arena an [`Engine`] carves for its own pipeline working
/// storage, independent of the [`System`]'s resource arena. `Arena` has no
/// facility for viewing a sub-region of another `Arena`'s backing buffer
/// without unsafe code (see `DESIGN.md`), so this is a second, separately
/// owned region rather than a literal carve of the parent's bytes.
const ENGINE_ARENA_SIZE: usize = 64 * 1024;

/// PCM output data-type tag (§6: "fixed value `Pcm16Bit`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Pcm16Bit,
}

/// `get_data`'s coarse outcome, collapsing the scheduler's five
/// [`StepResult`] values to the three the host-facing contract documents
/// (§6: "returns one of `StepIdle`, `StepBusy`, `StepError`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Busy,
    Error,
}

/// One engine: exactly one may exist per [`System`] at a time (§3
/// Lifecycles). Owns the assembled voice, its own working arena, the
/// scheduler, the diagnostics registry, and a small carry buffer so a
/// caller-supplied output slice smaller than one drained frame never loses
/// or duplicates bytes across `get_data` calls (§8 S6).
pub struct Engine {
    voice: Voice,
    work_arena: Arena,
    scheduler: Scheduler,
    diag: Diagnostics,
    tail_carry: Vec<u8>,
}

impl Engine {
    fn new(voice: Voice) -> Result<Self, MurmurError> {
        let work_arena = Arena::new(ENGINE_ARENA_SIZE).ok_or(MurmurError::OutOfMem)?;
        Ok(Self {
            voice,
            work_arena,
            scheduler: Scheduler::new(),
            diag: Diagnostics::new(),
            tail_carry: Vec::new(),
        })
    }

    /// Pushes UTF-8 bytes into the head ring. Returns the number of bytes
    /// actually accepted (§6: `feed_text` "returns bytes accepted").
    pub fn feed_text(&mut self, bytes: &[u8]) -> usize {
        self.scheduler.feed_text(bytes)
    }

    /// One scheduler tick plus a drain of the tail ring into `out`, per §6.
    /// `out_data_type` is written unconditionally, even when returning
    /// [`Status::Error`] — a documented oddity of the source's `get_data`
    /// (§9 Open Questions), preserved so callers that read the data-type
    /// tag after an error still see `Pcm16Bit`.
    ///
    /// `resource_arena` is the arena the engine's voice was assembled
    /// against (the one `load_resource` allocated knowledge bases into);
    /// stages read knowledge-base bytes from it at `initialize`/`step`.
    pub fn get_data(
        &mut self,
        resource_arena: &Arena,
        out: &mut [u8],
        out_data_type: &mut DataType,
    ) -> (Status, usize) {
        *out_data_type = DataType::Pcm16Bit;

        if !self.tail_carry.is_empty() {
            let n = self.drain_carry(out);
            return (Status::Busy, n);
        }
        if self.diag.has_exception() {
            return (Status::Error, 0);
        }

        let r = self.scheduler.tick(&self.voice, resource_arena, &mut self.diag);
        trace!(?r, "scheduler tick");
        if self.diag.has_exception() {
            return (Status::Error, 0);
        }

        let mut staged = Vec::new();
        while self.scheduler.drain_tail(&mut staged).is_ok() {
            self.tail_carry.extend_from_slice(&staged);
            staged.clear();
        }
        let written = self.drain_carry(out);

        let status = match r {
            StepResult::Error => Status::Error,
            StepResult::Idle if self.tail_carry.is_empty() && written == 0 => Status::Idle,
            _ => Status::Busy,
        };
        (status, written)
    }

    fn drain_carry(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.tail_carry.len());
        out[..n].copy_from_slice(&self.tail_carry[..n]);
        self.tail_carry.drain(..n);
        n
    }

    /// `reset(Full)` re-binds every stage to the voice and discards all
    /// in-flight items; `reset(Soft)` discards input/output buffers only.
    /// In this stand-in pipeline no stage accumulates derived state worth
    /// distinguishing between the two (tracked as an Open Question
    /// resolution in `DESIGN.md`), so both perform the same
    /// terminate-then-initialize sweep; only the carried diagnostics and
    /// tail buffer are preserved across `Soft`.
    pub fn reset(&mut self, mode: ResetMode, resource_arena: &Arena) {
        self.scheduler.reset(mode, &self.voice, resource_arena);
        self.tail_carry.clear();
        if matches!(mode, ResetMode::Full) {
            self.diag.reset();
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn work_arena_usage(&self) -> crate::arena::Usage {
        self.work_arena.usage()
    }

    fn into_voice(self) -> Voice {
        self.voice
    }
}

/// The host-facing system handle (§3 Lifecycles, §6). Owns the resource
/// arena, the resource manager, and at most one [`Engine`].
pub struct System {
    arena: Arena,
    resources: ResourceManager,
    engine: Option<Engine>,
}

impl System {
    /// Carves the resource arena and registers the singleton system state
    /// (§6 `initialize`).
    pub fn initialize(config: SystemConfig) -> Result<Self, MurmurError> {
        if config.arena_size == 0 {
            return Err(MurmurError::InvalidArgument("arena_size must be nonzero".into()));
        }
        let arena = Arena::new(config.arena_size).ok_or(MurmurError::OutOfMem)?;
        info!(arena_size = config.arena_size, "system initialized");
        Ok(Self {
            arena,
            resources: ResourceManager::new(),
            engine: None,
        })
    }

    /// Disposes any attached engine, then consumes `self` (§6 `terminate`).
    /// Rust's ownership model makes a double-`terminate` a compile error
    /// rather than a runtime `InvalidHandle`, so that error variant is
    /// unreachable from this entry point; it remains for parity with the
    /// documented contract and is used by other operations below.
    pub fn terminate(mut self) {
        if let Some(engine) = self.engine.take() {
            self.resources.release_voice(engine.into_voice());
        }
    }

    pub fn load_resource(
        &mut self,
        name: &str,
        source: &mut dyn ResourceSource,
    ) -> Result<(), MurmurError> {
        self.resources.load_resource(name, source, &mut self.arena)
    }

    pub fn unload_resource(&mut self, name: &str) -> Result<(), MurmurError> {
        self.resources.unload_resource(name, &mut self.arena)
    }

    pub fn create_voice_definition(&mut self, name: &str) -> Result<(), MurmurError> {
        self.resources.create_voice_definition(name)
    }

    pub fn add_resource_to_voice_definition(
        &mut self,
        voice_name: &str,
        resource_name: &str,
    ) -> Result<(), MurmurError> {
        self.resources
            .add_resource_to_voice_definition(voice_name, resource_name)
    }

    /// Creates the singleton engine for `voice_name`. `MaxNumExceeded` if
    /// one already exists (§3: "exactly one engine per system at any
    /// time").
    pub fn new_engine(&mut self, voice_name: &str) -> Result<(), MurmurError> {
        if self.engine.is_some() {
            return Err(MurmurError::MaxNumExceeded);
        }
        let voice = self.resources.create_voice(voice_name)?;
        let mut engine = Engine::new(voice)?;
        engine.scheduler.reset(ResetMode::Full, &engine.voice, &self.arena);
        self.engine = Some(engine);
        Ok(())
    }

    pub fn dispose_engine(&mut self) -> Result<(), MurmurError> {
        let engine = self.engine.take().ok_or(MurmurError::InvalidHandle)?;
        self.resources.release_voice(engine.into_voice());
        Ok(())
    }

    pub fn engine_mut(&mut self) -> Result<&mut Engine, MurmurError> {
        self.engine.as_mut().ok_or(MurmurError::InvalidHandle)
    }

    pub fn resource_arena(&self) -> &Arena {
        &self.arena
    }

    pub fn find_resource(&self, name: &str) -> Option<&crate::resource::Resource> {
        self.resources.find_resource(name)
    }

    pub fn loaded_resource_names(&self) -> Vec<&str> {
        self.resources.loaded_resource_names()
    }

    /// Runs `feed_text` against the attached engine (§6).
    pub fn feed_text(&mut self, bytes: &[u8]) -> Result<usize, MurmurError> {
        let engine = self.engine.as_mut().ok_or(MurmurError::InvalidHandle)?;
        Ok(engine.feed_text(bytes))
    }

    /// Runs `get_data` against the attached engine, supplying the resource
    /// arena the engine's stages read knowledge bases from.
    pub fn get_data(
        &mut self,
        out: &mut [u8],
        out_data_type: &mut DataType,
    ) -> Result<(Status, usize), MurmurError> {
        let arena = &self.arena;
        let engine = self.engine.as_mut().ok_or(MurmurError::InvalidHandle)?;
        Ok(engine.get_data(arena, out, out_data_type))
    }

    /// Resets the attached engine (§6 `reset_engine`).
    pub fn reset_engine(&mut self, mode: ResetMode) -> Result<(), MurmurError> {
        let arena = &self.arena;
        let engine = self.engine.as_mut().ok_or(MurmurError::InvalidHandle)?;
        engine.reset(mode, arena);
        Ok(())
    }
}
