#![forbid(unsafe_code)]

//! Render coordination: the single owner of the live renderer.
//!
//! # State Machine
//!
//! ```text
//!            mount                  redraw
//!  Absent ──────────▶ MountedIdle ─────────▶ MountedLive
//!    ▲                    ▲   ◀──────────────     │
//!    │                    │        erase           │
//!    └──── stop ──────────┴────────────────────────┘
//! ```
//!
//! - At most one renderer is mounted. `mount` stops the previous one.
//! - `erase` is a no-op unless status lines are on screen.
//! - `stop` is idempotent and leaves the last frame on screen as ordinary
//!   text, so the final status survives in scrollback.
//!
//! Each mount bumps a *generation*. Timers created on behalf of a renderer
//! carry the generation they were created for; [`RenderCoordinator::is_current`]
//! lets the event loop discard timers that outlived their renderer.
//!
//! Draw and erase failures are logged and counted here. They never reach the
//! code that writes raw text.

use std::io::Write;
use std::time::Duration;

use tracing::{debug, warn};

use crate::model::FileResult;
use crate::renderer::LiveRenderer;

/// What the coordinator currently has on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// No renderer.
    Absent,
    /// Renderer mounted, nothing drawn.
    MountedIdle,
    /// Status lines are on screen.
    MountedLive,
}

/// Counters for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub mounts: u64,
    pub stops: u64,
    pub draws: u64,
    pub erases: u64,
    pub draw_failures: u64,
    pub erase_failures: u64,
}

/// Owner of the single live renderer.
pub struct RenderCoordinator {
    renderer: Option<Box<dyn LiveRenderer>>,
    state: RenderState,
    generation: u64,
    stats: CoordinatorStats,
}

impl std::fmt::Debug for RenderCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCoordinator")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Default for RenderCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            renderer: None,
            state: RenderState::Absent,
            generation: 0,
            stats: CoordinatorStats::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Generation of the current (or last) mount. Zero before any mount.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.renderer.is_some()
    }

    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Whether a timer created for `generation` may still act.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.renderer.is_some() && generation == self.generation
    }

    /// Refresh period requested by the mounted renderer.
    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.renderer.as_ref().and_then(|r| r.refresh_interval())
    }

    /// Mount `renderer`, stopping any previous one. Returns the new
    /// generation.
    pub fn mount(&mut self, renderer: Box<dyn LiveRenderer>) -> u64 {
        self.stop();
        self.generation += 1;
        self.renderer = Some(renderer);
        self.state = RenderState::MountedIdle;
        self.stats.mounts += 1;
        debug!(generation = self.generation, "renderer mounted");
        self.generation
    }

    /// Replace the renderer's model without drawing.
    pub fn update(&mut self, files: Vec<FileResult>) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.update_files(files);
        }
    }

    /// Remove drawn status lines. No-op unless live.
    pub fn erase(&mut self, out: &mut dyn Write) {
        if self.state != RenderState::MountedLive {
            return;
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        self.stats.erases += 1;
        if let Err(err) = renderer.erase(out) {
            self.stats.erase_failures += 1;
            warn!(error = %err, generation = self.generation, "status erase failed");
        }
        self.state = RenderState::MountedIdle;
    }

    /// Draw the current model, erasing the previous frame first.
    ///
    /// Returns `true` when a frame is on screen afterwards.
    pub fn redraw(&mut self, out: &mut dyn Write) -> bool {
        if self.state == RenderState::MountedLive {
            self.erase(out);
        }
        let Some(renderer) = self.renderer.as_mut() else {
            return false;
        };
        match renderer.draw(out) {
            Ok(()) => {
                self.stats.draws += 1;
                self.state = RenderState::MountedLive;
                true
            }
            Err(err) => {
                self.stats.draw_failures += 1;
                self.state = RenderState::MountedIdle;
                warn!(error = %err, generation = self.generation, "status draw failed");
                false
            }
        }
    }

    /// Advance the renderer's animation state.
    pub fn tick(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.on_refresh();
        }
    }

    /// Stop and drop the renderer. Idempotent.
    ///
    /// Returns `true` if a renderer was stopped.
    pub fn stop(&mut self) -> bool {
        let Some(mut renderer) = self.renderer.take() else {
            return false;
        };
        renderer.stop();
        self.state = RenderState::Absent;
        self.stats.stops += 1;
        debug!(generation = self.generation, "renderer stopped");
        true
    }
}
