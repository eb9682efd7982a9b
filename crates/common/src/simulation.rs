//! # Simulation Playback
//!
//! The frame clock and the contract for simulation data providers (compartment
//! reports, spike trains, calcium diffusion). Handlers hand out one frame of
//! `f32` samples at a time; the animation parameters decide which frame is
//! current and whether playback may advance.

use std::sync::Arc;

use parking_lot::Mutex;

/// Reports whether the current simulation frame is ready to be displayed.
pub type IsReadyCallback = Arc<dyn Fn() -> bool + Send + Sync>;

// ============================================================================
// Handler Contract
// ============================================================================

/// Provider of per-frame simulation data.
///
/// `frame_data` may load lazily (memory-mapped reports, network fetches) and
/// is therefore `&mut self`; share handlers as [`SimulationHandlerRef`].
pub trait SimulationHandler: Send + Sync {
    fn frame_count(&self) -> u32;

    /// Samples per frame.
    fn frame_size(&self) -> u64;

    /// Simulation time step between frames.
    fn dt(&self) -> f64;

    /// Unit of `dt`, e.g. `"ms"`.
    fn unit(&self) -> &str;

    /// One frame of samples, or `None` while the frame is still loading.
    fn frame_data(&mut self, frame: u32) -> Option<&[f32]>;

    fn is_ready(&self) -> bool {
        true
    }

    fn size_in_bytes(&self) -> u64 {
        self.frame_count() as u64 * self.frame_size() * std::mem::size_of::<f32>() as u64
    }
}

pub type SimulationHandlerRef = Arc<Mutex<dyn SimulationHandler>>;

// ============================================================================
// Animation Parameters
// ============================================================================

/// The playback clock shared by the render loop, the network layer and every
/// model carrying simulation data.
///
/// Holds a single is-ready callback slot: the model that binds simulation
/// data registers it once and deregisters it when the model is destroyed.
#[derive(Default)]
pub struct AnimationParameters {
    current_frame: u32,
    frame_count: u32,
    dt: f64,
    unit: String,
    is_ready_callback: Option<IsReadyCallback>,
    modified: bool,
}

pub type AnimationParametersRef = Arc<Mutex<AnimationParameters>>;

impl AnimationParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Clamped to the last frame when a frame count is known.
    pub fn set_current_frame(&mut self, frame: u32) {
        let clamped = if self.frame_count > 0 {
            frame.min(self.frame_count - 1)
        } else {
            frame
        };
        if clamped != self.current_frame {
            self.current_frame = clamped;
            self.modified = true;
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn set_frame_count(&mut self, count: u32) {
        if count != self.frame_count {
            self.frame_count = count;
            self.modified = true;
        }
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn set_dt(&mut self, dt: f64) {
        if dt != self.dt {
            self.dt = dt;
            self.modified = true;
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
        self.modified = true;
    }

    /// Register the single is-ready callback. Returns `false` when a callback
    /// is already registered (the slot is not replaced).
    pub fn set_is_ready_callback(&mut self, callback: IsReadyCallback) -> bool {
        if self.is_ready_callback.is_some() {
            return false;
        }
        self.is_ready_callback = Some(callback);
        true
    }

    pub fn has_is_ready_callback(&self) -> bool {
        self.is_ready_callback.is_some()
    }

    pub fn remove_is_ready_callback(&mut self) {
        self.is_ready_callback = None;
    }

    /// True when no data provider is registered or the provider reports the
    /// current frame as displayable.
    pub fn is_ready(&self) -> bool {
        match &self.is_ready_callback {
            Some(cb) => cb(),
            None => true,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn reset_modified(&mut self) {
        self.modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_current_frame_clamps_to_frame_count() {
        let mut ap = AnimationParameters::new();
        ap.set_frame_count(10);
        ap.set_current_frame(25);
        assert_eq!(ap.current_frame(), 9);

        // without a known frame count nothing clamps
        let mut free = AnimationParameters::new();
        free.set_current_frame(25);
        assert_eq!(free.current_frame(), 25);
    }

    #[test]
    fn test_is_ready_callback_single_slot() {
        let mut ap = AnimationParameters::new();
        assert!(ap.is_ready());

        let flag = Arc::new(AtomicBool::new(false));
        let f = flag.clone();
        assert!(ap.set_is_ready_callback(Arc::new(move || f.load(Ordering::SeqCst))));
        assert!(!ap.is_ready());
        flag.store(true, Ordering::SeqCst);
        assert!(ap.is_ready());

        // second registration is rejected, first stays active
        assert!(!ap.set_is_ready_callback(Arc::new(|| false)));
        assert!(ap.is_ready());

        ap.remove_is_ready_callback();
        assert!(!ap.has_is_ready_callback());
        assert!(ap.is_ready());
    }

    #[test]
    fn test_modified_flag_tracks_changes() {
        let mut ap = AnimationParameters::new();
        assert!(!ap.is_modified());
        ap.set_current_frame(0); // no change, no flag
        assert!(!ap.is_modified());
        ap.set_frame_count(5);
        assert!(ap.is_modified());
        ap.reset_modified();
        ap.set_dt(0.1);
        assert!(ap.is_modified());
    }
}
