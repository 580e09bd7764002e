//! Ping-pong bookkeeping and the per-frame pass plan.

use crate::settings::RenderSettings;

/// One of the two ping-pong targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Slot::A => 0,
            Slot::B => 1,
        }
    }
}

/// Two same-sized targets and which of them currently holds the image.
///
/// Passes read `front` and write `back`, then [`swap`](Self::swap). A pass
/// that does not run must not swap.
#[derive(Debug, Clone)]
pub struct TargetChain<T> {
    targets: [T; 2],
    front: Slot,
}

impl<T> TargetChain<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            targets: [a, b],
            front: Slot::A,
        }
    }

    pub fn front_slot(&self) -> Slot {
        self.front
    }

    pub fn front(&self) -> &T {
        self.get(self.front)
    }

    pub fn back(&self) -> &T {
        self.get(self.front.other())
    }

    pub fn get(&self, slot: Slot) -> &T {
        &self.targets[slot.index()]
    }

    pub fn swap(&mut self) {
        self.front = self.front.other();
    }

    /// Starts a frame with the image in `A`.
    pub fn reset(&mut self) {
        self.front = Slot::A;
    }
}

/// One step of the user post-processing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostStep {
    pub effect: usize,
    pub read: Slot,
    pub write: Slot,
}

/// The reads and writes of an effect chain of `len` steps that starts and
/// must end in `front`.
///
/// Even steps read `front` and write the other target, odd steps the
/// reverse, so no step reads what it writes. The returned flag is set when
/// the last write landed in the other target and has to be copied back.
pub fn plan_post_chain(len: usize, front: Slot) -> (Vec<PostStep>, bool) {
    let steps = (0..len)
        .map(|effect| {
            let read = if effect % 2 == 0 { front } else { front.other() };
            PostStep {
                effect,
                read,
                write: read.other(),
            }
        })
        .collect();
    (steps, len % 2 == 1)
}

/// Replays an effect chain over `chain`.
///
/// `apply` runs one step from its read target into its write target and
/// `copy` moves the last result back into the front target after an odd
/// number of steps. The front slot never moves.
pub fn run_post_chain<T>(
    chain: &TargetChain<T>,
    steps: &[PostStep],
    copy_back: bool,
    mut apply: impl FnMut(&PostStep, &T, &T),
    copy: impl FnOnce(&T, &T),
) {
    for step in steps {
        apply(step, chain.get(step.read), chain.get(step.write));
    }
    if let (true, Some(last)) = (copy_back, steps.last()) {
        copy(chain.get(last.write), chain.front());
    }
}

/// Which gated passes run this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramePlan {
    pub shadow: bool,
    pub skybox: bool,
    pub resolve: bool,
    pub bloom: bool,
    pub blur: bool,
    pub depth_of_field: bool,
    pub post_processing: bool,
}

impl FramePlan {
    /// Decides the gated passes from the settings and what the frame has.
    ///
    /// `samples` is the effective sample count, `has_sun` whether a shadow
    /// casting light exists, `has_skybox` whether a sky cubemap was set and
    /// `effects` the number of active post-processing effects.
    pub fn new(
        settings: &RenderSettings,
        samples: u32,
        has_sun: bool,
        has_skybox: bool,
        effects: usize,
    ) -> Self {
        let post_processing = settings.post_processing && effects > 0;
        Self {
            shadow: settings.shadow_map && has_sun,
            skybox: has_skybox,
            resolve: samples > 1,
            bloom: settings.bloom,
            blur: settings.needs_blur(effects),
            depth_of_field: settings.depth_of_field,
            post_processing,
        }
    }

    /// The effect chain of this frame, starting at `front`. Empty when post
    /// processing does not run.
    pub fn post_chain(&self, effects: usize, front: Slot) -> (Vec<PostStep>, bool) {
        if self.post_processing {
            plan_post_chain(effects, front)
        } else {
            (Vec::new(), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn swap_toggles_front_and_back() {
        let mut chain = TargetChain::new("a", "b");
        assert_eq!(*chain.front(), "a");
        chain.swap();
        assert_eq!(*chain.front(), "b");
        assert_eq!(*chain.back(), "a");
        chain.reset();
        assert_eq!(chain.front_slot(), Slot::A);
    }

    #[test]
    fn no_step_reads_its_own_target() {
        for len in 0..6 {
            let (steps, _) = plan_post_chain(len, Slot::B);
            for step in &steps {
                assert_ne!(step.read, step.write);
            }
            for pair in steps.windows(2) {
                assert_eq!(pair[1].read, pair[0].write);
            }
        }
    }

    #[test]
    fn chain_ends_in_front() {
        for len in 1..6 {
            let (steps, copy_back) = plan_post_chain(len, Slot::A);
            let last = steps.last().unwrap().write;
            assert_eq!(copy_back, last != Slot::A, "len {len}");
        }
    }

    #[test]
    fn empty_chain_does_nothing() {
        let (steps, copy_back) = plan_post_chain(0, Slot::A);
        assert!(steps.is_empty());
        assert!(!copy_back);
    }

    /// Each target holds the effects applied to the scene image so far.
    fn run(plan: &FramePlan, effects: usize, front: Slot) -> (TargetChain<RefCell<Vec<usize>>>, usize) {
        let mut chain = TargetChain::new(RefCell::new(Vec::new()), RefCell::new(vec![99]));
        if front == Slot::B {
            chain.targets.swap(0, 1);
            chain.swap();
        }
        let (steps, copy_back) = plan.post_chain(effects, chain.front_slot());
        let mut copies = 0;
        run_post_chain(
            &chain,
            &steps,
            copy_back,
            |step, read, write| {
                let mut image = read.borrow().clone();
                image.push(step.effect);
                *write.borrow_mut() = image;
            },
            |from, to| {
                *to.borrow_mut() = from.borrow().clone();
                copies += 1;
            },
        );
        (chain, copies)
    }

    #[test]
    fn effect_chain_ends_in_the_starting_front() {
        let settings = RenderSettings {
            post_processing: true,
            ..Default::default()
        };
        for effects in 0..4 {
            for front in [Slot::A, Slot::B] {
                let plan = FramePlan::new(&settings, 1, false, false, effects);
                let (chain, copies) = run(&plan, effects, front);
                assert_eq!(chain.front_slot(), front);
                assert_eq!(
                    *chain.front().borrow(),
                    (0..effects).collect::<Vec<_>>(),
                    "{effects} effects from {front:?}"
                );
                assert_eq!(copies, effects % 2, "{effects} effects");
            }
        }
    }

    #[test]
    fn disabled_post_processing_leaves_front_untouched() {
        let settings = RenderSettings {
            post_processing: false,
            ..Default::default()
        };
        let plan = FramePlan::new(&settings, 1, false, false, 3);
        let (chain, copies) = run(&plan, 3, Slot::B);
        assert_eq!(chain.front_slot(), Slot::B);
        assert!(chain.front().borrow().is_empty());
        assert_eq!(*chain.back().borrow(), [99]);
        assert_eq!(copies, 0);
    }

    #[test]
    fn gated_passes_follow_settings() {
        let settings = RenderSettings {
            shadow_map: true,
            bloom: false,
            depth_of_field: true,
            post_processing: true,
            ..Default::default()
        };
        let plan = FramePlan::new(&settings, 4, false, true, 0);
        assert!(!plan.shadow, "no sun, no shadow");
        assert!(plan.resolve);
        assert!(!plan.bloom);
        assert!(plan.blur && plan.depth_of_field);
        assert!(!plan.post_processing, "no effects to run");

        let plan = FramePlan::new(&settings, 1, true, false, 2);
        assert!(plan.shadow && !plan.resolve && !plan.skybox && plan.post_processing);
    }
}
