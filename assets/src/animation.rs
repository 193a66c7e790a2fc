//! Keyframed skeletal animation.

use glam::{Quat, Vec3};
use redlilium_persist::{Class, Fields, Owned, Shared, TypeTag};

use crate::asset::Asset;
use crate::skeleton::Skeleton;

/// Keyframes of one joint.
///
/// `rotations` and `translations` each hold one key per entry of `times`.
#[derive(Debug, Clone, Default)]
pub struct Track {
    pub joint: u32,
    pub times: Vec<f32>,
    pub rotations: Vec<Quat>,
    pub translations: Vec<Vec3>,
}

impl Track {
    pub fn new(joint: u32) -> Self {
        Self {
            joint,
            ..Default::default()
        }
    }

    pub fn push_key(&mut self, time: f32, rotation: Quat, translation: Vec3) {
        self.times.push(time);
        self.rotations.push(rotation);
        self.translations.push(translation);
    }

    /// Time of the last key.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Interpolated pose at `time`, clamped to the first and last keys.
    pub fn sample(&self, time: f32) -> Option<(Quat, Vec3)> {
        let last = self.times.len().checked_sub(1)?;
        let next = self.times.partition_point(|&t| t <= time);
        if next == 0 {
            return Some((self.rotations[0], self.translations[0]));
        }
        if next > last {
            return Some((self.rotations[last], self.translations[last]));
        }
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let t = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        Some((
            self.rotations[prev].slerp(self.rotations[next], t),
            self.translations[prev].lerp(self.translations[next], t),
        ))
    }
}

impl Class for Track {
    const TAG: TypeTag = TypeTag::from_fourcc(b"TRCK");
    const NAME: &'static str = "Track";

    fn describe(fields: &mut Fields<Self>) {
        fields
            .value("joint", |t| &t.joint, |t| &mut t.joint)
            .value_list("times", |t| &t.times, |t| &mut t.times)
            .value_list("rotations", |t| &t.rotations, |t| &mut t.rotations)
            .value_list("translations", |t| &t.translations, |t| &mut t.translations);
    }
}

/// A clip for one skeleton. Owns its tracks; shares the skeleton.
#[derive(Debug, Default)]
pub struct Animation {
    pub base: Asset,
    pub duration: f32,
    pub skeleton: Shared<Skeleton>,
    pub tracks: Vec<Owned<Track>>,
}

impl Animation {
    pub fn new(name: impl Into<String>, skeleton: Shared<Skeleton>) -> Self {
        Self {
            base: Asset::new(name),
            skeleton,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    /// Adds a track and extends the duration to cover it.
    pub fn add_track(&mut self, track: Track) {
        self.duration = self.duration.max(track.end_time());
        self.tracks.push(Owned::new(track));
    }
}

impl Class for Animation {
    const TAG: TypeTag = TypeTag::from_fourcc(b"ANIM");
    const NAME: &'static str = "Animation";
    const PARENT: Option<TypeTag> = Some(Asset::TAG);

    fn describe(fields: &mut Fields<Self>) {
        fields
            .base("base", |a| &a.base, |a| &mut a.base)
            .value("duration", |a| &a.duration, |a| &mut a.duration)
            .resource("skeleton", |a| &a.skeleton, |a| &mut a.skeleton)
            .owned_list("tracks", |a| &a.tracks, |a| &mut a.tracks);
    }
}
