//! Guide correlation
//!
//! Attaches a parsed guide to a playlist. Programmes match a channel when
//! their `channel_id` equals the channel's `id` or `epg_id`. Unmatched
//! programmes are kept; filtering by channel happens at query time.

use std::collections::HashSet;

use crate::models::{Channel, Playlist, Program};

/// Merges guide entries into playlists and answers per-channel queries
pub struct GuideCorrelator;

impl GuideCorrelator {
    /// Return `playlist` with `programs` replaced by the given guide
    pub fn attach(mut playlist: Playlist, programs: Vec<Program>) -> Playlist {
        let keys: HashSet<&str> = playlist
            .channels
            .iter()
            .flat_map(|c| std::iter::once(c.id.as_str()).chain(c.epg_id.as_deref()))
            .collect();

        let matched = programs
            .iter()
            .filter(|p| keys.contains(p.channel_id.as_str()))
            .count();

        tracing::info!(
            "programs" = programs.len(),
            "matched" = matched,
            "orphans" = programs.len() - matched,
            "Guide attached to playlist"
        );

        playlist.programs = programs;
        playlist
    }

    /// Programmes for one channel, ordered by start time
    pub fn programs_for<'a>(playlist: &'a Playlist, channel: &Channel) -> Vec<&'a Program> {
        let mut programs: Vec<&Program> = playlist
            .programs
            .iter()
            .filter(|p| channel.matches_guide_ref(&p.channel_id))
            .collect();
        programs.sort_by_key(|p| p.start_time);
        programs
    }

    /// Programme airing on `channel` at `at` (epoch millis)
    pub fn now_playing<'a>(playlist: &'a Playlist, channel: &Channel, at: i64) -> Option<&'a Program> {
        playlist
            .programs
            .iter()
            .filter(|p| channel.matches_guide_ref(&p.channel_id))
            .find(|p| p.is_airing_at(at))
    }
}
