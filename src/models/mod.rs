pub mod playlist;
pub mod program;

pub use playlist::{
    group_id, Attributes, Channel, Group, GroupSet, Playlist, PlaylistHeader, PlaylistSnapshot,
    DEFAULT_PLAYLIST_NAME,
};
pub use program::Program;
