pub mod audio;
pub mod export;
pub mod playback;
