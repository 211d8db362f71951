pub mod audio_source;
pub mod event_sink;
pub mod grant_provider;
pub mod presenter;
