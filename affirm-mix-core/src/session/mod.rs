pub mod events;
pub mod mixer_session;
pub mod transport;
