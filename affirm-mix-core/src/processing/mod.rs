pub mod bus_mixer;
pub mod channel;
pub mod gain_ramp;
pub mod graph;
