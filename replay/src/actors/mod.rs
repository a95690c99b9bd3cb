pub mod player;

pub use player::{
    PlayerError, ReplayPlayer, ReplayPlayerActor, ReplayPlayerArguments, ReplayPlayerMsg,
};
