pub mod exposure;
pub mod gate;
pub mod limits;
pub mod sizing;
pub mod stop_loss;
