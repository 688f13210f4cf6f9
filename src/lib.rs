pub mod blocking;
pub mod dto;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matching;
pub mod model;
pub mod pipeline;
pub mod response;
pub mod scorer;
pub mod similarity;
pub mod training;
pub mod util;
