pub mod ast;
pub mod cexpr;
pub mod cps;
pub mod errors;
pub mod flatness;
pub mod fresh;
pub mod hygiene;
pub mod lift;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod span;
pub mod tags;
pub mod token;
