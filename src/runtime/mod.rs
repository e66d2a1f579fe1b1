pub mod error;
pub mod estimator;
pub mod frame;
pub mod machine;
pub mod rts;
pub mod value;
