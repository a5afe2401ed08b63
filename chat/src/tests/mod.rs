mod membership;
pub mod utils;
