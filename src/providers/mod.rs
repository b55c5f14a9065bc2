pub mod brsapi;
pub mod nobitex;
pub mod util;
