pub mod debug_log;
pub mod population;
pub mod travel;
