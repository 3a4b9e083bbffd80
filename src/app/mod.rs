pub mod archive;
pub mod cadence;
pub mod ports;
pub mod update_use_case;
