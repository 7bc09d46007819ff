//! Built-in device families.

pub mod cisco_ios;
pub mod f5_bigip;
