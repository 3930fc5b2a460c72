// Domain layer: probe reports and the probe port. No network code here.

pub mod model;
pub mod ports;
