pub mod ecg;
pub mod peaks;
